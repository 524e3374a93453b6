//! `ovni-models`: the pluggable model registry, plus the two built-in
//! models (`host`, `xtasks`) that turn raw decoded events into
//! abstract-machine transitions and channel writes.

mod error;
mod host;
mod registry;
mod xtasks;

pub use error::Error;
pub use host::{HostModel, CPU_STATE_PRV_TYPE, THREAD_STATE_PRV_TYPE};
pub use registry::{Model, ProbeCtx, ProbeVerdict, Registry};
pub use xtasks::{XtasksModel, SUBSYSTEM_PRV_TYPE};
