//! The abstract-machine state: loom/process/thread/CPU graph, system
//! builder, and thread/CPU lifecycle rules.

mod builder;
mod entities;
mod error;
mod machine;
mod system;

pub use builder::build;
pub use entities::{Cpu, ExtSlots, Gindex, Loom, Process, Thread};
pub use error::Error;
pub use machine::{CpuAggregate, ThreadState};
pub use system::System;
