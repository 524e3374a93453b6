//! `ovni-chan`: the dataflow layer between model event handlers and the
//! output writer.
//!
//! Models observe raw trace events and turn them into channel writes
//! (`set`/`push`/`pop`); a [`bay::Bay`] flushes those writes to a fixpoint
//! once per step and a [`mux::Mux`]/[`track::Track`] reduce several
//! per-thread channels into one per-CPU signal. The output writer then
//! reads each channel's `last()` value whenever it changed.

mod bay;
mod channel;
mod error;
mod mux;
mod track;

/// Dense index into a [`bay::Bay`]'s channel list.
pub type ChanId = usize;
/// Dense index into a [`bay::Bay`]'s mux list.
pub type MuxId = usize;

pub use bay::Bay;
pub use channel::{Channel, Value};
pub use error::Error;
pub use mux::{select_index, Candidate, Mux, SelectMode};
pub use track::Track;
