//! Tracks: a per-CPU aggregate built from one channel per thread that can
//! run there, plus a selector channel telling the mux which thread is
//! currently "the" occupant.
//!
//! A `Track` doesn't decide *who* is selected — that logic lives with
//! whoever owns the abstract machine's thread states (see
//! [`crate::mux::select_index`]) — it only wires the bookkeeping: one input
//! per candidate thread, one selector, one mux output that the output
//! writer subscribes to as "this CPU's current thread".

use crate::bay::Bay;
use crate::channel::Value;
use crate::error::Error;
use crate::{ChanId, MuxId};

pub struct Track {
    mux_id: MuxId,
    output: ChanId,
    selector: ChanId,
    inputs: Vec<ChanId>,
}

impl Track {
    /// Registers a track whose candidates are `inputs`, in a fixed order
    /// the caller keeps stable across the track's lifetime (selector
    /// indices are positions into this same list).
    pub fn new(bay: &mut Bay, name: impl Into<String>, selector: ChanId, inputs: Vec<ChanId>) -> Self {
        let (mux_id, output) = bay.add_mux(name, selector, inputs.clone());
        Track {
            mux_id,
            output,
            selector,
            inputs,
        }
    }

    pub fn output(&self) -> ChanId {
        self.output
    }

    pub fn selector(&self) -> ChanId {
        self.selector
    }

    pub fn inputs(&self) -> &[ChanId] {
        &self.inputs
    }

    pub fn mux_id(&self) -> MuxId {
        self.mux_id
    }

    /// Points the selector at candidate `index` (a position into `inputs`),
    /// or clears it to null when nothing is uniquely selected.
    pub fn select(&self, bay: &mut Bay, index: Option<usize>) -> Result<(), Error> {
        let value = match index {
            Some(i) => Value::Int(i as i64),
            None => Value::Null,
        };
        bay.set_scalar(self.selector, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use crate::mux::{select_index, Candidate, SelectMode};

    #[test]
    fn track_mirrors_the_selected_thread_channel() {
        let mut bay = Bay::new();
        let t0 = bay.add_channel(Channel::new_scalar("thread0"));
        let t1 = bay.add_channel(Channel::new_scalar("thread1"));
        let selector = bay.add_channel(Channel::new_scalar("cpu0.sel"));
        let track = Track::new(&mut bay, "cpu0", selector, vec![t0, t1]);

        bay.set_scalar(t0, Value::Int(111)).unwrap();
        bay.set_scalar(t1, Value::Int(222)).unwrap();

        let idx = select_index(&[Candidate::Inactive, Candidate::Running], SelectMode::Running);
        track.select(&mut bay, idx).unwrap();
        bay.propagate().unwrap();

        assert_eq!(bay.last(track.output()), Value::Int(222));
    }

    #[test]
    fn track_goes_null_when_no_unique_occupant() {
        let mut bay = Bay::new();
        let t0 = bay.add_channel(Channel::new_scalar("thread0"));
        let t1 = bay.add_channel(Channel::new_scalar("thread1"));
        let selector = bay.add_channel(Channel::new_scalar("cpu0.sel"));
        let track = Track::new(&mut bay, "cpu0", selector, vec![t0, t1]);

        bay.set_scalar(t0, Value::Int(1)).unwrap();
        bay.set_scalar(t1, Value::Int(1)).unwrap();
        track.select(&mut bay, None).unwrap();
        bay.propagate().unwrap();

        assert_eq!(bay.last(track.output()), Value::Null);
    }
}
