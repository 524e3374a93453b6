//! The channel registry and propagation engine.
//!
//! A `Bay` owns every [`Channel`] and [`Mux`] in the system and is the only
//! thing allowed to flush them. Models mutate channels through the bay's
//! `set_scalar`/`push_stack`/`pop_stack`, which record which channels went
//! dirty; once an event's model handlers have all run, the driver calls
//! [`Bay::propagate`] once to settle every mux output that depends, directly
//! or transitively, on what changed.
//!
//! This mirrors a broadcast ring in spirit: one registry that writers
//! publish into and that independently tracks each subscriber's state,
//! just replacing per-reader cursors with a dirty-propagation BFS since
//! every channel here has exactly one flush per step instead of a
//! free-running sequence number.

use crate::channel::{Channel, Value};
use crate::error::Error;
use crate::mux::Mux;
use crate::{ChanId, MuxId};
use std::collections::BTreeSet;

pub struct Bay {
    channels: Vec<Channel>,
    muxes: Vec<Mux>,
    /// channel id -> muxes that read it as an input or a selector.
    subscribers: Vec<Vec<MuxId>>,
    /// channels dirtied since the last `propagate()`.
    pending: BTreeSet<ChanId>,
}

impl Bay {
    pub fn new() -> Self {
        Bay {
            channels: Vec::new(),
            muxes: Vec::new(),
            subscribers: Vec::new(),
            pending: BTreeSet::new(),
        }
    }

    pub fn add_channel(&mut self, channel: Channel) -> ChanId {
        let id = self.channels.len();
        self.channels.push(channel);
        self.subscribers.push(Vec::new());
        id
    }

    /// Registers a mux reading `inputs` through `selector`, creating and
    /// returning its output channel's id alongside the mux's own id.
    pub fn add_mux(
        &mut self,
        name: impl Into<String>,
        selector: ChanId,
        inputs: Vec<ChanId>,
    ) -> (MuxId, ChanId) {
        let output = self.add_channel(Channel::new_scalar(name));
        let mux_id = self.muxes.len();
        self.subscribers[selector].push(mux_id);
        for &input in &inputs {
            self.subscribers[input].push(mux_id);
        }
        self.muxes.push(Mux {
            output,
            selector,
            inputs,
        });
        (mux_id, output)
    }

    pub fn channel(&self, id: ChanId) -> &Channel {
        &self.channels[id]
    }

    pub fn last(&self, id: ChanId) -> Value {
        self.channels[id].last()
    }

    pub fn set_scalar(&mut self, id: ChanId, value: Value) -> Result<(), Error> {
        self.channels[id].set(value)?;
        if self.channels[id].is_dirty() {
            self.pending.insert(id);
        }
        Ok(())
    }

    pub fn push_stack(&mut self, id: ChanId, value: Value) -> Result<(), Error> {
        self.channels[id].push(value)?;
        self.pending.insert(id);
        Ok(())
    }

    pub fn pop_stack(&mut self, id: ChanId, expect: Option<Value>) -> Result<Value, Error> {
        let popped = self.channels[id].pop(expect)?;
        self.pending.insert(id);
        Ok(popped)
    }

    /// Settles every mux output affected by this step's writes.
    ///
    /// Flushes all channels dirtied this step in ascending id order (their
    /// registration order, for determinism), re-evaluates any mux
    /// subscribed to one whose visible value actually changed, and queues
    /// that mux's output for the next round. Bounded at `4 * |channels|`
    /// rounds: with no cycles in the subscriber graph a single round always
    /// suffices, so a real mux network settles in 2-3; the bound only
    /// exists to turn an accidental cycle into an error instead of a hang.
    pub fn propagate(&mut self) -> Result<(), Error> {
        let bound = 4 * self.channels.len().max(1);
        let mut to_flush: BTreeSet<ChanId> = std::mem::take(&mut self.pending);
        let mut round = 0;

        while !to_flush.is_empty() {
            round += 1;
            if round > bound {
                return Err(Error::PropagationCycle {
                    bound,
                    channels: self.channels.len(),
                });
            }

            let batch: Vec<ChanId> = to_flush.iter().copied().collect();
            to_flush.clear();

            for id in batch {
                let changed = self.channels[id].flush();
                if !changed {
                    continue;
                }
                for mux_id in self.subscribers[id].clone() {
                    if let Some(out) = self.reevaluate_mux(mux_id) {
                        to_flush.insert(out);
                    }
                }
            }
        }
        Ok(())
    }

    /// Recomputes one mux's pending output from its current selector/input
    /// values. Returns the output channel id if this left it dirty.
    fn reevaluate_mux(&mut self, mux_id: MuxId) -> Option<ChanId> {
        let mux = &self.muxes[mux_id];
        let selector_value = self.channels[mux.selector()].last();
        let input_values: Vec<Value> = mux
            .inputs()
            .iter()
            .map(|&id| self.channels[id].last())
            .collect();
        let resolved = mux.resolve(selector_value, &input_values);
        let output = mux.output();
        // `set` never fails on a scalar channel; the mux output is always
        // created as one by `add_mux`.
        self.channels[output].set(resolved).ok()?;
        if self.channels[output].is_dirty() {
            Some(output)
        } else {
            None
        }
    }
}

impl Default for Bay {
    fn default() -> Self {
        Self::new()
    }
}
