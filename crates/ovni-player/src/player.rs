//! The multi-stream merger: a min-heap of active streams keyed by
//! synchronized clock, popped one event at a time.
//!
//! Pull-driven rather than polling: every stream already has its next event
//! decoded (`Stream::current`), so `step` is just "pop the earliest,
//! advance it, push it back if it has more".

use crate::error::Error;
use ovni_stream::{Advance, DecodedEvent, Stream};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::PathBuf;

/// One stream plus the bookkeeping the player needs to merge it: the
/// thread's dense global index (for the heap tie-break) and its loom's
/// clock offset (for the synchronized clock).
pub struct StreamSlot {
    pub gindex: usize,
    pub path: PathBuf,
    pub stream: Stream,
    pub clock_offset: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct HeapKey {
    clock: i64,
    gindex: usize,
}

/// One merged event, tagged with the thread it came from and its
/// synchronized clock (raw clock + loom offset).
#[derive(Debug, Clone)]
pub struct PlayerEvent {
    pub gindex: usize,
    pub synchronized_clock: i64,
    pub event: DecodedEvent,
}

pub enum Step {
    Event(PlayerEvent),
    End,
}

pub struct Player {
    streams: Vec<StreamSlot>,
    heap: BinaryHeap<Reverse<HeapKey>>,
    last_clock: i64,
    nprocessed: u64,
    /// When true, an out-of-order clock is a hard error; otherwise it is
    /// logged and the step proceeds, matching the linter-mode switch.
    strict: bool,
}

impl Player {
    /// Builds the heap from each slot's already-decoded `current` event.
    /// A slot whose stream hit end-of-file during `Stream::open` (an empty
    /// `.obs` file) never enters the heap at all.
    pub fn init(slots: Vec<StreamSlot>, strict: bool) -> Self {
        let mut heap = BinaryHeap::with_capacity(slots.len());
        for slot in &slots {
            if let Some(ev) = slot.stream.current() {
                heap.push(Reverse(HeapKey {
                    clock: synchronized_clock(ev, slot.clock_offset),
                    gindex: slot.gindex,
                }));
            }
        }
        Player {
            streams: slots,
            heap,
            last_clock: i64::MIN,
            nprocessed: 0,
            strict,
        }
    }

    /// Pops the earliest active stream, decodes its current event out, and
    /// advances it so the next `step` sees whatever comes after.
    pub fn step(&mut self) -> Result<Step, Error> {
        let Some(Reverse(key)) = self.heap.pop() else {
            return Ok(Step::End);
        };

        if key.clock < self.last_clock {
            if self.strict {
                return Err(Error::ClockRegression {
                    gindex: key.gindex,
                    clock: key.clock,
                    last_clock: self.last_clock,
                });
            }
            tracing::warn!(
                gindex = key.gindex,
                clock = key.clock,
                last_clock = self.last_clock,
                "clock regression, continuing in non-strict mode"
            );
        }
        self.last_clock = self.last_clock.max(key.clock);

        let slot = &mut self.streams[key.gindex];
        let event = slot
            .stream
            .current()
            .expect("heap key implies a decoded current event")
            .clone();

        self.nprocessed += 1;

        if let Advance::Decoded = slot.stream.advance(&slot.path)? {
            let next = slot
                .stream
                .current()
                .expect("Advance::Decoded implies a new current event");
            self.heap.push(Reverse(HeapKey {
                clock: synchronized_clock(next, slot.clock_offset),
                gindex: key.gindex,
            }));
        }

        Ok(Step::Event(PlayerEvent {
            gindex: key.gindex,
            synchronized_clock: key.clock,
            event,
        }))
    }

    /// `Σ bytes_read / Σ file_size` across every stream, active or not.
    pub fn progress(&self) -> f64 {
        let (read, total) = self
            .streams
            .iter()
            .fold((0u64, 0u64), |(read, total), slot| {
                (
                    read + slot.stream.bytes_read() as u64,
                    total + slot.stream.file_size() as u64,
                )
            });
        if total == 0 {
            1.0
        } else {
            read as f64 / total as f64
        }
    }

    pub fn nprocessed(&self) -> u64 {
        self.nprocessed
    }
}

fn synchronized_clock(event: &DecodedEvent, clock_offset: i64) -> i64 {
    event.raw_clock as i64 + clock_offset
}
