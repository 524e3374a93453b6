//! The xtasks model (`'X'`): per-thread subsystem stack.
//!
//! A single recognized event, category `'s'` value `'e'`, carries a 16-byte
//! payload laid out as `u64 value` (offset 0), `u32 id` (offset 8), `u32
//! type` (offset 12). `type == 0` pushes, `type == 1` pops; the
//! pushed/popped value is `value` when `id` equals the sentinel API-call id
//! (`EV_APICALL`, 85), otherwise `id` itself, telling apart "which" API call
//! (task creation vs. taskwait) from ones where the id alone already
//! identifies the call.

use crate::error::Error;
use crate::registry::{Model, ProbeCtx, ProbeVerdict};
use ovni_chan::{Bay, ChanId, Channel, Value};
use ovni_output::PcfBuilder;
use ovni_stream::DecodedEvent;
use ovni_system::{Gindex, System};

pub const MODEL_BYTE: u8 = b'X';

/// PRV type constant for the per-thread subsystem-stack row.
pub const SUBSYSTEM_PRV_TYPE: u32 = 20;

/// Sentinel id meaning "this is a generic API call; use the value field to
/// tell which one instead."
const EV_APICALL: u32 = 85;

struct ThreadExt {
    subsystem_chan: ChanId,
}

pub struct XtasksModel;

impl XtasksModel {
    pub fn new() -> Self {
        XtasksModel
    }

    /// The channel a driver should subscribe a `thread.prv` writer to for
    /// this thread's subsystem-stack row.
    pub fn subsystem_channel(sys: &System, model_id: usize, thread: Gindex) -> ChanId {
        sys.threads[thread].ext.get::<ThreadExt>(model_id).unwrap().subsystem_chan
    }
}

impl Default for XtasksModel {
    fn default() -> Self {
        Self::new()
    }
}

impl Model for XtasksModel {
    fn name(&self) -> &'static str {
        "xtasks"
    }

    fn model_byte(&self) -> u8 {
        MODEL_BYTE
    }

    fn probe(&mut self, _model_id: usize, ctx: &ProbeCtx) -> ProbeVerdict {
        if ctx.n_threads == 0 {
            return ProbeVerdict::Disable;
        }
        ProbeVerdict::Enable
    }

    fn create(&mut self, model_id: usize, sys: &mut System, bay: &mut Bay) -> Result<(), Error> {
        for gindex in 0..sys.threads.len() {
            let chan = bay.add_channel(Channel::new_stack(
                format!("thread.{}.subsystem", gindex + 1),
                Channel::DEFAULT_MAX_DEPTH,
            ));
            sys.threads[gindex]
                .ext
                .set(model_id, ThreadExt { subsystem_chan: chan });
        }
        Ok(())
    }

    fn connect(&mut self, _model_id: usize, _sys: &mut System, _bay: &mut Bay) -> Result<(), Error> {
        // No cross-thread wiring: each thread's subsystem stack is
        // self-contained.
        Ok(())
    }

    fn event(
        &mut self,
        model_id: usize,
        sys: &mut System,
        bay: &mut Bay,
        gindex: usize,
        event: &DecodedEvent,
        pcf: &mut PcfBuilder,
    ) -> Result<(), Error> {
        if event.category != b's' || event.value != b'e' {
            return Err(Error::UnexpectedEvent {
                model: self.name(),
                model_byte: event.model,
                category: event.category,
                value: event.value,
            });
        }

        let payload = &event.payload;
        if payload.len() != 16 {
            return Err(Error::MalformedPayload {
                model: self.name(),
                category: event.category,
                value: event.value,
                reason: format!("expected a 16-byte payload, got {}", payload.len()),
            });
        }

        let value = u64::from_le_bytes(payload[0..8].try_into().unwrap());
        let id = u32::from_le_bytes(payload[8..12].try_into().unwrap());
        let kind = u32::from_le_bytes(payload[12..16].try_into().unwrap());
        let id_or_value: i64 = if id == EV_APICALL { value as i64 } else { id as i64 };

        let chan = sys.threads[gindex]
            .ext
            .get::<ThreadExt>(model_id)
            .unwrap()
            .subsystem_chan;

        pcf.register_value(SUBSYSTEM_PRV_TYPE, id_or_value, format!("{id_or_value:#x}"));

        match kind {
            0 => {
                bay.push_stack(chan, Value::Int(id_or_value))?;
            }
            1 => {
                bay.pop_stack(chan, Some(Value::Int(id_or_value)))?;
            }
            other => {
                return Err(Error::MalformedPayload {
                    model: self.name(),
                    category: event.category,
                    value: event.value,
                    reason: format!("unknown subsystem event type {other}"),
                });
            }
        }
        Ok(())
    }

    fn finish(&mut self, _model_id: usize, _sys: &System, _bay: &Bay) -> Result<(), Error> {
        Ok(())
    }
}
