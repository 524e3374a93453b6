//! Multiplexers: a selector channel picks which of N input channels a mux's
//! output channel mirrors.
//!
//! The index arithmetic is deliberately dumb: `Mux` just reads whatever
//! index its selector channel last settled on and copies that input's
//! value out, the same way a ring buffer turns a raw sequence number into
//! a slot index with nothing fancier than a mask. Deciding
//! *which* index the selector should hold (one running thread among a
//! CPU's occupants, say) is the caller's problem — see [`select_index`].

use crate::channel::Value;
use crate::{ChanId, MuxId};

/// A mux: one output, one selector, N inputs. Lives inside a [`crate::bay::Bay`],
/// which owns the actual [`crate::channel::Channel`]s by id.
pub struct Mux {
    pub(crate) output: ChanId,
    pub(crate) selector: ChanId,
    pub(crate) inputs: Vec<ChanId>,
}

impl Mux {
    pub fn output(&self) -> ChanId {
        self.output
    }

    pub fn selector(&self) -> ChanId {
        self.selector
    }

    pub fn inputs(&self) -> &[ChanId] {
        &self.inputs
    }

    /// Given the selector's current value and the inputs' current values,
    /// what should the output become? Null selector, or a selector out of
    /// `[0, inputs.len())`, both yield null — an out-of-range selector is
    /// not a hard error here, since a one-step race between an input
    /// disappearing and the selector catching up is expected, not a bug.
    pub(crate) fn resolve(&self, selector_value: Value, input_values: &[Value]) -> Value {
        match selector_value.as_i64() {
            Some(idx) if idx >= 0 && (idx as usize) < input_values.len() => {
                input_values[idx as usize]
            }
            _ => Value::Null,
        }
    }
}

/// The state a mux's upstream candidates use when deciding what the
/// selector channel should hold. `Active` also covers cooling/warming: a
/// thread occupies the CPU without necessarily being the one scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    Inactive,
    Active,
    Running,
}

/// The closed set of selection rules a [`Mux`]'s selector can be computed
/// with. `Any`/`Running`/`Active` all share the same tie-breaking rule:
/// exactly one matching candidate selects it, zero or more than one yields
/// null (an idle CPU and an oversubscribed CPU look the same to the mux:
/// neither has a single well-defined occupant to mirror).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    Any,
    Running,
    Active,
}

/// Computes the selector index for a list of candidates under `mode`, per
/// [`SelectMode`]'s tie-breaking rule.
pub fn select_index(candidates: &[Candidate], mode: SelectMode) -> Option<usize> {
    let matches = |c: &Candidate| match mode {
        SelectMode::Any => !matches!(c, Candidate::Inactive),
        SelectMode::Running => matches!(c, Candidate::Running),
        SelectMode::Active => matches!(c, Candidate::Active | Candidate::Running),
    };
    let mut found = None;
    for (i, c) in candidates.iter().enumerate() {
        if matches(c) {
            if found.is_some() {
                return None;
            }
            found = Some(i);
        }
    }
    found
}
