//! Model registry: probe/create/connect/event/finish lifecycle, dispatched
//! by model-tag byte.
//!
//! A driver holds a fixed ordered set of models and drives them through an
//! explicit lifecycle: `probe` all of them, `create` then `connect` the
//! enabled ones, then route each decoded event to its owning model by
//! `model_byte`.

use crate::error::Error;
use ovni_chan::Bay;
use ovni_output::PcfBuilder;
use ovni_stream::DecodedEvent;
use ovni_system::System;

/// What a model decided during `probe`.
pub enum ProbeVerdict {
    Enable,
    Disable,
    Error(String),
}

/// Read-only context available to `probe`, before `create`/`connect` run.
pub struct ProbeCtx {
    pub n_threads: usize,
}

/// One pluggable model: recognizes events tagged with its `model_byte` and
/// turns them into abstract-machine transitions and channel writes.
pub trait Model: Send {
    fn name(&self) -> &'static str;
    fn model_byte(&self) -> u8;

    /// Names of other models this one requires to be enabled. Empty by
    /// default — most models are self-contained.
    fn depends_on(&self) -> &[&'static str] {
        &[]
    }

    fn probe(&mut self, model_id: usize, ctx: &ProbeCtx) -> ProbeVerdict;
    fn create(&mut self, model_id: usize, sys: &mut System, bay: &mut Bay) -> Result<(), Error>;
    fn connect(&mut self, model_id: usize, sys: &mut System, bay: &mut Bay) -> Result<(), Error>;
    fn event(
        &mut self,
        model_id: usize,
        sys: &mut System,
        bay: &mut Bay,
        gindex: usize,
        event: &DecodedEvent,
        pcf: &mut PcfBuilder,
    ) -> Result<(), Error>;
    fn finish(&mut self, model_id: usize, sys: &System, bay: &Bay) -> Result<(), Error>;
}

pub struct Registry {
    models: Vec<Box<dyn Model>>,
    enabled: Vec<bool>,
    /// Unknown model byte in an event: warn and ignore by default, fatal
    /// when the linter runs in strict mode.
    strict: bool,
}

impl Registry {
    pub fn new(strict: bool) -> Self {
        Registry {
            models: Vec::new(),
            enabled: Vec::new(),
            strict,
        }
    }

    pub fn n_models(&self) -> usize {
        self.models.len()
    }

    /// Registers a model and returns its dense registration id, used to
    /// key that model's slot in every entity's [`ovni_system::ExtSlots`].
    pub fn register(&mut self, model: Box<dyn Model>) -> usize {
        let id = self.models.len();
        self.models.push(model);
        self.enabled.push(true);
        id
    }

    pub fn is_enabled(&self, model_id: usize) -> bool {
        self.enabled[model_id]
    }

    /// Probes every model, then propagates disables across dependencies
    /// until no further model needs to change: if model A depends on B and
    /// B ends up disabled, A is disabled too, with a warning.
    pub fn probe_all(&mut self, ctx: &ProbeCtx, enable_all: bool) -> Result<(), Error> {
        for id in 0..self.models.len() {
            match self.models[id].probe(id, ctx) {
                ProbeVerdict::Enable => self.enabled[id] = true,
                ProbeVerdict::Disable => {
                    self.enabled[id] = false;
                    tracing::info!(model = self.models[id].name(), "model disabled by probe");
                }
                ProbeVerdict::Error(reason) => {
                    return Err(Error::ProbeFailed {
                        model: self.models[id].name(),
                        reason,
                    });
                }
            }
            if enable_all {
                self.enabled[id] = true;
            }
        }

        loop {
            let mut changed = false;
            for id in 0..self.models.len() {
                if !self.enabled[id] {
                    continue;
                }
                for dep in self.models[id].depends_on() {
                    let dep_enabled = self
                        .models
                        .iter()
                        .position(|m| m.name() == *dep)
                        .is_some_and(|dep_id| self.enabled[dep_id]);
                    if !dep_enabled {
                        tracing::warn!(
                            model = self.models[id].name(),
                            depends_on = *dep,
                            "disabling model: dependency is disabled"
                        );
                        self.enabled[id] = false;
                        changed = true;
                        break;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        Ok(())
    }

    pub fn create_all(&mut self, sys: &mut System, bay: &mut Bay) -> Result<(), Error> {
        for id in 0..self.models.len() {
            if self.enabled[id] {
                self.models[id].create(id, sys, bay)?;
            }
        }
        Ok(())
    }

    pub fn connect_all(&mut self, sys: &mut System, bay: &mut Bay) -> Result<(), Error> {
        for id in 0..self.models.len() {
            if self.enabled[id] {
                self.models[id].connect(id, sys, bay)?;
            }
        }
        Ok(())
    }

    /// Routes one event to the model owning its `model_byte`. An unknown
    /// or disabled byte is a warning (or a hard error in strict/linter
    /// mode); events for a known-but-disabled model are silently dropped,
    /// since disabling was itself an explicit (probed or dependency-driven)
    /// decision.
    pub fn dispatch_event(
        &mut self,
        sys: &mut System,
        bay: &mut Bay,
        gindex: usize,
        event: &DecodedEvent,
        pcf: &mut PcfBuilder,
    ) -> Result<(), Error> {
        let Some(id) = self.models.iter().position(|m| m.model_byte() == event.model) else {
            if self.strict {
                return Err(Error::UnknownModelByte { byte: event.model });
            }
            tracing::warn!(model_byte = event.model, "unknown model byte, ignoring event");
            return Ok(());
        };
        if !self.enabled[id] {
            tracing::debug!(model = self.models[id].name(), "event for disabled model, ignoring");
            return Ok(());
        }
        self.models[id].event(id, sys, bay, gindex, event, pcf)
    }

    pub fn finish_all(&mut self, sys: &System, bay: &Bay) -> Result<(), Error> {
        for id in 0..self.models.len() {
            if self.enabled[id] {
                self.models[id].finish(id, sys, bay)?;
            }
        }
        Ok(())
    }
}
