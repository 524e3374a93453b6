use crate::machine::ThreadState;
use std::any::Any;

/// Dense global index. Entities are stored in flat `Vec`s indexed directly
/// by this value instead of behind a hash table or intrusive linked list —
/// the id space is small, contiguous, and assigned once at build time, so a
/// direct index is both simpler and faster than hashing.
pub type Gindex = usize;

/// Per-entity extension slot: one model installs at most one value per
/// entity, keyed by the model's dense registration id. A fixed-size slot
/// array sized to the registered model count, rather than a
/// `HashMap<ModelId, Box<dyn Any>>`, for the same reason `Gindex` is a plain
/// array index: the key space (registered models) is small and known at
/// connect time.
#[derive(Default)]
pub struct ExtSlots {
    slots: Vec<Option<Box<dyn Any + Send>>>,
}

impl ExtSlots {
    pub fn with_capacity(n_models: usize) -> Self {
        let mut slots = Vec::with_capacity(n_models);
        slots.resize_with(n_models, || None);
        Self { slots }
    }

    pub fn set<T: Any + Send>(&mut self, model_id: usize, value: T) {
        self.slots[model_id] = Some(Box::new(value));
    }

    pub fn get<T: Any + Send>(&self, model_id: usize) -> Option<&T> {
        self.slots[model_id]
            .as_ref()
            .and_then(|b| b.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any + Send>(&mut self, model_id: usize) -> Option<&mut T> {
        self.slots[model_id]
            .as_mut()
            .and_then(|b| b.downcast_mut::<T>())
    }
}

pub struct Cpu {
    pub gindex: Gindex,
    pub loom_gindex: Gindex,
    /// `None` for the loom's single virtual CPU.
    pub phyid: Option<i64>,
    /// Threads currently mapped onto this CPU.
    pub occupants: Vec<Gindex>,
    /// How many of `occupants` are in `ThreadState::Running`.
    pub running_count: usize,
    pub ext: ExtSlots,
}

impl Cpu {
    pub fn is_virtual(&self) -> bool {
        self.phyid.is_none()
    }
}

pub struct Thread {
    pub gindex: Gindex,
    pub loom_gindex: Gindex,
    pub proc_gindex: Gindex,
    pub tid: i64,
    pub relpath: String,
    pub state: ThreadState,
    pub cpu: Option<Gindex>,
    pub ext: ExtSlots,
}

impl Thread {
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }
}

pub struct Process {
    pub gindex: Gindex,
    pub loom_gindex: Gindex,
    pub pid: i64,
    pub app_id: i64,
    pub rank: Option<i64>,
    pub threads: Vec<Gindex>,
    pub ext: ExtSlots,
}

pub struct Loom {
    pub gindex: Gindex,
    pub hostname: String,
    pub loom_id: String,
    pub clock_offset: i64,
    /// Physical CPU gindexes, ascending by phyid.
    pub cpus: Vec<Gindex>,
    pub vcpu: Gindex,
    pub processes: Vec<Gindex>,
    pub ext: ExtSlots,
}
