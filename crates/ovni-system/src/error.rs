use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid system: {0}")]
    InvalidSystem(String),

    #[error("unknown cpu phyid {phyid} in loom {loom_gindex}")]
    UnknownCpu { loom_gindex: usize, phyid: i64 },

    #[error("unknown thread tid {tid} in loom {loom_gindex}")]
    UnknownThread { loom_gindex: usize, tid: i64 },

    #[error("illegal transition: thread {gindex} in state {state:?} got event '{event}'")]
    BadTransition {
        gindex: usize,
        state: crate::machine::ThreadState,
        event: char,
    },
}
