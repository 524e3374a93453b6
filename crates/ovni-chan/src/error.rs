use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("stack channel '{name}' mismatch: popped {popped:?}, expected {expected:?}")]
    StackMismatch {
        name: String,
        popped: crate::channel::Value,
        expected: crate::channel::Value,
    },

    #[error("stack channel '{name}' overflowed max depth {max_depth}")]
    StackOverflow { name: String, max_depth: usize },

    #[error("channel '{name}' is not a {expected} channel")]
    WrongKind { name: String, expected: &'static str },

    #[error("self-loop forbidden: channel '{name}' cannot subscribe to itself")]
    SelfLoop { name: String },

    #[error("bay propagation did not settle within {bound} iterations ({channels} channels)")]
    PropagationCycle { bound: usize, channels: usize },
}
