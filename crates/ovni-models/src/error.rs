use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("model '{model}' failed to probe: {reason}")]
    ProbeFailed { model: &'static str, reason: String },

    #[error("no enabled model registered for model byte {byte:#04x} ({byte})")]
    UnknownModelByte { byte: u8 },

    #[error("model '{model}' got an unexpected event {model_byte:#04x}:{category}:{value}")]
    UnexpectedEvent {
        model: &'static str,
        model_byte: u8,
        category: u8,
        value: u8,
    },

    #[error("model '{model}' got a malformed payload for event {category}:{value}: {reason}")]
    MalformedPayload {
        model: &'static str,
        category: u8,
        value: u8,
        reason: String,
    },

    #[error("required model '{name}' is missing or disabled")]
    ModelMissing { name: &'static str },

    #[error(transparent)]
    System(#[from] ovni_system::Error),

    #[error(transparent)]
    Chan(#[from] ovni_chan::Error),
}
