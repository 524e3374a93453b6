use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{path}: incompatible trace (magic/version mismatch)")]
    IncompatibleTrace { path: PathBuf },

    #[error("{path}: corrupt stream: {source}")]
    CorruptStream {
        path: PathBuf,
        #[source]
        source: ovni_event::DecodeError,
    },

    #[error("failed to read '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse metadata '{path}'")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed trace entry path: {path}")]
    MalformedPath { path: PathBuf },

    #[error("malformed clock offset line {line_no}: '{line}'")]
    MalformedOffsetLine { line_no: usize, line: String },
}
