use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("trace directory '{0}' does not exist or is not a directory")]
    TracedirNotFound(PathBuf),

    #[error("clock offset file '{0}' does not exist")]
    ClockOffsetsNotFound(PathBuf),
}
