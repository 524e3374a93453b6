//! Command-line configuration for `ovniemu`.

mod cli;
mod error;

pub use cli::Cli;
pub use error::Error;
