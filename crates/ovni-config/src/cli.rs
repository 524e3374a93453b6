//! Command-line surface for `ovniemu`: the trace directory to replay, an
//! optional clock-offset table, linter/strict-mode toggles, and progress
//! reporting control, all via `clap`'s derive API.

use crate::error::Error;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ovniemu", about = "Offline trace emulator for parallel-runtime instrumentation")]
pub struct Cli {
    /// Directory holding the `loom.*/proc.*/thread.*.obs` trace tree.
    pub tracedir: PathBuf,

    /// Path to a clock offset table (`<hostname> <loomid> <offset_ns>` per line).
    #[arg(short = 'c', long = "clock-offsets", value_name = "FILE")]
    pub clock_offsets: Option<PathBuf>,

    /// Linter mode: clock regressions, unknown models, and bad transitions
    /// all become fatal errors instead of warnings.
    #[arg(short = 'l', long = "linter")]
    pub linter: bool,

    /// Enable every registered model regardless of its own probe verdict.
    #[arg(short = 'a', long = "enable-all")]
    pub enable_all: bool,

    /// Suppress periodic progress reporting.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl Cli {
    pub fn validate(&self) -> Result<(), Error> {
        if !self.tracedir.is_dir() {
            return Err(Error::TracedirNotFound(self.tracedir.clone()));
        }
        if let Some(path) = &self.clock_offsets {
            if !path.is_file() {
                return Err(Error::ClockOffsetsNotFound(path.clone()));
            }
        }
        Ok(())
    }
}
