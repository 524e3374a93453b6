//! Stream Reader and Clock Offset Table: the on-disk side of the emulator.
//!
//! [`discover`] walks a trace directory into [`StreamEntry`] descriptors;
//! [`Stream`] memory-maps and decodes one `.obs` file at a time;
//! [`ClockOffsetTable`] resolves each loom's raw clock to the run's
//! synchronized clock.

mod discover;
mod error;
mod metadata;
mod offsets;
mod stream;

pub use discover::{discover, StreamEntry};
pub use error::Error;
pub use metadata::{CpuDecl, LibMeta, OvniMeta, ProcMetadata, ThreadMetadata};
pub use offsets::ClockOffsetTable;
pub use stream::{stream_path_from_relpath, Advance, DecodedEvent, Stream};
