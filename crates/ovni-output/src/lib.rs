//! Trace output: `.prv` row writers and the `.pcf` label dictionary they
//! share with an external viewer.

mod error;
mod pcf;
mod prv;

pub use error::Error;
pub use pcf::PcfBuilder;
pub use prv::{encode_value, PrvWriter};
