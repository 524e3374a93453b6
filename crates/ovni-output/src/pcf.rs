//! PCF label dictionary: maps each `(event_type, value)` pair written to a
//! `.prv` file back to a human-readable label, so an external trace viewer
//! can render `10:2` as `Running` instead of a bare integer. Built up over
//! the run as models register their types and values, written once at
//! `finish`.

use crate::error::Error;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

struct EventType {
    name: String,
    values: BTreeMap<i64, String>,
}

#[derive(Default)]
pub struct PcfBuilder {
    types: BTreeMap<u32, EventType>,
}

impl PcfBuilder {
    pub fn new() -> Self {
        PcfBuilder::default()
    }

    /// Declares an event type's name. Safe to call more than once with the
    /// same type id as long as the name agrees; the first registration
    /// wins, later ones are ignored.
    pub fn register_type(&mut self, event_type: u32, name: impl Into<String>) {
        self.types.entry(event_type).or_insert_with(|| EventType {
            name: name.into(),
            values: BTreeMap::new(),
        });
    }

    /// Declares the label for one value of an event type. Panics if the
    /// type itself was never registered, since a value with no owning type
    /// is a model bug, not recoverable input.
    pub fn register_value(&mut self, event_type: u32, value: i64, label: impl Into<String>) {
        let entry = self
            .types
            .get_mut(&event_type)
            .unwrap_or_else(|| panic!("PCF value registered for unknown event type {event_type}"));
        entry.values.insert(value, label.into());
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::create(&path).map_err(|source| Error::Create {
            path: path.clone(),
            source,
        })?;
        self.write_to(&mut file)
            .map_err(|source| Error::Write { path, source })
    }

    fn write_to(&self, out: &mut impl Write) -> std::io::Result<()> {
        let mut first = true;
        for (event_type, entry) in &self.types {
            if !first {
                writeln!(out)?;
            }
            first = false;
            writeln!(out, "EVENT_TYPE")?;
            writeln!(out, "0\t{}\t{}", event_type, entry.name)?;
            if !entry.values.is_empty() {
                writeln!(out, "VALUES")?;
                for (value, label) in &entry.values {
                    writeln!(out, "{value}\t{label}")?;
                }
            }
        }
        Ok(())
    }
}
