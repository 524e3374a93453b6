//! PRV row writer.
//!
//! A `.prv` file is a flat sequence of `clock:row:type:value` lines, one per
//! *output edge*: a writer only emits a line when a channel it is
//! subscribed to flushes to a value that differs from the last one it
//! wrote, not on every flush. Everything here runs on the single driver
//! thread, so there's no queue between propagation and output, just a
//! `BufWriter` flushed at the end of the run.

use crate::error::Error;
use ovni_chan::{Bay, ChanId, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Encodes a channel value into a PRV field: `null` collapses to 0, `bad`
/// to the sentinel `0xffffffff`, everything else passes through unchanged.
pub fn encode_value(value: Value) -> i64 {
    match value {
        Value::Null => 0,
        Value::Bad => 0xffffffff,
        Value::Int(v) => v,
    }
}

struct Subscription {
    chan: ChanId,
    row: u64,
    event_type: u32,
    last_emitted: Option<Value>,
}

/// Writes one `.prv` file from a fixed set of channel subscriptions,
/// each tagged with the PRV row and event type it represents.
pub struct PrvWriter {
    path: PathBuf,
    out: BufWriter<File>,
    subs: Vec<Subscription>,
}

impl PrvWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| Error::Create {
            path: path.clone(),
            source,
        })?;
        Ok(PrvWriter {
            path,
            out: BufWriter::new(file),
            subs: Vec::new(),
        })
    }

    /// Registers a channel whose flushed value should surface as PRV rows
    /// of `row:event_type`. Order of registration has no effect on output:
    /// every line carries its own row and type.
    pub fn subscribe(&mut self, chan: ChanId, row: u64, event_type: u32) {
        self.subs.push(Subscription {
            chan,
            row,
            event_type,
            last_emitted: None,
        });
    }

    /// Emits one line per subscription whose channel's flushed value
    /// differs from what this writer last emitted for it.
    pub fn emit(&mut self, clock: i64, bay: &Bay) -> Result<(), Error> {
        for sub in &mut self.subs {
            let current = bay.last(sub.chan);
            if sub.last_emitted == Some(current) {
                continue;
            }
            writeln!(
                self.out,
                "{}:{}:{}:{}",
                clock,
                sub.row,
                sub.event_type,
                encode_value(current)
            )
            .map_err(|source| Error::Write {
                path: self.path.clone(),
                source,
            })?;
            sub.last_emitted = Some(current);
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.out.flush().map_err(|source| Error::Write {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovni_chan::Channel;
    use std::fs;

    #[test]
    fn emits_one_line_per_output_edge() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thread.prv");

        let mut bay = Bay::new();
        let chan = bay.add_channel(Channel::new_scalar("thread.1.state"));

        let mut writer = PrvWriter::create(&path).unwrap();
        writer.subscribe(chan, 1, 10);

        bay.set_scalar(chan, Value::Int(1)).unwrap();
        bay.propagate().unwrap();
        writer.emit(100, &bay).unwrap();

        // Unchanged flush: no new line.
        bay.set_scalar(chan, Value::Int(1)).unwrap();
        bay.propagate().unwrap();
        writer.emit(150, &bay).unwrap();

        bay.set_scalar(chan, Value::Int(2)).unwrap();
        bay.propagate().unwrap();
        writer.emit(200, &bay).unwrap();
        writer.flush().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "100:1:10:1\n200:1:10:2\n");
    }

    #[test]
    fn null_and_bad_encode_to_their_sentinels() {
        assert_eq!(encode_value(Value::Null), 0);
        assert_eq!(encode_value(Value::Bad), 0xffffffff);
        assert_eq!(encode_value(Value::Int(-3)), -3);
    }
}
