use crate::error::Error;
use std::collections::HashMap;
use std::path::Path;

/// Maps `(hostname, loom-id) -> offset_ns`, correcting each loom's raw clock
/// to the run's synchronized clock. A loom absent from the table (or when no
/// table was given at all) uses an offset of 0.
#[derive(Debug, Default, Clone)]
pub struct ClockOffsetTable {
    offsets: HashMap<(String, String), i64>,
}

impl ClockOffsetTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses one `<hostname> <loomid> <offset_ns>` line per loom.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut offsets = HashMap::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (Some(hostname), Some(loom_id), Some(offset_str), None) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                return Err(Error::MalformedOffsetLine {
                    line_no: i + 1,
                    line: line.to_string(),
                });
            };
            let offset_ns: i64 =
                offset_str
                    .parse()
                    .map_err(|_| Error::MalformedOffsetLine {
                        line_no: i + 1,
                        line: line.to_string(),
                    })?;
            offsets.insert((hostname.to_string(), loom_id.to_string()), offset_ns);
        }

        Ok(Self { offsets })
    }

    #[inline]
    pub fn offset(&self, hostname: &str, loom_id: &str) -> i64 {
        self.offsets
            .get(&(hostname.to_string(), loom_id.to_string()))
            .copied()
            .unwrap_or(0)
    }
}
