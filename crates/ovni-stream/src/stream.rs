use crate::error::Error;
use ovni_event::Event;
use ovni_mmap::MmapFile;
use std::path::{Path, PathBuf};

const STREAM_MAGIC: &[u8; 4] = b"OVNI";
const STREAM_VERSION: u8 = 1;
const STREAM_HEADER_LEN: usize = 5;

/// One decoded event, owning a small copy of its payload so `Stream` does
/// not need to be self-referential over its mmap.
#[derive(Debug, Clone)]
pub struct DecodedEvent {
    pub flags: u8,
    pub model: u8,
    pub category: u8,
    pub value: u8,
    /// Clock as recorded in the stream, before any synchronization offset.
    pub raw_clock: u64,
    pub payload: Vec<u8>,
}

impl DecodedEvent {
    #[inline]
    pub fn mcv(&self) -> (u8, u8, u8) {
        (self.model, self.category, self.value)
    }

    #[inline]
    pub fn is_jumbo(&self) -> bool {
        self.flags & ovni_event::FLAG_JUMBO != 0
    }
}

/// Whether decoding reached the end of the stream's event data.
pub enum Advance {
    Decoded,
    End,
}

/// One memory-mapped per-thread event stream.
///
/// Invariant: once `active` becomes `false` it never becomes `true` again.
/// Clocks within one stream are non-decreasing (the instrumentation library
/// guarantees this; the player does not re-check it per stream).
pub struct Stream {
    /// Identity: path relative to the trace directory root.
    pub relpath: String,
    mmap: MmapFile,
    cursor: usize,
    current: Option<DecodedEvent>,
    active: bool,
}

impl Stream {
    /// Opens and maps `path`, validates the stream header, and decodes the
    /// first event into `current`.
    pub fn open(path: &Path, relpath: String) -> Result<Self, Error> {
        let mmap = MmapFile::open_ro(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let buf = mmap.as_slice();
        if buf.len() < STREAM_HEADER_LEN
            || &buf[0..4] != STREAM_MAGIC.as_slice()
            || buf[4] != STREAM_VERSION
        {
            return Err(Error::IncompatibleTrace {
                path: path.to_path_buf(),
            });
        }

        let mut stream = Stream {
            relpath,
            mmap,
            cursor: STREAM_HEADER_LEN,
            current: None,
            active: true,
        };
        stream.decode_at_cursor(path)?;
        Ok(stream)
    }

    fn decode_at_cursor(&mut self, path: &Path) -> Result<Advance, Error> {
        let buf = &self.mmap.as_slice()[self.cursor..];
        if buf.is_empty() {
            self.active = false;
            self.current = None;
            return Ok(Advance::End);
        }

        let (ev, consumed) = Event::decode(buf).map_err(|source| Error::CorruptStream {
            path: path.to_path_buf(),
            source,
        })?;

        if ev.has_unknown_flags() {
            tracing::warn!(relpath = %self.relpath, flags = ev.flags, "unknown flag bits, accepting");
        }

        self.current = Some(DecodedEvent {
            flags: ev.flags,
            model: ev.model,
            category: ev.category,
            value: ev.value,
            raw_clock: ev.clock,
            payload: ev.payload.to_vec(),
        });
        self.cursor += consumed;
        Ok(Advance::Decoded)
    }

    /// Decodes the next event. On success the new event becomes `current`;
    /// at end of stream, `active` is cleared and `current` becomes `None`.
    pub fn advance(&mut self, path: &Path) -> Result<Advance, Error> {
        self.decode_at_cursor(path)
    }

    #[inline]
    pub fn current(&self) -> Option<&DecodedEvent> {
        self.current.as_ref()
    }

    #[inline]
    pub fn active(&self) -> bool {
        self.active
    }

    #[inline]
    pub fn bytes_read(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn file_size(&self) -> usize {
        self.mmap.len()
    }
}

pub fn stream_path_from_relpath(tracedir: &Path, relpath: &str) -> PathBuf {
    tracedir.join(relpath)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_stream_file(events: &[(u8, u8, u8, u8, u64, &[u8])]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(STREAM_MAGIC).unwrap();
        f.write_all(&[STREAM_VERSION]).unwrap();
        for &(flags, model, category, value, clock, payload) in events {
            f.write_all(&[flags, model, category, value]).unwrap();
            f.write_all(&clock.to_le_bytes()).unwrap();
            f.write_all(&[0u8; 4]).unwrap();
            f.write_all(payload).unwrap();
        }
        f.flush().unwrap();
        f
    }

    #[test]
    fn rejects_bad_magic() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"NOPE!").unwrap();
        f.flush().unwrap();
        let err = Stream::open(f.path(), "thread.1.obs".into()).unwrap_err();
        assert!(matches!(err, Error::IncompatibleTrace { .. }));
    }

    #[test]
    fn decodes_sequence_and_marks_inactive_at_eof() {
        let f = write_stream_file(&[
            (0x00, b'O', b'H', b'x', 100, &[]),
            (0x00, b'O', b'H', b'e', 200, &[]),
        ]);
        let mut s = Stream::open(f.path(), "thread.1.obs".into()).unwrap();
        assert!(s.active());
        assert_eq!(s.current().unwrap().raw_clock, 100);

        s.advance(f.path()).unwrap();
        assert_eq!(s.current().unwrap().raw_clock, 200);
        assert!(s.active());

        s.advance(f.path()).unwrap();
        assert!(!s.active());
        assert!(s.current().is_none());
    }
}
