use memmap2::Mmap;
use std::{fs::File, io, path::Path};

/// A read-only memory-mapped file.
///
/// The stream reader maps each thread's `.obs` file with this instead of
/// reading it into a heap buffer; the event decoder walks the mapped bytes
/// directly.
pub struct MmapFile {
    /// File handle kept alive to maintain the memory map validity.
    _file: File,
    mmap: Mmap,
}

impl MmapFile {
    /// Opens an existing file and maps it read-only.
    pub fn open_ro<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        // SAFETY: we hold the file open for the lifetime of the mapping and
        // never truncate it out from under a reader.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { _file: file, mmap })
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}
