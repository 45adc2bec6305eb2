use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use crc32fast::Hasher as Crc32;

use crate::cursor::Cursor;
use crate::format::{FOOTER_BYTES, MAGIC};
use crate::StoreError;

type Result<T> = std::result::Result<T, StoreError>;

/// Builder for [`open_read_only`](StoreOpenOptions::open_read_only), carrying
/// the page-cache size hint (§6.3's "configurable page cache", which must be
/// set before open).
#[derive(Debug, Default, Clone, Copy)]
pub struct StoreOpenOptions {
    cache_bytes: u64,
}

impl StoreOpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a page-cache size hint. This store loads the entire sorted
    /// file into memory at open rather than paging, so the hint has no
    /// further effect beyond being retrievable via
    /// [`StoreReader::cache_bytes`] — documented as a no-op sizing knob
    /// rather than silently dropped.
    pub fn cache_bytes(mut self, bytes: u64) -> Self {
        self.cache_bytes = bytes;
        self
    }

    pub fn open_read_only<P: AsRef<Path>>(self, path: P) -> Result<StoreReader> {
        StoreReader::open_with_cache(path, self.cache_bytes)
    }
}

/// A read-only, fully-loaded view of a store file: every `(key, value)` pair
/// sorted ascending by key, stable with respect to write order for ties.
///
/// Grounded in the donor's `SSTableReader`, which loads its whole index into
/// a `BTreeMap` at open; this store goes one step further and loads the
/// whole data section, which is appropriate for a WORM file whose size is
/// bounded and known ahead of time.
#[derive(Debug)]
pub struct StoreReader {
    path: PathBuf,
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    cache_bytes: u64,
}

impl StoreReader {
    /// Opens `path` read-only with no cache-size hint recorded.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_cache(path, 0)
    }

    fn open_with_cache<P: AsRef<Path>>(path: P, cache_bytes: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut f = File::open(&path)?;
        let filesize = f.metadata()?.len();
        if filesize < FOOTER_BYTES {
            return Err(StoreError::Corrupt("file too small for footer".into()));
        }

        f.seek(SeekFrom::End(-4))?;
        let magic = f.read_u32::<LittleEndian>()?;
        if magic != MAGIC {
            return Err(StoreError::Corrupt(format!(
                "bad magic: {magic:#010x}"
            )));
        }
        f.seek(SeekFrom::End(-(FOOTER_BYTES as i64)))?;
        let expected_count = f.read_u64::<LittleEndian>()?;

        f.seek(SeekFrom::Start(0))?;
        let data_end = filesize - FOOTER_BYTES;
        let mut reader = BufReader::new(f);
        let mut entries = Vec::with_capacity(expected_count as usize);

        while reader.stream_position()? < data_end {
            let stored_crc = reader.read_u32::<LittleEndian>()?;

            let key_len = reader.read_u32::<LittleEndian>()? as usize;
            let mut key = vec![0u8; key_len];
            reader.read_exact(&mut key)?;
            let val_len = reader.read_u32::<LittleEndian>()? as usize;
            let mut value = vec![0u8; val_len];
            reader.read_exact(&mut value)?;

            let mut hasher = Crc32::new();
            hasher.update(&(key_len as u32).to_le_bytes());
            hasher.update(&key);
            hasher.update(&(val_len as u32).to_le_bytes());
            hasher.update(&value);
            let actual_crc = hasher.finalize();
            if actual_crc != stored_crc {
                return Err(StoreError::Corrupt(format!(
                    "crc32 mismatch: expected {stored_crc:#010x}, got {actual_crc:#010x}"
                )));
            }

            entries.push((key, value));
        }

        if entries.len() as u64 != expected_count {
            return Err(StoreError::Corrupt(format!(
                "footer declares {expected_count} records, found {}",
                entries.len()
            )));
        }

        // Stable sort: ties (duplicate keys) keep their write order, which is
        // how `table`/`index` builds encode "ascending row_id wins ties".
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(Self {
            path,
            entries,
            cache_bytes,
        })
    }

    /// Returns the first stored value for an exact key match.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        let idx = self
            .entries
            .binary_search_by(|(k, _)| k.as_slice().cmp(key))
            .ok()?;
        // binary_search on a vector with duplicate keys may land on any
        // matching index; walk back to the first one.
        let mut first = idx;
        while first > 0 && self.entries[first - 1].0 == key {
            first -= 1;
        }
        Some(self.entries[first].1.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cache_bytes(&self) -> u64 {
        self.cache_bytes
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A forward/backward cursor over the fully-loaded sorted entries.
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor::new(&self.entries)
    }

    /// All entries in ascending key order, ties in write order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.entries.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }
}
