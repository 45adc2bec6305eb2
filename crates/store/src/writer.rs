use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use crc32fast::Hasher as Crc32;

use crate::format::MAGIC;
use crate::StoreError;

type Result<T> = std::result::Result<T, StoreError>;

/// Appends `(key, value)` pairs to a new store file and, on
/// [`finalize`](StoreWriter::finalize), writes the trailing footer and
/// fsyncs. Mirrors the donor's "write straight through, fsync, rename at the
/// table layer" discipline, except writes stream record-by-record instead of
/// draining an in-memory memtable, since a BUILDING table may accumulate far
/// more rows than should be held in memory at once.
#[derive(Debug)]
pub struct StoreWriter {
    path: PathBuf,
    file: BufWriter<File>,
    count: u64,
    record_buf: Vec<u8>,
}

impl StoreWriter {
    /// Creates `path` exclusively (fails if it already exists).
    pub fn create_exclusive<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    StoreError::AlreadyExists(path.clone())
                } else {
                    StoreError::Io(e)
                }
            })?;
        Ok(Self {
            path,
            file: BufWriter::new(file),
            count: 0,
            record_buf: Vec::with_capacity(256),
        })
    }

    /// Appends one `(key, value)` record. Duplicate keys are allowed;
    /// insertion order is preserved by later ties (see the `store` crate's
    /// reader, which stable-sorts by key at open time).
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.record_buf.clear();
        self.record_buf
            .write_u32::<LittleEndian>(key.len() as u32)?;
        self.record_buf.extend_from_slice(key);
        self.record_buf
            .write_u32::<LittleEndian>(value.len() as u32)?;
        self.record_buf.extend_from_slice(value);

        let mut hasher = Crc32::new();
        hasher.update(&self.record_buf);
        let crc = hasher.finalize();

        self.file.write_u32::<LittleEndian>(crc)?;
        self.file.write_all(&self.record_buf)?;
        self.count += 1;
        Ok(())
    }

    /// Number of records appended so far.
    pub fn len(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the footer, flushes, and fsyncs the file. Does not rename —
    /// callers atomically publish the file via [`crate::rename_into`] once
    /// every writer for a build is finalized.
    pub fn finalize(mut self) -> Result<()> {
        self.file.write_u64::<LittleEndian>(self.count)?;
        self.file.write_u32::<LittleEndian>(MAGIC)?;
        self.file.flush()?;
        self.file.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        Ok(())
    }
}
