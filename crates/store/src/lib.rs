//! The ordered key/value store wormtable is built on: exclusive-create,
//! atomic rename, append-with-duplicates, and a forward/backward cursor over
//! an immutable, fully-sorted file.
//!
//! There is no general-purpose external engine to bind against here, so this
//! crate generalizes the donor's `sstable`/`wal` crates — "a durable ordered
//! key/value file written once, read many times" is exactly what those two
//! crates already implement, with bloom filters and WAL replay stripped out
//! because a WORM store never needs either (see [`reader`] and [`writer`]
//! module docs for the specifics).

use std::path::Path;

use thiserror::Error;

mod cursor;
mod format;
mod reader;
mod writer;

pub use cursor::Cursor;
pub use reader::{StoreOpenOptions, StoreReader};
pub use writer::StoreWriter;

/// Errors raised by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("path already exists: {}", .0.display())]
    AlreadyExists(std::path::PathBuf),
    #[error("corrupt store file: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

type Result<T> = std::result::Result<T, StoreError>;

/// Atomically publishes a finalized build file at `final_path`, used by both
/// table publish and index build. Mirrors the donor's
/// temp-file-then-`rename`-then-fsync-parent-dir discipline.
pub fn rename_into(tmp_path: impl AsRef<Path>, final_path: impl AsRef<Path>) -> Result<()> {
    let tmp_path = tmp_path.as_ref();
    let final_path = final_path.as_ref();
    std::fs::rename(tmp_path, final_path)?;
    if let Some(parent) = final_path.parent() {
        if let Ok(dir) = std::fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}
