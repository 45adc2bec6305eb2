//! A write-once, read-many typed table: the `schema`/`row`/`store` crates
//! tied together into the three-state lifecycle a caller actually drives
//! (BUILDING → PUBLISHED → OPEN-FOR-READ), the same orchestration role
//! `engine::Engine` plays over `memtable`/`wal`/`sstable`.
//!
//! Column 0 is always the auto-managed `row_id`; [`Table::add_row`] assigns
//! it from an internal counter rather than trusting the caller's buffer.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use codec::{encode_uint, Element};
use row::RowBuffer;
use schema::{ColumnDescriptor, Schema, ROW_ID_COLUMN};
use store::{StoreOpenOptions, StoreReader, StoreWriter};
use thiserror::Error;

const BUILD_FILENAME: &str = "__build_primary";
const PRIMARY_FILENAME: &str = "primary";
const SCHEMA_FILENAME: &str = "schema.xml";

/// Errors raised while building, publishing, or reading a [`Table`].
#[derive(Debug, Error)]
pub enum TableError {
    #[error("{0}")]
    State(String),
    #[error("{0}")]
    Validation(String),
    #[error("no row with id {0}")]
    NotFound(u64),
    #[error(transparent)]
    Schema(#[from] schema::SchemaError),
    #[error(transparent)]
    Row(#[from] row::RowError),
    #[error(transparent)]
    Store(#[from] store::StoreError),
    #[error(transparent)]
    Codec(#[from] codec::CodecError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

type Result<T> = std::result::Result<T, TableError>;

/// A table's lifecycle stage. Generalizes spec.md's explicit three states
/// into a single enum rather than the scattered boolean flags `Engine` uses
/// for narrower phase tracking (e.g. `l0_compaction_trigger == 0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    /// Accepting `add_column`/`add_row` calls; not yet readable.
    Building,
    /// Closed and durable on disk, but not opened for reading in this
    /// process — call [`Table::open`] to get an OPEN-FOR-READ handle.
    Published,
    /// Opened read-only; [`Table::row`] is available.
    OpenForRead,
}

/// A write-once, read-many typed table.
pub struct Table {
    homedir: PathBuf,
    schema: Rc<Schema>,
    state: TableState,
    row_id_size: u8,
    first_append_done: bool,
    row_count: u64,
    writer: Option<StoreWriter>,
    reader: Option<StoreReader>,
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("homedir", &self.homedir)
            .field("state", &self.state)
            .field("row_count", &self.row_count)
            .field("columns", &self.schema.columns.len())
            .finish()
    }
}

impl Table {
    /// Starts a new BUILDING table. `homedir` must not already exist; it is
    /// created with owner-only permissions (Unix mode `0o700`), the same
    /// "fix permissions immediately after create" discipline as the store
    /// layer's atomic-rename-then-fsync.
    pub fn create(homedir: impl AsRef<Path>, row_id_size: u8) -> Result<Self> {
        let homedir = homedir.as_ref().to_path_buf();
        if homedir.exists() {
            return Err(TableError::State(format!(
                "homedir already exists: {}",
                homedir.display()
            )));
        }
        std::fs::create_dir_all(&homedir)?;
        set_owner_only(&homedir)?;

        let schema = Schema::new(row_id_size)?;
        let writer = StoreWriter::create_exclusive(homedir.join(BUILD_FILENAME))?;

        Ok(Self {
            homedir,
            schema: Rc::new(schema),
            state: TableState::Building,
            row_id_size,
            first_append_done: false,
            row_count: 0,
            writer: Some(writer),
            reader: None,
        })
    }

    /// Appends a user column. BUILDING only, and only before the first row
    /// is appended.
    pub fn add_column(&mut self, column: ColumnDescriptor) -> Result<()> {
        self.require_state(TableState::Building)?;
        if self.first_append_done {
            return Err(TableError::State(
                "cannot add columns after the first row has been appended".into(),
            ));
        }
        Rc::make_mut(&mut self.schema).add_column(column)?;
        Ok(())
    }

    /// Appends one row, assigning it the next `row_id`. The row buffer
    /// passed in is cloned and its `row_id` column overwritten — callers
    /// don't need to (and can't usefully) set it themselves.
    ///
    /// Oversize rows surface as [`TableError::Row`] with the row count left
    /// unchanged, since the counter is only advanced after a successful
    /// `put`.
    pub fn add_row(&mut self, row: &RowBuffer) -> Result<u64> {
        self.require_state(TableState::Building)?;
        let row_id = self.row_count;

        let mut row = row.clone();
        let row_id_col = self
            .schema
            .column_index(ROW_ID_COLUMN)
            .expect("schema always carries row_id as column 0");
        row.set(row_id_col, &[Element::Uint(row_id)])?;
        self.first_append_done = true;

        let bytes = row.as_bytes();
        let key = &bytes[..self.row_id_size as usize];
        let value = &bytes[self.row_id_size as usize..];

        let writer = self.writer.as_mut().expect("writer present while Building");
        writer.put(key, value)?;
        self.row_count += 1;
        Ok(row_id)
    }

    /// Writes `schema.xml`, finalizes and atomically publishes the store
    /// file, and transitions to PUBLISHED. A second call on an
    /// already-PUBLISHED or OPEN-FOR-READ handle is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.state != TableState::Building {
            return Ok(());
        }
        self.schema.save(self.homedir.join(SCHEMA_FILENAME))?;
        let writer = self.writer.take().expect("writer present while Building");
        writer.finalize()?;
        store::rename_into(
            self.homedir.join(BUILD_FILENAME),
            self.homedir.join(PRIMARY_FILENAME),
        )?;
        self.state = TableState::Published;
        Ok(())
    }

    /// Opens a published table read-only, with the default (no hint) page
    /// cache size. Use [`TableOpenOptions`] to set one first.
    pub fn open(homedir: impl AsRef<Path>) -> Result<Self> {
        TableOpenOptions::new().open(homedir)
    }

    /// Decodes and returns the row with the given `row_id`.
    pub fn row(&self, row_id: u64) -> Result<RowBuffer> {
        self.require_state(TableState::OpenForRead)?;
        let reader = self.reader.as_ref().expect("reader present while open for read");
        let key = encode_uint(row_id, self.row_id_size)?;
        let value = reader.get(&key).ok_or(TableError::NotFound(row_id))?;

        let mut bytes = key;
        bytes.extend_from_slice(value);
        RowBuffer::from_bytes(self.schema.clone(), &bytes).map_err(Into::into)
    }

    /// Total number of rows.
    pub fn len(&self) -> u64 {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn state(&self) -> TableState {
        self.state
    }

    pub fn homedir(&self) -> &Path {
        &self.homedir
    }

    /// Byte width of the `row_id` column, needed by `index` to size the
    /// big-endian row_id value it stores alongside each composite key.
    pub fn row_id_size(&self) -> u8 {
        self.row_id_size
    }

    /// Shared handle to this table's schema, for constructing [`RowBuffer`]s
    /// to pass to [`Table::add_row`].
    pub fn schema(&self) -> Rc<Schema> {
        self.schema.clone()
    }

    fn require_state(&self, expected: TableState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(TableError::State(format!(
                "operation requires table state {expected:?}, found {:?}",
                self.state
            )))
        }
    }
}

/// Builder for [`Table::open`], carrying the page-cache size hint that must
/// be set before opening (mirrors [`store::StoreOpenOptions`]).
#[derive(Debug, Default, Clone, Copy)]
pub struct TableOpenOptions {
    cache_bytes: u64,
}

impl TableOpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_bytes(mut self, bytes: u64) -> Self {
        self.cache_bytes = bytes;
        self
    }

    pub fn open(self, homedir: impl AsRef<Path>) -> Result<Table> {
        let homedir = homedir.as_ref().to_path_buf();
        let schema = Schema::load(homedir.join(SCHEMA_FILENAME))?;
        let row_id_size = schema
            .column(ROW_ID_COLUMN)
            .expect("schema always carries row_id")
            .element_size;

        let reader = StoreOpenOptions::new()
            .cache_bytes(self.cache_bytes)
            .open_read_only(homedir.join(PRIMARY_FILENAME))?;

        let row_count = match reader.cursor().last() {
            Some((key, _)) => codec::decode_uint(key)? + 1,
            None => 0,
        };

        Ok(Table {
            homedir,
            schema: Rc::new(schema),
            state: TableState::OpenForRead,
            row_id_size,
            first_append_done: true,
            row_count,
            writer: None,
            reader: Some(reader),
        })
    }
}

#[cfg(unix)]
fn set_owner_only(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn set_owner_only(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
