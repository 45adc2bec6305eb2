//! Facade crate: the single import path a consumer (the `cli`, integration
//! tests, or an external embedder) uses instead of depending on
//! `codec`/`schema`/`row`/`store`/`table`/`index`/`cursor` directly.
//!
//! The donor has no equivalent of this crate — `cli` there imports `engine`
//! directly, since one storage engine is the whole system. Here the system
//! is six narrowly-scoped crates, so this facade plays the same "thin
//! re-export surface" role `engine::replay_wal_and_build` plays for
//! `recovery` one level down: collect the pieces a caller actually needs
//! under one name, and aggregate their errors.

pub use codec::Element;
pub use cursor::{Bound, Cursor, CursorBuilder, CursorError, ProjectedRow};
pub use index::{Counter, Index, IndexError, IndexSpec};
pub use row::{RowBuffer, RowError};
pub use schema::{ColumnDescriptor, ColumnWidth, ElementType, Schema, SchemaError, ROW_ID_COLUMN};
pub use store::StoreError;
pub use table::{Table, TableError, TableOpenOptions, TableState};

use thiserror::Error;

/// Aggregates every crate's typed error behind one top-level type. Each
/// variant wraps a crate's own error transparently rather than remapping it
/// into spec.md's five abstract kinds (ValidationError/NotFound/IOError/
/// FormatError/StateError) — those categories are already visible in each
/// inner error's own variant names (`State`, `Validation`, `NotFound`), so a
/// second remapping layer here would only duplicate that classification.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Table(#[from] table::TableError),
    #[error(transparent)]
    Index(#[from] index::IndexError),
    #[error(transparent)]
    Cursor(#[from] cursor::CursorError),
    #[error(transparent)]
    Row(#[from] row::RowError),
    #[error(transparent)]
    Schema(#[from] schema::SchemaError),
    #[error(transparent)]
    Store(#[from] store::StoreError),
    #[error(transparent)]
    Codec(#[from] codec::CodecError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests;
