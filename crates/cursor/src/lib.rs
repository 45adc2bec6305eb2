//! A forward-only, single-owner walk over a table or an index, projecting a
//! named subset of columns and decoding every row from the underlying table
//! buffer.
//!
//! Grounded in the donor's `sstable::merge::MergeIterator`: a pull-based
//! `next_row` rather than a `std::iter::Iterator` impl, since advancing can
//! fail (a row may vanish from under an open handle only if the file itself
//! is corrupt, which must surface as an error, not a panic or a silently
//! truncated iteration).

use codec::Element;
use row::RowBuffer;
use schema::Schema;
use table::Table;
use thiserror::Error;

/// Errors raised while building or advancing a [`Cursor`].
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("{0}")]
    Validation(String),
    #[error("unknown column '{0}'")]
    NotFound(String),
    #[error(transparent)]
    Row(#[from] row::RowError),
    #[error(transparent)]
    Table(#[from] table::TableError),
    #[error(transparent)]
    Index(#[from] index::IndexError),
    #[error(transparent)]
    Codec(#[from] codec::CodecError),
}

type Result<T> = std::result::Result<T, CursorError>;

/// One row's projected columns, each still in its raw element-list form
/// (a `Fixed(n)` column yields `n` elements; a `var(k)` column yields its
/// whole payload as one list).
pub type ProjectedRow = Vec<Vec<Element>>;

/// A `start`/`stop` bound. On a table cursor, bounds are row ids; on an
/// index cursor, bounds are tuples matching a prefix of the indexed
/// columns.
#[derive(Debug, Clone)]
pub enum Bound {
    RowId(u64),
    Key(Vec<Element>),
}

enum Source<'a> {
    Table(&'a Table),
    Index { index: &'a index::Index, table: &'a Table },
}

/// Builder for a [`Cursor`]: which columns to project and the optional
/// `start`/`stop` bounds, mirroring [`table::TableOpenOptions`]'s "must be
/// set before open" shape.
pub struct CursorBuilder<'a> {
    source: Source<'a>,
    projection: Vec<String>,
    start: Option<Bound>,
    stop: Option<Bound>,
}

impl<'a> CursorBuilder<'a> {
    /// Columns to yield per row, in projection order. Must be called with a
    /// non-empty list before [`CursorBuilder::open`].
    pub fn project(mut self, columns: &[&str]) -> Self {
        self.projection = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Inclusive lower bound. Unset means "from the beginning".
    pub fn start(mut self, bound: Bound) -> Self {
        self.start = Some(bound);
        self
    }

    /// Exclusive upper bound. Unset means "to the end".
    pub fn stop(mut self, bound: Bound) -> Self {
        self.stop = Some(bound);
        self
    }

    pub fn open(self) -> Result<Cursor<'a>> {
        if self.projection.is_empty() {
            return Err(CursorError::Validation(
                "cursor projection must name at least one column".into(),
            ));
        }

        match self.source {
            Source::Table(table) => {
                let projection = resolve_projection(&table.schema(), &self.projection)?;
                let next_row_id = match self.start {
                    Some(Bound::RowId(id)) => id,
                    Some(Bound::Key(_)) => {
                        return Err(CursorError::Validation(
                            "a table cursor's bounds must be row ids".into(),
                        ))
                    }
                    None => 0,
                };
                let stop_row_id = match self.stop {
                    Some(Bound::RowId(id)) => Some(id),
                    Some(Bound::Key(_)) => {
                        return Err(CursorError::Validation(
                            "a table cursor's bounds must be row ids".into(),
                        ))
                    }
                    None => None,
                };
                Ok(Cursor {
                    inner: Inner::Table {
                        table,
                        next_row_id,
                        stop_row_id,
                    },
                    projection,
                })
            }
            Source::Index { index, table } => {
                let projection = resolve_projection(&table.schema(), &self.projection)?;
                let start_bytes = match self.start {
                    Some(Bound::Key(values)) => Some(encode_start_bound(index, &values)?),
                    Some(Bound::RowId(_)) => {
                        return Err(CursorError::Validation(
                            "an index cursor's bounds must be key tuples".into(),
                        ))
                    }
                    None => None,
                };
                let stop_bytes = match self.stop {
                    Some(Bound::Key(values)) => encode_stop_bound(index, &values)?,
                    Some(Bound::RowId(_)) => {
                        return Err(CursorError::Validation(
                            "an index cursor's bounds must be key tuples".into(),
                        ))
                    }
                    None => None,
                };
                Ok(Cursor {
                    inner: Inner::Index {
                        table,
                        store_cursor: index.cursor(),
                        start_bytes,
                        stop_bytes,
                        started: false,
                    },
                    projection,
                })
            }
        }
    }
}

enum Inner<'a> {
    Table {
        table: &'a Table,
        next_row_id: u64,
        stop_row_id: Option<u64>,
    },
    Index {
        table: &'a Table,
        store_cursor: store::Cursor<'a>,
        start_bytes: Option<Vec<u8>>,
        stop_bytes: Option<Vec<u8>>,
        started: bool,
    },
}

/// A forward-only walk over a table (primary order) or an index (index
/// order), yielding a projected, decoded tuple per row.
///
/// Not `Clone`; not `Sync` — a cursor owns one position in one underlying
/// `store::Cursor` and is meant for single-owner, single-threaded iteration,
/// per the library's scheduling model.
pub struct Cursor<'a> {
    inner: Inner<'a>,
    projection: Vec<usize>,
}

impl std::fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match &self.inner {
            Inner::Table { .. } => "table",
            Inner::Index { .. } => "index",
        };
        f.debug_struct("Cursor")
            .field("source", &source)
            .field("projection", &self.projection)
            .finish()
    }
}

impl<'a> Cursor<'a> {
    /// Starts building a cursor in primary (`row_id`) order.
    pub fn over_table(table: &'a Table) -> CursorBuilder<'a> {
        CursorBuilder {
            source: Source::Table(table),
            projection: Vec::new(),
            start: None,
            stop: None,
        }
    }

    /// Starts building a cursor in index-key order. `table` must be the
    /// table the `index` was built against.
    pub fn over_index(table: &'a Table, index: &'a index::Index) -> CursorBuilder<'a> {
        CursorBuilder {
            source: Source::Index { index, table },
            projection: Vec::new(),
            start: None,
            stop: None,
        }
    }

    /// Advances to and decodes the next row, or `None` once the `stop`
    /// bound or the end of the store is reached. Positions at the first
    /// row `>= start` on the first call.
    pub fn next_row(&mut self) -> Result<Option<ProjectedRow>> {
        let projection = &self.projection;
        match &mut self.inner {
            Inner::Table {
                table,
                next_row_id,
                stop_row_id,
            } => {
                if let Some(stop) = stop_row_id {
                    if *next_row_id >= *stop {
                        return Ok(None);
                    }
                }
                if *next_row_id >= table.len() {
                    return Ok(None);
                }
                let row_id = *next_row_id;
                *next_row_id += 1;
                let row = table.row(row_id)?;
                Ok(Some(project(&row, projection)?))
            }
            Inner::Index {
                table,
                store_cursor,
                start_bytes,
                stop_bytes,
                started,
            } => {
                let entry = if !*started {
                    *started = true;
                    match start_bytes {
                        Some(key) => store_cursor.seek(key),
                        None => store_cursor.first(),
                    }
                } else {
                    store_cursor.next()
                };
                let (key, value) = match entry {
                    Some(e) => e,
                    None => return Ok(None),
                };
                if let Some(stop) = stop_bytes {
                    if key >= stop.as_slice() {
                        return Ok(None);
                    }
                }
                let row_id = codec::decode_uint(value)?;
                let row = table.row(row_id)?;
                Ok(Some(project(&row, projection)?))
            }
        }
    }
}

fn resolve_projection(schema: &Schema, names: &[String]) -> Result<Vec<usize>> {
    names
        .iter()
        .map(|n| {
            schema
                .column_index(n)
                .ok_or_else(|| CursorError::NotFound(n.clone()))
        })
        .collect()
}

fn project(row: &RowBuffer, projection: &[usize]) -> Result<ProjectedRow> {
    projection.iter().map(|&idx| row.get(idx).map_err(Into::into)).collect()
}

fn validate_bound_len(index: &index::Index, values: &[Element]) -> Result<()> {
    if values.is_empty() || values.len() > index.columns().len() {
        return Err(CursorError::Validation(format!(
            "cursor key bound must name 1..={} columns",
            index.columns().len()
        )));
    }
    Ok(())
}

/// A `start` bound's bytes are used literally: any key with this prefix (a
/// partial tuple) or equal to it (a full tuple) compares as `>=` the
/// prefix's own bytes, which is exactly "the first key whose leading
/// columns match" — the smallest completion, with no further encoding
/// needed.
fn encode_start_bound(index: &index::Index, values: &[Element]) -> Result<Vec<u8>> {
    validate_bound_len(index, values)?;
    Ok(index.encode_prefix(values)?)
}

/// A `stop` bound must exclude everything with this prefix while still
/// including it (the "largest completion" spec.md describes) when the
/// tuple is a genuine partial prefix shorter than the index's column list.
/// Incrementing the prefix's encoded bytes to their lexicographic successor
/// gives exactly that boundary; a full-length tuple is already a complete
/// key and is used as-is.
fn encode_stop_bound(index: &index::Index, values: &[Element]) -> Result<Option<Vec<u8>>> {
    validate_bound_len(index, values)?;
    let bytes = index.encode_prefix(values)?;
    if values.len() < index.columns().len() {
        Ok(increment_bytes(&bytes))
    } else {
        Ok(Some(bytes))
    }
}

/// Lexicographic successor of `bytes`: increments the last byte that isn't
/// `0xFF`, truncating anything after it. `None` means every byte was
/// `0xFF` — there is no successor, so the bound is unbounded above.
fn increment_bytes(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut out = bytes.to_vec();
    for i in (0..out.len()).rev() {
        if out[i] != 0xFF {
            out[i] += 1;
            out.truncate(i + 1);
            return Some(out);
        }
    }
    None
}

#[cfg(test)]
mod tests;
