//! Named secondary ordered stores over a published table: composite
//! lexicographic keys, optional binning on the last column, prefix-bounded
//! min/max, distinct-key iteration, and an exact counter.
//!
//! Grounded in the donor's `sstable::merge::MergeIterator` ("walk sorted,
//! write out") for [`Index::build`], even though a build here is a single
//! source scan rather than an N-way merge, and in `bloom`'s role as an
//! auxiliary structure attached to a store — except wormtable's
//! [`Counter`] is an exact map, not probabilistic.

use std::path::{Path, PathBuf};

use codec::{
    decode_char, decode_float16, decode_float32, decode_float64, decode_int, decode_uint,
    encode_char, encode_float16, encode_float32, encode_float64, encode_int, encode_uint, Element,
};
use schema::{ColumnDescriptor, ColumnWidth, ElementType};
use table::{Table, TableState};
use thiserror::Error;

mod spec;

pub use spec::IndexSpec;

/// Errors raised while parsing an index expression, building, or querying
/// an [`Index`].
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("{0}")]
    State(String),
    #[error("{0}")]
    Validation(String),
    #[error("unknown column '{0}'")]
    NotFound(String),
    #[error(transparent)]
    Schema(#[from] schema::SchemaError),
    #[error(transparent)]
    Row(#[from] row::RowError),
    #[error(transparent)]
    Store(#[from] store::StoreError),
    #[error(transparent)]
    Table(#[from] table::TableError),
    #[error(transparent)]
    Codec(#[from] codec::CodecError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

type Result<T> = std::result::Result<T, IndexError>;

/// A named secondary ordered store, opened read-only (an index is only ever
/// queried, never appended to directly — it is rebuilt wholesale by
/// [`Index::build`]).
pub struct Index {
    name: String,
    columns: Vec<ColumnDescriptor>,
    bin_width: Option<u64>,
    row_id_size: u8,
    reader: store::StoreReader,
    path: PathBuf,
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("name", &self.name)
            .field("columns", &self.columns.len())
            .field("bin_width", &self.bin_width)
            .field("len", &self.reader.len())
            .finish()
    }
}

impl Index {
    /// Scans `table` (which must be OPEN-FOR-READ) ascending by `row_id`,
    /// writing one `(composite_key, row_id)` entry per row to a new store
    /// file named after the index, then opens it read-only.
    pub fn build(table: &Table, spec: IndexSpec) -> Result<Self> {
        if table.state() != TableState::OpenForRead {
            return Err(IndexError::State(
                "index build requires an OPEN-FOR-READ table".into(),
            ));
        }
        let schema = table.schema();
        let columns = resolve_columns(&schema, &spec)?;
        validate_columns(&columns, spec.bin_width)?;

        let name = spec.canonical_name();
        let build_path = table.homedir().join(format!("__build_{name}"));
        let final_path = table.homedir().join(&name);

        let col_indices: Vec<usize> = spec
            .columns
            .iter()
            .map(|n| schema.column_index(n).expect("resolved above"))
            .collect();
        let row_id_size = table.row_id_size();

        let mut writer = store::StoreWriter::create_exclusive(&build_path)?;
        for row_id in 0..table.len() {
            let row = table.row(row_id)?;
            let mut values = Vec::with_capacity(columns.len());
            for &idx in &col_indices {
                let mut elements = row.get(idx)?;
                let el = elements
                    .pop()
                    .ok_or_else(|| IndexError::Validation("indexed column produced no value".into()))?;
                values.push(el);
            }
            let key = encode_composite_for_row(&columns, &values, spec.bin_width)?;
            let value = encode_uint(row_id, row_id_size)?;
            writer.put(&key, &value)?;
        }
        writer.finalize()?;
        store::rename_into(&build_path, &final_path)?;

        let reader = store::StoreReader::open_read_only(&final_path)?;
        Ok(Self {
            name,
            columns,
            bin_width: spec.bin_width,
            row_id_size,
            reader,
            path: final_path,
        })
    }

    /// Reopens a previously built index. The index's own filename is its
    /// canonical `IndexSpec` expression, so no separate metadata file is
    /// needed to recover its column list or bin width.
    pub fn open(table: &Table, name: &str) -> Result<Self> {
        let spec = IndexSpec::parse(name)?;
        let schema = table.schema();
        let columns = resolve_columns(&schema, &spec)?;
        let path = table.homedir().join(name);
        let reader = store::StoreReader::open_read_only(&path)?;
        Ok(Self {
            name: name.to_string(),
            columns,
            bin_width: spec.bin_width,
            row_id_size: table.row_id_size(),
            reader,
            path,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.reader.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reader.is_empty()
    }

    /// First key in the index, decoded into one tuple value per indexed
    /// column.
    pub fn min_key(&self) -> Result<Option<Vec<Element>>> {
        match self.reader.cursor().first() {
            Some((k, _)) => Ok(Some(decode_composite(&self.columns, k)?)),
            None => Ok(None),
        }
    }

    pub fn max_key(&self) -> Result<Option<Vec<Element>>> {
        match self.reader.cursor().last() {
            Some((k, _)) => Ok(Some(decode_composite(&self.columns, k)?)),
            None => Ok(None),
        }
    }

    /// Smallest full key whose leading columns match `prefix`.
    pub fn min_key_with_prefix(&self, prefix: &[Element]) -> Result<Option<Vec<Element>>> {
        let prefix_bytes = encode_prefix(&self.columns, prefix)?;
        match self.prefix_bounds(&prefix_bytes) {
            Some((min, _)) => Ok(Some(decode_composite(&self.columns, &min)?)),
            None => Ok(None),
        }
    }

    /// Largest full key whose leading columns match `prefix`.
    pub fn max_key_with_prefix(&self, prefix: &[Element]) -> Result<Option<Vec<Element>>> {
        let prefix_bytes = encode_prefix(&self.columns, prefix)?;
        match self.prefix_bounds(&prefix_bytes) {
            Some((_, max)) => Ok(Some(decode_composite(&self.columns, &max)?)),
            None => Ok(None),
        }
    }

    /// Distinct keys in ascending order (duplicate keys coalesced).
    pub fn keys(&self) -> Result<Vec<Vec<Element>>> {
        let mut out = Vec::new();
        let mut last: Option<&[u8]> = None;
        for (k, _) in self.reader.iter() {
            if last != Some(k) {
                out.push(decode_composite(&self.columns, k)?);
                last = Some(k);
            }
        }
        Ok(out)
    }

    /// A read-only view from each distinct key to the number of rows that
    /// hash to it.
    pub fn counter(&self) -> Counter {
        let mut groups: Vec<(Vec<u8>, usize)> = Vec::new();
        for (k, _) in self.reader.iter() {
            if let Some(last) = groups.last_mut() {
                if last.0 == k {
                    last.1 += 1;
                    continue;
                }
            }
            groups.push((k.to_vec(), 1));
        }
        Counter {
            columns: self.columns.clone(),
            groups,
        }
    }

    /// Fetches the primary `row_id` stored alongside the entry at `pos` in
    /// the underlying store (used by `cursor` to resolve index rows back to
    /// table rows).
    pub fn row_id_at(&self, key: &[u8]) -> Result<Option<u64>> {
        match self.reader.get(key) {
            Some(v) => Ok(Some(decode_uint(v)?)),
            None => Ok(None),
        }
    }

    pub fn cursor(&self) -> store::Cursor<'_> {
        self.reader.cursor()
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn row_id_size(&self) -> u8 {
        self.row_id_size
    }

    /// Encodes a (possibly partial) prefix of values against this index's
    /// leading columns, with no binning re-applied. Exposed for `cursor`,
    /// which needs the same byte encoding to translate a bound tuple into a
    /// seek key.
    pub fn encode_prefix(&self, values: &[Element]) -> Result<Vec<u8>> {
        encode_prefix(&self.columns, values)
    }

    fn prefix_bounds(&self, prefix: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
        let entries: Vec<(&[u8], &[u8])> = self.reader.iter().collect();
        let start = entries.partition_point(|(k, _)| *k < prefix);
        if start >= entries.len() || !entries[start].0.starts_with(prefix) {
            return None;
        }
        let mut end = start;
        while end + 1 < entries.len() && entries[end + 1].0.starts_with(prefix) {
            end += 1;
        }
        Some((entries[start].0.to_vec(), entries[end].0.to_vec()))
    }
}

/// An exact mapping from distinct index keys to the count of rows that
/// produced them.
pub struct Counter {
    columns: Vec<ColumnDescriptor>,
    groups: Vec<(Vec<u8>, usize)>,
}

impl Counter {
    /// Number of rows whose (post-bin) indexed columns equal `key`; `0` if
    /// `key` is absent.
    pub fn get(&self, key: &[Element]) -> Result<usize> {
        let bytes = encode_prefix(&self.columns, key)?;
        Ok(self
            .groups
            .binary_search_by(|(k, _)| k.as_slice().cmp(bytes.as_slice()))
            .map(|i| self.groups[i].1)
            .unwrap_or(0))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// `(key, count)` pairs in ascending key order.
    pub fn iter(&self) -> Result<Vec<(Vec<Element>, usize)>> {
        self.groups
            .iter()
            .map(|(k, count)| Ok((decode_composite(&self.columns, k)?, *count)))
            .collect()
    }
}

fn resolve_columns(schema: &schema::Schema, spec: &IndexSpec) -> Result<Vec<ColumnDescriptor>> {
    spec.columns
        .iter()
        .map(|name| {
            schema
                .column(name)
                .cloned()
                .ok_or_else(|| IndexError::NotFound(name.clone()))
        })
        .collect()
}

fn validate_columns(columns: &[ColumnDescriptor], bin_width: Option<u64>) -> Result<()> {
    let last_idx = columns.len() - 1;
    for (i, col) in columns.iter().enumerate() {
        if col.num_elements.is_variable() && i != last_idx {
            return Err(IndexError::Validation(format!(
                "variable-width column '{}' may only appear as the last indexed column",
                col.name
            )));
        }
        if let ColumnWidth::Fixed(n) = col.num_elements {
            if n != 1 {
                return Err(IndexError::Validation(format!(
                    "indexed column '{}' must be single-valued",
                    col.name
                )));
            }
        }
    }
    if bin_width.is_some() && columns[last_idx].element_type == ElementType::Char {
        return Err(IndexError::Validation(
            "CHAR columns do not support bins".into(),
        ));
    }
    Ok(())
}

fn bin_element(el: &Element, width: u64) -> Result<Element> {
    Ok(match el {
        Element::Uint(v) => Element::Uint((v / width) * width),
        Element::Int(v) => {
            let w = width as i64;
            Element::Int(v.div_euclid(w) * w)
        }
        Element::Float(v) => {
            let w = width as f64;
            Element::Float((v / w).floor() * w)
        }
        Element::Bytes(_) => {
            return Err(IndexError::Validation(
                "CHAR columns do not support bins".into(),
            ))
        }
    })
}

fn encode_value(col: &ColumnDescriptor, el: &Element) -> Result<Vec<u8>> {
    Ok(match (col.element_type, el) {
        (ElementType::Uint, Element::Uint(v)) => encode_uint(*v, col.element_size)?,
        (ElementType::Int, Element::Int(v)) => encode_int(*v, col.element_size)?,
        (ElementType::Float, Element::Float(v)) => match col.element_size {
            2 => encode_float16(*v as f32).to_vec(),
            4 => encode_float32(*v as f32).to_vec(),
            8 => encode_float64(*v).to_vec(),
            n => return Err(codec::CodecError::InvalidWidth(n, "FLOAT").into()),
        },
        (ElementType::Char, Element::Bytes(b)) => encode_char(b),
        _ => {
            return Err(IndexError::Validation(format!(
                "value type does not match column '{}'",
                col.name
            )))
        }
    })
}

fn decode_value(col: &ColumnDescriptor, bytes: &[u8]) -> Result<Element> {
    Ok(match col.element_type {
        ElementType::Uint => Element::Uint(decode_uint(bytes)?),
        ElementType::Int => Element::Int(decode_int(bytes)?),
        ElementType::Float => Element::Float(match col.element_size {
            2 => decode_float16(bytes.try_into().unwrap()) as f64,
            4 => decode_float32(bytes.try_into().unwrap()) as f64,
            8 => decode_float64(bytes.try_into().unwrap()),
            n => return Err(codec::CodecError::InvalidWidth(n, "FLOAT").into()),
        }),
        ElementType::Char => Element::Bytes(decode_char(bytes)),
    })
}

fn encode_composite_for_row(
    columns: &[ColumnDescriptor],
    values: &[Element],
    bin_width: Option<u64>,
) -> Result<Vec<u8>> {
    let last_idx = columns.len() - 1;
    let mut out = Vec::new();
    for (i, (col, el)) in columns.iter().zip(values).enumerate() {
        let binned;
        let el = if i == last_idx {
            match bin_width {
                Some(w) => {
                    binned = bin_element(el, w)?;
                    &binned
                }
                None => el,
            }
        } else {
            el
        };
        out.extend(encode_value(col, el)?);
    }
    Ok(out)
}

/// Encodes a (possibly partial) prefix of values against the leading
/// columns. Never re-applies binning — callers of the prefix-bounded
/// lookups and the counter supply the literal (already-binned, for a binned
/// index) key they want to match, exactly as spec.md's own seed scenarios
/// do (e.g. `counter[25]` for a `QUAL[5]` index).
fn encode_prefix(columns: &[ColumnDescriptor], values: &[Element]) -> Result<Vec<u8>> {
    if values.len() > columns.len() {
        return Err(IndexError::Validation(
            "prefix longer than the index's column list".into(),
        ));
    }
    let mut out = Vec::new();
    for (col, el) in columns.iter().zip(values) {
        out.extend(encode_value(col, el)?);
    }
    Ok(out)
}

fn decode_composite(columns: &[ColumnDescriptor], key: &[u8]) -> Result<Vec<Element>> {
    let last_idx = columns.len() - 1;
    let mut offset = 0usize;
    let mut out = Vec::with_capacity(columns.len());
    for (i, col) in columns.iter().enumerate() {
        let width = if i == last_idx && col.num_elements.is_variable() {
            key.len() - offset
        } else {
            col.element_size as usize
        };
        let bytes = key
            .get(offset..offset + width)
            .ok_or_else(|| IndexError::Validation("composite key shorter than expected".into()))?;
        out.push(decode_value(col, bytes)?);
        offset += width;
    }
    Ok(out)
}

#[cfg(test)]
mod tests;
