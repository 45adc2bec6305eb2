//! The in-memory row buffer: one row's encoded bytes, laid out per a
//! [`Schema`] and (de)serialized to/from the bytes a `store` entry holds.
//!
//! A row buffer has two regions: the fixed header (one slot per column, laid
//! out by [`Schema::finalize`]) and, trailing it, a variable region holding
//! the packed payloads of any `var(k)` columns. A fixed column's slot holds
//! its encoded value directly; a variable column's slot holds a `(tail
//! offset, element count)` pair pointing into the variable region.

use std::rc::Rc;

use codec::{
    decode_char, decode_float16, decode_float32, decode_float64, decode_int, decode_uint,
    encode_char, encode_float16, encode_float32, encode_float64, encode_int, encode_uint, Element,
};
use schema::{ColumnDescriptor, ColumnWidth, ElementType, Schema};
use thiserror::Error;

/// Row buffers may not exceed this many total bytes (header + variable
/// region).
pub const MAX_ROW_BYTES: usize = 65_536;

#[derive(Debug, Error)]
pub enum RowError {
    #[error("column index {0} out of range")]
    NoSuchColumn(usize),
    #[error("column '{column}' expects {expected} element(s), got {actual}")]
    ArityMismatch {
        column: String,
        expected: String,
        actual: usize,
    },
    #[error("row buffer would grow to {size} bytes, exceeding the {MAX_ROW_BYTES}-byte limit")]
    Overflow { size: usize },
    #[error("row buffer is {actual} bytes, expected at least the {expected}-byte header")]
    Truncated { expected: usize, actual: usize },
    #[error(transparent)]
    Codec(#[from] codec::CodecError),
}

type Result<T> = std::result::Result<T, RowError>;

/// One row's encoded bytes, built against a shared [`Schema`] handle.
///
/// Holds an `Rc<Schema>` rather than a borrowed `&Schema`: a `Table` hands
/// out row buffers while itself needing a `&mut self` for `add_row`, and a
/// borrowed schema would alias that mutable borrow. An `Rc` clone is cheap
/// and keeps every row buffer pointing at the exact same schema instance.
#[derive(Debug, Clone)]
pub struct RowBuffer {
    schema: Rc<Schema>,
    buf: Vec<u8>,
}

impl RowBuffer {
    /// A freshly cleared row buffer: `buf` sized to exactly the header,
    /// every byte zero (the "missing" sentinel for every column, see the
    /// `codec` crate's module docs).
    pub fn new(schema: Rc<Schema>) -> Self {
        let header_size = schema.header_size as usize;
        Self {
            schema,
            buf: vec![0u8; header_size],
        }
    }

    /// Resets this buffer back to its freshly cleared state, discarding any
    /// variable-region payloads that had been appended.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.buf.resize(self.schema.header_size as usize, 0);
    }

    /// Returns an owned clone of the column descriptor at `index`, to avoid
    /// holding a borrow of `self` alive across the buffer writes that follow
    /// in `set`/`get`.
    fn column(&self, index: usize) -> Result<ColumnDescriptor> {
        self.schema
            .columns
            .get(index)
            .cloned()
            .ok_or(RowError::NoSuchColumn(index))
    }

    /// Encodes `elements` into column `index`. For a `Fixed(n)` column,
    /// `elements.len()` must equal `n`. For a `var(k)` CHAR column, exactly
    /// one `Element::Bytes` payload is expected, its length bounding the
    /// element count written to the fixed slot.
    pub fn set(&mut self, index: usize, elements: &[Element]) -> Result<()> {
        let col = self.column(index)?;
        match col.num_elements {
            ColumnWidth::Fixed(n) => {
                if elements.len() != n as usize {
                    return Err(RowError::ArityMismatch {
                        column: col.name.clone(),
                        expected: n.to_string(),
                        actual: elements.len(),
                    });
                }
                let base = col.fixed_region_offset as usize;
                for (i, el) in elements.iter().enumerate() {
                    let encoded = encode_element(&col, el)?;
                    if encoded.len() != col.element_size as usize {
                        return Err(RowError::ArityMismatch {
                            column: col.name.clone(),
                            expected: format!("{} byte element", col.element_size),
                            actual: encoded.len(),
                        });
                    }
                    let at = base + i * col.element_size as usize;
                    self.buf[at..at + encoded.len()].copy_from_slice(&encoded);
                }
                Ok(())
            }
            ColumnWidth::Var1 | ColumnWidth::Var2 => {
                let max = col.num_elements.max_elements().unwrap() as usize;
                let payload = var_payload_bytes(&col, elements)?;
                let count = payload.len() / col.element_size as usize;
                if count > max {
                    return Err(RowError::ArityMismatch {
                        column: col.name.clone(),
                        expected: format!("<= {max} elements"),
                        actual: count,
                    });
                }
                let new_len = self
                    .buf
                    .len()
                    .checked_add(payload.len())
                    .ok_or(RowError::Overflow { size: usize::MAX })?;
                if new_len > MAX_ROW_BYTES {
                    return Err(RowError::Overflow { size: new_len });
                }
                let tail_offset = self.buf.len() as u32;
                self.buf.extend_from_slice(&payload);

                let count_width = col.num_elements.count_width().unwrap() as usize;
                let slot = col.fixed_region_offset as usize;
                self.buf[slot..slot + 2].copy_from_slice(&tail_offset.to_be_bytes()[2..4]);
                let count_bytes = (count as u32).to_be_bytes();
                self.buf[slot + 2..slot + 2 + count_width]
                    .copy_from_slice(&count_bytes[4 - count_width..]);
                Ok(())
            }
        }
    }

    /// Decodes the elements stored in column `index`.
    pub fn get(&self, index: usize) -> Result<Vec<Element>> {
        let col = self.column(index)?;
        match col.num_elements {
            ColumnWidth::Fixed(n) => {
                let base = col.fixed_region_offset as usize;
                let mut out = Vec::with_capacity(n as usize);
                for i in 0..n as usize {
                    let at = base + i * col.element_size as usize;
                    let bytes = &self.buf[at..at + col.element_size as usize];
                    out.push(decode_element(&col, bytes)?);
                }
                Ok(out)
            }
            ColumnWidth::Var1 | ColumnWidth::Var2 => {
                let slot = col.fixed_region_offset as usize;
                let offset = u16::from_be_bytes([self.buf[slot], self.buf[slot + 1]]) as usize;
                let count_width = col.num_elements.count_width().unwrap() as usize;
                let mut count_bytes = [0u8; 4];
                count_bytes[4 - count_width..]
                    .copy_from_slice(&self.buf[slot + 2..slot + 2 + count_width]);
                let count = u32::from_be_bytes(count_bytes) as usize;

                if col.element_type == ElementType::Char {
                    let bytes = self.buf[offset..offset + count].to_vec();
                    return Ok(vec![Element::Bytes(decode_char(&bytes))]);
                }
                let mut out = Vec::with_capacity(count);
                for i in 0..count {
                    let at = offset + i * col.element_size as usize;
                    let bytes = &self.buf[at..at + col.element_size as usize];
                    out.push(decode_element(&col, bytes)?);
                }
                Ok(out)
            }
        }
    }

    /// Borrows the whole encoded row (header + variable region).
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Rebuilds a row buffer from previously encoded bytes (e.g. as read
    /// back from the `store`). Does not re-validate column contents — only
    /// that the buffer is at least as long as the schema's header.
    pub fn from_bytes(schema: Rc<Schema>, bytes: &[u8]) -> Result<Self> {
        if bytes.len() < schema.header_size as usize {
            return Err(RowError::Truncated {
                expected: schema.header_size as usize,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            schema,
            buf: bytes.to_vec(),
        })
    }
}

fn encode_element(col: &ColumnDescriptor, el: &Element) -> Result<Vec<u8>> {
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
            return Err(RowError::ArityMismatch {
                column: col.name.clone(),
                expected: format!("{:?} element", col.element_type),
                actual: 0,
            })
        }
    })
}

fn decode_element(col: &ColumnDescriptor, bytes: &[u8]) -> Result<Element> {
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

/// Flattens the elements passed to `set` on a variable column into the raw
/// bytes that get appended to the buffer's tail.
fn var_payload_bytes(col: &ColumnDescriptor, elements: &[Element]) -> Result<Vec<u8>> {
    if col.element_type == ElementType::Char {
        if elements.len() != 1 {
            return Err(RowError::ArityMismatch {
                column: col.name.clone(),
                expected: "1 Bytes element".to_string(),
                actual: elements.len(),
            });
        }
        return match &elements[0] {
            Element::Bytes(b) => Ok(encode_char(b)),
            _ => Err(RowError::ArityMismatch {
                column: col.name.clone(),
                expected: "Bytes element".to_string(),
                actual: 1,
            }),
        };
    }
    let mut out = Vec::with_capacity(elements.len() * col.element_size as usize);
    for el in elements {
        out.extend_from_slice(&encode_element(col, el)?);
    }
    Ok(out)
}
