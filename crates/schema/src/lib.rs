//! Column descriptors and the ordered schema that describes a wormtable row.
//!
//! A [`Schema`] is an ordered list of [`ColumnDescriptor`]s. Column 0 is
//! always the auto-managed `row_id` column. [`Schema::finalize`] walks the
//! columns assigning `fixed_region_offset`/`fixed_region_size`, producing the
//! row header length every row buffer is built around.
//!
//! Persistence is an XML document (`schema.xml`), parsed and written with
//! `quick-xml`.

use std::io::{Read, Write};

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

/// Current schema XML version written by this crate.
pub const SCHEMA_VERSION: &str = "1.0";

/// Name of the auto-managed primary-key column, always column 0.
pub const ROW_ID_COLUMN: &str = "row_id";

/// Errors raised while building or loading a [`Schema`].
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("column name must not be empty")]
    EmptyName,
    #[error("duplicate column name: {0}")]
    DuplicateName(String),
    #[error("invalid element size {size} for element type {element_type:?}")]
    InvalidElementSize { element_type: ElementType, size: u8 },
    #[error("row header size {header} bytes does not fit the address width of variable column '{column}'")]
    HeaderTooLarge { header: u32, column: String },
    #[error("malformed schema xml: {0}")]
    Format(String),
    #[error("schema version missing or unsupported: {0:?}")]
    UnsupportedVersion(Option<String>),
    #[error("unknown attribute '{0}' on <column>")]
    UnknownAttribute(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

type Result<T> = std::result::Result<T, SchemaError>;

/// The four element types a column may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Uint,
    Int,
    Float,
    Char,
}

impl ElementType {
    fn as_str(self) -> &'static str {
        match self {
            ElementType::Uint => "uint",
            ElementType::Int => "int",
            ElementType::Float => "float",
            ElementType::Char => "char",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "uint" => Ok(ElementType::Uint),
            "int" => Ok(ElementType::Int),
            "float" => Ok(ElementType::Float),
            "char" => Ok(ElementType::Char),
            other => Err(SchemaError::Format(format!("unknown element_type '{other}'"))),
        }
    }

    /// Validates that `size` is an allowed element width for this type.
    pub fn validate_size(self, size: u8) -> Result<()> {
        let ok = match self {
            ElementType::Uint | ElementType::Int => (1..=8).contains(&size),
            ElementType::Float => matches!(size, 2 | 4 | 8),
            ElementType::Char => size == 1,
        };
        if ok {
            Ok(())
        } else {
            Err(SchemaError::InvalidElementSize {
                element_type: self,
                size,
            })
        }
    }
}

/// Whether a column's element count is fixed or variable, and if variable,
/// the width of its count field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnWidth {
    /// A fixed number of elements, always present.
    Fixed(u32),
    /// `var(1)`: up to 255 elements, 1-byte count field.
    Var1,
    /// `var(2)`: up to 65,535 elements, 2-byte count field.
    Var2,
}

/// Byte width of the offset field written into a variable column's fixed
/// slot. Constant at 2 bytes regardless of `var(1)`/`var(2)`, since a row is
/// capped at 65,536 bytes and every tail position must be addressable.
const VAR_OFFSET_WIDTH: u32 = 2;

impl ColumnWidth {
    /// Byte width of the count field within the column's fixed slot.
    pub fn count_width(self) -> Option<u32> {
        match self {
            ColumnWidth::Fixed(_) => None,
            ColumnWidth::Var1 => Some(1),
            ColumnWidth::Var2 => Some(2),
        }
    }

    /// Maximum number of elements this variable width can hold.
    pub fn max_elements(self) -> Option<u32> {
        match self {
            ColumnWidth::Fixed(_) => None,
            ColumnWidth::Var1 => Some(255),
            ColumnWidth::Var2 => Some(65_535),
        }
    }

    pub fn is_variable(self) -> bool {
        !matches!(self, ColumnWidth::Fixed(_))
    }

    fn xml_attr(self) -> String {
        match self {
            ColumnWidth::Fixed(n) => n.to_string(),
            ColumnWidth::Var1 => "var(1)".to_string(),
            ColumnWidth::Var2 => "var(2)".to_string(),
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "var(1)" => Ok(ColumnWidth::Var1),
            "var(2)" => Ok(ColumnWidth::Var2),
            other => other
                .parse::<u32>()
                .map(ColumnWidth::Fixed)
                .map_err(|_| SchemaError::Format(format!("invalid num_elements '{other}'"))),
        }
    }
}

/// One column's full descriptor, including the offsets assigned by
/// [`Schema::finalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub description: String,
    pub element_type: ElementType,
    pub element_size: u8,
    pub num_elements: ColumnWidth,
    pub fixed_region_offset: u32,
    pub fixed_region_size: u32,
}

impl ColumnDescriptor {
    /// Builds a new descriptor with offsets left at zero; call
    /// [`Schema::finalize`] (via [`Schema::add_column`]) to assign them.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        element_type: ElementType,
        element_size: u8,
        num_elements: ColumnWidth,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(SchemaError::EmptyName);
        }
        element_type.validate_size(element_size)?;
        Ok(Self {
            name,
            description: description.into(),
            element_type,
            element_size,
            num_elements,
            fixed_region_offset: 0,
            fixed_region_size: 0,
        })
    }

    /// The width, in bytes, of this column's slot in the row header.
    fn slot_width(&self) -> u32 {
        match self.num_elements {
            ColumnWidth::Fixed(n) => n * self.element_size as u32,
            ColumnWidth::Var1 | ColumnWidth::Var2 => {
                VAR_OFFSET_WIDTH + self.num_elements.count_width().unwrap()
            }
        }
    }
}

/// An ordered sequence of [`ColumnDescriptor`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub columns: Vec<ColumnDescriptor>,
    /// Row header size in bytes (sum of fixed-region sizes), valid only
    /// after [`Schema::finalize`].
    pub header_size: u32,
}

impl Schema {
    /// Creates a new schema with only the auto-managed `row_id` column,
    /// using `row_id_size` bytes (default 4).
    pub fn new(row_id_size: u8) -> Result<Self> {
        ElementType::Uint.validate_size(row_id_size)?;
        let row_id = ColumnDescriptor::new(
            ROW_ID_COLUMN,
            "auto-assigned row identifier",
            ElementType::Uint,
            row_id_size,
            ColumnWidth::Fixed(1),
        )?;
        let mut schema = Self {
            columns: vec![row_id],
            header_size: 0,
        };
        schema.finalize()?;
        Ok(schema)
    }

    /// Appends a user column. Rejects duplicate or empty names.
    pub fn add_column(&mut self, column: ColumnDescriptor) -> Result<()> {
        if column.name.is_empty() {
            return Err(SchemaError::EmptyName);
        }
        if self.columns.iter().any(|c| c.name == column.name) {
            return Err(SchemaError::DuplicateName(column.name));
        }
        self.columns.push(column);
        self.finalize()
    }

    /// Walks columns in declaration order assigning `fixed_region_offset`
    /// and `fixed_region_size`, and validates that the resulting row header
    /// size is representable within every variable column's address width.
    pub fn finalize(&mut self) -> Result<()> {
        let mut offset = 0u32;
        for col in &mut self.columns {
            col.fixed_region_offset = offset;
            col.fixed_region_size = col.slot_width();
            offset = offset
                .checked_add(col.fixed_region_size)
                .expect("row header size overflowed u32");
        }
        self.header_size = offset;

        for col in &self.columns {
            if col.num_elements.is_variable() {
                let max_addressable = (1u64 << (8 * VAR_OFFSET_WIDTH)) - 1;
                if offset as u64 > max_addressable {
                    return Err(SchemaError::HeaderTooLarge {
                        header: offset,
                        column: col.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Index of a column by name, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.column_index(name).map(|i| &self.columns[i])
    }

    /// Writes this schema as `schema.xml`.
    pub fn write_xml<W: Write>(&self, w: W) -> Result<()> {
        let mut writer = Writer::new_with_indent(w, b' ', 2);

        let xml_err = |e: quick_xml::Error| SchemaError::Format(e.to_string());

        let mut schema_start = BytesStart::new("schema");
        schema_start.push_attribute(("version", SCHEMA_VERSION));
        writer.write_event(Event::Start(schema_start)).map_err(xml_err)?;

        writer
            .write_event(Event::Start(BytesStart::new("columns")))
            .map_err(xml_err)?;
        for col in &self.columns {
            let mut elem = BytesStart::new("column");
            elem.push_attribute(("name", col.name.as_str()));
            elem.push_attribute(("description", col.description.as_str()));
            elem.push_attribute(("element_type", col.element_type.as_str()));
            elem.push_attribute(("element_size", col.element_size.to_string().as_str()));
            let width_attr = col.num_elements.xml_attr();
            elem.push_attribute(("num_elements", width_attr.as_str()));
            writer.write_event(Event::Empty(elem)).map_err(xml_err)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("columns")))
            .map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("schema")))
            .map_err(xml_err)?;
        Ok(())
    }

    /// Reads a schema from `schema.xml`. Rejects unknown `<column>`
    /// attributes and missing/unsupported `version`.
    pub fn read_xml<R: Read>(r: R) -> Result<Self> {
        let mut reader = Reader::from_reader(std::io::BufReader::new(r));
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut columns = Vec::new();
        let mut version_seen: Option<String> = None;

        loop {
            match reader
                .read_event_into(&mut buf)
                .map_err(|e| SchemaError::Format(e.to_string()))?
            {
                Event::Start(e) | Event::Empty(e) => {
                    let local = e.local_name();
                    let tag = std::str::from_utf8(local.as_ref()).unwrap_or_default();
                    if tag == "schema" {
                        for attr in e.attributes() {
                            let attr = attr.map_err(|e| SchemaError::Format(e.to_string()))?;
                            if attr.key.as_ref() == b"version" {
                                version_seen = Some(
                                    attr.unescape_value()
                                        .map_err(|e| SchemaError::Format(e.to_string()))?
                                        .into_owned(),
                                );
                            }
                        }
                    } else if tag == "column" {
                        columns.push(parse_column_element(&e)?);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        match version_seen.as_deref() {
            Some(SCHEMA_VERSION) => {}
            other => return Err(SchemaError::UnsupportedVersion(other.map(String::from))),
        }

        let mut schema = Schema {
            columns,
            header_size: 0,
        };
        schema.finalize()?;
        Ok(schema)
    }

    /// Convenience: write `schema.xml` to a path.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_xml(std::io::BufWriter::new(file))
    }

    /// Convenience: load `schema.xml` from a path.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::read_xml(std::io::BufReader::new(file))
    }
}

fn parse_column_element(e: &BytesStart) -> Result<ColumnDescriptor> {
    let mut name = None;
    let mut description = String::new();
    let mut element_type = None;
    let mut element_size = None;
    let mut num_elements = None;

    for attr in e.attributes() {
        let attr = attr.map_err(|e| SchemaError::Format(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref()).unwrap_or_default();
        let value = attr
            .unescape_value()
            .map_err(|e| SchemaError::Format(e.to_string()))?
            .into_owned();
        match key {
            "name" => name = Some(value),
            "description" => description = value,
            "element_type" => element_type = Some(ElementType::parse(&value)?),
            "element_size" => {
                element_size = Some(
                    value
                        .parse::<u8>()
                        .map_err(|_| SchemaError::Format(format!("bad element_size '{value}'")))?,
                )
            }
            "num_elements" => num_elements = Some(ColumnWidth::parse(&value)?),
            other => return Err(SchemaError::UnknownAttribute(other.to_string())),
        }
    }

    let name = name.ok_or_else(|| SchemaError::Format("<column> missing 'name'".into()))?;
    let element_type =
        element_type.ok_or_else(|| SchemaError::Format("<column> missing 'element_type'".into()))?;
    let element_size =
        element_size.ok_or_else(|| SchemaError::Format("<column> missing 'element_size'".into()))?;
    let num_elements =
        num_elements.ok_or_else(|| SchemaError::Format("<column> missing 'num_elements'".into()))?;

    ColumnDescriptor::new(name, description, element_type, element_size, num_elements)
}
