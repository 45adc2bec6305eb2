//! Parser for the index naming grammar: `col ("+" col)* ("[" width "]")?`.
//! An index's own file name on disk *is* its canonical expression — the same
//! complexity class as the donor's `Manifest`'s `"L0:filename"` line parser.

use crate::IndexError;

type Result<T> = std::result::Result<T, IndexError>;

/// A parsed index expression: an ordered list of column names and an
/// optional bin width applying to the last one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub columns: Vec<String>,
    pub bin_width: Option<u64>,
}

impl IndexSpec {
    /// Parses e.g. `"REF"`, `"CHROM+POS"`, `"QUAL[5]"`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IndexError::Validation("empty index expression".into()));
        }

        let (cols_part, bin_width) = if let Some(stripped) = s.strip_suffix(']') {
            let open = stripped.rfind('[').ok_or_else(|| {
                IndexError::Validation(format!("unbalanced '[' in index expression '{s}'"))
            })?;
            let width_str = &stripped[open + 1..];
            let width = width_str.parse::<u64>().map_err(|_| {
                IndexError::Validation(format!("invalid bin width '{width_str}' in '{s}'"))
            })?;
            (&stripped[..open], Some(width))
        } else {
            (s, None)
        };

        let columns: Vec<String> = cols_part.split('+').map(|c| c.trim().to_string()).collect();
        if columns.iter().any(|c| c.is_empty()) {
            return Err(IndexError::Validation(format!(
                "empty column name in index expression '{s}'"
            )));
        }

        Ok(Self { columns, bin_width })
    }

    /// Reconstructs the canonical expression string — also the index's
    /// on-disk file name.
    pub fn canonical_name(&self) -> String {
        let mut name = self.columns.join("+");
        if let Some(w) = self.bin_width {
            name.push('[');
            name.push_str(&w.to_string());
            name.push(']');
        }
        name
    }
}
