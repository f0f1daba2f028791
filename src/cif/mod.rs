//! Columnar CIF data model shared by the text and binary readers.
//!
//! Both [`parse_text`] (mmCIF) and [`parse_binary`] (BinaryCIF) produce the
//! same [`CifFile`]: data blocks holding categories, categories holding
//! equally long fields. Missing values (`.`/`?` in text, masked entries in
//! binary) read back as `None`.

mod binary;
mod text;

use std::borrow::Cow;
use std::fmt;

pub use binary::parse_binary;
pub use text::parse_text;

/// Errors produced while reading CIF data.
#[derive(Debug, Clone, PartialEq)]
pub enum CifError {
    /// Malformed text CIF.
    Syntax {
        /// 1-based line of the offending token.
        line: usize,
        /// What was wrong.
        message: String,
    },
    /// Text input was not UTF-8.
    Encoding(String),
    /// Malformed BinaryCIF container or column encoding.
    Binary(String),
    /// No `data_` block in the input.
    NoDataBlock,
}

impl CifError {
    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn binary(message: impl Into<String>) -> Self {
        Self::Binary(message.into())
    }
}

impl fmt::Display for CifError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax { line, message } => {
                write!(f, "CIF syntax error at line {line}: {message}")
            }
            Self::Encoding(msg) => write!(f, "CIF text is not UTF-8: {msg}"),
            Self::Binary(msg) => write!(f, "BinaryCIF decode error: {msg}"),
            Self::NoDataBlock => f.write_str("no data block found"),
        }
    }
}

impl std::error::Error for CifError {}

/// A parsed CIF file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CifFile {
    /// Data blocks in file order.
    pub blocks: Vec<CifBlock>,
}

impl CifFile {
    /// First data block, which holds the structure in mmCIF files.
    #[must_use]
    pub fn first_block(&self) -> Option<&CifBlock> {
        self.blocks.first()
    }
}

/// One `data_` block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CifBlock {
    /// Block header (the text after `data_`).
    pub header: String,
    /// Categories in file order.
    pub categories: Vec<CifCategory>,
}

impl CifBlock {
    /// Empty block with the given header.
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            categories: Vec::new(),
        }
    }

    /// Category by name, without the leading underscore
    /// (case-insensitive).
    #[must_use]
    pub fn category(&self, name: &str) -> Option<&CifCategory> {
        self.categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub(crate) fn category_mut(
        &mut self,
        name: &str,
    ) -> Option<&mut CifCategory> {
        self.categories
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// A category: a table of equally long fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CifCategory {
    /// Category name without the leading underscore, e.g. `atom_site`.
    pub name: String,
    /// Number of rows.
    pub row_count: usize,
    /// Fields in file order.
    pub fields: Vec<CifField>,
}

impl CifCategory {
    /// Field by name (case-insensitive).
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&CifField> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }
}

/// Column values. Text CIF always produces [`FieldData::Text`]; BinaryCIF
/// keeps the decoded numeric type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldData {
    /// String values.
    Text(Vec<Option<String>>),
    /// Integer values.
    Int(Vec<Option<i64>>),
    /// Floating point values.
    Float(Vec<Option<f64>>),
}

/// A named column of a category.
#[derive(Debug, Clone, PartialEq)]
pub struct CifField {
    /// Field name without the category prefix, e.g. `Cartn_x`.
    pub name: String,
    /// Values, one per row.
    pub data: FieldData,
}

impl CifField {
    /// Text field from raw values.
    pub fn text(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            data: FieldData::Text(values),
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.data {
            FieldData::Text(v) => v.len(),
            FieldData::Int(v) => v.len(),
            FieldData::Float(v) => v.len(),
        }
    }

    /// Whether the field holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `row` as a string.
    #[must_use]
    pub fn str(&self, row: usize) -> Option<Cow<'_, str>> {
        match &self.data {
            FieldData::Text(v) => {
                v.get(row)?.as_deref().map(Cow::Borrowed)
            }
            FieldData::Int(v) => {
                v.get(row).copied().flatten().map(|i| i.to_string().into())
            }
            FieldData::Float(v) => {
                v.get(row).copied().flatten().map(|x| x.to_string().into())
            }
        }
    }

    /// Value at `row` as an integer. Unparseable text reads as `None`.
    #[must_use]
    pub fn int(&self, row: usize) -> Option<i64> {
        match &self.data {
            FieldData::Text(v) => v.get(row)?.as_deref()?.parse().ok(),
            FieldData::Int(v) => v.get(row).copied().flatten(),
            FieldData::Float(v) => {
                v.get(row).copied().flatten().map(|x| x.round() as i64)
            }
        }
    }

    /// Value at `row` as a float. Unparseable text reads as `None`.
    #[must_use]
    pub fn float(&self, row: usize) -> Option<f64> {
        match &self.data {
            FieldData::Text(v) => v.get(row)?.as_deref()?.parse().ok(),
            FieldData::Int(v) => v.get(row).copied().flatten().map(|i| i as f64),
            FieldData::Float(v) => v.get(row).copied().flatten(),
        }
    }
}
