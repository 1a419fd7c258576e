// Read-only view over a profile file's arrays and attributes

use crate::clean::Cleaner;
use crate::config::PhysicalRanges;
use crate::error::Result;
use argo_common::types::QcFlag;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Numeric variable decoded to `f64`, with its cleaning attributes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumericVar {
    pub name: String,
    pub shape: Vec<usize>,
    /// Row-major values
    pub data: Vec<f64>,
    pub fill_value: Option<f64>,
    pub valid_min: Option<f64>,
    pub valid_max: Option<f64>,
    pub units: Option<String>,
    pub calendar: Option<String>,
}

impl NumericVar {
    pub fn new(name: impl Into<String>, shape: Vec<usize>, data: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            shape,
            data,
            ..Self::default()
        }
    }

    /// One-dimensional variable
    pub fn vector(name: impl Into<String>, data: Vec<f64>) -> Self {
        let len = data.len();
        Self::new(name, vec![len], data)
    }

    pub fn with_fill_value(mut self, fill: f64) -> Self {
        self.fill_value = Some(fill);
        self
    }

    pub fn with_valid_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.valid_min = min;
        self.valid_max = max;
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_calendar(mut self, calendar: impl Into<String>) -> Self {
        self.calendar = Some(calendar.into());
        self
    }

    /// Flat element `i`
    pub fn at(&self, i: usize) -> Option<f64> {
        self.data.get(i).copied()
    }

    /// Row `i` along the last dimension
    ///
    /// A 1-D variable is a single row; any other index is out of range.
    pub fn row(&self, i: usize) -> Option<&[f64]> {
        let width = match self.shape.as_slice() {
            [] => self.data.len(),
            [_] => self.data.len(),
            [.., last] => *last,
        };
        if width == 0 {
            return if i == 0 { Some(&[]) } else { None };
        }
        let start = i.checked_mul(width)?;
        let end = start.checked_add(width)?;
        self.data.get(start..end)
    }

    /// First finite value anywhere in the array
    pub fn first_finite(&self) -> Option<f64> {
        self.data.iter().copied().find(|v| v.is_finite())
    }

    /// Cleaner built from this variable's attributes and the physical table
    pub fn cleaner(&self, ranges: &PhysicalRanges) -> Cleaner {
        Cleaner::new(ranges.for_variable(&self.name))
            .with_fill_value(self.fill_value)
            .with_valid_range(self.valid_min, self.valid_max)
    }
}

/// Text-like field as stored in the file
#[derive(Debug, Clone, PartialEq)]
pub enum TextField {
    /// Fixed-width character array, row-major
    CharArray { data: Vec<u8>, shape: Vec<usize> },
    /// Scalar byte string
    Bytes(Vec<u8>),
    /// Scalar text (e.g. a string attribute)
    Text(String),
    /// Scalar number stored where text was expected
    Number(f64),
}

fn clean_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl TextField {
    pub fn chars(shape: Vec<usize>, data: impl Into<Vec<u8>>) -> Self {
        TextField::CharArray {
            data: data.into(),
            shape,
        }
    }

    /// Decoded value for profile `i`
    ///
    /// A 0-d character array is one string, a 1-d array holds one character
    /// per profile and a 2-d or larger array holds one string per row.
    /// Scalars ignore the index.
    pub fn value_at(&self, i: usize) -> Option<String> {
        match self {
            TextField::CharArray { data, shape } => match shape.len() {
                0 => clean_text(&String::from_utf8_lossy(data)),
                1 => data
                    .get(i)
                    .and_then(|b| clean_text(&(*b as char).to_string())),
                _ => {
                    let width = shape.last().copied().unwrap_or(0);
                    let start = i.checked_mul(width)?;
                    let row = data.get(start..start.checked_add(width)?)?;
                    clean_text(&String::from_utf8_lossy(row))
                },
            },
            TextField::Bytes(bytes) => clean_text(&String::from_utf8_lossy(bytes)),
            TextField::Text(text) => clean_text(text),
            TextField::Number(n) => n.is_finite().then(|| n.to_string()),
        }
    }

    /// Per-level QC flags of profile `i`
    ///
    /// For a 2-d array this is row `i`; a 1-d array is a single row.
    pub fn flags_row(&self, i: usize) -> Option<Vec<Option<QcFlag>>> {
        match self {
            TextField::CharArray { data, shape } => {
                let row: &[u8] = if shape.len() >= 2 {
                    let width = shape.last().copied().unwrap_or(0);
                    let start = i.checked_mul(width)?;
                    data.get(start..start.checked_add(width)?)?
                } else if i == 0 {
                    data
                } else {
                    return None;
                };
                Some(row.iter().map(|b| QcFlag::from_byte(*b)).collect())
            },
            TextField::Bytes(bytes) if i == 0 => {
                Some(bytes.iter().map(|b| QcFlag::from_byte(*b)).collect())
            },
            TextField::Text(text) if i == 0 => Some(text.chars().map(QcFlag::from_char).collect()),
            _ => None,
        }
    }
}

/// Random access to the variables of one profile file
pub trait Dataset {
    /// Length of a named dimension, if the file declares it
    fn dimension_len(&self, name: &str) -> Option<usize>;

    /// Numeric variable decoded to `f64`; `Ok(None)` when absent
    fn numeric(&self, name: &str) -> Result<Option<NumericVar>>;

    /// Text-like variable; `Ok(None)` when absent
    fn text(&self, name: &str) -> Result<Option<TextField>>;

    /// File-level attributes as JSON
    fn global_attributes(&self) -> Result<Map<String, Value>>;
}

/// In-memory [`Dataset`] built from already decoded arrays
#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    dimensions: HashMap<String, usize>,
    numeric: HashMap<String, NumericVar>,
    text: HashMap<String, TextField>,
    globals: Map<String, Value>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dimension(mut self, name: impl Into<String>, len: usize) -> Self {
        self.dimensions.insert(name.into(), len);
        self
    }

    pub fn with_numeric(mut self, var: NumericVar) -> Self {
        self.numeric.insert(var.name.clone(), var);
        self
    }

    pub fn with_text(mut self, name: impl Into<String>, field: TextField) -> Self {
        self.text.insert(name.into(), field);
        self
    }

    pub fn with_global(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.globals.insert(name.into(), value.into());
        self
    }
}

impl Dataset for MemoryDataset {
    fn dimension_len(&self, name: &str) -> Option<usize> {
        self.dimensions.get(name).copied()
    }

    fn numeric(&self, name: &str) -> Result<Option<NumericVar>> {
        Ok(self.numeric.get(name).cloned())
    }

    fn text(&self, name: &str) -> Result<Option<TextField>> {
        Ok(self.text.get(name).cloned())
    }

    fn global_attributes(&self) -> Result<Map<String, Value>> {
        Ok(self.globals.clone())
    }
}
