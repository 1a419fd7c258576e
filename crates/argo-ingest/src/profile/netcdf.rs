// Dataset over the netCDF C library

use super::dataset::{Dataset, NumericVar, TextField};
use crate::error::{IngestError, Result};
use netcdf::AttributeValue;
use serde_json::{Map, Number, Value};
use std::path::Path;

/// Profile file opened through libnetcdf
pub struct NetcdfDataset {
    file: netcdf::File,
}

impl NetcdfDataset {
    pub fn open(path: &Path) -> Result<Self> {
        let file = netcdf::open(path)
            .map_err(|e| IngestError::Dataset(format!("{}: {e}", path.display())))?;
        Ok(Self { file })
    }
}

fn attr_f64(value: AttributeValue) -> Option<f64> {
    match value {
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Float(v) => Some(f64::from(v)),
        AttributeValue::Int(v) => Some(f64::from(v)),
        AttributeValue::Short(v) => Some(f64::from(v)),
        AttributeValue::Schar(v) => Some(f64::from(v)),
        AttributeValue::Uchar(v) => Some(f64::from(v)),
        AttributeValue::Ushort(v) => Some(f64::from(v)),
        AttributeValue::Uint(v) => Some(f64::from(v)),
        AttributeValue::Doubles(v) => v.first().copied(),
        AttributeValue::Floats(v) => v.first().map(|x| f64::from(*x)),
        AttributeValue::Ints(v) => v.first().map(|x| f64::from(*x)),
        AttributeValue::Shorts(v) => v.first().map(|x| f64::from(*x)),
        _ => None,
    }
}

fn attr_json(value: AttributeValue) -> Value {
    let num = |v: f64| Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null);
    match value {
        AttributeValue::Str(s) => Value::String(s),
        AttributeValue::Strs(v) => Value::Array(v.into_iter().map(Value::String).collect()),
        AttributeValue::Doubles(v) => Value::Array(v.into_iter().map(num).collect()),
        AttributeValue::Floats(v) => Value::Array(v.into_iter().map(|x| num(f64::from(x))).collect()),
        AttributeValue::Ints(v) => Value::Array(v.into_iter().map(Value::from).collect()),
        AttributeValue::Shorts(v) => Value::Array(v.into_iter().map(Value::from).collect()),
        AttributeValue::Longlong(v) => Value::from(v),
        AttributeValue::Ulonglong(v) => Value::from(v),
        other => attr_f64(other).map(num).unwrap_or(Value::Null),
    }
}

impl NetcdfDataset {
    fn var_attr(var: &netcdf::Variable<'_>, name: &str) -> Option<AttributeValue> {
        var.attribute_value(name).and_then(|v| v.ok())
    }

    fn var_text_attr(var: &netcdf::Variable<'_>, name: &str) -> Option<String> {
        match Self::var_attr(var, name)? {
            AttributeValue::Str(s) => Some(s),
            _ => None,
        }
    }

    fn is_char(var: &netcdf::Variable<'_>) -> bool {
        matches!(var.vartype(), netcdf::types::NcVariableType::Char)
    }
}

impl Dataset for NetcdfDataset {
    fn dimension_len(&self, name: &str) -> Option<usize> {
        self.file.dimension(name).map(|d| d.len())
    }

    fn numeric(&self, name: &str) -> Result<Option<NumericVar>> {
        let Some(var) = self.file.variable(name) else {
            return Ok(None);
        };
        if Self::is_char(&var) {
            return Ok(None);
        }

        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let data: Vec<f64> = var.get_values::<f64, _>(..)?;

        Ok(Some(NumericVar {
            name: name.to_string(),
            shape,
            data,
            fill_value: Self::var_attr(&var, "_FillValue").and_then(attr_f64),
            valid_min: Self::var_attr(&var, "valid_min").and_then(attr_f64),
            valid_max: Self::var_attr(&var, "valid_max").and_then(attr_f64),
            units: Self::var_text_attr(&var, "units"),
            calendar: Self::var_text_attr(&var, "calendar"),
        }))
    }

    fn text(&self, name: &str) -> Result<Option<TextField>> {
        let Some(var) = self.file.variable(name) else {
            return Ok(None);
        };

        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

        if Self::is_char(&var) {
            let data = var.get_raw_values(..)?;
            return Ok(Some(TextField::CharArray { data, shape }));
        }

        // numeric variable holding a code, e.g. an integer data mode
        let values: Vec<f64> = var.get_values::<f64, _>(..)?;
        Ok(values.first().copied().map(TextField::Number))
    }

    fn global_attributes(&self) -> Result<Map<String, Value>> {
        let mut attrs = Map::new();
        for attr in self.file.attributes() {
            match attr.value() {
                Ok(value) => {
                    attrs.insert(attr.name().to_string(), attr_json(value));
                },
                Err(e) => {
                    tracing::debug!(attribute = attr.name(), error = %e, "Skipping unreadable attribute");
                },
            }
        }
        Ok(attrs)
    }
}
