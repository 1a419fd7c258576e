//! Per-level rows and per-profile summaries
//!
//! Everything here works on cleaned values: a [`Series`] holds one profile's
//! row of a variable after [`Cleaner`] has been applied, next to its QC flags.

use crate::clean::{best_value, Cleaner};
use argo_common::types::{is_good, QcFlag};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One profile's row of a variable, cleaned, with its QC flags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    values: Vec<Option<f64>>,
    flags: Vec<Option<QcFlag>>,
}

impl Series {
    pub fn new(raw: Option<&[f64]>, cleaner: &Cleaner, flags: Option<Vec<Option<QcFlag>>>) -> Self {
        Self {
            values: raw
                .unwrap_or_default()
                .iter()
                .map(|v| cleaner.clean(*v).ok())
                .collect(),
            flags: flags.unwrap_or_default(),
        }
    }

    pub fn value(&self, i: usize) -> Option<f64> {
        self.values.get(i).copied().flatten()
    }

    pub fn flag(&self, i: usize) -> Option<QcFlag> {
        self.flags.get(i).copied().flatten()
    }

    /// Number of levels this series covers (values or flags)
    pub fn len(&self) -> usize {
        self.values.len().max(self.flags.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any level holds a cleaned value
    pub fn has_signal(&self) -> bool {
        self.values.iter().any(Option::is_some)
    }

    /// Occurrences of each non-blank flag
    pub fn flag_counts(&self) -> BTreeMap<char, u64> {
        let mut counts = BTreeMap::new();
        for flag in self.flags.iter().flatten() {
            *counts.entry(flag.as_char()).or_insert(0) += 1;
        }
        counts
    }

    /// Number of cleaned values and their maximum
    pub fn valid_summary(&self) -> (usize, Option<f64>) {
        let valid: Vec<f64> = self.values.iter().flatten().copied().collect();
        let max = valid.iter().copied().reduce(f64::max);
        (valid.len(), max)
    }
}

/// Raw and adjusted series of one science variable
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Measurement {
    pub raw: Series,
    pub adjusted: Series,
}

impl Measurement {
    pub fn new(raw: Series, adjusted: Series) -> Self {
        Self { raw, adjusted }
    }

    pub fn best(&self, i: usize) -> Option<f64> {
        best_value(
            self.raw.value(i),
            self.raw.flag(i),
            self.adjusted.value(i),
            self.adjusted.flag(i),
        )
    }

    pub fn len(&self) -> usize {
        self.raw.len().max(self.adjusted.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_signal(&self) -> bool {
        self.raw.has_signal() || self.adjusted.has_signal()
    }

    /// Some level has a cleaned adjusted value with a good adjusted flag
    pub fn has_good_adjusted(&self) -> bool {
        (0..self.adjusted.len())
            .any(|i| self.adjusted.value(i).is_some() && is_good(self.adjusted.flag(i)))
    }
}

/// Core level row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoreLevel {
    pub level_index: i32,
    pub pres: Option<f64>,
    pub pres_qc: Option<QcFlag>,
    pub pres_adjusted: Option<f64>,
    pub pres_adjusted_qc: Option<QcFlag>,
    pub temp: Option<f64>,
    pub temp_qc: Option<QcFlag>,
    pub temp_adjusted: Option<f64>,
    pub temp_adjusted_qc: Option<QcFlag>,
    pub best_temp: Option<f64>,
    pub psal: Option<f64>,
    pub psal_qc: Option<QcFlag>,
    pub psal_adjusted: Option<f64>,
    pub psal_adjusted_qc: Option<QcFlag>,
    pub best_psal: Option<f64>,
}

/// BGC level row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BgcLevel {
    pub level_index: i32,
    pub pres: Option<f64>,
    pub doxy: Option<f64>,
    pub doxy_qc: Option<QcFlag>,
    pub doxy_adjusted: Option<f64>,
    pub doxy_adjusted_qc: Option<QcFlag>,
    pub best_doxy: Option<f64>,
    pub chla: Option<f64>,
    pub chla_qc: Option<QcFlag>,
    pub chla_adjusted: Option<f64>,
    pub chla_adjusted_qc: Option<QcFlag>,
    pub best_chla: Option<f64>,
}

/// Core variables of one profile
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoreSeries {
    pub pres: Measurement,
    pub temp: Measurement,
    pub psal: Measurement,
}

impl CoreSeries {
    /// One row per level up to the longest participating series
    pub fn levels(&self) -> Vec<CoreLevel> {
        let n = self.pres.len().max(self.temp.len()).max(self.psal.len());
        (0..n)
            .map(|i| CoreLevel {
                level_index: level_index(i),
                pres: self.pres.raw.value(i),
                pres_qc: self.pres.raw.flag(i),
                pres_adjusted: self.pres.adjusted.value(i),
                pres_adjusted_qc: self.pres.adjusted.flag(i),
                temp: self.temp.raw.value(i),
                temp_qc: self.temp.raw.flag(i),
                temp_adjusted: self.temp.adjusted.value(i),
                temp_adjusted_qc: self.temp.adjusted.flag(i),
                best_temp: self.temp.best(i),
                psal: self.psal.raw.value(i),
                psal_qc: self.psal.raw.flag(i),
                psal_adjusted: self.psal.adjusted.value(i),
                psal_adjusted_qc: self.psal.adjusted.flag(i),
                best_psal: self.psal.best(i),
            })
            .collect()
    }

    /// Some adjusted temperature or salinity is usable
    pub fn has_adjusted(&self) -> bool {
        self.temp.has_good_adjusted() || self.psal.has_good_adjusted()
    }

    /// Count and maximum of the cleaned raw pressures
    pub fn pressure_summary(&self) -> (usize, Option<f64>) {
        self.pres.raw.valid_summary()
    }
}

/// BGC variables of one profile
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BgcSeries {
    /// Adjusted pressure when the file has it, else raw pressure
    pub pres: Series,
    pub doxy: Measurement,
    pub chla: Measurement,
}

impl BgcSeries {
    /// BGC rows, or `None` when no oxygen or chlorophyll value survives cleaning
    ///
    /// Levels without a pressure, or with all four oxygen/chlorophyll values
    /// missing, are dropped.
    pub fn levels(&self) -> Option<Vec<BgcLevel>> {
        if !self.doxy.has_signal() && !self.chla.has_signal() {
            return None;
        }

        let n = self.pres.len().max(self.doxy.len()).max(self.chla.len());
        let rows = (0..n)
            .filter_map(|i| {
                let pres = self.pres.value(i)?;
                let row = BgcLevel {
                    level_index: level_index(i),
                    pres: Some(pres),
                    doxy: self.doxy.raw.value(i),
                    doxy_qc: self.doxy.raw.flag(i),
                    doxy_adjusted: self.doxy.adjusted.value(i),
                    doxy_adjusted_qc: self.doxy.adjusted.flag(i),
                    best_doxy: self.doxy.best(i),
                    chla: self.chla.raw.value(i),
                    chla_qc: self.chla.raw.flag(i),
                    chla_adjusted: self.chla.adjusted.value(i),
                    chla_adjusted_qc: self.chla.adjusted.flag(i),
                    best_chla: self.chla.best(i),
                };
                let empty = row.doxy.is_none()
                    && row.doxy_adjusted.is_none()
                    && row.chla.is_none()
                    && row.chla_adjusted.is_none();
                (!empty).then_some(row)
            })
            .collect();
        Some(rows)
    }
}

fn level_index(i: usize) -> i32 {
    i32::try_from(i).unwrap_or(i32::MAX)
}

/// QC summary JSON: flag counts per variable, e.g. `{"temp_qc": {"1": 70, "4": 2}}`
pub fn qc_summary<'a>(entries: impl IntoIterator<Item = (&'a str, &'a Series)>) -> Value {
    let mut summary = Map::new();
    for (key, series) in entries {
        let counts: Map<String, Value> = series
            .flag_counts()
            .into_iter()
            .map(|(flag, n)| (flag.to_string(), Value::from(n)))
            .collect();
        summary.insert(key.to_string(), Value::Object(counts));
    }
    Value::Object(summary)
}
