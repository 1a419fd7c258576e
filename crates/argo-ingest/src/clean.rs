//! Value cleaning and best-value selection
//!
//! Raw array entries become either a finite physical value or a
//! [`ReasonCode`] saying why they were rejected. Checks run in a fixed
//! order and the first failing check wins; values are never clamped.

use crate::config::ValueRange;
use argo_common::types::{is_good, QcFlag};
use serde::Serialize;
use std::fmt;

/// Magnitudes above this are placeholders, never measurements
pub const MAX_ABS_VALUE: f64 = 1.0e10;

/// Conventional "no data" placeholders, matched with their negatives
pub const SENTINELS: [f64; 5] = [999.0, 9_999.0, 99_999.0, 1.0e20, 9.96921e36];

const RELATIVE_TOLERANCE: f64 = 1.0e-6;

/// Why a raw value was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    NonFinite,
    FillValue,
    Sentinel,
    OutOfDeclaredRange,
    OutOfPhysicalRange,
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReasonCode::NonFinite => "non-finite",
            ReasonCode::FillValue => "fill value",
            ReasonCode::Sentinel => "sentinel",
            ReasonCode::OutOfDeclaredRange => "outside declared valid range",
            ReasonCode::OutOfPhysicalRange => "outside physical range",
        };
        f.write_str(s)
    }
}

/// Per-variable cleaning parameters: declared attributes plus the physical limit
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cleaner {
    pub fill_value: Option<f64>,
    pub valid_min: Option<f64>,
    pub valid_max: Option<f64>,
    pub physical: Option<ValueRange>,
}

impl Cleaner {
    pub fn new(physical: Option<ValueRange>) -> Self {
        Self {
            physical,
            ..Self::default()
        }
    }

    pub fn with_fill_value(mut self, fill: Option<f64>) -> Self {
        self.fill_value = fill;
        self
    }

    pub fn with_valid_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.valid_min = min;
        self.valid_max = max;
        self
    }

    pub fn clean(&self, raw: f64) -> Result<f64, ReasonCode> {
        clean_value(raw, self)
    }

    /// Cleaned value, or `None` if any check rejects it
    pub fn clean_opt(&self, raw: Option<f64>) -> Option<f64> {
        raw.and_then(|v| self.clean(v).ok())
    }
}

fn close_to(value: f64, target: f64) -> bool {
    (value - target).abs() <= RELATIVE_TOLERANCE * target.abs().max(1.0)
}

/// Whether `value` is a known placeholder rather than a measurement
pub fn is_sentinel(value: f64) -> bool {
    value.abs() > MAX_ABS_VALUE || SENTINELS.iter().any(|s| close_to(value.abs(), *s))
}

/// Clean one raw value
pub fn clean_value(raw: f64, cleaner: &Cleaner) -> Result<f64, ReasonCode> {
    if !raw.is_finite() {
        return Err(ReasonCode::NonFinite);
    }

    if let Some(fill) = cleaner.fill_value.filter(|f| f.is_finite()) {
        if close_to(raw, fill) {
            return Err(ReasonCode::FillValue);
        }
    }

    if is_sentinel(raw) {
        return Err(ReasonCode::Sentinel);
    }

    if cleaner.valid_min.is_some_and(|min| raw < min)
        || cleaner.valid_max.is_some_and(|max| raw > max)
    {
        return Err(ReasonCode::OutOfDeclaredRange);
    }

    if let Some(range) = cleaner.physical {
        if !range.contains(raw) {
            return Err(ReasonCode::OutOfPhysicalRange);
        }
    }

    Ok(raw)
}

/// Choose the adjusted value when its QC is good, else the raw value when
/// its QC is good, else nothing. Inputs are already cleaned.
pub fn best_value(
    raw: Option<f64>,
    raw_qc: Option<QcFlag>,
    adjusted: Option<f64>,
    adjusted_qc: Option<QcFlag>,
) -> Option<f64> {
    match (adjusted, raw) {
        (Some(adj), _) if is_good(adjusted_qc) => Some(adj),
        (_, Some(r)) if is_good(raw_qc) => Some(r),
        _ => None,
    }
}
