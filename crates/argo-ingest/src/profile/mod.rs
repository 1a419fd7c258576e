//! Profile file parsing
//!
//! A profile file is reached through the [`Dataset`] trait so that parsing
//! does not depend on how the arrays were read. [`extract_profiles`] turns one
//! file into a [`ParsedFile`]: identity from the path, global attributes, and
//! one [`ProfileRecord`] per profile with cleaned level rows.

pub mod dataset;
#[cfg(feature = "netcdf")]
pub mod netcdf;
pub mod path;
pub mod time;

pub use dataset::{Dataset, MemoryDataset, NumericVar, TextField};
pub use path::{ProfilePath, ProfilePathParser};
pub use time::decode_time;

use crate::clean::Cleaner;
use crate::config::PhysicalRanges;
use crate::error::Result;
use crate::levels::{qc_summary, BgcLevel, BgcSeries, CoreLevel, CoreSeries, Measurement, Series};
use argo_common::types::{Modality, QcFlag};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

/// Dimension holding the number of profiles in a file
pub const PROFILE_DIMENSION: &str = "N_PROF";

/// One profile ready for storage
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRecord {
    pub profile_index: i32,
    pub juld_time: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub direction: Option<String>,
    pub vertical_sampling_scheme: Option<String>,
    pub data_mode: Option<String>,
    pub qc_summary: Value,
    pub has_adjusted_core: bool,
    pub n_core_levels: i32,
    pub max_pres: Option<f64>,
    pub core_levels: Vec<CoreLevel>,
    /// `None` when the profile carries no usable oxygen or chlorophyll
    pub bgc_levels: Option<Vec<BgcLevel>>,
}

impl ProfileRecord {
    pub fn n_bgc_levels(&self) -> i32 {
        self.bgc_levels
            .as_ref()
            .map(|rows| i32::try_from(rows.len()).unwrap_or(i32::MAX))
            .unwrap_or(0)
    }
}

/// Everything read from one file
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFile {
    pub path: ProfilePath,
    pub global_attrs: Map<String, Value>,
    pub profiles: Vec<ProfileRecord>,
}

impl ParsedFile {
    pub fn modality(&self) -> Modality {
        self.path.file_type.modality()
    }
}

/// Open a profile file with the compiled-in reader
#[cfg(feature = "netcdf")]
pub fn open_dataset(path: &Path) -> Result<Box<dyn Dataset + Send>> {
    Ok(Box::new(netcdf::NetcdfDataset::open(path)?))
}

/// Open a profile file with the compiled-in reader
#[cfg(not(feature = "netcdf"))]
pub fn open_dataset(path: &Path) -> Result<Box<dyn Dataset + Send>> {
    Err(crate::error::IngestError::Dataset(format!(
        "{}: argo-ingest was built without netcdf support (enable the `netcdf` feature)",
        path.display()
    )))
}

const NUMERIC_VARS: [&str; 16] = [
    "JULD",
    "TIME",
    "LATITUDE",
    "LATITUDE_ADJUSTED",
    "LONGITUDE",
    "LONGITUDE_ADJUSTED",
    "PRES",
    "PRES_ADJUSTED",
    "TEMP",
    "TEMP_ADJUSTED",
    "PSAL",
    "PSAL_ADJUSTED",
    "DOXY",
    "DOXY_ADJUSTED",
    "CHLA",
    "CHLA_ADJUSTED",
];

const TEXT_VARS: [&str; 13] = [
    "DIRECTION",
    "VERTICAL_SAMPLING_SCHEME",
    "DATA_MODE",
    "PRES_QC",
    "PRES_ADJUSTED_QC",
    "TEMP_QC",
    "TEMP_ADJUSTED_QC",
    "PSAL_QC",
    "PSAL_ADJUSTED_QC",
    "DOXY_QC",
    "DOXY_ADJUSTED_QC",
    "CHLA_QC",
    "CHLA_ADJUSTED_QC",
];

/// All variables of one file, read once
struct FileArrays {
    numeric: HashMap<&'static str, NumericVar>,
    text: HashMap<&'static str, TextField>,
}

impl FileArrays {
    fn read(ds: &dyn Dataset) -> Result<Self> {
        let mut numeric = HashMap::new();
        for name in NUMERIC_VARS {
            if let Some(var) = ds.numeric(name)? {
                numeric.insert(name, var);
            }
        }
        let mut text = HashMap::new();
        for name in TEXT_VARS {
            if let Some(field) = ds.text(name)? {
                text.insert(name, field);
            }
        }
        Ok(Self { numeric, text })
    }

    fn var(&self, name: &str) -> Option<&NumericVar> {
        self.numeric.get(name)
    }

    fn flags(&self, name: &str, i: usize) -> Option<Vec<Option<QcFlag>>> {
        self.text.get(name).and_then(|f| f.flags_row(i))
    }

    fn series(&self, name: &str, qc_name: &str, i: usize, ranges: &PhysicalRanges) -> Series {
        match self.var(name) {
            Some(var) => Series::new(var.row(i), &var.cleaner(ranges), self.flags(qc_name, i)),
            None => Series::new(None, &Cleaner::default(), self.flags(qc_name, i)),
        }
    }

    fn measurement(&self, name: &str, i: usize, ranges: &PhysicalRanges) -> Measurement {
        let adjusted = format!("{name}_ADJUSTED");
        Measurement::new(
            self.series(name, &format!("{name}_QC"), i, ranges),
            self.series(&adjusted, &format!("{adjusted}_QC"), i, ranges),
        )
    }

    /// Observation time from `JULD`, else `TIME`
    fn time_at(&self, i: usize) -> Option<DateTime<Utc>> {
        let var = self.var("JULD").or_else(|| self.var("TIME"))?;
        let raw = var.at(i)?;
        let cleaner = Cleaner::default().with_fill_value(var.fill_value);
        let value = cleaner.clean(raw).ok()?;
        decode_time(value, var.units.as_deref(), var.calendar.as_deref())
    }

    /// Adjusted position at `i`, else raw at `i`, else the first finite raw value
    fn position_at(&self, name: &str, i: usize, ranges: &PhysicalRanges) -> Option<f64> {
        let pick = |var: &NumericVar| var.cleaner(ranges).clean_opt(var.at(i));
        let adjusted = self.var(&format!("{name}_ADJUSTED")).and_then(pick);
        adjusted.or_else(|| {
            let raw = self.var(name)?;
            pick(raw).or_else(|| {
                let cleaner = raw.cleaner(ranges);
                raw.data.iter().find_map(|v| cleaner.clean(*v).ok())
            })
        })
    }

    fn text_at(&self, name: &str, i: usize) -> Option<String> {
        self.text.get(name).and_then(|f| f.value_at(i))
    }
}

fn global_text(globals: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match globals.get(*name)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        },
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Parse every profile of one file
pub fn extract_profiles(
    ds: &dyn Dataset,
    path: ProfilePath,
    ranges: &PhysicalRanges,
) -> Result<ParsedFile> {
    let arrays = FileArrays::read(ds)?;
    let global_attrs = ds.global_attributes()?;
    let n_prof = ds.dimension_len(PROFILE_DIMENSION).unwrap_or(1);

    let has_doxy = arrays.var("DOXY").is_some() || arrays.var("DOXY_ADJUSTED").is_some();
    let has_chla = arrays.var("CHLA").is_some() || arrays.var("CHLA_ADJUSTED").is_some();
    let bgc_pres_name = if arrays.var("PRES_ADJUSTED").is_some() {
        "PRES_ADJUSTED"
    } else {
        "PRES"
    };

    let mut profiles = Vec::with_capacity(n_prof);
    for i in 0..n_prof {
        let core = CoreSeries {
            pres: arrays.measurement("PRES", i, ranges),
            temp: arrays.measurement("TEMP", i, ranges),
            psal: arrays.measurement("PSAL", i, ranges),
        };

        let bgc = BgcSeries {
            pres: arrays.series(bgc_pres_name, &format!("{bgc_pres_name}_QC"), i, ranges),
            doxy: arrays.measurement("DOXY", i, ranges),
            chla: arrays.measurement("CHLA", i, ranges),
        };

        let pres_flags = if arrays.text.contains_key("PRES_QC") {
            core.pres.raw.clone()
        } else {
            core.pres.adjusted.clone()
        };
        let mut summary_entries = vec![
            ("pres_qc", &pres_flags),
            ("temp_qc", &core.temp.raw),
            ("psal_qc", &core.psal.raw),
        ];
        if has_doxy {
            summary_entries.push(("doxy_qc", &bgc.doxy.raw));
        }
        if has_chla {
            summary_entries.push(("chla_qc", &bgc.chla.raw));
        }

        let (n_core_levels, max_pres) = core.pressure_summary();

        let data_mode = if arrays.text.contains_key("DATA_MODE") {
            arrays.text_at("DATA_MODE", i)
        } else {
            global_text(&global_attrs, &["DATA_MODE", "DATAMODE"])
        };

        profiles.push(ProfileRecord {
            profile_index: i32::try_from(i).unwrap_or(i32::MAX),
            juld_time: arrays.time_at(i),
            latitude: arrays.position_at("LATITUDE", i, ranges),
            longitude: arrays.position_at("LONGITUDE", i, ranges),
            direction: arrays.text_at("DIRECTION", i),
            vertical_sampling_scheme: arrays.text_at("VERTICAL_SAMPLING_SCHEME", i),
            data_mode,
            qc_summary: qc_summary(summary_entries),
            has_adjusted_core: core.has_adjusted(),
            n_core_levels: i32::try_from(n_core_levels).unwrap_or(i32::MAX),
            max_pres,
            core_levels: core.levels(),
            bgc_levels: bgc.levels(),
        });
    }

    Ok(ParsedFile {
        path,
        global_attrs,
        profiles,
    })
}
