//! Index row selection by date window and ocean basin

use crate::error::{IngestError, Result};
use crate::index::ParsedIndex;
use argo_common::types::OceanCode;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use tracing::{info, warn};

const FILE_ALIASES: [&str; 5] = ["file", "filepath", "path", "ncfile", "nc_file"];
const DATE_ALIASES: [&str; 6] = [
    "date",
    "date_update",
    "date_creation",
    "datefile",
    "date_time",
    "filedate",
];
const OCEAN_ALIASES: [&str; 2] = ["ocean", "basin"];

/// Half-open UTC window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub ocean: OceanCode,
}

impl SelectionWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, ocean: OceanCode) -> Self {
        Self { start, end, ocean }
    }

    /// Window from midnight of `start` to midnight of `end`
    pub fn from_dates(start: NaiveDate, end: NaiveDate, ocean: OceanCode) -> Self {
        Self {
            start: start.and_time(chrono::NaiveTime::MIN),
            end: end.and_time(chrono::NaiveTime::MIN),
            ocean,
        }
    }

    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t < self.end
    }
}

/// Column positions resolved through the alias table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub file: Option<usize>,
    pub date: Option<usize>,
    pub ocean: Option<usize>,
}

impl ColumnMap {
    pub fn resolve(index: &ParsedIndex) -> Self {
        let first = |aliases: &[&str]| aliases.iter().find_map(|a| index.column(a));
        Self {
            file: first(&FILE_ALIASES),
            date: first(&DATE_ALIASES),
            ocean: first(&OCEAN_ALIASES),
        }
    }
}

/// Parse an index date cell such as `20200105031500` or `2020-01-05T03:15:00Z`
///
/// Separators `T`, `Z`, `-` and `:` are removed, then the leading digits are
/// read as `YYYYMMDDhhmmss`, `YYYYMMDDhhmm` or `YYYYMMDD`.
pub fn parse_index_date(cell: &str) -> Option<NaiveDateTime> {
    let cleaned: String = cell
        .trim()
        .chars()
        .filter(|c| !matches!(c, 'T' | 'Z' | '-' | ':'))
        .collect();
    let digits: String = cleaned.chars().take_while(char::is_ascii_digit).collect();

    match digits.len() {
        n if n >= 14 => NaiveDateTime::parse_from_str(&digits[..14], "%Y%m%d%H%M%S").ok(),
        12 | 13 => NaiveDateTime::parse_from_str(&digits[..12], "%Y%m%d%H%M").ok(),
        8..=11 => NaiveDate::parse_from_str(&digits[..8], "%Y%m%d")
            .ok()
            .map(|d| d.and_time(chrono::NaiveTime::MIN)),
        _ => None,
    }
}

fn cell(row: &[String], col: usize) -> &str {
    row.get(col).map(String::as_str).unwrap_or("")
}

/// Relative paths of the rows of one index that fall inside the window
fn scan(index: &ParsedIndex, columns: &ColumnMap, window: &SelectionWindow) -> Vec<String> {
    let (Some(file_col), Some(ocean_col)) = (columns.file, columns.ocean) else {
        return Vec::new();
    };

    index
        .rows
        .iter()
        .filter(|row| window.ocean.matches(cell(row, ocean_col)))
        .filter(|row| match columns.date {
            Some(date_col) => parse_index_date(cell(row, date_col)).is_some_and(|t| window.contains(t)),
            None => true,
        })
        .map(|row| cell(row, file_col).trim())
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

/// Order-preserving de-duplication; the first occurrence keeps its position
pub fn dedup_paths(paths: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

/// Select relative file paths from the core index and optionally the BGC index
///
/// BGC matches follow all core matches. The only fatal condition is a core
/// index without a resolvable ocean column.
pub fn select_paths(
    core: &ParsedIndex,
    bgc: Option<&ParsedIndex>,
    window: &SelectionWindow,
) -> Result<Vec<String>> {
    let core_columns = ColumnMap::resolve(core);
    info!(?core_columns, "Resolved core index columns");

    if core_columns.ocean.is_none() {
        return Err(IngestError::MissingOceanColumn {
            header: core.header.clone(),
        });
    }
    if core_columns.date.is_none() {
        warn!("Core index has no date column; selecting without a time filter");
    }

    let mut selected = scan(core, &core_columns, window);
    info!(kept = selected.len(), "Filtered core index rows");

    if let Some(bgc) = bgc.filter(|b| !b.is_empty()) {
        let bgc_columns = ColumnMap::resolve(bgc);
        if bgc_columns.ocean.is_none() {
            warn!("BGC index has no ocean column; skipping BGC selection");
        } else {
            if bgc_columns.date.is_none() {
                warn!("BGC index has no date column; selecting without a time filter");
            }
            let bgc_selected = scan(bgc, &bgc_columns, window);
            info!(kept = bgc_selected.len(), "Filtered BGC index rows");
            selected.extend(bgc_selected);
        }
    }

    let unique = dedup_paths(selected);
    info!(files = unique.len(), "Selected files");
    Ok(unique)
}
