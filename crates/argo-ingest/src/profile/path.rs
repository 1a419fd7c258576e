// Profile identity from the relative path under dac/

use crate::error::{IngestError, Result};
use argo_common::types::FileType;
use regex::Regex;

/// Identity of a profile file, derived only from its path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilePath {
    /// Data assembly center (first path segment)
    pub dac: String,
    pub wmo: i64,
    pub cycle_number: i32,
    pub file_type: FileType,
    /// Trailing path segment
    pub source_file: String,
    /// Normalized relative path, `/`-separated
    pub rel_path: String,
}

/// Parser for `<dac>/<wmo>/profiles/<prefix><wmo>_<cycle>[letter].nc`
pub struct ProfilePathParser {
    filename: Regex,
}

impl ProfilePathParser {
    pub fn new() -> Result<Self> {
        // Whole-name match: `.nc.bak` and other suffixed copies are not
        // profiles. Extension case follows the directory walk, which
        // accepts `.NC`.
        Ok(Self {
            filename: Regex::new(r"^(?P<prefix>[A-Za-z]*)(?P<wmo>\d{6,10})_(?P<cycle>\d+)[A-Za-z]?\.(?i:nc)$")?,
        })
    }

    pub fn parse(&self, rel_path: &str) -> Result<ProfilePath> {
        let invalid = |reason: &str| IngestError::InvalidPath {
            path: rel_path.to_string(),
            reason: reason.to_string(),
        };

        let normalized = rel_path.replace('\\', "/");
        let normalized = normalized.trim_matches('/');
        let parts: Vec<&str> = normalized.split('/').collect();
        if parts.len() < 3 {
            return Err(invalid("expected at least <dac>/<wmo>/<file>"));
        }

        let dac = parts[0];
        let source_file = parts[parts.len() - 1];

        let caps = self
            .filename
            .captures(source_file)
            .ok_or_else(|| invalid("file name does not match <prefix><wmo>_<cycle>.nc"))?;

        let wmo: i64 = caps["wmo"]
            .parse()
            .map_err(|_| invalid("platform number out of range"))?;
        let cycle_number: i32 = caps["cycle"]
            .parse()
            .map_err(|_| invalid("cycle number out of range"))?;

        let bgc = caps["prefix"].to_ascii_uppercase().starts_with('S')
            || normalized.to_ascii_lowercase().contains("sprof");
        let file_type = if bgc {
            FileType::BgcSprof
        } else {
            FileType::CoreProfile
        };

        Ok(ProfilePath {
            dac: dac.to_string(),
            wmo,
            cycle_number,
            file_type,
            source_file: source_file.to_string(),
            rel_path: normalized.to_string(),
        })
    }
}
