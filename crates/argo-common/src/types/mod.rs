//! Domain vocabulary shared by the ingest pipeline and schema readers

use crate::error::ArgoError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Single-letter ocean basin code used by the GDAC index files (e.g. `A`, `I`, `P`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OceanCode(char);

impl OceanCode {
    /// Create an ocean code from a letter, normalizing to upper case
    pub fn new(letter: char) -> Result<Self, ArgoError> {
        if letter.is_ascii_alphabetic() {
            Ok(Self(letter.to_ascii_uppercase()))
        } else {
            Err(ArgoError::InvalidOcean(letter.to_string()))
        }
    }

    pub fn as_char(self) -> char {
        self.0
    }

    /// Compare against a raw index cell, ignoring case and surrounding whitespace
    pub fn matches(self, cell: &str) -> bool {
        let cell = cell.trim();
        let mut chars = cell.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => c.to_ascii_uppercase() == self.0,
            _ => false,
        }
    }
}

impl FromStr for OceanCode {
    type Err = ArgoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::new(c),
            _ => Err(ArgoError::InvalidOcean(s.to_string())),
        }
    }
}

impl fmt::Display for OceanCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Variant of a profile file, derived from its filename
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    /// Core CTD profile file (`R`/`D` prefixed)
    CoreProfile,
    /// Synthetic biogeochemical profile file (`S` prefixed or `Sprof`)
    BgcSprof,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::CoreProfile => "core_profile",
            FileType::BgcSprof => "bgc_sprof",
        }
    }

    /// Profile modality stored for profiles read from this file type
    pub fn modality(&self) -> Modality {
        match self {
            FileType::CoreProfile => Modality::Core,
            FileType::BgcSprof => Modality::Bgc,
        }
    }
}

impl FromStr for FileType {
    type Err = ArgoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "core_profile" => Ok(FileType::CoreProfile),
            "bgc_sprof" => Ok(FileType::BgcSprof),
            _ => Err(ArgoError::InvalidFileType(s.to_string())),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile modality, part of the natural key of a stored profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Core,
    Bgc,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Core => "core",
            Modality::Bgc => "bgc",
        }
    }
}

impl FromStr for Modality {
    type Err = ArgoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "core" => Ok(Modality::Core),
            "bgc" => Ok(Modality::Bgc),
            _ => Err(ArgoError::InvalidModality(s.to_string())),
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-character measurement quality flag
///
/// `1` (good) and `2` (probably good) are the only flags accepted when
/// choosing a best value. Blank flags are not represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QcFlag(char);

impl QcFlag {
    /// Decode a flag from a raw character cell; blank and NUL yield `None`
    pub fn from_char(c: char) -> Option<Self> {
        if c == '\0' || c.is_whitespace() {
            None
        } else {
            Some(Self(c))
        }
    }

    /// Decode a flag from a raw byte cell
    pub fn from_byte(b: u8) -> Option<Self> {
        Self::from_char(b as char)
    }

    /// Decode a flag from a text cell, keeping its first non-blank character
    pub fn from_text(s: &str) -> Option<Self> {
        s.trim_matches(|c: char| c == '\0' || c.is_whitespace())
            .chars()
            .next()
            .and_then(Self::from_char)
    }

    pub fn as_char(self) -> char {
        self.0
    }

    pub fn is_good(self) -> bool {
        matches!(self.0, '1' | '2')
    }
}

impl fmt::Display for QcFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether an optional flag counts as good quality
pub fn is_good(flag: Option<QcFlag>) -> bool {
    flag.map(QcFlag::is_good).unwrap_or(false)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ocean_code_parse() {
        assert_eq!("i".parse::<OceanCode>().unwrap().as_char(), 'I');
        assert_eq!(" P ".parse::<OceanCode>().unwrap().as_char(), 'P');
        assert!("".parse::<OceanCode>().is_err());
        assert!("AI".parse::<OceanCode>().is_err());
        assert!("3".parse::<OceanCode>().is_err());
    }

    #[test]
    fn test_ocean_code_matches_cell() {
        let ocean: OceanCode = "A".parse().unwrap();
        assert!(ocean.matches("A"));
        assert!(ocean.matches(" a "));
        assert!(!ocean.matches("I"));
        assert!(!ocean.matches(""));
        assert!(!ocean.matches("AA"));
    }

    #[test]
    fn test_file_type_modality() {
        assert_eq!(FileType::CoreProfile.modality(), Modality::Core);
        assert_eq!(FileType::BgcSprof.modality(), Modality::Bgc);
        assert_eq!(FileType::BgcSprof.as_str(), "bgc_sprof");
        assert_eq!("core_profile".parse::<FileType>().unwrap(), FileType::CoreProfile);
        assert_eq!("BGC".parse::<Modality>().unwrap(), Modality::Bgc);
        assert!("profile".parse::<FileType>().is_err());
    }

    #[test]
    fn test_qc_flag_decoding() {
        assert!(QcFlag::from_text("1").unwrap().is_good());
        assert!(QcFlag::from_byte(b'2').unwrap().is_good());
        assert!(!QcFlag::from_char('4').unwrap().is_good());
        assert_eq!(QcFlag::from_char(' '), None);
        assert_eq!(QcFlag::from_byte(0), None);
        assert_eq!(QcFlag::from_text("   "), None);
        assert!(!is_good(None));
    }

    proptest! {
        #[test]
        fn prop_ocean_code_roundtrips_letters(c in proptest::char::range('a', 'z')) {
            let ocean: OceanCode = c.to_string().parse().unwrap();
            prop_assert_eq!(ocean.as_char(), c.to_ascii_uppercase());
            prop_assert!(ocean.matches(&c.to_ascii_uppercase().to_string()));
        }
    }
}
