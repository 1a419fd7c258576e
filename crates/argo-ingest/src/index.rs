//! GDAC index file parsing
//!
//! Index files are (usually gzipped) delimiter-separated tables preceded by a
//! `#` comment preamble. The parser tolerates an unknown delimiter, a header
//! that is not on the first line, and short rows. Malformed rows are padded,
//! never rejected.

use crate::error::{IngestError, Result};
use flate2::read::GzDecoder;
use std::collections::HashMap;
use std::io::Read;
use tracing::{debug, info};

/// Core profile index name on every mirror
pub const CORE_INDEX: &str = "ar_index_global_prof.txt.gz";

/// Synthetic (BGC) profile index name on every mirror
pub const BGC_INDEX: &str = "argo_synthetic-profile_index.txt.gz";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const DELIMITERS: [u8; 3] = [b',', b';', b'\t'];
const SNIFF_LINES: usize = 200;

/// Parsed index table
///
/// Every row has exactly `header.len()` cells; missing trailing cells are empty
/// strings and surplus cells are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedIndex {
    /// Lower-cased, trimmed column names in file order
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ParsedIndex {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Position of a column; a repeated name resolves to its last occurrence
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().rposition(|h| h == name)
    }

    /// Row `i` as a column-name to value mapping
    pub fn row_map(&self, i: usize) -> Option<HashMap<&str, &str>> {
        self.rows.get(i).map(|row| {
            self.header
                .iter()
                .zip(row.iter())
                .map(|(h, v)| (h.as_str(), v.as_str()))
                .collect()
        })
    }
}

/// Read and parse an index file from disk
pub fn load_index_file(path: &std::path::Path) -> Result<ParsedIndex> {
    let raw = std::fs::read(path)?;
    info!(path = %path.display(), kb = raw.len() / 1024, "Read index file");
    let hint = path.file_name().and_then(|n| n.to_str());
    load_index(&raw, hint)
}

/// Parse index bytes; `filename_hint` lets a `.gz` suffix force decompression
pub fn load_index(raw: &[u8], filename_hint: Option<&str>) -> Result<ParsedIndex> {
    let text = decompress_to_text(raw, filename_hint)?;

    let lines: Vec<&str> = text.lines().collect();
    let lines = strip_preamble(&lines);
    if lines.is_empty() {
        debug!("No data after preamble");
        return Ok(ParsedIndex::default());
    }

    let delimiter = sniff_delimiter(&lines[..lines.len().min(SNIFF_LINES)]);
    let header_idx = find_header(lines, delimiter);
    let body = lines[header_idx..].join("\n");

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut records = reader.records();
    let header: Vec<String> = match records.next() {
        Some(record) => record?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect(),
        None => return Ok(ParsedIndex::default()),
    };

    let width = header.len();
    let mut rows = Vec::new();
    for record in records {
        let record = record?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let mut row: Vec<String> = record.iter().take(width).map(|c| c.trim().to_string()).collect();
        row.resize(width, String::new());
        rows.push(row);
    }

    info!(
        rows = rows.len(),
        columns = width,
        delimiter = %(delimiter as char).escape_default(),
        "Parsed index"
    );

    Ok(ParsedIndex { header, rows })
}

fn decompress_to_text(raw: &[u8], filename_hint: Option<&str>) -> Result<String> {
    let gzipped = raw.starts_with(&GZIP_MAGIC)
        || filename_hint.is_some_and(|name| name.to_ascii_lowercase().ends_with(".gz"));

    if !gzipped {
        return Ok(String::from_utf8_lossy(raw).into_owned());
    }

    let mut decoded = Vec::new();
    GzDecoder::new(raw)
        .read_to_end(&mut decoded)
        .map_err(|e| IngestError::Parse(format!("gzip decompression failed: {e}")))?;
    Ok(String::from_utf8_lossy(&decoded).into_owned())
}

/// Drop the leading run of blank and `#` comment lines
fn strip_preamble<'a, 'b>(lines: &'b [&'a str]) -> &'b [&'a str] {
    let skip = lines
        .iter()
        .take_while(|l| l.trim().is_empty() || l.trim_start().starts_with('#'))
        .count();
    if skip > 0 {
        debug!(lines = skip, "Stripped comment preamble");
    }
    &lines[skip..]
}

/// Pick the candidate delimiter that splits the sample most consistently
///
/// A candidate scores by how many lines share its most common non-zero
/// per-line count. Ties keep the earlier candidate; no match means comma.
fn sniff_delimiter(sample: &[&str]) -> u8 {
    let mut best: Option<(u8, usize)> = None;

    for &delim in &DELIMITERS {
        let mut freq: HashMap<usize, usize> = HashMap::new();
        for line in sample.iter().filter(|l| !l.trim().is_empty()) {
            let count = line.bytes().filter(|b| *b == delim).count();
            if count > 0 {
                *freq.entry(count).or_default() += 1;
            }
        }
        let score = freq.values().copied().max().unwrap_or(0);
        if score > 0 && best.is_none_or(|(_, s)| score > s) {
            best = Some((delim, score));
        }
    }

    best.map(|(d, _)| d).unwrap_or(b',')
}

/// First line whose split, lower-cased fields contain `file`; else line 0
fn find_header(lines: &[&str], delimiter: u8) -> usize {
    let delim = delimiter as char;
    lines
        .iter()
        .position(|line| line.split(delim).any(|f| f.trim().eq_ignore_ascii_case("file")))
        .unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    const ARGO_INDEX: &str = "\
# Title : Profile directory file of the Argo Global Data Assembly Center
# Description : The directory file describes all individual profile files of the argo GDAC ftp site.
# FTP root number 1 : ftp://ftp.ifremer.fr/ifremer/argo/dac
#
file,date,latitude,longitude,ocean,profiler_type,institution,date_update
aoml/13857/profiles/R13857_001.nc,19970729200300,0.267,-16.032,A,845,AO,20181011180520
incois/2902266/profiles/D2902266_010.nc,20200105031500,12.1,88.2,I,846,IN,20200301120000
";

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_parse_gzipped_index() {
        let parsed = load_index(&gzip(ARGO_INDEX), Some(CORE_INDEX)).unwrap();
        assert_eq!(parsed.header[0], "file");
        assert_eq!(parsed.header.len(), 8);
        assert_eq!(parsed.len(), 2);

        let row = parsed.row_map(1).unwrap();
        assert_eq!(row["file"], "incois/2902266/profiles/D2902266_010.nc");
        assert_eq!(row["ocean"], "I");
        assert_eq!(row["date_update"], "20200301120000");
    }

    #[test]
    fn test_load_index_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CORE_INDEX);
        std::fs::write(&path, gzip(ARGO_INDEX)).unwrap();

        let parsed = load_index_file(&path).unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(load_index_file(&dir.path().join("missing.txt.gz")).is_err());
    }

    #[test]
    fn test_gzip_detected_by_magic_without_hint() {
        let parsed = load_index(&gzip(ARGO_INDEX), None).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_semicolon_and_header_drift() {
        let text = "\
# comment

generated by some tool
FILE ; Date ; Ocean
a/1/profiles/R1900001_001.nc;20200101000000;P
b/2/profiles/R1900002_002.nc;20200102000000
";
        let parsed = load_index(text.as_bytes(), Some("index.txt")).unwrap();
        assert_eq!(parsed.header, vec!["file", "date", "ocean"]);
        assert_eq!(parsed.rows.len(), 2);
        // short row padded to header width
        assert_eq!(parsed.rows[1], vec!["b/2/profiles/R1900002_002.nc", "20200102000000", ""]);
    }

    #[test]
    fn test_tab_delimited_and_blank_rows() {
        let text = "file\tocean\na.nc\tA\n\t\n\nb.nc\tI\textra\n";
        let parsed = load_index(text.as_bytes(), None).unwrap();
        assert_eq!(parsed.header, vec!["file", "ocean"]);
        assert_eq!(parsed.rows, vec![vec!["a.nc", "A"], vec!["b.nc", "I"]]);
    }

    #[test]
    fn test_header_missing_defaults_to_first_line() {
        let text = "path,basin\nx.nc,A\n";
        let parsed = load_index(text.as_bytes(), None).unwrap();
        assert_eq!(parsed.header, vec!["path", "basin"]);
        assert_eq!(parsed.column("basin"), Some(1));
        assert_eq!(parsed.column("ocean"), None);
    }

    #[test]
    fn test_only_preamble_is_empty() {
        let parsed = load_index(b"# nothing here\n\n#\n", None).unwrap();
        assert!(parsed.is_empty());
        assert!(parsed.header.is_empty());
        assert!(load_index(b"", None).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_gzip_is_error() {
        let mut bytes = gzip(ARGO_INDEX);
        bytes.truncate(12);
        assert!(load_index(&bytes, Some(CORE_INDEX)).is_err());
    }

    #[test]
    fn test_sniff_defaults_to_comma() {
        assert_eq!(sniff_delimiter(&["no delimiters here"]), b',');
        assert_eq!(sniff_delimiter(&["a;b;c", "d;e;f", "g,h"]), b';');
    }
}
