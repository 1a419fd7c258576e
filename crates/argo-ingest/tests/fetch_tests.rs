//! Acquisition integration tests
//!
//! Mirrors are served by `wiremock`, downloads land in temporary directories.
//! Backoff is configured to zero so retries do not slow the suite down.
//!
//! ```bash
//! cargo test -p argo-ingest --test fetch_tests
//! ```

use argo_common::types::OceanCode;
use argo_ingest::config::FetchConfig;
use argo_ingest::fetch::{DownloadOutcome, Downloader, IndexCache, MirrorFetcher};
use argo_ingest::index::CORE_INDEX;
use argo_ingest::pipeline::AcquisitionPipeline;
use argo_ingest::select::SelectionWindow;
use argo_ingest::IngestError;
use chrono::NaiveDate;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CORE_INDEX_TEXT: &str = "\
# Title : Profile directory file of the Argo Global Data Assembly Center
# Description : The directory file describes all individual profile files of the argo GDAC ftp site.
# Project : ARGO
# Format version : 2.0
# Date of update : 20230301080004
# FTP root number 1 : ftp://ftp.ifremer.fr/ifremer/argo/dac
# GDAC node : CORIOLIS
file,date,latitude,longitude,ocean,profiler_type,institution,date_update
incois/2902266/profiles/D2902266_010.nc,20230105120000,-12.5,80.2,I,846,IN,20230110000000
incois/2902266/profiles/D2902266_011.nc,20230115120000,-12.9,80.9,I,846,IN,20230120000000
aoml/1901839/profiles/R1901839_001.nc,20230106000000,10.1,-30.2,A,851,AO,20230107000000
incois/2902266/profiles/D2902266_012.nc,20230201000000,-13.1,81.0,I,846,IN,20230202000000
";

fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

fn fast_config(mirrors: Vec<String>, dest: &Path) -> FetchConfig {
    FetchConfig::new()
        .with_mirrors(mirrors)
        .with_backoff(0.0, 1.0, 0.0)
        .with_timeout(5)
        .with_dest_root(dest)
        .with_index_dir(dest.join("indexes"))
}

fn january(ocean: char) -> SelectionWindow {
    SelectionWindow::from_dates(
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2023, 2, 1).unwrap(),
        OceanCode::new(ocean).unwrap(),
    )
}

// ============================================================================
// Mirror fallback
// ============================================================================

#[tokio::test]
async fn test_falls_back_to_second_mirror() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    let rel = "dac/incois/2902266/profiles/D2902266_010.nc";

    Mock::given(method("GET"))
        .and(path(format!("/{rel}")))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&first)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{rel}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"CDF\x01payload".to_vec()))
        .expect(1)
        .mount(&second)
        .await;

    let dest = tempfile::tempdir().unwrap();
    let config = fast_config(vec![first.uri(), second.uri()], dest.path()).with_max_tries(2, 3);
    let fetcher = MirrorFetcher::new(&config).unwrap();

    let fetched = fetcher.fetch(rel, 2).await.unwrap();
    assert_eq!(fetched.bytes, b"CDF\x01payload");
    assert_eq!(fetched.mirror, second.uri());
}

#[tokio::test]
async fn test_all_mirrors_exhausted_returns_last_error() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&first)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(3)
        .mount(&second)
        .await;

    let dest = tempfile::tempdir().unwrap();
    let config = fast_config(vec![first.uri(), second.uri()], dest.path());
    let fetcher = MirrorFetcher::new(&config).unwrap();

    let err = fetcher.fetch("missing.txt.gz", 3).await.unwrap_err();
    match err {
        IngestError::Status { status, url } => {
            assert_eq!(status, 404);
            assert!(url.starts_with(&second.uri()));
        },
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// Worker pool downloads
// ============================================================================

#[tokio::test]
async fn test_download_all_skips_existing_and_tallies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dac/aoml/1901839/profiles/R1901839_002.nc"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 2048]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dac/aoml/1901839/profiles/R1901839_003.nc"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dest = tempfile::tempdir().unwrap();
    let config = fast_config(vec![server.uri()], dest.path()).with_workers(2);
    let dac = config.dac_root();
    let existing = dac.join("aoml/1901839/profiles/R1901839_001.nc");
    std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
    std::fs::write(&existing, b"already here").unwrap();

    let fetcher = MirrorFetcher::new(&config).unwrap();
    let downloader = Downloader::new(&fetcher, &dac);
    let paths: Vec<String> = (1..=3)
        .map(|c| format!("aoml/1901839/profiles/R1901839_00{c}.nc"))
        .collect();

    let mut seen: Vec<DownloadOutcome> = Vec::new();
    let mut last_total = 0;
    let report = downloader
        .download_all(&paths, |outcome, tally| {
            last_total = tally.ok + tally.fail;
            seen.push(outcome.clone());
        })
        .await;

    assert_eq!(report.selected, 3);
    assert_eq!(report.ok, 2);
    assert_eq!(report.fail, 1);
    assert_eq!(last_total, 3);
    assert_eq!(seen.len(), 3);

    let by_path = |suffix: &str| seen.iter().find(|o| o.rel_path.ends_with(suffix)).unwrap();
    assert_eq!(by_path("_001.nc").message, "exists");
    assert_eq!(by_path("_001.nc").mirror, None);
    assert_eq!(by_path("_002.nc").message, "ok (2 KB)");
    assert_eq!(by_path("_002.nc").mirror.as_deref(), Some(server.uri().as_str()));
    assert!(!by_path("_003.nc").success);

    assert_eq!(std::fs::read(&existing).unwrap(), b"already here");
    assert_eq!(
        std::fs::read(dac.join("aoml/1901839/profiles/R1901839_002.nc")).unwrap().len(),
        2048
    );
    assert!(!dac.join("aoml/1901839/profiles/R1901839_003.nc").exists());
}

#[tokio::test]
async fn test_download_rejects_escaping_path() {
    let server = MockServer::start().await;
    let dest = tempfile::tempdir().unwrap();
    let config = fast_config(vec![server.uri()], dest.path());
    let fetcher = MirrorFetcher::new(&config).unwrap();

    let outcome = Downloader::new(&fetcher, config.dac_root())
        .download_one("../../etc/passwd")
        .await;
    assert!(!outcome.success);
    assert!(outcome.message.contains("Invalid profile path"));
}

// ============================================================================
// Index cache
// ============================================================================

#[tokio::test]
async fn test_index_cache_fetches_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{CORE_INDEX}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(gzip(CORE_INDEX_TEXT)))
        .expect(1)
        .mount(&server)
        .await;

    let dest = tempfile::tempdir().unwrap();
    let config = fast_config(vec![server.uri()], dest.path());
    let fetcher = MirrorFetcher::new(&config).unwrap();
    let cache = IndexCache::new(&fetcher, &config.index_dir);

    let first = cache.load(CORE_INDEX).await.unwrap();
    let second = cache.load(CORE_INDEX).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 4);
    assert_eq!(first.header[0], "file");
    assert!(config.index_dir.join(CORE_INDEX).exists());
}

// ============================================================================
// Acquisition pipeline
// ============================================================================

#[tokio::test]
async fn test_acquisition_pipeline_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{CORE_INDEX}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(gzip(CORE_INDEX_TEXT)))
        .expect(1)
        .mount(&server)
        .await;
    for cycle in ["010", "011"] {
        Mock::given(method("GET"))
            .and(path(format!("/dac/incois/2902266/profiles/D2902266_{cycle}.nc")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"CDF".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
    }

    let dest = tempfile::tempdir().unwrap();
    let config = fast_config(vec![server.uri()], dest.path());
    let dac = config.dac_root();

    let mut lines = Vec::new();
    let report = AcquisitionPipeline::new(config)
        .run(&january('I'), false, |outcome, _| lines.push(outcome.rel_path.clone()))
        .await
        .unwrap();

    // the Atlantic row and the February row are not selected
    assert_eq!(report.selected, 2);
    assert_eq!(report.ok, 2);
    assert_eq!(report.fail, 0);
    lines.sort();
    assert_eq!(
        lines,
        vec![
            "incois/2902266/profiles/D2902266_010.nc",
            "incois/2902266/profiles/D2902266_011.nc",
        ]
    );
    assert!(dac.join("incois/2902266/profiles/D2902266_010.nc").exists());
}

#[tokio::test]
async fn test_acquisition_requires_ocean_column() {
    let server = MockServer::start().await;
    let index = "file,date,latitude\naoml/1901839/profiles/R1901839_001.nc,20230106000000,10.1\n";
    Mock::given(method("GET"))
        .and(path(format!("/{CORE_INDEX}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(gzip(index)))
        .mount(&server)
        .await;

    let dest = tempfile::tempdir().unwrap();
    let config = fast_config(vec![server.uri()], dest.path());

    let err = AcquisitionPipeline::new(config)
        .run(&january('A'), false, |_, _| {})
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::MissingOceanColumn { .. }));
    assert_eq!(err.exit_code(), 3);
}
