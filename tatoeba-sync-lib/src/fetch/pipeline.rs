use super::decompress::{Codec, decompress};
use super::download::download;
use super::extract::extract;
use super::Progress;
use crate::Result;
use crate::store::path_utils::{file_stem, url_stem};
use crate::store::{VersionStore, is_stale};
use chrono::NaiveDateTime;
use ohno::AppError;
use std::path::{Path, PathBuf};
use url::Url;

const LOG_TARGET: &str = "     fetch";

/// How far the fetch of one file got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum FetchState {
    Unknown,
    Checked,
    Downloaded,
    Decompressed,
    Extracted,
    Versioned,
}

/// Result of fetching one remote file.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The local copy already has the remote version; nothing was transferred.
    UpToDate,

    /// The file was transferred and unpacked into these local files.
    Fetched(Vec<PathBuf>),

    /// The fetch stopped after reaching `state`.
    Failed { state: FetchState, error: AppError },
}

/// Brings local files up to date with one remote file at a time.
#[derive(Debug, Clone)]
pub struct FetchPipeline {
    client: reqwest::Client,
}

impl FetchPipeline {
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetch `url` into `out_dir` unless the version recorded for it is already `version`.
    ///
    /// Compressed downloads are decompressed and tar archives are extracted. On success the stem of
    /// the URL and of every produced file are recorded at `version`.
    pub async fn fetch(
        &self,
        url: &Url,
        version: NaiveDateTime,
        out_dir: &Path,
        store: &mut VersionStore,
        progress: &dyn Progress,
    ) -> FetchOutcome {
        let stem = url_stem(url);
        if !is_stale(store.get(stem), version) {
            log::debug!(target: LOG_TARGET, "'{stem}' is up to date");
            return FetchOutcome::UpToDate;
        }

        let mut state = FetchState::Checked;
        match self.transfer(url, version, out_dir, store, progress, &mut state).await {
            Ok(produced) => FetchOutcome::Fetched(produced),
            Err(error) => {
                log::warn!(target: LOG_TARGET, "Could not fetch {url} (stopped after '{state}'): {error:#}");
                FetchOutcome::Failed { state, error }
            }
        }
    }

    async fn transfer(
        &self,
        url: &Url,
        version: NaiveDateTime,
        out_dir: &Path,
        store: &mut VersionStore,
        progress: &dyn Progress,
        state: &mut FetchState,
    ) -> Result<Vec<PathBuf>> {
        progress.set_phase("Downloading");
        let downloaded = download(&self.client, url, out_dir, progress).await?;
        *state = FetchState::Downloaded;

        let unpacked = if Codec::from_path(&downloaded).is_some() {
            let output = decompress(&downloaded)?;
            *state = FetchState::Decompressed;
            output
        } else {
            downloaded
        };

        let produced = if unpacked.extension().is_some_and(|ext| ext == "tar") {
            let members = extract(&unpacked, out_dir)?;
            *state = FetchState::Extracted;
            members
        } else {
            vec![unpacked]
        };

        store.set(url_stem(url), version)?;
        for path in &produced {
            store.set(file_stem(path), version)?;
        }
        *state = FetchState::Versioned;

        log::info!(target: LOG_TARGET, "Fetched {url} into {} file(s)", produced.len());
        Ok(produced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::NoProgress;
    use bzip2::Compression;
    use bzip2::write::BzEncoder;
    use chrono::NaiveDate;
    use std::fs;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn bz2(data: &[u8]) -> Vec<u8> {
        let mut encoder = BzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap().and_hms_opt(6, 0, 0).unwrap()
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    async fn test_fetch_then_up_to_date() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/exports/per_language/eng/eng_tags.tsv.bz2"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(bz2(b"1\tidiom\n")))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("tags");
        let mut store = VersionStore::open(dir.path());
        let pipeline = FetchPipeline::new(reqwest::Client::new());
        let url = Url::parse(&format!("{}/exports/per_language/eng/eng_tags.tsv.bz2", server.uri())).unwrap();

        let outcome = pipeline.fetch(&url, day(7), &out_dir, &mut store, &NoProgress).await;
        let FetchOutcome::Fetched(produced) = outcome else {
            panic!("expected a fetch, got {outcome:?}");
        };
        assert_eq!(produced, [out_dir.join("eng_tags.tsv")]);
        assert_eq!(fs::read_to_string(&produced[0]).unwrap(), "1\tidiom\n");
        assert!(!out_dir.join("eng_tags.tsv.bz2").exists());
        assert_eq!(store.get("eng_tags"), Some(day(7)));

        let later_same_day = day(7).date().and_hms_opt(23, 0, 0).unwrap();
        let again = pipeline.fetch(&url, later_same_day, &out_dir, &mut store, &NoProgress).await;
        assert!(matches!(again, FetchOutcome::UpToDate));
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    async fn test_failed_download_reports_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut store = VersionStore::open(dir.path());
        let url = Url::parse(&format!("{}/stats/queries.csv.bz2", server.uri())).unwrap();

        let outcome = FetchPipeline::new(reqwest::Client::new())
            .fetch(&url, day(7), dir.path(), &mut store, &NoProgress)
            .await;

        assert!(matches!(outcome, FetchOutcome::Failed { state: FetchState::Checked, .. }));
        assert_eq!(store.get("queries"), None);
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    async fn test_corrupt_download_stops_after_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"garbage".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut store = VersionStore::open(dir.path());
        let url = Url::parse(&format!("{}/exports/links.tar.bz2", server.uri())).unwrap();

        let outcome = FetchPipeline::new(reqwest::Client::new())
            .fetch(&url, day(7), dir.path(), &mut store, &NoProgress)
            .await;

        assert!(matches!(outcome, FetchOutcome::Failed { state: FetchState::Downloaded, .. }));
        assert!(store.is_empty());
    }
}
