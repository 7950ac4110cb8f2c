//! Persistent record of the remote version each local file was derived from.

use crate::Result;
use chrono::NaiveDateTime;
use ohno::IntoAppError;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "  versions";

/// Name of the version file inside a data directory.
pub const VERSIONS_FILE: &str = "versions.json";

/// Format of the timestamps stored in the version file.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Maps file stems to the remote version they were produced from.
///
/// Every `set` is written through to disk. The file is replaced with a rename, so an
/// interrupted write never damages entries that were already stored.
#[derive(Debug)]
pub struct VersionStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl VersionStore {
    /// Open the store kept in `data_dir`.
    ///
    /// A missing or unreadable version file gives an empty store.
    #[must_use]
    pub fn open(data_dir: impl AsRef<Path>) -> Self {
        let path = data_dir.as_ref().join(VERSIONS_FILE);
        let entries = load(&path);
        Self { path, entries }
    }

    /// Point the store at another data directory and reload from there.
    pub fn set_dir(&mut self, data_dir: impl AsRef<Path>) {
        *self = Self::open(data_dir);
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The recorded version for `stem`, if any.
    #[must_use]
    pub fn get(&self, stem: &str) -> Option<NaiveDateTime> {
        let raw = self.entries.get(stem)?;
        match NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT) {
            Ok(version) => Some(version),
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Ignoring malformed version '{raw}' for '{stem}': {e}");
                None
            }
        }
    }

    /// Record `version` for `stem` and persist the store.
    ///
    /// Sub-second precision is dropped. Earlier versions are accepted as given.
    pub fn set(&mut self, stem: impl Into<String>, version: NaiveDateTime) -> Result<()> {
        let stem = stem.into();
        let formatted = version.format(TIMESTAMP_FORMAT).to_string();
        log::debug!(target: LOG_TARGET, "Recording version {formatted} for '{stem}'");
        let _ = self.entries.insert(stem, formatted);
        self.save()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).into_app_err_with(|| format!("unable to create directory '{}'", parent.display()))?;
        }

        let temp = self.path.with_extension("json.tmp");
        let file = File::create(&temp).into_app_err_with(|| format!("unable to create version file '{}'", temp.display()))?;
        let mut writer = BufWriter::new(file);

        #[cfg(debug_assertions)]
        let result = serde_json::to_writer_pretty(&mut writer, &self.entries);
        #[cfg(not(debug_assertions))]
        let result = serde_json::to_writer(&mut writer, &self.entries);

        result.into_app_err_with(|| format!("unable to write version file '{}'", temp.display()))?;
        writer
            .flush()
            .into_app_err_with(|| format!("unable to flush version file '{}'", temp.display()))?;
        drop(writer);

        fs::rename(&temp, &self.path).into_app_err_with(|| format!("unable to replace version file '{}'", self.path.display()))
    }
}

/// Whether a file recorded at `local` must be fetched again to reach `remote`.
///
/// Only the dates are compared: the remote listing has minute granularity and the exports are
/// produced at most daily.
#[must_use]
pub fn is_stale(local: Option<NaiveDateTime>, remote: NaiveDateTime) -> bool {
    local.is_none_or(|local| local.date() < remote.date())
}

fn load(path: &Path) -> BTreeMap<String, String> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            log::debug!(target: LOG_TARGET, "No version file at '{}': {e:#}", path.display());
            return BTreeMap::new();
        }
    };

    match serde_json::from_reader(BufReader::new(file)) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!(target: LOG_TARGET, "Unreadable version file '{}', starting empty: {e:#}", path.display());
            BTreeMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap().and_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_missing_file_gives_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::open(dir.path());
        assert!(store.is_empty());
        assert_eq!(store.get("links"), None);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_corrupt_file_gives_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(VERSIONS_FILE), "{ not json").unwrap();
        let store = VersionStore::open(dir.path());
        assert!(store.is_empty());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_set_is_written_through() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = VersionStore::open(dir.path());
        store.set("eng_tags", at(1, 6, 30)).unwrap();

        let text = fs::read_to_string(dir.path().join(VERSIONS_FILE)).unwrap();
        assert!(text.contains("\"eng_tags\""));
        assert!(text.contains("2026-03-01 06:30:00"));

        let reopened = VersionStore::open(dir.path());
        assert_eq!(reopened.get("eng_tags"), Some(at(1, 6, 30)));
        assert!(!dir.path().join("versions.json.tmp").exists());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_latest_set_wins_without_monotonicity() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = VersionStore::open(dir.path());

        store.set("links", at(1, 0, 0)).unwrap();
        store.set("links", at(2, 0, 0)).unwrap();
        assert_eq!(store.get("links"), Some(at(2, 0, 0)));

        store.set("links", at(1, 12, 0)).unwrap();
        assert_eq!(store.get("links"), Some(at(1, 12, 0)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_sub_second_precision_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = VersionStore::open(dir.path());
        let precise = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap().and_hms_milli_opt(5, 6, 7, 890).unwrap();
        store.set("queries", precise).unwrap();
        assert_eq!(store.get("queries"), NaiveDate::from_ymd_opt(2026, 3, 4).unwrap().and_hms_opt(5, 6, 7));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_malformed_entry_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(VERSIONS_FILE), r#"{"links": "yesterday", "tags": "2026-03-01 00:00:00"}"#).unwrap();
        let store = VersionStore::open(dir.path());
        assert_eq!(store.get("links"), None);
        assert_eq!(store.get("tags"), Some(at(1, 0, 0)));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_set_dir_reloads() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();

        let mut store = VersionStore::open(first.path());
        store.set("links", at(1, 0, 0)).unwrap();

        store.set_dir(second.path());
        assert_eq!(store.get("links"), None);
        assert_eq!(store.path(), second.path().join(VERSIONS_FILE));

        store.set_dir(first.path());
        assert_eq!(store.get("links"), Some(at(1, 0, 0)));
    }

    #[test]
    fn test_is_stale_compares_dates_only() {
        assert!(is_stale(None, at(1, 0, 0)));
        assert!(is_stale(Some(at(1, 23, 59)), at(2, 0, 1)));
        assert!(!is_stale(Some(at(2, 0, 1)), at(2, 23, 0)));
        assert!(!is_stale(Some(at(3, 0, 0)), at(2, 0, 0)));
    }
}
