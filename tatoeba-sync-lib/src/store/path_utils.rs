//! Naming rules for the files kept in the data directory.

use crate::Result;
use ohno::IntoAppError;
use std::fs;
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "     paths";

/// Suffix marking a temporary partition file that is not yet complete.
pub const PART_SUFFIX: &str = ".part";

/// Suffix of a file still being written by decompression or extraction.
pub const TMP_SUFFIX: &str = ".tmp";

/// Tag inserted before the extension of the previous version of a file.
pub const OLD_TAG: &str = "old";

/// Sanitize a string for use as a path component
///
/// Key values taken from rows end up in file names, so path traversal sequences and
/// characters that are not valid in file names are replaced.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(sanitize_path_component("eng"), "eng");
/// assert_eq!(sanitize_path_component("../../etc/passwd"), "______etc_passwd");
/// ```
#[must_use]
pub fn sanitize_path_component(s: &str) -> String {
    let s = s.replace("..", "__");
    s.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_")
}

/// The version key of a file: its name up to the first `.`.
///
/// `links.tar.bz2`, `links.tar` and `links.csv` all share the stem `links`.
#[must_use]
pub fn file_stem(path: &Path) -> &str {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    name.split('.').next().unwrap_or(name)
}

/// The last path segment of a URL, as used for the local download name.
#[must_use]
pub fn url_file_name(url: &url::Url) -> &str {
    url.path_segments().and_then(|mut segments| segments.next_back()).unwrap_or_default()
}

/// The version key of the file a URL points to.
#[must_use]
pub fn url_stem(url: &url::Url) -> &str {
    file_stem(Path::new(url_file_name(url)))
}

/// Insert `_<tag>` between the file's name and its last extension.
///
/// `eng_tags.tsv` tagged with `added` becomes `eng_tags_added.tsv`.
#[must_use]
pub fn tagged_path(path: &Path, tag: &str) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_{tag}.{ext}"),
        None => format!("{stem}_{tag}"),
    };
    path.with_file_name(name)
}

/// The path holding the previous version of `path`.
#[must_use]
pub fn old_path(path: &Path) -> PathBuf {
    tagged_path(path, OLD_TAG)
}

/// The temporary path a partition file is written to before it is finalized.
#[must_use]
pub fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
    name.push(PART_SUFFIX);
    path.with_file_name(name)
}

/// The path a file is written to before it replaces `path`.
#[must_use]
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
    name.push(TMP_SUFFIX);
    path.with_file_name(name)
}

/// Move an existing file out of the way so it survives as the previous version.
///
/// Returns whether a file was moved. Any earlier previous version is replaced.
pub fn retire_existing(path: &Path) -> Result<bool> {
    if !path.is_file() {
        return Ok(false);
    }

    let old = old_path(path);
    if old.is_file() {
        fs::remove_file(&old).into_app_err_with(|| format!("unable to remove '{}'", old.display()))?;
    }
    fs::rename(path, &old).into_app_err_with(|| format!("unable to move '{}' to '{}'", path.display(), old.display()))?;
    log::debug!(target: LOG_TARGET, "Kept previous version of '{}' as '{}'", path.display(), old.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_language_codes() {
        assert_eq!(sanitize_path_component("eng"), "eng");
        assert_eq!(sanitize_path_component("cmn-Hant"), "cmn-Hant");
        assert_eq!(sanitize_path_component("\\N"), "_N");
    }

    #[test]
    fn test_sanitize_path_traversal() {
        assert_eq!(sanitize_path_component(".."), "__");
        assert_eq!(sanitize_path_component("../../etc/passwd"), "______etc_passwd");
        assert_eq!(sanitize_path_component("a:b|c"), "a_b_c");
    }

    #[test]
    fn test_file_stem_stops_at_first_dot() {
        assert_eq!(file_stem(Path::new("/data/links/links.tar.bz2")), "links");
        assert_eq!(file_stem(Path::new("eng_sentences_detailed.tsv")), "eng_sentences_detailed");
        assert_eq!(file_stem(Path::new("queries")), "queries");
    }

    #[test]
    fn test_url_file_name() {
        let url = url::Url::parse("https://downloads.tatoeba.org/exports/per_language/eng/eng_tags.tsv.bz2").unwrap();
        assert_eq!(url_file_name(&url), "eng_tags.tsv.bz2");
        assert_eq!(url_stem(&url), "eng_tags");
    }

    #[test]
    fn test_tagged_path_inserts_before_extension() {
        assert_eq!(tagged_path(Path::new("/d/eng_tags.tsv"), "added"), PathBuf::from("/d/eng_tags_added.tsv"));
        assert_eq!(old_path(Path::new("/d/links.tar")), PathBuf::from("/d/links_old.tar"));
        assert_eq!(tagged_path(Path::new("plain"), "old"), PathBuf::from("plain_old"));
    }

    #[test]
    fn test_part_path() {
        assert_eq!(part_path(Path::new("/d/eng-fra_links.tsv")), PathBuf::from("/d/eng-fra_links.tsv.part"));
        assert_eq!(temp_path(Path::new("/d/links.csv")), PathBuf::from("/d/links.csv.tmp"));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_retire_existing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("eng_tags.tsv");

        assert!(!retire_existing(&file).unwrap());

        fs::write(&file, "1\tfirst\n").unwrap();
        assert!(retire_existing(&file).unwrap());
        assert!(!file.exists());
        assert_eq!(fs::read_to_string(dir.path().join("eng_tags_old.tsv")).unwrap(), "1\tfirst\n");

        fs::write(&file, "2\tsecond\n").unwrap();
        assert!(retire_existing(&file).unwrap());
        assert_eq!(fs::read_to_string(dir.path().join("eng_tags_old.tsv")).unwrap(), "2\tsecond\n");
    }
}
