use super::writer::write_rows;
use super::{Row, TabularReader};
use crate::Result;
use crate::store::VersionStore;
use crate::store::path_utils::{file_stem, old_path, tagged_path};
use crate::tables::TableDescriptor;
use ohno::bail;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "      diff";

/// Tags of the files [`DifferenceFinder::write_changes`] produces.
pub const ADDED_TAG: &str = "added";
pub const REMOVED_TAG: &str = "removed";
pub const MODIFIED_TAG: &str = "modified";

/// Rows that differ between two versions of a file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changes {
    pub added: Vec<Row>,
    pub removed: Vec<Row>,

    /// New versions of rows whose key survived. Only computed when key columns are given.
    pub modified: Option<Vec<Row>>,
}

impl Changes {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.as_ref().is_none_or(Vec::is_empty)
    }
}

/// Compares a file with the previous version kept next to it.
#[derive(Debug, Clone)]
pub struct DifferenceFinder {
    delimiter: u8,
    columns: Option<usize>,
    text_column: Option<isize>,
}

impl DifferenceFinder {
    /// A finder for files with an unknown width.
    #[must_use]
    pub const fn new(delimiter: u8) -> Self {
        Self {
            delimiter,
            columns: None,
            text_column: None,
        }
    }

    /// A finder reading files in the dialect of `table`.
    #[must_use]
    pub const fn for_table(table: &TableDescriptor) -> Self {
        Self {
            delimiter: table.delimiter,
            columns: Some(table.columns),
            text_column: table.text_column,
        }
    }

    fn reader(&self, path: &Path) -> TabularReader {
        let reader = TabularReader::from_path(path, self.delimiter).with_text_column(self.text_column);
        match self.columns {
            Some(columns) => reader.with_columns(columns),
            None => reader,
        }
    }

    /// Diff `new_file` against its `_old` sibling.
    ///
    /// Returns `None` when either file is missing. With `key_columns`, a new row whose key also
    /// belongs to a vanished row counts as modified instead of added and the vanished row is not
    /// reported as removed.
    ///
    /// # Errors
    ///
    /// Fails when the two files do not have the same row width.
    pub fn find_changes(&self, new_file: &Path, key_columns: &[usize]) -> Result<Option<Changes>> {
        let old_file = old_path(new_file);
        if !new_file.is_file() || !old_file.is_file() {
            log::debug!(target: LOG_TARGET, "Nothing to compare '{}' with", new_file.display());
            return Ok(None);
        }

        self.check_schema(&old_file, new_file)?;

        let old_rows = distinct(self.reader(&old_file).rows());
        let new_rows = distinct(self.reader(new_file).rows());

        let old_set: HashSet<&Row> = old_rows.iter().collect();
        let new_set: HashSet<&Row> = new_rows.iter().collect();

        let new_only: Vec<Row> = new_rows.iter().filter(|row| !old_set.contains(row)).cloned().collect();
        let old_only: Vec<Row> = old_rows.iter().filter(|row| !new_set.contains(row)).cloned().collect();

        let changes = if key_columns.is_empty() {
            Changes {
                added: new_only,
                removed: old_only,
                modified: None,
            }
        } else {
            let new_keys: HashSet<Vec<&str>> = new_only.iter().map(|row| key_of(row, key_columns)).collect();
            let shared: HashSet<Vec<&str>> = old_only
                .iter()
                .map(|row| key_of(row, key_columns))
                .filter(|key| new_keys.contains(key))
                .collect();

            let (modified, added): (Vec<Row>, Vec<Row>) =
                new_only.iter().cloned().partition(|row| shared.contains(&key_of(row, key_columns)));
            let removed = old_only
                .iter()
                .filter(|row| !shared.contains(&key_of(row, key_columns)))
                .cloned()
                .collect();

            Changes {
                added,
                removed,
                modified: Some(modified),
            }
        };

        log::debug!(
            target: LOG_TARGET,
            "'{}': {} added, {} removed, {} modified",
            new_file.display(),
            changes.added.len(),
            changes.removed.len(),
            changes.modified.as_ref().map_or(0, Vec::len)
        );

        Ok(Some(changes))
    }

    /// Write `changes` next to `new_file` as its `_added`, `_removed` and `_modified` siblings.
    ///
    /// Each written file takes the recorded version of `new_file`.
    pub fn write_changes(&self, new_file: &Path, changes: &Changes, store: &mut VersionStore) -> Result<Vec<PathBuf>> {
        let mut outputs = vec![
            (tagged_path(new_file, ADDED_TAG), &changes.added),
            (tagged_path(new_file, REMOVED_TAG), &changes.removed),
        ];
        if let Some(modified) = &changes.modified {
            outputs.push((tagged_path(new_file, MODIFIED_TAG), modified));
        }

        let version = store.get(file_stem(new_file));
        let mut written = Vec::with_capacity(outputs.len());

        for (path, rows) in outputs {
            let _ = write_rows(&path, self.delimiter, false, rows)?;
            if let Some(version) = version {
                store.set(file_stem(&path), version)?;
            }
            written.push(path);
        }

        Ok(written)
    }

    fn check_schema(&self, old_file: &Path, new_file: &Path) -> Result<()> {
        let (Some(old_width), Some(new_width)) = (self.raw_width(old_file), self.raw_width(new_file)) else {
            return Ok(());
        };

        let compatible = match (self.columns, self.text_column) {
            // A text column can make the first line wider than the schema.
            (Some(expected), Some(_)) => old_width.min(new_width) >= expected,
            (Some(expected), None) => old_width == expected && new_width == expected,
            (None, _) => old_width == new_width,
        };

        if !compatible {
            bail!(
                "'{}' has {new_width} columns where its previous version has {old_width}, the files cannot be compared",
                new_file.display()
            );
        }

        Ok(())
    }

    /// Number of fields on the first non-empty line of `path`.
    fn raw_width(&self, path: &Path) -> Option<usize> {
        TabularReader::from_path(path, self.delimiter).rows().next().map(|row| row.len())
    }
}

fn key_of<'a>(row: &'a [String], key_columns: &[usize]) -> Vec<&'a str> {
    key_columns
        .iter()
        .map(|&column| row.get(column).map_or("", String::as_str))
        .collect()
}

/// The rows in order of first appearance, without repeats.
fn distinct(rows: impl Iterator<Item = Row>) -> Vec<Row> {
    let mut seen = HashSet::new();
    rows.filter(|row| seen.insert(row.clone())).collect()
}
