//! Read-side access to the local data directory.
//!
//! [`Corpus`] reads the files an update produced, as raw rows or typed records, for any table and
//! language selection. [`Corpus::parallel`] pairs the sentences of one language with their
//! translations in another.

use crate::Result;
use crate::data::{ADDED_TAG, MODIFIED_TAG, REMOVED_TAG, Row, RowFilter, TabularReader};
use crate::store::path_utils::tagged_path;
use crate::tables::{Record, RemoteShape, TableDescriptor};
use clap::ValueEnum;
use ohno::app_err;
use std::path::{Path, PathBuf};

mod parallel;

pub use parallel::{Distance, ParallelPairs, parallel_requests};

const LOG_TARGET: &str = "    corpus";

/// Which version of a file to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Scope {
    /// The current rows
    #[default]
    All,

    /// Rows that appeared with the last update
    Added,

    /// Rows that disappeared with the last update
    Removed,

    /// Rows whose content changed with the last update
    Modified,
}

impl Scope {
    const fn tag(self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::Added => Some(ADDED_TAG),
            Self::Removed => Some(REMOVED_TAG),
            Self::Modified => Some(MODIFIED_TAG),
        }
    }
}

/// The tables kept in a data directory.
#[derive(Debug, Clone)]
pub struct Corpus {
    data_dir: PathBuf,
}

impl Corpus {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// The local file holding `table` for `languages`.
    ///
    /// No languages designates the multilingual master.
    #[must_use]
    pub fn path(&self, table: &TableDescriptor, languages: &[&str], scope: Scope) -> PathBuf {
        let name = if languages.is_empty() {
            table.master_file_name()
        } else {
            table.slice_file_name(languages)
        };

        let path = table.local_dir(&self.data_dir).join(name);
        match scope.tag() {
            Some(tag) => tagged_path(&path, tag),
            None => path,
        }
    }

    /// A reader over the local file of `table` for `languages`.
    pub fn reader(&self, table: &str, languages: &[&str], scope: Scope) -> Result<TabularReader> {
        let table = lookup(table)?;
        Ok(TabularReader::for_table(self.path(table, languages, scope), table))
    }

    /// The rows of `table` for `languages`.
    ///
    /// A per-language table whose language files were never fetched is read from its master,
    /// keeping the rows of `languages`. Missing data reads as empty.
    pub fn rows(&self, table: &str, languages: &[&str], scope: Scope) -> Result<Box<dyn Iterator<Item = Row>>> {
        let table = lookup(table)?;
        let reader = TabularReader::for_table(self.path(table, languages, scope), table);
        if reader.exists() || languages.is_empty() || table.shape != RemoteShape::PerLanguage {
            return Ok(Box::new(reader.rows()));
        }

        let master = TabularReader::for_table(self.path(table, &[], scope), table);
        match table.language_column {
            Some(column) if master.exists() => {
                log::debug!(target: LOG_TARGET, "Reading '{}' rows for {} from the master", table.name, languages.join(", "));
                let filter = RowFilter::new(column, languages.iter().copied())?;
                Ok(Box::new(master.rows().filter(move |row| filter.accepts(row))))
            }
            _ => Ok(Box::new(reader.rows())),
        }
    }

    /// The rows of `R`'s table for `languages`, as typed records.
    pub fn records<R: Record + 'static>(&self, languages: &[&str], scope: Scope) -> Result<impl Iterator<Item = R>> {
        Ok(self.rows(R::TABLE, languages, scope)?.map(R::from_row))
    }
}

fn lookup(table: &str) -> Result<&'static TableDescriptor> {
    TableDescriptor::lookup(table).ok_or_else(|| app_err!("unknown table '{table}'"))
}
