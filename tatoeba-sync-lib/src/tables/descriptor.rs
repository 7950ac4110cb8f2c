use crate::Result;
use ohno::IntoAppError;
use std::path::{Path, PathBuf};
use url::Url;

/// Language argument meaning "every language", served from the multilingual master.
pub const WILDCARD: &str = "*";

/// The table whose rows map a sentence id to its language code.
pub const LANGUAGE_TABLE: &str = "sentences_detailed";

/// Columns of [`LANGUAGE_TABLE`] holding the sentence id and its language.
pub const LANGUAGE_INDEX_COLUMNS: (usize, usize) = (0, 1);

/// Where and how a table is published on the download site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum RemoteShape {
    /// One compressed file per language, plus an archived master for all languages.
    PerLanguage,

    /// A single archived master covering every language.
    Archive,

    /// A single compressed file in the statistics area.
    Stats,
}

/// How the values of a split rule's key columns are turned into partition names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitKey {
    /// Key columns hold sentence ids, mapped to languages through the language index.
    LanguageIndex,

    /// Key columns are used as they are.
    Column,
}

/// How a multilingual master is partitioned locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitRule {
    pub columns: &'static [usize],
    pub key: SplitKey,
}

/// Static description of one exported table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: &'static str,
    pub delimiter: u8,
    pub columns: usize,
    pub text_column: Option<isize>,
    pub shape: RemoteShape,
    pub split: Option<SplitRule>,
    pub diffable: bool,
    pub language_column: Option<usize>,
}

const fn per_language(name: &'static str, columns: usize, text_column: Option<isize>, language_column: Option<usize>) -> TableDescriptor {
    TableDescriptor {
        name,
        delimiter: b'\t',
        columns,
        text_column,
        shape: RemoteShape::PerLanguage,
        split: None,
        diffable: true,
        language_column,
    }
}

static TABLES: [TableDescriptor; 12] = [
    per_language("sentences_detailed", 6, Some(2), Some(1)),
    per_language("sentences_CC0", 4, Some(2), Some(1)),
    per_language("sentences_base", 2, None, None),
    per_language("transcriptions", 5, Some(-1), Some(1)),
    per_language("tags", 2, Some(-1), None),
    per_language("sentences_in_lists", 2, None, None),
    per_language("sentences_with_audio", 5, None, None),
    per_language("user_languages", 4, Some(-1), Some(0)),
    TableDescriptor {
        name: "links",
        delimiter: b'\t',
        columns: 2,
        text_column: None,
        shape: RemoteShape::Archive,
        split: Some(SplitRule {
            columns: &[0, 1],
            key: SplitKey::LanguageIndex,
        }),
        diffable: true,
        language_column: None,
    },
    TableDescriptor {
        name: "jpn_indices",
        delimiter: b'\t',
        columns: 3,
        text_column: Some(-1),
        shape: RemoteShape::Archive,
        split: Some(SplitRule {
            columns: &[0],
            key: SplitKey::LanguageIndex,
        }),
        diffable: true,
        language_column: None,
    },
    TableDescriptor {
        name: "user_lists",
        delimiter: b'\t',
        columns: 6,
        text_column: Some(4),
        shape: RemoteShape::Archive,
        split: None,
        diffable: true,
        language_column: None,
    },
    TableDescriptor {
        name: "queries",
        delimiter: b',',
        columns: 3,
        text_column: Some(-1),
        shape: RemoteShape::Stats,
        split: Some(SplitRule {
            columns: &[1],
            key: SplitKey::Column,
        }),
        diffable: false,
        language_column: Some(1),
    },
];

impl TableDescriptor {
    /// Every supported table.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &TABLES
    }

    /// Find the descriptor of the table called `name`.
    #[must_use]
    pub fn lookup(name: &str) -> Option<&'static Self> {
        TABLES.iter().find(|table| table.name == name)
    }

    /// The descriptor of [`LANGUAGE_TABLE`].
    #[must_use]
    pub fn language_table() -> &'static Self {
        &TABLES[0]
    }

    #[must_use]
    pub const fn is_archived(&self) -> bool {
        matches!(self.shape, RemoteShape::Archive)
    }

    /// Whether partitions of this table are keyed by a pair of languages.
    #[must_use]
    pub const fn is_paired(&self) -> bool {
        matches!(self.split, Some(rule) if rule.columns.len() == 2)
    }

    /// Whether splitting this table needs the id to language index.
    #[must_use]
    pub const fn needs_language_index(&self) -> bool {
        matches!(self.split, Some(SplitRule { key: SplitKey::LanguageIndex, .. }))
    }

    /// Extension of the files this table is split into.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        if self.delimiter == b'\t' { "tsv" } else { "csv" }
    }

    /// Local directory holding this table's files.
    #[must_use]
    pub fn local_dir(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(self.name)
    }

    /// File name of the multilingual master once unpacked.
    #[must_use]
    pub fn master_file_name(&self) -> String {
        format!("{}.csv", self.name)
    }

    /// File name of the slice of this table for `languages`.
    ///
    /// Per-language exports are always tab separated; local partitions follow the table's delimiter.
    #[must_use]
    pub fn slice_file_name(&self, languages: &[&str]) -> String {
        let extension = match self.shape {
            RemoteShape::PerLanguage => "tsv",
            RemoteShape::Archive | RemoteShape::Stats => self.extension(),
        };
        format!("{}_{}.{extension}", languages.join("-"), self.name)
    }

    /// The remote URLs publishing this table for `languages`.
    ///
    /// `base` must end with a `/`. Only per-language tables depend on `languages`; the wildcard
    /// selects their archived master.
    pub fn remote_urls(&self, base: &Url, languages: &[String]) -> Result<Vec<Url>> {
        let relative: Vec<String> = match self.shape {
            RemoteShape::PerLanguage if !languages.iter().any(|lang| lang == WILDCARD) => languages
                .iter()
                .map(|lang| format!("exports/per_language/{lang}/{lang}_{}.tsv.bz2", self.name))
                .collect(),
            RemoteShape::PerLanguage | RemoteShape::Archive => vec![format!("exports/{}.tar.bz2", self.name)],
            RemoteShape::Stats => vec![format!("stats/{}.csv.bz2", self.name)],
        };

        relative
            .iter()
            .map(|path| base.join(path).into_app_err_with(|| format!("unable to build download URL for '{path}'")))
            .collect()
    }
}

/// Directory listing the per-language export folders, one per language code.
pub fn languages_url(base: &Url) -> Result<Url> {
    base.join("exports/per_language/").into_app_err("unable to build languages URL")
}
