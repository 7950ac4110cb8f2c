//! The tables published by the corpus.
//!
//! # Implementation Model
//!
//! Every table is described once by a [`TableDescriptor`] in a registry keyed by table name. The
//! descriptor carries everything the other stages need to handle the table: the dialect used to
//! parse it (delimiter, width, text column), where it is published (per language, as an archived
//! master, or in the statistics area), how its master is split locally, and whether successive
//! versions are diffed. Code never branches on table names; it looks the descriptor up.
//!
//! Typed access to rows goes through the [`Record`] types, thin wrappers that convert positional
//! fields on demand and read malformed or null values as absent.

mod descriptor;
mod records;

pub use descriptor::{
    LANGUAGE_INDEX_COLUMNS, LANGUAGE_TABLE, RemoteShape, SplitKey, SplitRule, TableDescriptor, WILDCARD, languages_url,
};
pub use records::{
    JpnIndex, Link, NULL_MARKER, Query, Record, SentenceBase, SentenceCc0, SentenceDetailed, SentenceInList, SentenceWithAudio, Tag,
    Transcription, UserLanguage, UserList, field, is_null,
};
