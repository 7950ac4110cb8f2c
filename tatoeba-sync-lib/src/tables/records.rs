use crate::data::Row;
use chrono::{NaiveDate, NaiveDateTime};

/// Marker the exports use for a missing value.
pub const NULL_MARKER: &str = "\\N";

const EXPORT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const QUERY_DATE_FORMAT: &str = "%d %b %Y";

/// A typed view over one row of a table.
pub trait Record: Sized {
    /// Name of the table the record is read from.
    const TABLE: &'static str;

    fn from_row(row: Row) -> Self;

    fn row(&self) -> &[String];
}

/// The field at `index`, or `None` when it is missing, empty or a null marker.
#[must_use]
pub fn field(row: &[String], index: usize) -> Option<&str> {
    row.get(index).map(String::as_str).filter(|value| !is_null(value))
}

/// Whether `value` stands for a missing value.
#[must_use]
pub fn is_null(value: &str) -> bool {
    value.is_empty() || value == NULL_MARKER
}

fn parse_id(value: Option<&str>) -> Option<u64> {
    value?.trim().parse().ok()
}

fn parse_export_date(value: Option<&str>) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value?, EXPORT_DATE_FORMAT).ok()
}

fn parse_query_date(value: Option<&str>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value?, QUERY_DATE_FORMAT).ok()
}

/// Generates a record struct wrapping a row, with one accessor per column.
///
/// Column kinds:
/// - `id`: unsigned integer, `None` when absent or malformed
/// - `text`: string, empty when absent
/// - `opt_text`: string, `None` when absent
/// - `datetime`: export timestamp, `None` when absent or malformed (including the zero date)
/// - `day`: query log date, `None` when absent or malformed
macro_rules! define_record {
    (@type id) => { Option<u64> };
    (@type text) => { &str };
    (@type opt_text) => { Option<&str> };
    (@type datetime) => { Option<NaiveDateTime> };
    (@type day) => { Option<NaiveDate> };

    (@get id, $row:expr, $index:literal) => { parse_id(field($row, $index)) };
    (@get text, $row:expr, $index:literal) => { field($row, $index).unwrap_or_default() };
    (@get opt_text, $row:expr, $index:literal) => { field($row, $index) };
    (@get datetime, $row:expr, $index:literal) => { parse_export_date(field($row, $index)) };
    (@get day, $row:expr, $index:literal) => { parse_query_date(field($row, $index)) };

    (
        $(#[$meta:meta])*
        $name:ident in $table:literal {
            $(
                $(#[$field_meta:meta])*
                $field:ident: $kind:ident = $index:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            row: Row,
        }

        impl Record for $name {
            const TABLE: &'static str = $table;

            fn from_row(row: Row) -> Self {
                Self { row }
            }

            fn row(&self) -> &[String] {
                &self.row
            }
        }

        impl $name {
            $(
                $(#[$field_meta])*
                #[must_use]
                pub fn $field(&self) -> define_record!(@type $kind) {
                    define_record!(@get $kind, &self.row, $index)
                }
            )*
        }
    };
}

define_record! {
    /// A sentence with its owner and dates.
    SentenceDetailed in "sentences_detailed" {
        sentence_id: id = 0,
        lang: opt_text = 1,
        text: text = 2,
        username: opt_text = 3,
        date_added: datetime = 4,
        date_last_modified: datetime = 5,
    }
}

define_record! {
    /// A sentence released under CC0.
    SentenceCc0 in "sentences_CC0" {
        sentence_id: id = 0,
        lang: opt_text = 1,
        text: text = 2,
        date_last_modified: datetime = 3,
    }
}

define_record! {
    /// The sentence a sentence was translated from, if known.
    SentenceBase in "sentences_base" {
        sentence_id: id = 0,
        /// `Some(0)` marks an original sentence.
        base_of_the_sentence: id = 1,
    }
}

define_record! {
    Transcription in "transcriptions" {
        sentence_id: id = 0,
        lang: opt_text = 1,
        script_name: text = 2,
        username: opt_text = 3,
        transcription: text = 4,
    }
}

define_record! {
    Tag in "tags" {
        sentence_id: id = 0,
        tag_name: text = 1,
    }
}

define_record! {
    SentenceInList in "sentences_in_lists" {
        list_id: id = 0,
        sentence_id: id = 1,
    }
}

define_record! {
    SentenceWithAudio in "sentences_with_audio" {
        sentence_id: id = 0,
        audio_id: id = 1,
        username: opt_text = 2,
        license: opt_text = 3,
        attribution_url: opt_text = 4,
    }
}

define_record! {
    /// A language a user declared, with their skill level (0 to 5).
    UserLanguage in "user_languages" {
        lang: opt_text = 0,
        skill_level: id = 1,
        username: opt_text = 2,
        details: opt_text = 3,
    }
}

define_record! {
    /// A translation link between two sentences.
    Link in "links" {
        sentence_id: id = 0,
        translation_id: id = 1,
    }
}

define_record! {
    JpnIndex in "jpn_indices" {
        sentence_id: id = 0,
        meaning_id: id = 1,
        text: text = 2,
    }
}

define_record! {
    UserList in "user_lists" {
        list_id: id = 0,
        username: opt_text = 1,
        date_created: datetime = 2,
        date_last_modified: datetime = 3,
        list_name: text = 4,
        editable_by: opt_text = 5,
    }
}

define_record! {
    /// A search made on the site.
    Query in "queries" {
        date: day = 0,
        language: opt_text = 1,
        content: text = 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> Row {
        fields.iter().map(|field| (*field).to_string()).collect()
    }

    #[test]
    fn test_sentence_detailed_accessors() {
        let sentence = SentenceDetailed::from_row(row(&["1276", "eng", "Let's try something.", "CK", "2010-04-08 01:23:45", "\\N"]));
        assert_eq!(sentence.sentence_id(), Some(1276));
        assert_eq!(sentence.lang(), Some("eng"));
        assert_eq!(sentence.text(), "Let's try something.");
        assert_eq!(sentence.username(), Some("CK"));
        assert_eq!(
            sentence.date_added(),
            NaiveDate::from_ymd_opt(2010, 4, 8).unwrap().and_hms_opt(1, 23, 45)
        );
        assert_eq!(sentence.date_last_modified(), None);
        assert_eq!(SentenceDetailed::TABLE, "sentences_detailed");
    }

    #[test]
    fn test_malformed_values_read_as_absent() {
        let list = UserList::from_row(row(&["x", "\\N", "0000-00-00 00:00:00", "garbage", "My list", "creator"]));
        assert_eq!(list.list_id(), None);
        assert_eq!(list.username(), None);
        assert_eq!(list.date_created(), None);
        assert_eq!(list.date_last_modified(), None);
        assert_eq!(list.list_name(), "My list");
    }

    #[test]
    fn test_short_row_reads_as_absent() {
        let link = Link::from_row(row(&["77"]));
        assert_eq!(link.sentence_id(), Some(77));
        assert_eq!(link.translation_id(), None);

        let tag = Tag::from_row(row(&["5"]));
        assert_eq!(tag.tag_name(), "");
    }

    #[test]
    fn test_query_date() {
        let query = Query::from_row(row(&["21 Mar 2020", "fra", "bonjour, le monde"]));
        assert_eq!(query.date(), NaiveDate::from_ymd_opt(2020, 3, 21));
        assert_eq!(query.language(), Some("fra"));
        assert_eq!(query.content(), "bonjour, le monde");
    }

    #[test]
    fn test_row_is_kept() {
        let fields = row(&["1", "2"]);
        let link = Link::from_row(fields.clone());
        assert_eq!(link.row(), fields.as_slice());
    }

    #[test]
    fn test_is_null() {
        assert!(is_null(""));
        assert!(is_null("\\N"));
        assert!(!is_null("N"));
        assert!(!is_null("eng"));
    }
}
