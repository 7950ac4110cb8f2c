use crate::tables::{TableDescriptor, WILDCARD};
use core::fmt::{Display, Formatter};

/// One table to bring up to date, for a set of languages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub table: String,
    pub languages: Vec<String>,

    /// For paired tables, only the pair `languages[0]-languages[1]` is of interest.
    pub oriented_pair: bool,
}

impl UpdateRequest {
    #[must_use]
    pub fn new<I, S>(table: impl Into<String>, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            languages: languages.into_iter().map(Into::into).collect(),
            oriented_pair: false,
        }
    }

    /// Restrict a paired table to the ordered pair made of the two languages.
    #[must_use]
    pub const fn oriented(mut self) -> Self {
        self.oriented_pair = true;
        self
    }

    /// Whether the request covers every language.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.languages.iter().any(|lang| lang == WILDCARD)
    }

    /// The explicit language codes of the request.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.languages.iter().map(String::as_str).filter(|lang| *lang != WILDCARD)
    }
}

/// A request that cannot be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    UnknownTable(String),
    UnknownLanguages(Vec<String>),
    NotLanguagePair { table: String, count: usize },
}

impl Display for RequestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnknownTable(table) => write!(f, "unknown table '{table}'"),
            Self::UnknownLanguages(languages) => write!(f, "unknown language code(s): {}", languages.join(", ")),
            Self::NotLanguagePair { table, count } => {
                write!(f, "an oriented pair of '{table}' needs exactly 2 languages, got {count}")
            }
        }
    }
}

impl core::error::Error for RequestError {}

/// Check everything about `requests` that does not need the network.
pub fn check_requests(requests: &[UpdateRequest]) -> Result<(), RequestError> {
    for request in requests {
        let Some(table) = TableDescriptor::lookup(&request.table) else {
            return Err(RequestError::UnknownTable(request.table.clone()));
        };

        if request.oriented_pair && table.is_paired() && request.languages.len() != 2 {
            return Err(RequestError::NotLanguagePair {
                table: request.table.clone(),
                count: request.languages.len(),
            });
        }
    }

    Ok(())
}

/// Check that every explicit language code of `requests` is in `available`.
pub fn check_languages(requests: &[UpdateRequest], available: &[String]) -> Result<(), RequestError> {
    let mut unknown: Vec<String> = requests
        .iter()
        .flat_map(UpdateRequest::codes)
        .filter(|code| !available.iter().any(|lang| lang.as_str() == *code))
        .map(str::to_string)
        .collect();

    if unknown.is_empty() {
        return Ok(());
    }

    unknown.sort();
    unknown.dedup();
    Err(RequestError::UnknownLanguages(unknown))
}
