use std::collections::BTreeSet;
use url::Url;

/// Something that could not be brought up to date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// The remote URL or local file concerned.
    pub subject: String,
    pub message: String,
}

/// What an update run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Stems of the local files written during the run.
    pub updated: BTreeSet<String>,

    /// Stems of the remote files whose local copy was already current.
    pub up_to_date: BTreeSet<String>,

    /// Candidate files the remote listing does not mention.
    pub unavailable: Vec<Url>,

    pub failed: Vec<Failure>,
}

impl UpdateReport {
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub(crate) fn fail(&mut self, subject: impl ToString, message: impl Into<String>) {
        self.failed.push(Failure {
            subject: subject.to_string(),
            message: message.into(),
        });
    }
}
