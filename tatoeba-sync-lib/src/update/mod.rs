//! Incremental update of a data directory.
//!
//! # Implementation Model
//!
//! An update is a batch of [`UpdateRequest`]s, each naming a table and the languages of
//! interest. [`UpdateOrchestrator::run`] handles a batch in fixed stages:
//!
//! 1. **Validate**: unknown tables, unknown language codes and malformed language pairs reject
//!    the whole batch with a [`RequestError`] before any file is touched.
//! 2. **Plan**: each request becomes the remote URLs of its table. Tables split through the
//!    language index pull in the sentence table for the same languages.
//! 3. **Listings**: URLs are grouped by directory and each directory listing is read once.
//! 4. **Fetch**: every stale file goes through the fetch pipeline, sentences first.
//! 5. **Split**: masters that changed, or whose language index changed, are partitioned.
//! 6. **Compare**: new and re-split files are compared with their previous version.
//!
//! Failures past validation only affect the file concerned; they are logged and collected in
//! the [`UpdateReport`], and the batch carries on.

mod orchestrator;
mod report;
mod request;

pub use orchestrator::UpdateOrchestrator;
pub use report::{Failure, UpdateReport};
pub use request::{RequestError, UpdateRequest, check_languages, check_requests};
