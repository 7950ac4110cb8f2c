//! Remote listings and the per-file fetch pipeline.
//!
//! # Implementation Model
//!
//! The download server publishes plain HTML index pages. A [`VersionSource`] turns one index page
//! into a map from file URL to publication time; [`HttpVersionSource`] scrapes the pages and keeps
//! each one for a short TTL so that requests sharing a directory cost a single round trip.
//!
//! [`FetchPipeline`] then moves a single file through a fixed sequence of [`FetchState`]s:
//!
//! ```text
//! unknown -> checked -> downloaded -> decompressed -> extracted -> versioned
//! ```
//!
//! The check compares the recorded version with the remote one and ends the pipeline without any
//! network traffic when the local copy is current. Decompression and extraction replace existing
//! files through their `_old` sibling so the previous version stays available for diffing. The
//! version store is only updated once every produced file is in place, so a failure at any stage
//! leaves the file stale and the next run retries it.

mod decompress;
mod download;
mod extract;
mod pipeline;
mod progress;
mod version_source;

pub use decompress::{Codec, decompress};
pub use download::download;
pub use extract::extract;
pub use pipeline::{FetchOutcome, FetchPipeline, FetchState};
pub use progress::{NoProgress, Progress};
pub use version_source::{DEFAULT_LISTING_TTL, HttpVersionSource, VersionSource};
