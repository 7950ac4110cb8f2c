//! Local bookkeeping for the data directory.
//!
//! # Implementation Model
//!
//! [`VersionStore`] maps each file stem to the remote version the file was produced from. It is a
//! plain JSON object kept next to the data, loaded once and written through on every change.
//! Callers own their store explicitly; pointing a store at another data directory reloads it.
//!
//! [`path_utils`] holds the naming rules shared by every stage that writes files: the stem used as
//! the version key, the `_old` sibling that keeps the previous version of a file around for
//! diffing, and the `.part` name used while a partition file is still being written.

pub mod path_utils;
mod version_store;

pub use version_store::{TIMESTAMP_FORMAT, VERSIONS_FILE, VersionStore, is_stale};
