//! Reading, splitting and comparing the exported files.
//!
//! # Implementation Model
//!
//! The exports are delimited text without quoting. [`TabularReader`] turns a file, a byte buffer
//! or a list of rows into a restartable sequence of rows, repairing the rows damaged by a text
//! column that contains the delimiter or a line break. Everything downstream works on plain
//! [`Row`] values.
//!
//! [`Partitioner`] streams the rows of a multilingual master into one file per key, buffering
//! rows per output and writing them to `.part` files that only receive their final name once the
//! whole master has been read. [`DifferenceFinder`] compares a file with the `_old` sibling left
//! behind when it was replaced, and writes the added, removed and modified rows next to it.
//!
//! Files written here use the same dialect as the exports, so they can be read back with
//! [`TabularReader`].

mod difference;
mod partitioner;
mod reader;
mod row_filter;
mod writer;

pub use difference::{ADDED_TAG, Changes, DifferenceFinder, MODIFIED_TAG, REMOVED_TAG};
pub use partitioner::{Buffer, DEFAULT_BUFFER_BYTES, Partitioner};
pub use reader::{Row, Rows, TabularReader};
pub use row_filter::{Converter, RowFilter};
pub use writer::write_rows;
