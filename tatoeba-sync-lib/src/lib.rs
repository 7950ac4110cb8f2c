#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for tatoeba-sync
//!
//! This library acquires, caches and re-partitions the tabular exports published by the Tatoeba
//! sentence corpus. It decides which local files are stale, fetches and unpacks the remote exports,
//! splits multilingual files into per-language slices, and records what changed between pulls.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface and orchestration
//! - [`corpus`]: Read-side access to the local data directory
//! - [`data`]: Tolerant reader, partitioner and difference finder for the export dialect
//! - [`fetch`]: Remote listings and the per-file fetch pipeline
//! - [`store`]: Version bookkeeping and file naming rules
//! - [`tables`]: Table registry and typed records
//! - [`update`]: Incremental update orchestration

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub mod commands;
pub mod corpus;
pub mod data;
pub mod fetch;
pub mod store;
pub mod tables;
pub mod update;

pub use crate::commands::{Host, run};
