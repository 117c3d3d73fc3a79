//! Core record logic: field model, merging, change tracking, lookup, retry.

pub mod client;
pub mod config;
pub mod edit;
pub mod executor;
pub mod merge;
pub mod record;
pub mod types;
