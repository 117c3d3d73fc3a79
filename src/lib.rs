//! sysdelta: change-tracked edits of provisioning-server system records.
//!
//! Fetches a system record over XML-RPC, tracks local field changes, and
//! emits a `cobbler system edit` command covering only what changed.

pub mod cli;
pub mod core;
pub mod transport;
