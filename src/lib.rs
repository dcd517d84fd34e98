//! mergeclock - deadline-driven auto-merge for GitHub pull requests
//!
//! Every tracked pull request gets a merge deadline of five days plus five
//! days per commit, counted from its latest commit, creation or push. Reviews
//! move the deadline: approvals bring it forward and change requests push it
//! back, each weighted by the reviewer's share of the repository's commits.
//! Once the deadline passes, the periodic sweep merges the pull request.
//!
//! Layers, leaves first:
//! - [`gateway`]: the remote repository API
//! - [`deadline`]: pure deadline computation
//! - [`tracking`]: persisted per-PR state
//! - [`reconcile`]: one synchronization cycle per PR
//! - [`sweep`] and [`ingest`]: the two triggers
//! - [`server`]: the HTTP surface

pub mod auth;
pub mod clock;
pub mod config;
pub mod deadline;
pub mod error;
pub mod gateway;
pub mod ingest;
pub mod logging;
pub mod reconcile;
pub mod server;
pub mod sweep;
pub mod tracking;
pub mod types;

pub use error::{Error, Result};
