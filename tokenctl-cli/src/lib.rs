//! tokenctl: manage tokens across a federation of clusters
//!
//! The [`federation`] module holds the engine: concurrent fan-out queries,
//! sync group partitioning and write target resolution. The remaining
//! modules are the command-line front end built on top of it.

pub mod api;
pub mod commands;
pub mod config;
pub mod federation;
pub mod output;
