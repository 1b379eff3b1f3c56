//! # jobindex
//!
//! Application layer around `jobindex-core`: the HTTP push endpoints, the
//! CLI, file configuration, and the `tracing` bridge for index events.

pub mod api;
pub mod cli;
pub mod config;
pub mod sink;
