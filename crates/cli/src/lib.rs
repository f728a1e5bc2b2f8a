//! Command line front-end for the ring cache.
//!
//! Provides commands for:
//! - Inspecting ring entries and members
//! - Locating the owner of keys
//! - Simulating membership changes on an in-memory cluster

pub mod commands;
pub mod config;

pub use commands::{Command, CommandResult};
pub use config::{CliConfig, ClusterSpec, NodeSpec};
