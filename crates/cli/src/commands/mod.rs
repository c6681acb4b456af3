//! Command handlers for the incidex CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod build;
pub mod query;
pub mod serve;
pub mod stats;

// Re-export command types for convenience
pub use build::BuildCommand;
pub use query::QueryCommand;
pub use serve::ServeCommand;
pub use stats::StatsCommand;
