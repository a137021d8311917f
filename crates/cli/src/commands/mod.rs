//! Subcommand implementations

pub mod agent;
pub mod link;
pub mod stats;
