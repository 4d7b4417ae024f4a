//! Subcommand implementations

pub mod series;
pub mod status;
