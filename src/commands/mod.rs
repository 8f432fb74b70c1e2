//! Command-line subcommands

pub mod changes;
pub mod create;
pub mod serve;
