//! CLI commands

pub mod deploy;
pub mod run;
