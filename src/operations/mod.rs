//! Business logic shared by the CLI commands

pub mod calculator;
pub mod tasks;
