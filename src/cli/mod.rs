//! CLI 模块

pub mod calc;
pub mod mcp;
pub mod task;
pub mod travel;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::storage::config::StorageBackend;

#[derive(Parser)]
#[command(name = "trellis")]
#[command(version)]
#[command(about = "Task manager, calculator and travel MCP tools")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage tasks (interactive shell, or one command when ARGS are given)
    Task {
        /// Task file (defaults to ~/.trellis/tasks.json or tasks.db)
        #[arg(long)]
        file: Option<PathBuf>,
        /// Storage backend (defaults to the config file setting)
        #[arg(long, value_enum)]
        storage: Option<StorageBackend>,
        /// A single command, e.g. `add "Write report" "" high 2025-06-01`
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Add two numbers interactively, or evaluate `A OP B`
    Calc {
        /// Operand, operator (+ - * / or add sub mul div), operand
        #[arg(allow_hyphen_values = true, allow_negative_numbers = true, num_args = 0..=3)]
        expression: Vec<String>,
    },
    /// Start MCP server (stdio transport) with the travel tools
    Mcp,
    /// Weather forecast and packing suggestions for a destination
    Weather {
        /// City name, e.g. "Paris" or "Tokyo, Japan"
        destination: String,
        /// Travel dates, e.g. "2025-06-15 to 2025-06-20"
        travel_dates: String,
    },
    /// Search flights between two airports
    Flights {
        /// Origin IATA code, e.g. JFK
        origin: String,
        /// Destination IATA code, e.g. LAX
        destination: String,
        /// Departure date (YYYY-MM-DD)
        departure_date: String,
    },
}
