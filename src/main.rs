mod cli;
mod error;
mod operations;
mod storage;
mod travel;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 日志写到 stderr：stdout 留给 CLI 输出和 MCP stdio 通道
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    // 解析命令行参数
    let cli = Cli::parse();
    init_logging();

    match run(cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// 统一调度；`Ok(false)` 表示命令已输出错误结果
fn run(command: Commands) -> Result<bool, BoxError> {
    let config = storage::config::load_config();

    match command {
        Commands::Task {
            file,
            storage,
            args,
        } => {
            cli::task::execute(&config.tasks, file, storage, args)?;
            Ok(true)
        }
        Commands::Calc { expression } => {
            cli::calc::execute(expression)?;
            Ok(true)
        }
        Commands::Mcp => {
            let travel = config.travel.with_env_keys();
            tokio::runtime::Runtime::new()?
                .block_on(cli::mcp::run_mcp_server(travel, config.mcp))?;
            Ok(true)
        }
        Commands::Weather {
            destination,
            travel_dates,
        } => {
            let travel = config.travel.with_env_keys();
            Ok(cli::travel::weather(&travel, &destination, &travel_dates)?)
        }
        Commands::Flights {
            origin,
            destination,
            departure_date,
        } => {
            let travel = config.travel.with_env_keys();
            Ok(cli::travel::flights(
                &travel,
                &origin,
                &destination,
                &departure_date,
            )?)
        }
    }
}
