//! gymlink: command-line client for remote environments

use clap::Parser;

use gymlink_client::cli::Cli;
use gymlink_client::commands;
use gymlink_utils::{init_logging_with_config, LogConfig};

fn main() {
    let cli = Cli::parse();

    let mut log_config = LogConfig::cli();
    if let Some(path) = cli.log_file {
        log_config = log_config.with_log_file(path);
    }
    if let Err(e) = init_logging_with_config(log_config) {
        eprintln!("Warning: {}", e);
    }

    let exit_code = match commands::execute(cli.command, cli.addr, cli.env) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    std::process::exit(exit_code);
}
