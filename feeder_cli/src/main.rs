mod cli;
mod device;
mod error_fmt;
mod logging;
mod schedule;

use std::path::Path;

use clap::Parser;
use eyre::WrapErr;
use feeder_config::Config;
use serde_json::Value;

use crate::cli::{Cli, Commands, DEFAULT_CONFIG};
use crate::error_fmt::{
    EXIT_OK, exit_code_for_error, exit_code_for_status, format_error_json, humanize,
};

fn main() {
    // Only affects panics and Debug output of reports; errors are rendered by `report`.
    let _ = color_eyre::install();
    let cli = Cli::parse();

    let cfg = match load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => std::process::exit(report(&cli, &err)),
    };

    let level = cli
        .log_level
        .as_deref()
        .or(cfg.logging.level.as_deref())
        .unwrap_or("info");
    let guard = match logging::init(cli.json, level, &cfg.logging) {
        Ok(guard) => guard,
        Err(err) => std::process::exit(report(&cli, &err)),
    };

    let code = match run(&cli, &cfg) {
        Ok(code) => code,
        Err(err) => report(&cli, &err),
    };
    drop(guard);
    std::process::exit(code);
}

fn load_config(path: Option<&Path>) -> eyre::Result<Config> {
    match path {
        Some(p) => feeder_config::load_file(p),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            feeder_config::load_file(Path::new(DEFAULT_CONFIG))
        }
        None => {
            let cfg = Config::default();
            cfg.validate().wrap_err("default config is invalid")?;
            Ok(cfg)
        }
    }
}

fn run(cli: &Cli, cfg: &Config) -> eyre::Result<i32> {
    match &cli.cmd {
        Commands::Channels => {
            print_json(&device::channels());
            Ok(EXIT_OK)
        }
        Commands::Schedule { state, action } => {
            let body = schedule::run(cfg, state, action)?;
            print_json(&body);
            Ok(EXIT_OK)
        }
        cmd => {
            let outcome = device::run(cfg, cmd)?;
            if !outcome.status.is_ok() {
                tracing::warn!(status = ?outcome.status, "command did not succeed");
            }
            print_json(&outcome.body);
            Ok(exit_code_for_status(outcome.status))
        }
    }
}

fn print_json(v: &Value) {
    println!("{v}");
}

/// Print the error in the requested format and pick the exit code.
fn report(cli: &Cli, err: &eyre::Report) -> i32 {
    tracing::error!(error = %err, "command failed");
    if cli.json {
        eprintln!("{}", format_error_json(err));
    } else {
        eprintln!("{}", humanize(err));
    }
    exit_code_for_error(err)
}
