//! # iac-cli
//!
//! Command-line interface for shift-left policy checks on IaC sources.
//!
//! - `iac run` - evaluate a policy directory against a source directory
//! - `iac list-policies` - validate and list the policies in a directory
//! - `iac graph` - show the parsed resource types and reference index
//!
//! ## Exit status
//!
//! `iac run` exits 0 when no policy matched, 1 when findings are present,
//! and 2 on a fatal error (no sources, only HCL sources, no policies,
//! unreadable or unparseable input, bad flags). A 1 means "findings", not a crash.
//! The other subcommands exit 0 on success and 2 on error.

mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Exit status for fatal errors.
const EXIT_FATAL: u8 = 2;

/// Shift-left policy checks for infrastructure-as-code.
#[derive(Parser)]
#[command(name = "iac", version, about)]
struct Cli {
    /// Log debug details to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate policies against a source directory.
    Run(commands::run::RunArgs),
    /// Validate and list the policies in a directory.
    ListPolicies(commands::list_policies::ListPoliciesArgs),
    /// Show the resource types and references parsed from a source directory.
    Graph(commands::graph::GraphArgs),
}

fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let mut filter = EnvFilter::from_default_env();
    for target in ["iac", "iac_graph", "iac_policy", "iac_runner"] {
        filter = filter.add_directive(format!("{}={}", target, level).parse()?);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
    Ok(())
}

fn dispatch(cli: &Cli) -> anyhow::Result<ExitCode> {
    match &cli.command {
        Commands::Run(args) => {
            let summary = commands::run::execute(args)?;
            Ok(ExitCode::from(summary.exit_code() as u8))
        }
        Commands::ListPolicies(args) => {
            commands::list_policies::execute(args)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Graph(args) => {
            commands::graph::execute(args)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("error: {:#}", e);
        return ExitCode::from(EXIT_FATAL);
    }
    match dispatch(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}
