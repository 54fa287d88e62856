//! mals command-line tool
//!
//! Runs Lua scripts against the bridge, generates documentation for
//! bridged packages and validates configuration files.

mod commands;
mod logging;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::docs::DocFormat;

#[derive(Parser)]
#[command(name = "mals")]
#[command(about = "Host-function bridge for embedded Lua", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (defaults to ./mals.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a Lua script
    Run {
        /// Script file
        file: PathBuf,
        /// Arguments exposed to the script as `arg`
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },

    /// Generate documentation for a bridged package
    Docs {
        /// Output format
        #[arg(short, long, value_enum, default_value = "lua")]
        format: DocFormat,
        /// Package to document
        #[arg(short, long, default_value = "context")]
        package: String,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Validate a configuration file
    CheckConfig {
        /// Configuration file
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Run { file, args } => commands::run::execute(cli.config.as_deref(), &file, &args),
        Commands::Docs {
            format,
            package,
            out,
        } => commands::docs::execute(cli.config.as_deref(), format, &package, out.as_deref()),
        Commands::CheckConfig { file } => commands::check_config::execute(&file),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
