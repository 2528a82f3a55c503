mod import;
mod logging;
mod serve;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Procurement execution tracker.
#[derive(Parser)]
#[command(
    name = "vendorflow",
    version,
    about = "Procurement execution tracker: HTTP API and material import"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the procurement HTTP API server
    Serve(serve::ServeArgs),

    /// Parse a materials CSV and print the result
    Import {
        /// Path to the CSV file
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            logging::init(cli.verbose, cli.quiet);
            cmd_serve(args, cli.output, cli.quiet);
        }
        Commands::Import { file } => {
            import::cmd_import(&file, cli.output, cli.quiet);
        }
    }
}

fn cmd_serve(args: serve::ServeArgs, output: OutputFormat, quiet: bool) {
    let config = match serve::ServeConfig::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    };
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(
                &format!("failed to create tokio runtime: {}", e),
                output,
                quiet,
            );
            process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(serve::start_server(config)) {
        report_error(&format!("Server error: {}", e), output, quiet);
        process::exit(1);
    }
}

/// Report an error on stderr in the requested format.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
