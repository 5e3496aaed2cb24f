// confdiff - compare candidate configuration files against the configuration store

mod exit_codes;
mod render;
mod run;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use exit_codes::{EXIT_INVALID_DESCRIPTOR, EXIT_RUNTIME, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "confdiff")]
#[command(about = "Compare area configuration files against the configuration store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log debug detail to stderr (RUST_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the comparisons a descriptor calls for
    #[command(after_help = "\
Examples:
  confdiff run area-3201.toml
  confdiff run area-3201.toml --json
  confdiff run area-3201.toml --output diff.json --quiet

Exit codes:
  0  no differences
  1  differences found
  2  usage error
  3  invalid descriptor
  4  output could not be written")]
    Run {
        /// Path to the descriptor TOML file
        descriptor: PathBuf,

        /// Output JSON to stdout instead of the human rendering
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Suppress warnings and status lines on stderr
        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// Parse and validate a descriptor without running
    #[command(after_help = "\
Examples:
  confdiff validate area-3201.toml")]
    Validate {
        /// Path to the descriptor TOML file
        descriptor: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run { descriptor, json, output, quiet } => {
            run::cmd_run(descriptor, json, output, quiet)
        }
        Commands::Validate { descriptor } => run::cmd_validate(descriptor),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn descriptor(msg: impl Into<String>) -> Self {
        Self { code: EXIT_INVALID_DESCRIPTOR, message: msg.into(), hint: None }
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self { code: EXIT_RUNTIME, message: msg.into(), hint: None }
    }

    /// Exit with `code` and print nothing.
    pub fn silent(code: u8) -> Self {
        Self { code, message: String::new(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
