//! Next Release CLI - Bridge interface for release pipelines
//!
//! Prints `{original, version}` as JSON (default) or the bare version.
//! Exit codes: 0 resolved, 1 failed, 2 bad input, 3 record not restored.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use nextrelease_core::{
    logging, NpmCalculator, ResolutionRequest, ResolutionResult, ResolveError, Resolver,
    SemverCalculator, DEFAULT_RECORD, ENGINE_VERSION,
};

#[derive(Parser)]
#[command(name = "nextrelease-cli")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Compute the next semantic version without changing the version record")]
struct Cli {
    /// major | minor | patch | bump | final | an explicit MAJOR.MINOR.PATCH[-PRE] version
    token: Option<String>,

    /// Use this version instead of reading the record
    #[arg(short = 'o', long = "override")]
    override_version: Option<String>,

    /// Path to the version record
    #[arg(short, long, env = "NEXTRELEASE_RECORD", default_value = DEFAULT_RECORD)]
    record: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Calculator used for major/minor/patch
    #[arg(short, long, value_enum, default_value_t = CalculatorChoice::Npm)]
    calculator: CalculatorChoice,

    /// npm executable
    #[arg(long, env = "NEXTRELEASE_NPM", default_value = "npm")]
    npm: String,

    /// Kill the npm calculator after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Plain,
}

#[derive(Clone, Copy, ValueEnum)]
enum CalculatorChoice {
    Npm,
    Builtin,
}

fn build_resolver(cli: &Cli) -> Resolver {
    match cli.calculator {
        CalculatorChoice::Npm => {
            let mut npm = NpmCalculator::new(&cli.npm);
            if let Some(secs) = cli.timeout_secs {
                npm = npm.with_timeout(Duration::from_secs(secs));
            }
            Resolver::new(npm)
        }
        CalculatorChoice::Builtin => Resolver::new(SemverCalculator),
    }
}

fn print_result(format: OutputFormat, result: &ResolutionResult) -> ExitCode {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(result) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to serialize result: {}", e);
                ExitCode::FAILURE
            }
        },
        OutputFormat::Plain => {
            println!("{}", result.version);
            ExitCode::SUCCESS
        }
    }
}

fn print_error(format: OutputFormat, err: &ResolveError) -> ExitCode {
    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({ "error": err.to_string() });
            println!("{}", output);
        }
        OutputFormat::Plain => eprintln!("error: {}", err),
    }
    ExitCode::from(err.exit_code())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("{}", e);
    }

    let resolver = build_resolver(&cli);
    let mut request = ResolutionRequest::new(cli.token.clone().unwrap_or_default())
        .with_record(cli.record.clone());
    request.override_version = cli.override_version.clone();

    tracing::debug!(calculator = resolver.calculator_name(), "resolver ready");

    match resolver.resolve(&request) {
        Ok(result) => print_result(cli.format, &result),
        Err(err) => {
            if err.is_fatal() {
                tracing::error!(error = %err, "version record may be corrupted");
            }
            print_error(cli.format, &err)
        }
    }
}
