// verdict CLI - fairness reports over county bail-decision records

mod exit_codes;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use verdict_analysis::store::SourceSummary;
use verdict_analysis::{AnalysisError, AnalysisPlan, RunSummary};
use verdict_io::XlsxReport;

use exit_codes::{analysis_exit_code, EXIT_ERROR, EXIT_PLAN_READ, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "verdict")]
#[command(about = "Cross-tabulation and fairness reports for bail decisions and risk scores")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every county CSV, run the analysis plan and write the Excel report
    #[command(after_help = "\
Examples:
  verdict run
  verdict run --input data/counties --output reports/fairness.xlsx
  verdict run --plan gender.plan.toml --json
  RUST_LOG=debug verdict run        # include table previews")]
    Run {
        /// Directory holding the county CSV files
        #[arg(long, short = 'i', default_value = "input", env = "VERDICT_INPUT")]
        input: PathBuf,

        /// Report workbook; existing sheets with other names are kept
        #[arg(long, short = 'o', default_value = "output/Analysis_output.xlsx", env = "VERDICT_OUTPUT")]
        output: PathBuf,

        /// Analysis plan (TOML); the built-in plan is used when omitted
        #[arg(long, short = 'p')]
        plan: Option<PathBuf>,

        /// Print a JSON run summary to stdout
        #[arg(long)]
        json: bool,

        /// Only log warnings and errors
        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// Parse and validate an analysis plan without running it
    Validate {
        /// Plan file (TOML)
        plan: PathBuf,
    },

    /// Print the built-in analysis plan as TOML
    Plan,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        None => {
            // No subcommand = show help
            eprintln!("Usage: verdict <command> [options]");
            eprintln!("       verdict --help for more information");
            Ok(())
        }
        Some(Commands::Run { input, output, plan, json, quiet }) => {
            init_logging(quiet);
            cmd_run(&input, &output, plan.as_deref(), json, quiet)
        }
        Some(Commands::Validate { plan }) => {
            init_logging(false);
            cmd_validate(&plan)
        }
        Some(Commands::Plan) => cmd_plan(),
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

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  verdict-analysis ", env!("CARGO_PKG_VERSION"),
        "\nbuild:   ", env!("BUILD_PROFILE"),
        "\ntarget:  ", env!("TARGET"),
    )
}

/// `RUST_LOG` wins when set; otherwise info, or warn with `--quiet`.
fn init_logging(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<AnalysisError> for CliError {
    fn from(err: AnalysisError) -> Self {
        let hint = match &err {
            AnalysisError::NoInputs(_) => {
                Some("put the county CSV files in the input directory, or pass --input DIR".to_string())
            }
            AnalysisError::MissingColumn { .. } => Some(format!(
                "required columns: {}",
                verdict_analysis::Field::ALL
                    .iter()
                    .filter(|f| f.is_required())
                    .map(|f| f.label())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
            AnalysisError::PlanParse(_) | AnalysisError::PlanValidation(_) => {
                Some("`verdict plan` prints the built-in plan as a starting point".to_string())
            }
            AnalysisError::Sink(_) => {
                Some("check that the report is not open in another program".to_string())
            }
            _ => None,
        };
        Self { code: analysis_exit_code(&err), message: err.to_string(), hint }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn read_plan(path: &Path) -> Result<AnalysisPlan, CliError> {
    let content = std::fs::read_to_string(path).map_err(|e| CliError {
        code: EXIT_PLAN_READ,
        message: format!("cannot read plan {}: {}", path.display(), e),
        hint: None,
    })?;
    Ok(AnalysisPlan::from_toml(&content)?)
}

#[derive(Serialize)]
struct RunOutput<'a> {
    input: String,
    output: String,
    sources: &'a [SourceSummary],
    #[serde(flatten)]
    summary: &'a RunSummary,
}

fn cmd_run(
    input: &Path,
    output: &Path,
    plan: Option<&Path>,
    json: bool,
    quiet: bool,
) -> Result<(), CliError> {
    if output.is_dir() {
        return Err(CliError::args(format!("output {} is a directory", output.display()))
            .with_hint("pass a workbook path such as output/Analysis_output.xlsx"));
    }

    // Plan problems are reported before any input is touched
    let plan = match plan {
        Some(path) => read_plan(path)?,
        None => AnalysisPlan::default(),
    };
    plan.validate()?;
    log::info!("plan '{}': {} analyses", plan.name, plan.analyses.len());

    let store = verdict_io::load_dir(input)?;
    log::info!("{} records from {} files", store.len(), store.sources().len());

    let mut report = XlsxReport::open(output)?;
    let summary = verdict_analysis::run(&plan, store.records(), &mut report)?;
    report.save()?;

    if json {
        let out = RunOutput {
            input: input.display().to_string(),
            output: output.display().to_string(),
            sources: store.sources(),
            summary: &summary,
        };
        let text = serde_json::to_string_pretty(&out).map_err(|e| CliError {
            code: EXIT_ERROR,
            message: format!("cannot serialize run summary: {}", e),
            hint: None,
        })?;
        println!("{}", text);
    } else if !quiet {
        println!(
            "{} records, {} sheets -> {}",
            summary.records,
            summary.sheets.len(),
            output.display()
        );
    }
    Ok(())
}

fn cmd_validate(path: &Path) -> Result<(), CliError> {
    let plan = read_plan(path)?;
    println!("ok: '{}' ({} analyses)", plan.name, plan.analyses.len());
    for name in plan.sheet_names() {
        println!("  {}", name);
    }
    Ok(())
}

fn cmd_plan() -> Result<(), CliError> {
    let text = AnalysisPlan::default().to_toml()?;
    print!("{}", text);
    Ok(())
}
