//! Binary entry point for the graphswap CLI.
#![forbid(unsafe_code)]

#[path = "cli/ui.rs"]
mod ui;

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use graphswap::cost::calibrate::{self, CalibrateOptions, MEASUREMENTS};
use graphswap::cost::{CalibrationTable, CostModel};
use graphswap::logging::init_logging;
use graphswap::storage::TraceStorage;
use graphswap::trace::{load_trace, replay, ReplaySummary};
use graphswap::{ContainerAssignment, HotSwapConfig, HotSwapEngine};
use serde::Serialize;

use ui::{Theme, Ui};

#[derive(Parser, Debug)]
#[command(
    name = "graphswap",
    version,
    about = "Calibrate and replay profiling-driven container swaps",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        env = "GRAPHSWAP_LOG",
        default_value = "warn",
        help = "Log filter directive (e.g. info, graphswap=debug)"
    )]
    log: String,

    #[arg(long, global = true, value_enum, default_value_t = Theme::Auto)]
    theme: Theme,

    #[arg(long, global = true, help = "Suppress decoration and progress bars")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Measure container operations and write a calibration table")]
    Calibrate {
        #[arg(long, value_name = "FILE", help = "Output TOML file")]
        out: PathBuf,
        #[arg(long, default_value_t = 1024, help = "Elements per measured container")]
        size: usize,
        #[arg(long, default_value_t = 5, help = "Repetitions per measurement")]
        rounds: usize,
        #[arg(long, default_value_t = 0x5eed, help = "Workload seed")]
        seed: u64,
    },
    #[command(about = "Replay a recorded access trace through the engine")]
    Replay {
        #[arg(long, value_name = "FILE", help = "JSON-lines trace")]
        trace: PathBuf,
        #[arg(long, value_name = "FILE", help = "Engine configuration (TOML)")]
        config: Option<PathBuf>,
        #[arg(long, value_name = "FILE", help = "Calibration table (TOML)")]
        calibration: Option<PathBuf>,
    },
    #[command(about = "List the candidate assignments a configuration scores")]
    Candidates {
        #[arg(long, value_name = "FILE", help = "Engine configuration (TOML)")]
        config: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct CalibrateReport {
    path: String,
    entries: usize,
    size: usize,
    rounds: usize,
}

#[derive(Serialize)]
struct CandidatesReport {
    count: usize,
    candidates: Vec<ContainerAssignment>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log)?;
    let quiet = cli.quiet || cli.format == OutputFormat::Json;
    let ui = Ui::new(cli.theme, quiet);

    match cli.command {
        Command::Calibrate {
            out,
            size,
            rounds,
            seed,
        } => {
            let options = CalibrateOptions::default()
                .size(size)
                .rounds(rounds)
                .seed(seed);
            let bar = ui.progress(MEASUREMENTS as u64, "calibrate");
            let table = calibrate::run_with_progress(&options, |kind, op| {
                bar.set_message(format!("{kind}/{op}"));
                bar.inc(1);
            })?;
            bar.finish_and_clear();
            write_table(&out, &table)?;
            let report = CalibrateReport {
                path: out.display().to_string(),
                entries: table.len(),
                size,
                rounds,
            };
            emit(cli.format, &report, || {
                ui.success(&format!(
                    "Wrote {} calibration entries to {}",
                    report.entries, report.path
                ));
            })?;
        }
        Command::Replay {
            trace,
            config,
            calibration,
        } => {
            let config = HotSwapConfig::load_or_default(config.as_deref())?;
            let model = match calibration {
                Some(path) => CostModel::new(CalibrationTable::load(&path)?),
                None => CostModel::builtin(),
            };
            let records = load_trace(&trace)?;
            let storage = TraceStorage::new(ContainerAssignment::default())?;
            let mut engine = HotSwapEngine::new(config, model)?;
            let summary = replay(&mut engine, &storage, &records);
            emit(cli.format, &summary, || print_replay_text(&ui, &summary))?;
        }
        Command::Candidates { config } => {
            let config = HotSwapConfig::load_or_default(config.as_deref())?;
            let candidates = config.candidates.enumerate()?;
            let report = CandidatesReport {
                count: candidates.len(),
                candidates,
            };
            emit(cli.format, &report, || {
                ui.list(
                    &format!("Candidates ({})", report.count),
                    report.candidates.iter().map(ToString::to_string),
                );
            })?;
        }
    }
    Ok(())
}

fn write_table(path: &Path, table: &CalibrationTable) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, table.to_toml_string()?)?;
    Ok(())
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: FnOnce(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn print_replay_text(ui: &Ui, summary: &ReplaySummary) {
    for outcome in &summary.outcomes {
        let detail = if outcome.swapped {
            format!("{} ({})", outcome.assignment, outcome.reason)
        } else {
            outcome.reason.to_string()
        };
        ui.decision(outcome.batch, outcome.swapped, &detail);
    }
    let first_switch = summary
        .first_switch
        .map_or_else(|| "-".to_string(), |a| a.to_string());
    ui.section(
        "Summary",
        [
            ("batches", summary.outcomes.len().to_string()),
            ("swaps", summary.swaps_done.to_string()),
            ("first switch", first_switch),
            ("final", summary.final_assignment.to_string()),
        ],
    );
}
