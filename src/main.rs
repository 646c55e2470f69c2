use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

use clap::Parser;

use horizon::config::SimConfig;
use horizon::core::{simulation, EstimateModel, RunOptions, SimEvent, TaskGraph};
use horizon::report::{self, SimulationReport};
use horizon::{hlog, hlog_error, table, Result};

/// Horizon - Monte Carlo schedule forecaster with critical path analysis
#[derive(Parser, Debug)]
#[command(name = "horizon")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    HORIZON_DEBUG=1     Enable debug logging (alternative to --debug)"
)]
pub struct Cli {
    /// Path to the task table (CSV)
    pub table: PathBuf,

    /// Path to a TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output directory for the CSV and JSON reports
    #[arg(long, default_value = "output")]
    pub out: PathBuf,

    /// Master seed (overrides the configuration file)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of trials (overrides the configuration file)
    #[arg(long)]
    pub runs: Option<usize>,

    /// Worker thread count (overrides the configuration file)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Enable debug logging (writes to ~/.horizon/horizon.log)
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Suppress progress output and the executive summary
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

fn main() {
    let cli = Cli::parse();
    horizon::log::init(cli.debug);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            hlog_error!("run aborted: {}", e);
            eprintln!("error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    hlog!("Horizon starting: table={}", cli.table.display());

    let mut config = SimConfig::load_or_default(cli.config.as_deref())?;
    if let Some(runs) = cli.runs {
        config.simulation_runs = runs;
    }
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    if let Some(workers) = cli.workers {
        config.workers = Some(workers);
    }
    config.validate()?;

    let tasks = table::read_tasks(&cli.table)?;
    let graph = TaskGraph::build(tasks)?;
    hlog!(
        "Loaded {} tasks, {} dependencies",
        graph.task_count(),
        graph.dependency_count()
    );

    let seed = config.seed.unwrap_or_else(rand::random::<u64>);
    let opts = RunOptions {
        trials: config.simulation_runs,
        seed,
        workers: config.effective_workers(),
        model: EstimateModel::BetaPert,
        confidence_levels: config.confidence_levels.clone(),
    };

    if !cli.quiet {
        println!(
            "Running {} trials across {} worker(s), seed {}...",
            opts.trials, opts.workers, opts.seed
        );
    }

    let report = execute(graph, opts, cli.quiet)?;

    report::write_csv_files(&report, &cli.out)?;
    report::write_json(&report, &cli.out.join("simulation_report.json"))?;
    hlog!(
        "Reports written to {} ({} trials completed)",
        cli.out.display(),
        report.meta.n_trials_completed
    );

    if !cli.quiet {
        print_summary(&report, &cli.out);
    }

    Ok(if report.meta.partial { 130 } else { 0 })
}

/// Run the simulation on a worker thread while the main thread drains
/// progress events for console display.
fn execute(graph: TaskGraph, opts: RunOptions, quiet: bool) -> Result<SimulationReport> {
    let cancel = Arc::new(AtomicBool::new(false));
    let (tx, rx) = crossbeam_channel::bounded::<SimEvent>(16);

    let sim_cancel = Arc::clone(&cancel);
    let handle = thread::spawn(move || {
        let result = simulation::run(&graph, &opts, &sim_cancel, Some(&tx));
        drop(tx);
        result
    });

    // The channel closes when the simulation thread drops its sender.
    for event in rx.iter() {
        if quiet {
            continue;
        }
        if let SimEvent::Progress { completed, total } = event {
            if completed % 1000 == 0 {
                println!("  progress: {}/{}", completed, total);
            }
        }
    }

    handle
        .join()
        .unwrap_or_else(|_| Err(horizon::Error::TaskJoin("simulation thread panicked".to_string())))
}

/// Print the executive summary after a completed run.
fn print_summary(report: &SimulationReport, out_dir: &std::path::Path) {
    println!();
    println!("==============================================================");
    println!("  Schedule forecast ({} trials)", report.duration.n);
    println!("==============================================================");
    println!();
    println!("Duration:");
    println!(
        "  mean {:.1} +/- {:.1}, range {:.1} - {:.1}",
        report.duration.mean, report.duration.std_dev, report.duration.min, report.duration.max
    );
    println!();
    println!("Key percentiles:");
    for p in [50u8, 75, 80, 90, 95] {
        println!("  P{}: {:.1}", p, report.percentile(p));
    }

    let critical: Vec<_> = report
        .task_criticality
        .iter()
        .filter(|t| t.criticality_pct > 50.0)
        .take(5)
        .collect();
    println!();
    println!("Top critical tasks (>50% of trials):");
    if critical.is_empty() {
        println!("  none");
    }
    for (i, task) in critical.iter().enumerate() {
        println!(
            "  {}. {} ({}) - {:.1}% critical",
            i + 1,
            task.name,
            task.category,
            task.criticality_pct
        );
    }

    println!();
    println!("Top risk drivers:");
    for (i, task) in report.sensitivity.iter().take(5).enumerate() {
        println!(
            "  {}. {} - impact {:.3}, correlation {:.3}",
            i + 1,
            task.name,
            task.impact_score,
            task.correlation
        );
    }

    println!();
    println!("Buffer recommendations:");
    for scenario in report.scenarios.iter().rev() {
        println!(
            "  {} ({}%): plan for {:.1} (+{:.1} buffer)",
            scenario.name, scenario.success_probability, scenario.target, scenario.buffer
        );
    }

    println!();
    println!("Reports written to {}", out_dir.display());
    if report.meta.partial {
        println!(
            "NOTE: run was cancelled after {} trials; results are partial.",
            report.meta.n_trials_completed
        );
    }
}
