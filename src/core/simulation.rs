//! Simulation orchestration: N trials across W workers.
//!
//! Trials are partitioned into contiguous index ranges, one per worker.
//! Each worker owns a private trial runner and aggregate and seeds a
//! fresh RNG per trial from `derive_seed(master, trial_index)`, so the
//! set of executed trials is a pure function of `(master_seed, N)` and
//! does not depend on the worker count or scheduling. The coordinator
//! merges worker aggregates in worker order and finalizes the report.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use crossbeam_channel::Sender;

use crate::core::aggregate::Aggregate;
use crate::core::dag::TaskGraph;
use crate::core::sampler::{derive_seed, EstimateModel, SplitMix64};
use crate::core::trial::TrialRunner;
use crate::error::{Error, Result};
use crate::hlog_debug;
use crate::report::{RunMeta, SimulationReport};

/// How many trials a worker completes between progress reports and
/// cancellation checks of the shared counter.
const PROGRESS_STRIDE: usize = 250;

/// Options for one simulation run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Number of Monte Carlo trials.
    pub trials: usize,
    /// Master seed for the per-trial seed derivation.
    pub seed: u64,
    /// Worker thread count (clamped to the trial count).
    pub workers: usize,
    /// Distribution family for duration sampling.
    pub model: EstimateModel,
    /// Confidence levels echoed into the report meta.
    pub confidence_levels: Vec<f64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            trials: crate::config::DEFAULT_RUNS,
            seed: 0,
            workers: 1,
            model: EstimateModel::BetaPert,
            confidence_levels: Vec::new(),
        }
    }
}

/// Events emitted while a simulation is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    /// Progress update; emitted roughly every few hundred trials.
    Progress {
        /// Trials completed so far across all workers.
        completed: usize,
        /// Total trials requested.
        total: usize,
    },
    /// All workers have finished.
    Finished,
}

/// Run the simulation and produce the final report.
///
/// `cancel` is checked between trials; when it becomes true the workers
/// stop and the result is marked partial. A numeric overflow in any
/// trial aborts the whole run with an error instead.
pub fn run(
    graph: &TaskGraph,
    opts: &RunOptions,
    cancel: &AtomicBool,
    progress: Option<&Sender<SimEvent>>,
) -> Result<SimulationReport> {
    if opts.trials == 0 {
        return Err(Error::Config("trials must be >= 1".to_string()));
    }
    if opts.workers == 0 {
        return Err(Error::Config("workers must be >= 1".to_string()));
    }

    let total = opts.trials;
    let workers = opts.workers.min(total);
    let chunk = total.div_ceil(workers);
    let completed = AtomicUsize::new(0);

    hlog_debug!(
        "simulation start: trials={}, workers={}, seed={}, model={}",
        total,
        workers,
        opts.seed,
        opts.model
    );

    let results: Vec<Result<Aggregate>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|w| {
                let start = w * chunk;
                let end = (start + chunk).min(total);
                let completed = &completed;
                let tx = progress;
                scope.spawn(move || {
                    run_range(graph, opts, start..end, cancel, completed, total, tx)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(Error::TaskJoin("worker thread panicked".to_string())))
            })
            .collect()
    });

    // Merge in worker order so the fold is deterministic.
    let mut merged = Aggregate::new(graph.task_count());
    for result in results {
        merged.merge(result?);
    }

    if let Some(tx) = progress {
        let _ = tx.try_send(SimEvent::Finished);
    }

    let done = merged.trials();
    let meta = RunMeta {
        n_trials_completed: done,
        seed_used: opts.seed,
        partial: done < total,
        task_count: graph.task_count(),
        confidence_levels: opts.confidence_levels.clone(),
        generated_at: chrono::Utc::now(),
    };
    hlog_debug!("simulation done: completed={}/{}", done, total);
    Ok(merged.finalize(graph, meta))
}

/// Worker loop over a contiguous range of global trial indices.
#[allow(clippy::too_many_arguments)]
fn run_range(
    graph: &TaskGraph,
    opts: &RunOptions,
    range: std::ops::Range<usize>,
    cancel: &AtomicBool,
    completed: &AtomicUsize,
    total: usize,
    progress: Option<&Sender<SimEvent>>,
) -> Result<Aggregate> {
    let mut runner = TrialRunner::new(graph.task_count());
    let mut aggregate = Aggregate::new(graph.task_count());
    let mut since_report = 0;

    for trial in range {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let mut rng = SplitMix64::new(derive_seed(opts.seed, trial as u64));
        let duration = runner.run(graph, opts.model, &mut rng, trial)?;
        aggregate.record(duration, &runner);

        since_report += 1;
        if since_report == PROGRESS_STRIDE {
            since_report = 0;
            let done = completed.fetch_add(PROGRESS_STRIDE, Ordering::Relaxed) + PROGRESS_STRIDE;
            if let Some(tx) = progress {
                let _ = tx.try_send(SimEvent::Progress {
                    completed: done,
                    total,
                });
            }
        }
    }
    completed.fetch_add(since_report, Ordering::Relaxed);
    Ok(aggregate)
}
