//! Single trial execution: sample, forward pass, critical path.
//!
//! A trial samples one duration per task, computes earliest finish times
//! with a longest-path forward pass over the topological order, then
//! reconstructs exactly one critical path by walking backward from the
//! latest-finishing sink. All ties (sink selection and predecessor
//! choice) break toward the lowest insertion index, so criticality
//! counts are a pure function of the inputs and the seed.

use crate::core::dag::TaskGraph;
use crate::core::sampler::{sample_duration, EstimateModel};
use crate::error::{Error, Result};
use fixedbitset::FixedBitSet;
use rand::Rng;

/// Reusable per-worker trial state.
///
/// Owns scratch buffers sized to the task count so repeated trials do
/// not allocate. The buffers hold the outcome of the most recent run.
pub struct TrialRunner {
    durations: Vec<f64>,
    finish: Vec<f64>,
    critical: FixedBitSet,
}

impl TrialRunner {
    /// Create a runner for a graph with the given task count.
    pub fn new(task_count: usize) -> Self {
        Self {
            durations: vec![0.0; task_count],
            finish: vec![0.0; task_count],
            critical: FixedBitSet::with_capacity(task_count),
        }
    }

    /// Execute one trial and return the project duration.
    ///
    /// `trial` is the global trial index, used only for diagnostics.
    ///
    /// # Errors
    ///
    /// `NumericOverflow` when a sampled duration or a finish time is
    /// non-finite; this indicates a data or programming bug and aborts
    /// the simulation.
    pub fn run<R: Rng + ?Sized>(
        &mut self,
        graph: &TaskGraph,
        model: EstimateModel,
        rng: &mut R,
        trial: usize,
    ) -> Result<f64> {
        let n = graph.task_count();
        debug_assert_eq!(self.durations.len(), n);

        // Sample durations in insertion order so the RNG stream is
        // independent of the topological order.
        for i in 0..n {
            let d = sample_duration(model, &graph.task(i).estimate, rng);
            if !d.is_finite() {
                return Err(Error::NumericOverflow {
                    task: graph.task(i).id.clone(),
                    trial,
                });
            }
            self.durations[i] = d;
        }

        // Forward longest-path pass.
        for &i in graph.topo_order() {
            let base = graph
                .predecessors(i)
                .iter()
                .fold(0.0_f64, |acc, &p| acc.max(self.finish[p]));
            let f = base + self.durations[i];
            if !f.is_finite() {
                return Err(Error::NumericOverflow {
                    task: graph.task(i).id.clone(),
                    trial,
                });
            }
            self.finish[i] = f;
        }

        // Sink: maximum finish, lowest index on ties.
        let mut sink = 0;
        for i in 1..n {
            if self.finish[i] > self.finish[sink] {
                sink = i;
            }
        }
        let total = self.finish[sink];

        // Backward walk: at each step move to the predecessor with the
        // largest finish time; ascending iteration keeps the lowest
        // index on ties.
        self.critical.clear();
        let mut current = sink;
        loop {
            self.critical.insert(current);
            let preds = graph.predecessors(current);
            if preds.is_empty() {
                break;
            }
            let mut best = preds[0];
            for &p in &preds[1..] {
                if self.finish[p] > self.finish[best] {
                    best = p;
                }
            }
            current = best;
        }

        Ok(total)
    }

    /// Sampled durations of the most recent trial.
    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    /// Earliest finish times of the most recent trial.
    pub fn finish_times(&self) -> &[f64] {
        &self.finish
    }

    /// Critical-path membership of the most recent trial.
    pub fn critical(&self) -> &FixedBitSet {
        &self.critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sampler::SplitMix64;
    use crate::core::task::{Estimate, Task};

    fn fixed_task(id: &str, duration: f64, preds: &[&str]) -> Task {
        Task::new(
            id,
            &format!("{} task", id),
            Estimate::new(duration, duration, duration),
        )
        .with_predecessors(preds)
    }

    fn run_trial(graph: &TaskGraph) -> (f64, TrialRunner) {
        let mut runner = TrialRunner::new(graph.task_count());
        let mut rng = SplitMix64::new(0);
        let total = runner
            .run(graph, EstimateModel::BetaPert, &mut rng, 0)
            .unwrap();
        (total, runner)
    }

    #[test]
    fn test_single_task() {
        let graph = TaskGraph::build(vec![fixed_task("A", 3.0, &[])]).unwrap();
        let (total, runner) = run_trial(&graph);
        assert_eq!(total, 3.0);
        assert!(runner.critical().contains(0));
    }

    #[test]
    fn test_chain_finish_times() {
        let graph = TaskGraph::build(vec![
            fixed_task("A", 1.0, &[]),
            fixed_task("B", 2.0, &["A"]),
            fixed_task("C", 3.0, &["B"]),
        ])
        .unwrap();
        let (total, runner) = run_trial(&graph);
        assert_eq!(runner.finish_times(), &[1.0, 3.0, 6.0]);
        assert_eq!(total, 6.0);
        // Whole chain is critical.
        for i in 0..3 {
            assert!(runner.critical().contains(i));
        }
    }

    #[test]
    fn test_parallel_paths_critical_path() {
        // A -> C, B -> C with B much longer: critical path is B, C.
        let graph = TaskGraph::build(vec![
            fixed_task("A", 1.0, &[]),
            fixed_task("B", 5.0, &[]),
            fixed_task("C", 1.0, &["A", "B"]),
        ])
        .unwrap();
        let (total, runner) = run_trial(&graph);
        assert_eq!(total, 6.0);
        assert!(!runner.critical().contains(0));
        assert!(runner.critical().contains(1));
        assert!(runner.critical().contains(2));
    }

    #[test]
    fn test_tie_breaks_choose_lowest_index() {
        // Two identical parallel chains into a sink; the reconstruction
        // must pick the first-inserted one.
        let graph = TaskGraph::build(vec![
            fixed_task("A1", 2.0, &[]),
            fixed_task("A2", 2.0, &[]),
            fixed_task("S", 1.0, &["A1", "A2"]),
        ])
        .unwrap();
        let (total, runner) = run_trial(&graph);
        assert_eq!(total, 3.0);
        assert!(runner.critical().contains(0));
        assert!(!runner.critical().contains(1));
        assert!(runner.critical().contains(2));
    }

    #[test]
    fn test_sink_tie_break_lowest_index() {
        // Two disconnected tasks with equal durations; the first is the
        // chosen sink.
        let graph = TaskGraph::build(vec![
            fixed_task("A", 4.0, &[]),
            fixed_task("B", 4.0, &[]),
        ])
        .unwrap();
        let (total, runner) = run_trial(&graph);
        assert_eq!(total, 4.0);
        assert!(runner.critical().contains(0));
        assert!(!runner.critical().contains(1));
    }

    #[test]
    fn test_zero_duration_task_not_critical() {
        // Zero-duration task on a short parallel branch never appears on
        // the critical path of a non-trivial project.
        let graph = TaskGraph::build(vec![
            fixed_task("Z", 0.0, &[]),
            fixed_task("B", 5.0, &[]),
            fixed_task("C", 1.0, &["Z", "B"]),
        ])
        .unwrap();
        let (total, runner) = run_trial(&graph);
        assert_eq!(total, 6.0);
        assert!(!runner.critical().contains(0));
    }

    #[test]
    fn test_all_zero_project() {
        let graph = TaskGraph::build(vec![
            fixed_task("A", 0.0, &[]),
            fixed_task("B", 0.0, &["A"]),
        ])
        .unwrap();
        let (total, runner) = run_trial(&graph);
        assert_eq!(total, 0.0);
        // A path is still reported even when everything is zero.
        assert!(runner.critical().count_ones(..) >= 1);
    }

    #[test]
    fn test_project_duration_at_least_max_duration() {
        let tasks = vec![
            Task::new("A", "A", Estimate::new(1.0, 2.0, 4.0)),
            Task::new("B", "B", Estimate::new(2.0, 3.0, 6.0)).with_predecessors(&["A"]),
            Task::new("C", "C", Estimate::new(0.5, 1.0, 2.0)).with_predecessors(&["A"]),
        ];
        let graph = TaskGraph::build(tasks).unwrap();
        let mut runner = TrialRunner::new(graph.task_count());
        for seed in 0..200 {
            let mut rng = SplitMix64::new(seed);
            let total = runner
                .run(&graph, EstimateModel::BetaPert, &mut rng, seed as usize)
                .unwrap();
            let max_d = runner.durations().iter().cloned().fold(0.0, f64::max);
            assert!(total >= max_d - 1e-12);
        }
    }

    #[test]
    fn test_critical_path_has_zero_slack() {
        // Sum of durations along the reported path equals the project
        // duration.
        let tasks = vec![
            Task::new("A", "A", Estimate::new(1.0, 2.0, 3.0)),
            Task::new("B", "B", Estimate::new(1.0, 2.0, 3.0)).with_predecessors(&["A"]),
            Task::new("C", "C", Estimate::new(1.0, 2.0, 3.0)),
            Task::new("D", "D", Estimate::new(1.0, 2.0, 3.0)).with_predecessors(&["B", "C"]),
        ];
        let graph = TaskGraph::build(tasks).unwrap();
        let mut runner = TrialRunner::new(graph.task_count());
        for seed in 0..100 {
            let mut rng = SplitMix64::new(seed);
            let total = runner
                .run(&graph, EstimateModel::BetaPert, &mut rng, 0)
                .unwrap();
            let path_sum: f64 = (0..graph.task_count())
                .filter(|&i| runner.critical().contains(i))
                .map(|i| runner.durations()[i])
                .sum();
            assert!(
                (path_sum - total).abs() < 1e-9,
                "path sum {} != project duration {}",
                path_sum,
                total
            );
        }
    }
}
