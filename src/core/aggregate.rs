//! Trial aggregation and statistics finalization.
//!
//! The aggregate keeps the full project-duration sample (for exact
//! nearest-rank percentiles), per-task criticality counts, the moment
//! sums needed for Pearson correlation between task and project
//! durations, and enough per-task mass to pool category statistics.
//! Sub-aggregates from parallel workers compose by addition and sample
//! concatenation, so the merge is associative and the coordinator can
//! fold worker results in a fixed order.

use crate::core::dag::TaskGraph;
use crate::core::trial::TrialRunner;
use crate::report::{
    use_case_label, BufferEntry, CategorySummary, DistributionPoint, DurationSummary,
    PriorityLevel, RiskAnalysis, RiskLevel, RunMeta, Scenario, SensitivityEntry,
    SimulationReport, TaskCriticality, REPORTED_PERCENTILES,
};

/// Running aggregate state over completed trials.
#[derive(Debug, Clone)]
pub struct Aggregate {
    /// Number of trials folded in.
    n: usize,
    /// Project duration of every trial.
    sample: Vec<f64>,
    /// Trials in which task i lay on the selected critical path.
    crit_counts: Vec<u64>,
    /// Per-task duration sums.
    sum_d: Vec<f64>,
    /// Per-task squared duration sums.
    sum_d2: Vec<f64>,
    /// Per-task sums of duration times project duration.
    sum_dd: Vec<f64>,
    /// Sum of project durations.
    sum_total: f64,
    /// Sum of squared project durations.
    sum_total2: f64,
}

impl Aggregate {
    /// Create an empty aggregate for the given task count.
    pub fn new(task_count: usize) -> Self {
        Self {
            n: 0,
            sample: Vec::new(),
            crit_counts: vec![0; task_count],
            sum_d: vec![0.0; task_count],
            sum_d2: vec![0.0; task_count],
            sum_dd: vec![0.0; task_count],
            sum_total: 0.0,
            sum_total2: 0.0,
        }
    }

    /// Number of trials recorded.
    pub fn trials(&self) -> usize {
        self.n
    }

    /// Criticality count for a task.
    pub fn criticality_count(&self, index: usize) -> u64 {
        self.crit_counts[index]
    }

    /// Fold one completed trial into the aggregate.
    pub fn record(&mut self, project_duration: f64, trial: &TrialRunner) {
        self.n += 1;
        self.sample.push(project_duration);
        self.sum_total += project_duration;
        self.sum_total2 += project_duration * project_duration;

        let durations = trial.durations();
        for (i, &d) in durations.iter().enumerate() {
            self.sum_d[i] += d;
            self.sum_d2[i] += d * d;
            self.sum_dd[i] += d * project_duration;
        }
        for i in trial.critical().ones() {
            self.crit_counts[i] += 1;
        }
    }

    /// Merge another aggregate into this one.
    ///
    /// Counts and moment sums add; samples concatenate. The sample is
    /// sorted at finalization, so merge order does not affect any
    /// sample-derived statistic.
    pub fn merge(&mut self, other: Aggregate) {
        self.n += other.n;
        self.sample.extend(other.sample);
        self.sum_total += other.sum_total;
        self.sum_total2 += other.sum_total2;
        for i in 0..self.crit_counts.len() {
            self.crit_counts[i] += other.crit_counts[i];
            self.sum_d[i] += other.sum_d[i];
            self.sum_d2[i] += other.sum_d2[i];
            self.sum_dd[i] += other.sum_dd[i];
        }
    }

    /// Produce the final report from the accumulated state.
    pub fn finalize(mut self, graph: &TaskGraph, meta: RunMeta) -> SimulationReport {
        self.sample
            .sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let n = self.n;
        let nf = n as f64;

        let mean = if n > 0 { self.sum_total / nf } else { 0.0 };
        let std_dev = if n > 1 {
            ((self.sum_total2 - nf * mean * mean) / (nf - 1.0)).max(0.0).sqrt()
        } else {
            0.0
        };
        let duration = DurationSummary {
            mean,
            std_dev,
            min: self.sample.first().copied().unwrap_or(0.0),
            max: self.sample.last().copied().unwrap_or(0.0),
            n,
        };

        let percentiles = REPORTED_PERCENTILES
            .iter()
            .map(|&p| (p, nearest_rank(&self.sample, p)))
            .collect::<std::collections::BTreeMap<u8, f64>>();
        let baseline = percentiles.get(&50).copied().unwrap_or(0.0);

        let buffers = REPORTED_PERCENTILES
            .iter()
            .map(|&p| {
                let days = percentiles[&p];
                let buffer_days = (days - baseline).max(0.0);
                let buffer_pct = if baseline > 0.0 {
                    buffer_days / baseline * 100.0
                } else {
                    0.0
                };
                BufferEntry {
                    percentile: p,
                    days,
                    buffer_days,
                    buffer_pct,
                    use_case_label: use_case_label(p).to_string(),
                }
            })
            .collect();

        // Per-task statistics.
        let task_count = graph.task_count();
        let mut crit_rows = Vec::with_capacity(task_count);
        let mut sens_rows = Vec::with_capacity(task_count);
        let mut impacts = vec![0.0; task_count];
        let mut crit_pcts = vec![0.0; task_count];
        for i in 0..task_count {
            let task = graph.task(i);
            let pct = if n > 0 {
                self.crit_counts[i] as f64 / nf * 100.0
            } else {
                0.0
            };
            crit_pcts[i] = pct;
            let mean_d = if n > 0 { self.sum_d[i] / nf } else { 0.0 };
            let var_d = if n > 1 {
                ((self.sum_d2[i] - nf * mean_d * mean_d) / (nf - 1.0)).max(0.0)
            } else {
                0.0
            };
            let correlation = pearson(
                nf,
                self.sum_total,
                self.sum_total2,
                self.sum_d[i],
                self.sum_d2[i],
                self.sum_dd[i],
            );
            let impact = correlation * var_d.sqrt();
            impacts[i] = impact;

            let priority = PriorityLevel::from_criticality(pct);
            crit_rows.push(TaskCriticality {
                id: task.id.clone(),
                name: task.name.clone(),
                category: task.category.clone(),
                criticality_pct: pct,
                mean_duration: mean_d,
                priority_level: priority,
                resource_allocation_hint: priority.resource_hint().to_string(),
            });
            sens_rows.push(SensitivityEntry {
                id: task.id.clone(),
                name: task.name.clone(),
                category: task.category.clone(),
                impact_score: impact,
                correlation,
                variance: var_d,
                risk_level: RiskLevel::from_impact(impact),
            });
        }
        // Stable sorts keep insertion order among exact ties.
        crit_rows.sort_by(|a, b| {
            b.criticality_pct
                .partial_cmp(&a.criticality_pct)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sens_rows.sort_by(|a, b| {
            b.impact_score
                .partial_cmp(&a.impact_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let categories = self.category_rollups(graph, &impacts, &crit_pcts);

        let scenarios = [
            ("Aggressive", 50u8, "Internal stretch goals"),
            ("Moderate", 75, "Team planning"),
            ("Conservative", 90, "Client commitments"),
            ("Very_Conservative", 95, "High-risk projects"),
        ]
        .iter()
        .map(|&(name, p, recommended)| {
            let target = percentiles[&p];
            Scenario {
                name: name.to_string(),
                target,
                success_probability: p,
                buffer: (target - baseline).max(0.0),
                recommended_for: recommended.to_string(),
            }
        })
        .collect();

        let risk = risk_analysis(&self.sample, mean);

        let duration_distribution = self
            .sample
            .iter()
            .enumerate()
            .map(|(rank, &d)| DistributionPoint {
                duration: d,
                cumulative_probability: (rank + 1) as f64 / nf.max(1.0),
            })
            .collect();

        SimulationReport {
            duration,
            percentiles,
            buffers,
            task_criticality: crit_rows,
            sensitivity: sens_rows,
            categories,
            scenarios,
            duration_distribution,
            risk,
            meta,
        }
    }

    /// Category rollups pooled over all trials, in first-appearance order.
    fn category_rollups(
        &self,
        graph: &TaskGraph,
        impacts: &[f64],
        crit_pcts: &[f64],
    ) -> Vec<CategorySummary> {
        struct CatAccum {
            task_count: usize,
            sum: f64,
            sum_sq: f64,
            impact: f64,
            crit_pct_sum: f64,
        }

        let mut order: Vec<String> = Vec::new();
        let mut accums: std::collections::HashMap<String, CatAccum> =
            std::collections::HashMap::new();
        for (i, task) in graph.tasks().enumerate() {
            let entry = accums.entry(task.category.clone()).or_insert_with(|| {
                order.push(task.category.clone());
                CatAccum {
                    task_count: 0,
                    sum: 0.0,
                    sum_sq: 0.0,
                    impact: 0.0,
                    crit_pct_sum: 0.0,
                }
            });
            entry.task_count += 1;
            entry.sum += self.sum_d[i];
            entry.sum_sq += self.sum_d2[i];
            entry.impact += impacts[i];
            entry.crit_pct_sum += crit_pcts[i];
        }

        order
            .into_iter()
            .map(|name| {
                let acc = &accums[&name];
                // Realized durations pooled across tasks and trials.
                let m = (acc.task_count * self.n) as f64;
                let mean = if m > 0.0 { acc.sum / m } else { 0.0 };
                let std = if m > 1.0 {
                    ((acc.sum_sq - m * mean * mean) / (m - 1.0)).max(0.0).sqrt()
                } else {
                    0.0
                };
                CategorySummary {
                    name,
                    task_count: acc.task_count,
                    mean_duration: mean,
                    std_duration: std,
                    risk_contribution: acc.impact,
                    avg_criticality_pct: acc.crit_pct_sum / acc.task_count as f64,
                }
            })
            .collect()
    }
}

/// Nearest-rank percentile over a sorted sample (zero-based rank
/// `floor(P/100 * (N-1))`), always an observed value.
fn nearest_rank(sorted: &[f64], percentile: u8) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (percentile as f64 / 100.0 * (sorted.len() - 1) as f64).floor() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

/// Pearson correlation from moment sums; 0 when either side is constant.
fn pearson(n: f64, sum_y: f64, sum_y2: f64, sum_x: f64, sum_x2: f64, sum_xy: f64) -> f64 {
    if n < 2.0 {
        return 0.0;
    }
    let num = n * sum_xy - sum_y * sum_x;
    let den = ((n * sum_y2 - sum_y * sum_y) * (n * sum_x2 - sum_x * sum_x)).max(0.0).sqrt();
    if den > 0.0 {
        (num / den).clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Tail-risk figures from the sorted duration sample.
fn risk_analysis(sorted: &[f64], mean: f64) -> RiskAnalysis {
    let n = sorted.len();
    if n == 0 {
        return RiskAnalysis {
            probability_over_mean: 0.0,
            probability_over_150_pct: 0.0,
            probability_over_200_pct: 0.0,
            value_at_risk_95: 0.0,
            expected_shortfall_95: 0.0,
        };
    }
    let nf = n as f64;
    let frac_over = |threshold: f64| sorted.iter().filter(|&&d| d > threshold).count() as f64 / nf;
    let var_95 = nearest_rank(sorted, 95);
    let tail: Vec<f64> = sorted.iter().copied().filter(|&d| d >= var_95).collect();
    let shortfall = tail.iter().sum::<f64>() / tail.len() as f64;
    RiskAnalysis {
        probability_over_mean: frac_over(mean),
        probability_over_150_pct: frac_over(mean * 1.5),
        probability_over_200_pct: frac_over(mean * 2.0),
        value_at_risk_95: var_95,
        expected_shortfall_95: shortfall,
    }
}
