//! Result object and its externally fixed serializations.
//!
//! The column names and orderings of the CSV files are consumed by
//! downstream tooling and must not change. No computation happens here
//! beyond formatting; all statistics are produced by the aggregator.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::table::escape_field;

/// Percentiles reported by the simulation, in ascending order.
pub const REPORTED_PERCENTILES: [u8; 7] = [10, 25, 50, 75, 80, 90, 95];

/// Summary statistics of the project duration distribution.
#[derive(Debug, Clone, Serialize)]
pub struct DurationSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub n: usize,
}

/// One row of the percentile/buffer table.
#[derive(Debug, Clone, Serialize)]
pub struct BufferEntry {
    pub percentile: u8,
    pub days: f64,
    pub buffer_days: f64,
    pub buffer_pct: f64,
    pub use_case_label: String,
}

/// Planning use-case label for a reported percentile.
pub fn use_case_label(percentile: u8) -> &'static str {
    match percentile {
        10 => "Optimistic scenario",
        25 => "Aggressive planning",
        50 => "Baseline estimate",
        75 => "Internal planning",
        80 => "Moderate buffer",
        90 => "External commitments",
        _ => "Conservative buffer",
    }
}

/// Priority bands derived from criticality percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PriorityLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl PriorityLevel {
    /// Band for a criticality percentage in [0, 100].
    pub fn from_criticality(pct: f64) -> Self {
        if pct > 80.0 {
            PriorityLevel::Critical
        } else if pct > 50.0 {
            PriorityLevel::High
        } else if pct > 20.0 {
            PriorityLevel::Medium
        } else {
            PriorityLevel::Low
        }
    }

    /// Resource allocation hint for the same band.
    pub fn resource_hint(&self) -> &'static str {
        match self {
            PriorityLevel::Critical => "Best resources",
            PriorityLevel::High | PriorityLevel::Medium => "Monitor closely",
            PriorityLevel::Low => "Standard",
        }
    }
}

impl std::fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriorityLevel::Critical => write!(f, "Critical"),
            PriorityLevel::High => write!(f, "High"),
            PriorityLevel::Medium => write!(f, "Medium"),
            PriorityLevel::Low => write!(f, "Low"),
        }
    }
}

/// Risk bands derived from the impact score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    /// Band for an impact score.
    pub fn from_impact(score: f64) -> Self {
        if score > 1.0 {
            RiskLevel::High
        } else if score >= 0.4 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::High => write!(f, "High"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::Low => write!(f, "Low"),
        }
    }
}

/// Per-task criticality row, sorted by criticality descending.
#[derive(Debug, Clone, Serialize)]
pub struct TaskCriticality {
    pub id: String,
    pub name: String,
    pub category: String,
    pub criticality_pct: f64,
    pub mean_duration: f64,
    pub priority_level: PriorityLevel,
    pub resource_allocation_hint: String,
}

/// Per-task sensitivity row, sorted by impact score descending.
#[derive(Debug, Clone, Serialize)]
pub struct SensitivityEntry {
    pub id: String,
    pub name: String,
    pub category: String,
    pub impact_score: f64,
    pub correlation: f64,
    pub variance: f64,
    pub risk_level: RiskLevel,
}

/// Per-category rollup.
#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub name: String,
    pub task_count: usize,
    pub mean_duration: f64,
    pub std_duration: f64,
    pub risk_contribution: f64,
    pub avg_criticality_pct: f64,
}

/// Named planning scenario keyed to a percentile.
#[derive(Debug, Clone, Serialize)]
pub struct Scenario {
    pub name: String,
    pub target: f64,
    pub success_probability: u8,
    pub buffer: f64,
    pub recommended_for: String,
}

/// One point of the sorted duration sample.
#[derive(Debug, Clone, Serialize)]
pub struct DistributionPoint {
    pub duration: f64,
    pub cumulative_probability: f64,
}

/// Tail-risk figures computed from the duration sample.
#[derive(Debug, Clone, Serialize)]
pub struct RiskAnalysis {
    pub probability_over_mean: f64,
    pub probability_over_150_pct: f64,
    pub probability_over_200_pct: f64,
    pub value_at_risk_95: f64,
    pub expected_shortfall_95: f64,
}

/// Run metadata.
#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub n_trials_completed: usize,
    pub seed_used: u64,
    pub partial: bool,
    pub task_count: usize,
    pub confidence_levels: Vec<f64>,
    pub generated_at: DateTime<Utc>,
}

/// The complete simulation result.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub duration: DurationSummary,
    pub percentiles: BTreeMap<u8, f64>,
    pub buffers: Vec<BufferEntry>,
    pub task_criticality: Vec<TaskCriticality>,
    pub sensitivity: Vec<SensitivityEntry>,
    pub categories: Vec<CategorySummary>,
    pub scenarios: Vec<Scenario>,
    pub duration_distribution: Vec<DistributionPoint>,
    pub risk: RiskAnalysis,
    pub meta: RunMeta,
}

impl SimulationReport {
    /// Value for a reported percentile; 0 when the sample was empty.
    pub fn percentile(&self, p: u8) -> f64 {
        self.percentiles.get(&p).copied().unwrap_or(0.0)
    }
}

/// Write the JSON report.
pub fn write_json(report: &SimulationReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    Ok(())
}

/// Write the six CSV files into `out_dir`, creating it if needed.
pub fn write_csv_files(report: &SimulationReport, out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)?;
    write_distribution(report, &out_dir.join("project_duration_distribution.csv"))?;
    write_buffers(report, &out_dir.join("percentiles_and_buffers.csv"))?;
    write_criticality(report, &out_dir.join("task_criticality.csv"))?;
    write_sensitivity(report, &out_dir.join("sensitivity_analysis.csv"))?;
    write_categories(report, &out_dir.join("category_analysis.csv"))?;
    write_scenarios(report, &out_dir.join("scenario_planning.csv"))?;
    Ok(())
}

fn write_distribution(report: &SimulationReport, path: &Path) -> Result<()> {
    let mut out = fs::File::create(path)?;
    writeln!(out, "Duration_Days,Frequency,Cumulative_Probability")?;
    for point in &report.duration_distribution {
        writeln!(
            out,
            "{:.1},1,{:.4}",
            point.duration, point.cumulative_probability
        )?;
    }
    Ok(())
}

fn write_buffers(report: &SimulationReport, path: &Path) -> Result<()> {
    let mut out = fs::File::create(path)?;
    writeln!(out, "Percentile,Days,Buffer_Days,Buffer_Percentage,Use_Case")?;
    for entry in &report.buffers {
        writeln!(
            out,
            "P{},{:.1},{:.1},{:.1}%,{}",
            entry.percentile,
            entry.days,
            entry.buffer_days,
            entry.buffer_pct,
            escape_field(&entry.use_case_label)
        )?;
    }
    Ok(())
}

fn write_criticality(report: &SimulationReport, path: &Path) -> Result<()> {
    let mut out = fs::File::create(path)?;
    writeln!(
        out,
        "Task_ID,Task_Name,Category,Criticality_Percentage,Priority_Level,Resource_Allocation"
    )?;
    for row in &report.task_criticality {
        writeln!(
            out,
            "{},{},{},{:.1}%,{},{}",
            escape_field(&row.id),
            escape_field(&row.name),
            escape_field(&row.category),
            row.criticality_pct,
            row.priority_level,
            escape_field(&row.resource_allocation_hint)
        )?;
    }
    Ok(())
}

fn write_sensitivity(report: &SimulationReport, path: &Path) -> Result<()> {
    let mut out = fs::File::create(path)?;
    writeln!(
        out,
        "Task_ID,Task_Name,Category,Impact_Score,Correlation,Variance,Risk_Level"
    )?;
    for row in &report.sensitivity {
        writeln!(
            out,
            "{},{},{},{:.3},{:.3},{:.2},{}",
            escape_field(&row.id),
            escape_field(&row.name),
            escape_field(&row.category),
            row.impact_score,
            row.correlation,
            row.variance,
            row.risk_level
        )?;
    }
    Ok(())
}

fn write_categories(report: &SimulationReport, path: &Path) -> Result<()> {
    let mut out = fs::File::create(path)?;
    writeln!(
        out,
        "Category,Task_Count,Mean_Duration,Std_Duration,Risk_Contribution,Avg_Criticality"
    )?;
    for row in &report.categories {
        writeln!(
            out,
            "{},{},{:.1},{:.1},{:.1},{:.1}%",
            escape_field(&row.name),
            row.task_count,
            row.mean_duration,
            row.std_duration,
            row.risk_contribution,
            row.avg_criticality_pct
        )?;
    }
    Ok(())
}

fn write_scenarios(report: &SimulationReport, path: &Path) -> Result<()> {
    let mut out = fs::File::create(path)?;
    writeln!(
        out,
        "Scenario,Target_Days,Success_Probability,Buffer_Days,Recommended_For"
    )?;
    for row in &report.scenarios {
        writeln!(
            out,
            "{},{:.1},{}%,{:.1},{}",
            escape_field(&row.name),
            row.target,
            row.success_probability,
            row.buffer,
            escape_field(&row.recommended_for)
        )?;
    }
    Ok(())
}
