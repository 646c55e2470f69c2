//! Task data model for the simulation DAG.
//!
//! A task carries a stable user-supplied id, a display name, an opaque
//! category label, a list of predecessor ids and a three-point duration
//! estimate. Tasks are immutable once the graph is built.

use serde::{Deserialize, Serialize};

/// Three-point duration estimate (optimistic, most likely, pessimistic).
///
/// Durations are real numbers in abstract time units. A valid estimate
/// satisfies `0 <= O <= M <= P` with all values finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    /// Optimistic (best case) duration.
    pub optimistic: f64,
    /// Most likely duration.
    pub most_likely: f64,
    /// Pessimistic (worst case) duration.
    pub pessimistic: f64,
}

impl Estimate {
    /// Create a new estimate. Validation is deferred to graph construction.
    pub fn new(optimistic: f64, most_likely: f64, pessimistic: f64) -> Self {
        Self {
            optimistic,
            most_likely,
            pessimistic,
        }
    }

    /// Check the estimate ordering and finiteness.
    ///
    /// Returns a short reason string on failure, used to build an
    /// `InvalidEstimate` error with the offending task id attached.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let (o, m, p) = (self.optimistic, self.most_likely, self.pessimistic);
        if !o.is_finite() || !m.is_finite() || !p.is_finite() {
            return Err("non-finite value".to_string());
        }
        if o < 0.0 {
            return Err("O<0".to_string());
        }
        if p < o {
            return Err("P<O".to_string());
        }
        if m < o {
            return Err("M<O".to_string());
        }
        if p < m {
            return Err("P<M".to_string());
        }
        Ok(())
    }

    /// PERT expected duration: `(O + 4M + P) / 6`.
    pub fn mean(&self) -> f64 {
        (self.optimistic + 4.0 * self.most_likely + self.pessimistic) / 6.0
    }

    /// PERT standard deviation: `(P - O) / 6`.
    pub fn std_dev(&self) -> f64 {
        (self.pessimistic - self.optimistic) / 6.0
    }

    /// Width of the estimate interval.
    pub fn range(&self) -> f64 {
        self.pessimistic - self.optimistic
    }

    /// True when the estimate collapses to a single point (`P == O`).
    pub fn is_constant(&self) -> bool {
        self.pessimistic == self.optimistic
    }
}

/// A single task in the project network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Stable opaque identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Grouping label for category rollups.
    pub category: String,
    /// Ids of tasks that must finish before this one starts.
    pub predecessors: Vec<String>,
    /// Three-point duration estimate.
    pub estimate: Estimate,
    /// Resource label, carried through but not interpreted by the core.
    pub resources: Option<String>,
}

impl Task {
    /// Create a task with no predecessors and the default category.
    pub fn new(id: &str, name: &str, estimate: Estimate) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            category: "general".to_string(),
            predecessors: Vec::new(),
            estimate,
            resources: None,
        }
    }

    /// Set the category label.
    pub fn with_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    /// Set the predecessor id list.
    pub fn with_predecessors(mut self, predecessors: &[&str]) -> Self {
        self.predecessors = predecessors.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Set the resources label.
    pub fn with_resources(mut self, resources: &str) -> Self {
        self.resources = Some(resources.to_string());
        self
    }
}
