use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::{hlog_debug, Error, Result};

/// Default number of Monte Carlo trials.
pub const DEFAULT_RUNS: usize = 10_000;

/// Simulation configuration loaded from a TOML file.
///
/// Every field has a sensible default so an absent or partial file
/// still yields a runnable configuration. CLI flags override these
/// values after loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Number of Monte Carlo trials to run.
    #[serde(default = "default_runs")]
    pub simulation_runs: usize,
    /// Confidence levels in (0, 1), echoed into the report meta so
    /// consumers can form intervals from the raw percentiles.
    #[serde(default = "default_confidence_levels")]
    pub confidence_levels: Vec<f64>,
    /// Master seed. When absent, an entropy-derived seed is used and
    /// reported in the result meta.
    pub seed: Option<u64>,
    /// Worker thread count. Defaults to the available parallelism.
    pub workers: Option<usize>,
}

fn default_runs() -> usize {
    DEFAULT_RUNS
}

fn default_confidence_levels() -> Vec<f64> {
    vec![0.80, 0.90, 0.95]
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            simulation_runs: default_runs(),
            confidence_levels: default_confidence_levels(),
            seed: None,
            workers: None,
        }
    }
}

impl SimConfig {
    /// Load a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        hlog_debug!("SimConfig::load path={}", path.display());
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        hlog_debug!(
            "SimConfig loaded: runs={}, seed={:?}, workers={:?}",
            config.simulation_runs,
            config.seed,
            config.workers
        );
        Ok(config)
    }

    /// Load a configuration, falling back to defaults when no path is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// Validate field ranges.
    pub fn validate(&self) -> Result<()> {
        if self.simulation_runs == 0 {
            return Err(Error::Config("simulation_runs must be >= 1".to_string()));
        }
        if let Some(w) = self.workers {
            if w == 0 {
                return Err(Error::Config("workers must be >= 1".to_string()));
            }
        }
        for &c in &self.confidence_levels {
            if !(c > 0.0 && c < 1.0) {
                return Err(Error::Config(format!(
                    "confidence level {} outside (0, 1)",
                    c
                )));
            }
        }
        Ok(())
    }

    /// Worker count to use, defaulting to the machine's parallelism.
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}
