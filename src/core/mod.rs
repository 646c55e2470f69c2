//! Core simulation engine.
//!
//! This module contains the fundamental pieces of the Monte Carlo
//! pipeline: the task data model, the validated dependency graph, the
//! duration samplers, the single-trial executor, the trial aggregator
//! and the multi-worker orchestrator.

pub mod aggregate;
pub mod dag;
pub mod sampler;
pub mod simulation;
pub mod task;
pub mod trial;

pub use aggregate::Aggregate;
pub use dag::TaskGraph;
pub use sampler::{derive_seed, EstimateModel, SplitMix64};
pub use simulation::{run, RunOptions, SimEvent};
pub use task::{Estimate, Task};
pub use trial::TrialRunner;
