//! Metric dependency graph and evaluation planning.
pub mod dag;
pub mod plan;

pub use dag::{CycleDetected, DependencyGraph};
pub use plan::EvaluationPlan;
