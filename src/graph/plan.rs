//! The compiled form of a score configuration, shared by batch and stream runs.

use super::dag::{CycleDetected, DependencyGraph};
use crate::config::{MetricDef, ScoreConfig};
use crate::logger::log_to;
use log::Log;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct EvaluationPlan {
    order: Vec<String>,
    metrics: HashMap<String, MetricDef>,
}

impl EvaluationPlan {
    /// Builds the dependency graph and sorts it. Fails before any key is scheduled
    /// if the metrics form a cycle.
    pub fn compile(config: &ScoreConfig, logger: &dyn Log) -> Result<Self, CycleDetected> {
        let dag = DependencyGraph::build(&config.metrics);
        for (from, to) in dag.edges() {
            log_to!(logger, Trace, "dependency {from} -> {to}");
        }
        for name in dag.dangling_references() {
            log_to!(logger, Warn, "metric reference 'self.{name}' has no definition; it will evaluate to null");
        }

        let order = dag.topological_order().inspect_err(|err| {
            log_to!(logger, Error, "{err}");
        })?;
        log_to!(logger, Debug, "evaluation order: {}", order.join(" -> "));

        let metrics = config.metrics.iter().map(|m| (m.name.clone(), m.clone())).collect();
        Ok(Self { order, metrics })
    }

    /// Assembles a plan from an order computed elsewhere. Names in `order` without
    /// a definition are reported per key at evaluation time.
    pub fn from_parts(order: Vec<String>, metrics: HashMap<String, MetricDef>) -> Self {
        Self { order, metrics }
    }

    pub fn order(&self) -> &[String] { &self.order }

    pub fn metric(&self, name: &str) -> Option<&MetricDef> {
        self.metrics.get(name)
    }

    pub fn len(&self) -> usize { self.order.len() }

    pub fn is_empty(&self) -> bool { self.order.is_empty() }
}
