//! dag.rs
//! The metric dependency graph and its evaluation order.
//!
//! Nodes are metric names; an edge `X -> Y` means Y reads `self.X`. Metric
//! nodes are inserted first, in configuration order, so any node past
//! `metric_count` is a name that was referenced but never defined.

use crate::config::MetricDef;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

/// The evaluation order could not cover every metric.
///
/// `unresolved` lists, in configuration order, the metrics whose in-degree never
/// reached zero: the cycle members plus anything downstream of them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cycle detected in metric dependencies (unresolved: {})", .unresolved.join(", "))]
pub struct CycleDetected {
    pub unresolved: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
    in_degree: Vec<usize>,
    metric_count: usize,
}

impl DependencyGraph {
    /// Scans every `self.` parameter. Referenced names are not checked here; a
    /// dangling reference simply never produces a value.
    pub fn build(metrics: &[MetricDef]) -> Self {
        let mut dag = Self::default();
        for metric in metrics {
            dag.node(&metric.name);
        }
        dag.metric_count = dag.graph.node_count();

        for metric in metrics {
            let current = dag.index[metric.name.as_str()];
            for dependency in metric.dependencies() {
                let referenced = dag.node(dependency);
                dag.graph.add_edge(referenced, current, ());
                dag.in_degree[current.index()] += 1;
            }
        }
        dag
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), id);
        self.in_degree.push(0);
        id
    }

    #[inline]
    fn is_metric(&self, id: NodeIndex) -> bool {
        id.index() < self.metric_count
    }

    pub fn metric_count(&self) -> usize { self.metric_count }

    pub fn in_degree(&self, name: &str) -> Option<usize> {
        let id = *self.index.get(name)?;
        self.is_metric(id).then(|| self.in_degree[id.index()])
    }

    /// Metrics that read `name`, one entry per referencing parameter.
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        let Some(&id) = self.index.get(name) else { return Vec::new() };
        self.graph
            .neighbors_directed(id, Direction::Outgoing)
            .map(|n| self.graph[n].as_str())
            .collect()
    }

    /// Every `(referenced, dependent)` pair.
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.graph
            .edge_references()
            .map(|e| (self.graph[e.source()].as_str(), self.graph[e.target()].as_str()))
            .collect()
    }

    /// Names used in `self.` parameters that no metric defines.
    pub fn dangling_references(&self) -> Vec<&str> {
        self.graph
            .node_indices()
            .filter(|&id| !self.is_metric(id))
            .map(|id| self.graph[id].as_str())
            .collect()
    }

    /// Returns the evaluation order using Kahn's Algorithm.
    ///
    /// Seeds are taken in configuration order, which makes the result stable
    /// for a given configuration. Undefined names take part in the walk so
    /// their dependents are released, but never appear in the order.
    pub fn topological_order(&self) -> Result<Vec<String>, CycleDetected> {
        let mut in_degree = self.in_degree.clone();
        let mut queue: VecDeque<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|id| in_degree[id.index()] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.metric_count);

        while let Some(node) = queue.pop_front() {
            if self.is_metric(node) {
                order.push(self.graph[node].clone());
            }
            for dependent in self.graph.neighbors_directed(node, Direction::Outgoing) {
                let degree = &mut in_degree[dependent.index()];
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if order.len() < self.metric_count {
            let unresolved = self
                .graph
                .node_indices()
                .filter(|&id| self.is_metric(id) && in_degree[id.index()] > 0)
                .map(|id| self.graph[id].clone())
                .collect();
            return Err(CycleDetected { unresolved });
        }

        Ok(order)
    }
}
