use crate::compute::kernel::EvalContext;
use crate::compute::ledger::{Ledger, MetricError, RowError, ScoredRow};
use crate::compute::registry::OperatorRegistry;
use crate::config::MetricDef;
use crate::graph::EvaluationPlan;
use crate::logger::{log_to, SharedLogger};
use crate::store::{Datasets, Key};
use std::sync::Arc;

/// Evaluates a plan for one key at a time.
///
/// Everything it holds is shared read-only, so a clone per worker is cheap and no
/// locking is needed. Each `compute_key` call owns its own ledger.
#[derive(Debug, Clone)]
pub struct Engine {
    plan: Arc<EvaluationPlan>,
    datasets: Arc<Datasets>,
    operators: Arc<OperatorRegistry>,
    logger: SharedLogger,
}

impl Engine {
    pub fn new(plan: Arc<EvaluationPlan>, datasets: Arc<Datasets>, logger: SharedLogger) -> Self {
        Self { plan, datasets, operators: Arc::new(OperatorRegistry::default()), logger }
    }

    pub fn with_operators(mut self, operators: OperatorRegistry) -> Self {
        self.operators = Arc::new(operators);
        self
    }

    pub fn plan(&self) -> &EvaluationPlan { &self.plan }

    pub fn datasets(&self) -> &Datasets { &self.datasets }

    pub fn logger(&self) -> &SharedLogger { &self.logger }

    /// Evaluates every metric in plan order. Metric-level failures become nulls;
    /// only a plan inconsistency fails the row.
    pub fn compute_key(&self, key: &Key) -> Result<ScoredRow, RowError> {
        let mut ledger = Ledger::new();
        for name in self.plan.order() {
            let metric = self.plan.metric(name).ok_or_else(|| RowError::MissingDefinition {
                key: key.clone(),
                metric: name.clone(),
            })?;
            self.evaluate_metric(metric, key, &mut ledger);
        }
        Ok(ScoredRow::new(key.clone(), ledger))
    }

    /// Returns the metric's value for `key`, computing and recording it unless the
    /// ledger already has one.
    pub fn evaluate_metric(&self, metric: &MetricDef, key: &Key, ledger: &mut Ledger) -> Option<f64> {
        if let Some(value) = ledger.get(&metric.name) {
            return Some(value);
        }

        match self.apply(metric, key, ledger) {
            Ok(Some(value)) => {
                ledger.insert(metric.name.clone(), value);
                Some(value)
            }
            Ok(None) => None,
            Err(err @ MetricError::UnknownOperator(_)) => {
                log_to!(&*self.logger, Warn, "{key} {}: {err}", metric.name);
                None
            }
            Err(err) => {
                log_to!(&*self.logger, Error, "{key} {}: {err}", metric.name);
                None
            }
        }
    }

    fn apply(&self, metric: &MetricDef, key: &Key, ledger: &Ledger) -> Result<Option<f64>, MetricError> {
        let kind = &metric.operation.kind;
        let operator = self
            .operators
            .get(kind)
            .ok_or_else(|| MetricError::UnknownOperator(kind.clone()))?;
        let ctx = EvalContext::new(key, &metric.name, ledger, &self.datasets, &*self.logger);
        Ok(operator.evaluate(&metric.operation.parameters, &ctx)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoreConfig;
    use crate::logger::Captured;
    use crate::store::Dataset;
    use log::Level;
    use std::collections::HashMap;

    fn datasets() -> Datasets {
        let mut emissions = Dataset::new();
        emissions.insert(
            Key::new("A", 2020).unwrap(),
            [("field1".to_string(), 1.0), ("field2".to_string(), 2.0)].into_iter().collect(),
        );
        emissions.insert(Key::new("B", 2020).unwrap(), [("field2".to_string(), 5.0)].into_iter().collect());
        let mut waste = Dataset::new();
        waste.insert(Key::new("A", 2020).unwrap(), [("amount".to_string(), 0.0)].into_iter().collect());
        waste.insert(Key::new("B", 2020).unwrap(), [("amount".to_string(), 2.0)].into_iter().collect());
        [("emissions".to_string(), emissions), ("waste".to_string(), waste)].into_iter().collect()
    }

    fn engine(metrics: Vec<MetricDef>) -> Engine {
        let logger = SharedLogger::global();
        let plan = EvaluationPlan::compile(&ScoreConfig::new(metrics), &*logger).unwrap();
        Engine::new(Arc::new(plan), Arc::new(datasets()), logger)
    }

    #[test]
    fn test_compute_key_threads_results_forward() {
        let engine = engine(vec![
            MetricDef::new("ratio", "divide", ["self.total", "waste.amount"]),
            MetricDef::new("total", "sum", ["emissions.field1", "emissions.field2"]),
        ]);

        let b = engine.compute_key(&Key::new("B", 2020).unwrap()).unwrap();
        assert_eq!(b.metric("total"), Some(5.0));
        assert_eq!(b.metric("ratio"), Some(2.5));

        // Division by zero for A only nulls the ratio.
        let a = engine.compute_key(&Key::new("A", 2020).unwrap()).unwrap();
        assert_eq!(a.metric("total"), Some(3.0));
        assert_eq!(a.metric("ratio"), None);
        assert_eq!(a.metrics.len(), 1);
    }

    #[test]
    fn test_unknown_operator_is_null_and_isolated() {
        let engine = engine(vec![
            MetricDef::new("weird", "median", ["emissions.field1"]),
            MetricDef::new("total", "sum", ["emissions.field1"]),
        ]);
        let row = engine.compute_key(&Key::new("A", 2020).unwrap()).unwrap();
        assert_eq!(row.metric("weird"), None);
        assert_eq!(row.metric("total"), Some(1.0));
    }

    #[test]
    fn test_evaluate_metric_is_memoized() {
        let engine = engine(vec![MetricDef::new("total", "sum", ["emissions.field1"])]);
        let metric = engine.plan().metric("total").unwrap().clone();
        let key = Key::new("A", 2020).unwrap();

        let mut ledger = Ledger::new();
        ledger.insert("total", 99.0);
        assert_eq!(engine.evaluate_metric(&metric, &key, &mut ledger), Some(99.0));

        let mut fresh = Ledger::new();
        assert_eq!(engine.evaluate_metric(&metric, &key, &mut fresh), Some(1.0));
        assert_eq!(fresh.get("total"), Some(1.0));
    }

    #[test]
    fn test_null_dependency_propagates_without_error() {
        let engine = engine(vec![
            MetricDef::new("total", "sum", ["emissions.nothing"]),
            MetricDef::new("ratio", "divide", ["self.total", "waste.amount"]),
        ]);
        let row = engine.compute_key(&Key::new("B", 2020).unwrap()).unwrap();
        assert!(row.metrics.is_empty());
    }

    #[test]
    fn test_order_without_definition_fails_row() {
        let plan = EvaluationPlan::from_parts(vec!["ghost".to_string()], HashMap::new());
        let engine = Engine::new(Arc::new(plan), Arc::new(datasets()), SharedLogger::global());
        let err = engine.compute_key(&Key::new("A", 2020).unwrap()).unwrap_err();
        assert!(matches!(err, RowError::MissingDefinition { ref metric, .. } if metric == "ghost"));
    }

    #[test]
    fn test_metric_errors_reach_injected_logger() {
        log::set_max_level(log::LevelFilter::Off);
        let captured = Captured::default();
        let logger = SharedLogger::new(captured.clone());
        let config = ScoreConfig::new(vec![
            MetricDef::new("weird", "median", ["emissions.field1"]),
            MetricDef::new("r", "divide", ["emissions.field1", "waste.amount"]),
        ]);
        let plan = EvaluationPlan::compile(&config, &*logger).unwrap();
        let engine = Engine::new(Arc::new(plan), Arc::new(datasets()), logger);

        let row = engine.compute_key(&Key::new("A", 2020).unwrap()).unwrap();
        assert!(row.metrics.is_empty());

        let lines = captured.lines();
        assert!(lines.contains(&(Level::Warn, "(A, 2020) weird: unknown operator 'median'".to_string())));
        assert!(lines.contains(&(Level::Error, "(A, 2020) r: division by zero".to_string())));
    }
}
