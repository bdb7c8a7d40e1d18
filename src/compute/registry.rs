use crate::compute::kernel::{Divide, Operator, Or, Sum};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Operator name to implementation. Open for registration; `Default` carries
/// `sum`, `or` and `divide`.
#[derive(Clone)]
pub struct OperatorRegistry {
    operators: HashMap<String, Arc<dyn Operator>>,
}

impl OperatorRegistry {
    pub fn empty() -> Self {
        Self { operators: HashMap::new() }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("sum", Sum);
        registry.register("or", Or);
        registry.register("divide", Divide);
        registry
    }

    /// Adds an operator, replacing any previous one of the same name.
    pub fn register(&mut self, name: impl Into<String>, operator: impl Operator + 'static) {
        self.operators.insert(name.into(), Arc::new(operator));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Operator> {
        self.operators.get(name).map(|op| op.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorRegistry").field("operators", &self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::kernel::{EvalContext, OperatorError};
    use crate::compute::ledger::Ledger;
    use crate::config::Parameter;
    use crate::logger::SharedLogger;
    use crate::store::{Datasets, Key};

    struct Constant(f64);

    impl Operator for Constant {
        fn evaluate(&self, _: &[Parameter], _: &EvalContext<'_>) -> Result<Option<f64>, OperatorError> {
            Ok(Some(self.0))
        }
    }

    #[test]
    fn test_builtins_registered() {
        assert_eq!(OperatorRegistry::default().names(), vec!["divide", "or", "sum"]);
        assert!(OperatorRegistry::empty().get("sum").is_none());
    }

    #[test]
    fn test_register_custom_operator() {
        let mut registry = OperatorRegistry::with_builtins();
        registry.register("sum", Constant(42.0));

        let key = Key::new("A", 2020).unwrap();
        let (ledger, datasets, logger) = (Ledger::new(), Datasets::new(), SharedLogger::global());
        let ctx = EvalContext::new(&key, "m", &ledger, &datasets, &*logger);
        let op = registry.get("sum").unwrap();
        assert_eq!(op.evaluate(&[], &ctx), Ok(Some(42.0)));
    }
}
