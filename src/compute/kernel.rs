//! Operators: the arithmetic applied to a metric's resolved parameters.
//!
//! Each operator decides its own null propagation. `sum` skips missing inputs and
//! is null only when every input is missing; `or` and `divide` read exactly two
//! parameters and ignore any extras.

use crate::compute::ledger::Ledger;
use crate::compute::resolve::resolve;
use crate::config::Parameter;
use crate::logger::log_to;
use crate::store::{Datasets, Key};
use log::Log;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperatorError {
    #[error("operator '{operator}' needs at least {required} parameters, got {given}")]
    InsufficientParameters { operator: &'static str, required: usize, given: usize },
    #[error("division by zero")]
    DivisionByZero,
}

/// Read-only view of one key's evaluation, handed to operators.
pub struct EvalContext<'a> {
    pub key: &'a Key,
    pub metric: &'a str,
    ledger: &'a Ledger,
    datasets: &'a Datasets,
    logger: &'a dyn Log,
}

impl<'a> EvalContext<'a> {
    pub fn new(key: &'a Key, metric: &'a str, ledger: &'a Ledger, datasets: &'a Datasets, logger: &'a dyn Log) -> Self {
        Self { key, metric, ledger, datasets, logger }
    }

    /// Resolves a parameter; `None` means "no value".
    pub fn value(&self, param: &Parameter) -> Option<f64> {
        match resolve(&param.source, self.key, self.ledger, self.datasets) {
            Ok(v) => Some(v),
            Err(reason) => {
                log_to!(self.logger, Debug, "{} {}: {}: {reason}", self.key, self.metric, param.source);
                None
            }
        }
    }
}

pub trait Operator: Send + Sync {
    /// `Ok(None)` is a null result, not a failure.
    fn evaluate(&self, params: &[Parameter], ctx: &EvalContext<'_>) -> Result<Option<f64>, OperatorError>;
}

fn require(operator: &'static str, params: &[Parameter], required: usize) -> Result<(), OperatorError> {
    if params.len() < required {
        return Err(OperatorError::InsufficientParameters { operator, required, given: params.len() });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl Operator for Sum {
    fn evaluate(&self, params: &[Parameter], ctx: &EvalContext<'_>) -> Result<Option<f64>, OperatorError> {
        Ok(params
            .iter()
            .filter_map(|p| ctx.value(p))
            .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v)))
    }
}

/// First non-null of the first two parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Or;

impl Operator for Or {
    fn evaluate(&self, params: &[Parameter], ctx: &EvalContext<'_>) -> Result<Option<f64>, OperatorError> {
        require("or", params, 2)?;
        Ok(ctx.value(&params[0]).or_else(|| ctx.value(&params[1])))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Divide;

impl Operator for Divide {
    fn evaluate(&self, params: &[Parameter], ctx: &EvalContext<'_>) -> Result<Option<f64>, OperatorError> {
        require("divide", params, 2)?;
        let (Some(numerator), Some(denominator)) = (ctx.value(&params[0]), ctx.value(&params[1])) else {
            return Ok(None);
        };
        if denominator == 0.0 {
            return Err(OperatorError::DivisionByZero);
        }
        Ok(Some(numerator / denominator))
    }
}
