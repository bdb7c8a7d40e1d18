//! Per-key metric evaluation and its parallel scheduling.
pub mod cancel;
pub mod engine;
pub mod kernel;
pub mod ledger;
pub mod registry;
pub mod resolve;
pub mod scheduler;

pub use cancel::CancelToken;
pub use engine::Engine;
pub use kernel::{Divide, EvalContext, Operator, OperatorError, Or, Sum};
pub use ledger::{Ledger, MetricError, RowError, ScoredRow};
pub use registry::OperatorRegistry;
pub use resolve::{resolve, Unresolved};
pub use scheduler::{ScheduleError, ScoreStream, Scheduler};
