//! Parallel fan-out of keys over a fixed worker pool.
//!
//! Keys are enqueued up front on a pre-sized queue. Workers pull one key at a
//! time, run `Engine::compute_key`, and push the outcome on a result channel.
//! The result side is the only place rows are merged.
//!
//! Batch mode waits for the pool, drops failed rows and sorts by key. Stream
//! mode hands rows to an emitter thread which forwards them in completion order
//! until every key is done or the request is cancelled.

use crate::compute::cancel::CancelToken;
use crate::compute::engine::Engine;
use crate::compute::ledger::{RowError, ScoredRow};
use crate::logger::{log_to, SharedLogger};
use crate::store::Key;
use crossbeam::channel::{self, select, Receiver, Sender};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("failed to spawn emitter thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("work queue closed before all keys were enqueued")]
    QueueClosed,
    #[error("operation cancelled")]
    Cancelled,
}

type RowOutcome = Result<ScoredRow, RowError>;

#[derive(Debug, Clone)]
pub struct Scheduler {
    engine: Engine,
    workers: usize,
}

impl Scheduler {
    /// A worker count of zero is treated as one.
    pub fn new(engine: Engine, workers: usize) -> Self {
        Self { engine, workers: workers.max(1) }
    }

    pub fn workers(&self) -> usize { self.workers }

    fn pool(&self) -> Result<ThreadPool, ScheduleError> {
        Ok(ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("scoring-worker-{i}"))
            .build()?)
    }

    /// Computes every key and returns the surviving rows sorted by (entity, year).
    ///
    /// Once `cancel` fires, workers stop taking new keys; the call returns
    /// `Cancelled` after in-flight keys finish.
    pub fn run_batch(&self, keys: Vec<Key>, cancel: &CancelToken) -> Result<Vec<ScoredRow>, ScheduleError> {
        let logger = self.engine.logger();
        let total = keys.len();
        let jobs = enqueue(keys)?;
        let (results_tx, results_rx) = channel::unbounded::<RowOutcome>();
        let pool = self.pool()?;
        log_to!(&**logger, Info, "computing {total} keys on {} workers", self.workers);

        pool.scope(|scope| {
            for _ in 0..self.workers {
                let (jobs, results_tx, engine) = (jobs.clone(), results_tx.clone(), &self.engine);
                scope.spawn(move |_| work(engine, &jobs, &results_tx, cancel));
            }
        });
        drop(results_tx);

        if cancel.is_cancelled() {
            log_to!(&**logger, Warn, "batch cancelled; discarding {} computed rows", results_rx.len());
            return Err(ScheduleError::Cancelled);
        }

        let mut rows = Vec::with_capacity(total);
        for outcome in results_rx.iter() {
            match outcome {
                Ok(row) => rows.push(row),
                Err(err) => log_to!(&**logger, Error, "dropping row: {err}"),
            }
        }
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        log_to!(&**logger, Debug, "batch complete: {} of {total} rows", rows.len());
        Ok(rows)
    }

    /// Starts computing and returns immediately with a stream of rows in
    /// completion order.
    pub fn run_stream(&self, keys: Vec<Key>, cancel: CancelToken) -> Result<ScoreStream, ScheduleError> {
        let jobs = enqueue(keys)?;
        let pool = self.pool()?;
        let (results_tx, results_rx) = channel::bounded::<RowOutcome>(self.workers);

        for _ in 0..self.workers {
            let (engine, jobs, results_tx, cancel) =
                (self.engine.clone(), jobs.clone(), results_tx.clone(), cancel.clone());
            pool.spawn(move || work(&engine, &jobs, &results_tx, &cancel));
        }
        drop(results_tx);

        let (rows_tx, rows_rx) = channel::bounded(self.workers);
        let emitter_cancel = cancel.clone();
        let logger = self.engine.logger().clone();
        thread::Builder::new()
            .name("scoring-emitter".to_string())
            .spawn(move || {
                // The pool lives as long as the emitter.
                let _pool = pool;
                emit(&results_rx, &rows_tx, &emitter_cancel, &logger);
            })?;

        Ok(ScoreStream { rows: rows_rx, cancel })
    }
}

fn enqueue(keys: Vec<Key>) -> Result<Receiver<Key>, ScheduleError> {
    let (tx, rx) = channel::bounded(keys.len().max(1));
    for key in keys {
        tx.send(key).map_err(|_| ScheduleError::QueueClosed)?;
    }
    Ok(rx)
}

fn work(engine: &Engine, jobs: &Receiver<Key>, results: &Sender<RowOutcome>, cancel: &CancelToken) {
    while !cancel.is_cancelled() {
        let Ok(key) = jobs.try_recv() else { break };
        if results.send(compute_guarded(engine, &key)).is_err() {
            break;
        }
    }
}

fn compute_guarded(engine: &Engine, key: &Key) -> RowOutcome {
    panic::catch_unwind(AssertUnwindSafe(|| engine.compute_key(key))).unwrap_or_else(|payload| {
        Err(RowError::Panicked { key: key.clone(), message: panic_message(payload.as_ref()) })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn emit(results: &Receiver<RowOutcome>, rows: &Sender<ScoredRow>, cancel: &CancelToken, logger: &SharedLogger) {
    let mut emitted = 0usize;
    loop {
        let next = select! {
            recv(results) -> outcome => outcome.ok(),
            recv(cancel.done()) -> _ => None,
        };
        let Some(outcome) = next else { break };

        match outcome {
            Ok(row) => {
                if cancel.is_cancelled() {
                    break;
                }
                let delivered = select! {
                    send(rows, row) -> sent => sent.is_ok(),
                    recv(cancel.done()) -> _ => false,
                };
                if !delivered {
                    break;
                }
                emitted += 1;
            }
            Err(err) => log_to!(&**logger, Error, "dropping row: {err}"),
        }
    }
    if cancel.is_cancelled() {
        log_to!(&**logger, Info, "stream cancelled after {emitted} rows");
    } else {
        log_to!(&**logger, Debug, "stream closed after {emitted} rows");
    }
}

/// Rows from a streaming run, in completion order. Ends when every key has been
/// processed or the run is cancelled.
#[derive(Debug)]
pub struct ScoreStream {
    rows: Receiver<ScoredRow>,
    cancel: CancelToken,
}

impl ScoreStream {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }
}

impl Iterator for ScoreStream {
    type Item = ScoredRow;

    fn next(&mut self) -> Option<ScoredRow> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.rows.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::kernel::{EvalContext, Operator, OperatorError};
    use crate::compute::registry::OperatorRegistry;
    use crate::config::{MetricDef, Parameter, ScoreConfig};
    use crate::graph::EvaluationPlan;
    use crate::store::{Dataset, Datasets};
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn keys(n: usize) -> Vec<Key> {
        (0..n).map(|i| Key::new(format!("E{:03}", n - i), 2000 + (i % 3) as i32).unwrap()).collect()
    }

    fn scheduler(keys: &[Key], workers: usize, operators: OperatorRegistry) -> Scheduler {
        let emissions: Dataset = keys
            .iter()
            .map(|k| (k.clone(), [("x".to_string(), k.year() as f64)].into_iter().collect()))
            .collect();
        let datasets: Datasets = [("emissions".to_string(), emissions)].into_iter().collect();
        let logger = SharedLogger::global();
        let config = ScoreConfig::new(vec![MetricDef::new("total", "sum", ["emissions.x"])]);
        let plan = EvaluationPlan::compile(&config, &*logger).unwrap();
        let engine = Engine::new(Arc::new(plan), Arc::new(datasets), logger).with_operators(operators);
        Scheduler::new(engine, workers)
    }

    #[rstest]
    #[case(1)]
    #[case(5)]
    #[case(32)]
    fn test_batch_sorted_regardless_of_workers(#[case] workers: usize) {
        let input = keys(40);
        let rows = scheduler(&input, workers, OperatorRegistry::default())
            .run_batch(input.clone(), &CancelToken::new())
            .unwrap();

        let mut expected = input;
        expected.sort();
        assert_eq!(rows.iter().map(|r| r.key.clone()).collect::<Vec<_>>(), expected);
        assert!(rows.iter().all(|r| r.metric("total") == Some(r.key.year() as f64)));
    }

    #[test]
    fn test_batch_empty_key_set() {
        let rows = scheduler(&[], 3, OperatorRegistry::default()).run_batch(Vec::new(), &CancelToken::new()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_batch_cancelled_is_error() {
        let input = keys(10);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = scheduler(&input, 2, OperatorRegistry::default()).run_batch(input, &cancel).unwrap_err();
        assert!(matches!(err, ScheduleError::Cancelled));
    }

    struct PanicsFor(String);

    impl Operator for PanicsFor {
        fn evaluate(&self, _: &[Parameter], ctx: &EvalContext<'_>) -> Result<Option<f64>, OperatorError> {
            if ctx.key.entity() == self.0 {
                panic!("boom for {}", ctx.key);
            }
            Ok(Some(1.0))
        }
    }

    #[test]
    fn test_panicking_key_is_dropped_not_fatal() {
        let input = keys(5);
        let victim = input[0].entity().to_string();
        let mut operators = OperatorRegistry::default();
        operators.register("sum", PanicsFor(victim.clone()));

        let rows = scheduler(&input, 2, operators).run_batch(input, &CancelToken::new()).unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.key.entity() != victim));
    }

    #[test]
    fn test_stream_yields_every_row() {
        let input = keys(25);
        let stream = scheduler(&input, 4, OperatorRegistry::default()).run_stream(input.clone(), CancelToken::new()).unwrap();

        let mut got: Vec<Key> = stream.map(|row| row.key).collect();
        got.sort();
        let mut expected = input;
        expected.sort();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_stream_stops_after_cancel() {
        let input = keys(200);
        let mut stream = scheduler(&input, 2, OperatorRegistry::default()).run_stream(input, CancelToken::new()).unwrap();

        assert!(stream.next().is_some());
        stream.cancel();
        assert!(stream.next().is_none());
        assert!(stream.cancel_token().is_cancelled());
    }

    /// Sleeps before answering and counts how many keys it was asked for.
    struct Slow(Arc<AtomicUsize>);

    impl Operator for Slow {
        fn evaluate(&self, _: &[Parameter], _: &EvalContext<'_>) -> Result<Option<f64>, OperatorError> {
            thread::sleep(Duration::from_millis(10));
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Some(1.0))
        }
    }

    fn slow_scheduler(keys: &[Key], workers: usize) -> (Scheduler, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut operators = OperatorRegistry::default();
        operators.register("sum", Slow(calls.clone()));
        (scheduler(keys, workers, operators), calls)
    }

    #[test]
    fn test_batch_cancelled_mid_run() {
        let input = keys(200);
        let (scheduler, calls) = slow_scheduler(&input, 2);
        let cancel = CancelToken::new();

        let canceller = {
            let cancel = cancel.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                cancel.cancel();
            })
        };
        let err = scheduler.run_batch(input, &cancel).unwrap_err();
        canceller.join().unwrap();

        assert!(matches!(err, ScheduleError::Cancelled));
        let computed = calls.load(Ordering::SeqCst);
        assert!(computed < 200, "computed {computed} keys");
    }

    #[test]
    fn test_stream_cancel_stops_workers_and_emitter() {
        let input = keys(200);
        let (scheduler, calls) = slow_scheduler(&input, 2);
        let mut stream = scheduler.run_stream(input, CancelToken::new()).unwrap();

        assert!(stream.next().is_some());
        stream.cancel();

        // The emitter drops its sender on the way out, which closes the channel.
        let closed = loop {
            match stream.rows.recv_timeout(Duration::from_secs(5)) {
                Ok(_) => continue,
                Err(err) => break err.is_disconnected(),
            }
        };
        assert!(closed);

        // Workers finish at most their in-flight key, then go quiet.
        thread::sleep(Duration::from_millis(100));
        let settled = calls.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(calls.load(Ordering::SeqCst), settled);
        assert!(settled < 200, "computed {settled} keys");
    }
}
