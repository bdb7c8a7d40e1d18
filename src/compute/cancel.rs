use crossbeam::channel::{self, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Cancellation signal shared by everything serving one request.
///
/// `is_cancelled` is for polling between keys. `done` is a channel that becomes
/// ready (disconnected) once cancelled, for use inside `select!`.
#[derive(Debug, Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    done: Receiver<()>,
    trigger: Arc<Mutex<Option<Sender<()>>>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (trigger, done) = channel::bounded(0);
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            done,
            trigger: Arc::new(Mutex::new(Some(trigger))),
        }
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let mut trigger = match self.trigger.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        trigger.take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn done(&self) -> &Receiver<()> {
        &self.done
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
