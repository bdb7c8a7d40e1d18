//! Logger handle passed into the engine's entry points.
//!
//! The engine never logs through the process-wide `log` facade directly; every
//! call site targets the handle it was given, e.g.
//! `log_to!(&*handle, Warn, "...")`. Records go straight to the handle, so the
//! handle's own `enabled` is the only filter; `log::max_level()` is not
//! consulted.

use log::{Level, Log, Metadata, Record};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

#[derive(Clone)]
pub struct SharedLogger(Arc<dyn Log>);

impl SharedLogger {
    pub fn new(logger: impl Log + 'static) -> Self {
        Self(Arc::new(logger))
    }

    /// Forwards to whatever logger the process has installed at the time of each
    /// call, so a handle made before `log::set_logger` still reaches it.
    pub fn global() -> Self {
        Self(Arc::new(ProcessLogger))
    }
}

impl From<Arc<dyn Log>> for SharedLogger {
    fn from(logger: Arc<dyn Log>) -> Self {
        Self(logger)
    }
}

impl Deref for SharedLogger {
    type Target = dyn Log;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl fmt::Debug for SharedLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedLogger")
    }
}

struct ProcessLogger;

impl Log for ProcessLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        log::logger().enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        log::logger().log(record)
    }

    fn flush(&self) {
        log::logger().flush()
    }
}

/// Call-site location captured by `log_to!`: module path, file and line.
pub(crate) type Location = (&'static str, &'static str, u32);

/// Sends one record to `logger` if it accepts the level and target.
pub(crate) fn dispatch<L: Log + ?Sized>(logger: &L, level: Level, location: Location, args: fmt::Arguments<'_>) {
    let (module_path, file, line) = location;
    let metadata = Metadata::builder().level(level).target(module_path).build();
    if !logger.enabled(&metadata) {
        return;
    }
    logger.log(
        &Record::builder()
            .metadata(metadata)
            .args(args)
            .module_path_static(Some(module_path))
            .file_static(Some(file))
            .line(Some(line))
            .build(),
    );
}

/// `log_to!(logger, Warn, "{key}: {err}")` logs to an explicit `log::Log`.
macro_rules! log_to {
    ($logger:expr, $level:ident, $($arg:tt)+) => {
        $crate::logger::dispatch(
            $logger,
            ::log::Level::$level,
            (module_path!(), file!(), line!()),
            format_args!($($arg)+),
        )
    };
}

pub(crate) use log_to;

/// Keeps every record it is handed, for assertions.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct Captured {
    lines: Arc<std::sync::Mutex<Vec<(Level, String)>>>,
}

#[cfg(test)]
impl Captured {
    pub(crate) fn lines(&self) -> Vec<(Level, String)> {
        self.lines.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Log for Captured {
    fn enabled(&self, _: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        self.lines.lock().unwrap().push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}
