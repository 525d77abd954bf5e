//! Per-query execution context: stage logging and interruption.

use crate::error::{QueryError, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Stage logger owned by one query. A query that asked for debug output
/// logs its stages at `info`, everyone else at `debug`.
#[derive(Debug, Clone, Copy)]
pub struct QueryLog {
    level: log::Level,
}

impl QueryLog {
    pub fn new(debug: bool) -> Self {
        let level = if debug { log::Level::Info } else { log::Level::Debug };
        Self { level }
    }

    pub fn step(&self, args: fmt::Arguments<'_>) {
        log::log!(target: "callflow::query", self.level, "{}", args);
    }
}

impl Default for QueryLog {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Cancellation flag and deadline, checked once per expansion step.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    cancelled: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl Interrupt {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = Some(flag);
        self
    }

    pub fn check(&self) -> Result<()> {
        if let Some(flag) = &self.cancelled {
            if flag.load(Ordering::Relaxed) {
                return Err(QueryError::Interrupted("cancelled by caller".to_string()));
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(QueryError::Interrupted("deadline exceeded".to_string()));
            }
        }
        Ok(())
    }
}

/// Everything a pipeline stage needs besides the graph.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    pub log: QueryLog,
    pub interrupt: Interrupt,
}

impl QueryContext {
    pub fn new(debug: bool, interrupt: Interrupt) -> Self {
        Self {
            log: QueryLog::new(debug),
            interrupt,
        }
    }
}
