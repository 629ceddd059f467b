//! Migration state reconciliation and execution.

mod executor;
mod generator;
mod ledger;
mod migrator;
mod reconcile;
mod script;

pub use executor::{split_sql_statements, ExecutionReport, ScriptExecutor};
pub use generator::{GeneratedFile, MigrationGenerator};
pub use ledger::Ledger;
pub use migrator::{Migrator, Status};
pub use reconcile::{plan_down, plan_up, scan_directory, Direction, Reconciler};
pub use script::{ScriptMigration, ScriptRegistry};

use std::fmt;
use std::sync::Arc;

use stratum_core::StratumError;

/// Observer receiving the human-readable progress messages
/// (`Execute [file]`, `Create file path`, `Error : message`).
#[derive(Clone)]
pub struct LogSink(Arc<dyn Fn(&str) + Send + Sync>);

impl LogSink {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Forward a message to the sink.
    pub fn log(&self, message: &str) {
        (self.0)(message)
    }

    /// Report an error in the `Error : <message>` form.
    pub fn error(&self, err: &StratumError) {
        self.log(&format!("Error : {}", err));
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(|message| tracing::info!("{}", message))
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LogSink")
    }
}

/// Facade operation an [`Outcome`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Up,
    Down,
}

/// Result of a facade call.
///
/// `files` lists the names (without directory) of what was created, applied
/// or reverted, in order. `errors` holds every problem encountered: statement
/// failures that did not stop the run, and at most one fatal error that did
/// (always last).
#[derive(Debug)]
pub struct Outcome {
    pub operation: Operation,
    pub files: Vec<String>,
    pub errors: Vec<StratumError>,
}

impl Outcome {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            files: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// True when nothing went wrong.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// True when the call had nothing to do and nothing failed.
    pub fn is_noop(&self) -> bool {
        self.files.is_empty() && self.errors.is_empty()
    }

    /// Whether the run stopped early on a fatal error.
    pub fn is_aborted(&self) -> bool {
        self.errors.iter().any(|e| !e.is_statement_failure())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_log_sink_error_format() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = seen.clone();
            LogSink::new(move |m| seen.lock().unwrap().push(m.to_string()))
        };

        sink.log("Execute [20230101000000_up.sql]");
        sink.error(&StratumError::Database("connection refused".into()));

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], "Execute [20230101000000_up.sql]");
        assert_eq!(seen[1], "Error : Database error: connection refused");
    }

    #[test]
    fn test_outcome_flags() {
        let mut outcome = Outcome::new(Operation::Up);
        assert!(outcome.is_noop());
        assert!(outcome.is_success());

        outcome.errors.push(StratumError::Statement {
            file: "a_up.sql".into(),
            index: 1,
            message: "boom".into(),
        });
        assert!(!outcome.is_success());
        assert!(!outcome.is_aborted());

        outcome.errors.push(StratumError::Parse("bad".into()));
        assert!(outcome.is_aborted());
    }
}
