use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use stratum_core::config::StratumConfig;
use stratum_core::error::{Result, StratumError};
use stratum_core::migration::{ExtensionMode, LedgerEntry};
use stratum_core::naming;
use tracing::debug;

use super::executor::ScriptExecutor;
use super::generator::MigrationGenerator;
use super::ledger::Ledger;
use super::reconcile::{plan_up, scan_directory, Reconciler};
use super::script::ScriptRegistry;
use super::{LogSink, Operation, Outcome};
use crate::db::{Connection, Database};

/// Applied and pending migrations.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    /// Ledger entries, most recent first.
    pub applied: Vec<LedgerEntry>,
    /// Files an up run with no target would apply, in order.
    pub pending: Vec<String>,
}

/// Entry point for creating, applying and reverting migrations.
///
/// One migrator holds one configuration and one database handle for the
/// duration of a command. Operations take `&mut self` so a migrator never
/// runs two of them at once.
///
/// `create`, `up` and `down` never fail: every error is logged to the sink as
/// `Error : <message>` and returned in the [`Outcome`].
pub struct Migrator {
    config: StratumConfig,
    folder: PathBuf,
    conn: Arc<dyn Connection>,
    scripts: ScriptRegistry,
    sink: LogSink,
}

impl Migrator {
    /// Build from configuration. No I/O happens until the first operation.
    pub fn setup(config: StratumConfig) -> Result<Self> {
        let db = Database::connect_lazy(&config.database)?;
        Self::with_connection(config, Arc::new(db))
    }

    /// Build around an existing connection.
    pub fn with_connection(config: StratumConfig, conn: Arc<dyn Connection>) -> Result<Self> {
        config.validate()?;
        let folder = std::path::absolute(&config.migrations.folder)?;
        debug!("Migration folder: {}", folder.display());

        Ok(Self {
            config,
            folder,
            conn,
            scripts: ScriptRegistry::new(),
            sink: LogSink::default(),
        })
    }

    /// Send progress messages to `sink` instead of `tracing`.
    pub fn with_sink(mut self, sink: LogSink) -> Self {
        self.sink = sink;
        self
    }

    /// Implementations for script migrations.
    pub fn with_scripts(mut self, scripts: ScriptRegistry) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn config(&self) -> &StratumConfig {
        &self.config
    }

    /// Absolute migration folder.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn connection(&self) -> &dyn Connection {
        self.conn.as_ref()
    }

    fn ledger(&self) -> Ledger {
        Ledger::new(self.conn.clone(), self.config.migrations.table.clone())
    }

    fn executor(&self) -> ScriptExecutor {
        ScriptExecutor::new(self.conn.clone(), self.scripts.clone(), self.sink.clone())
    }

    /// Create a new migration stamped with the current instant.
    ///
    /// `mode` overrides the configured kind of files.
    pub fn create(&mut self, labels: &[String], mode: Option<ExtensionMode>) -> Outcome {
        self.create_at(naming::now(), labels, mode)
    }

    /// Create a new migration stamped with `at`.
    pub fn create_at(
        &mut self,
        at: NaiveDateTime,
        labels: &[String],
        mode: Option<ExtensionMode>,
    ) -> Outcome {
        let mut outcome = Outcome::new(Operation::Create);
        let result = self.write_migration(at, labels, mode, &mut outcome);
        self.finish(&mut outcome, result);
        outcome
    }

    fn write_migration(
        &self,
        at: NaiveDateTime,
        labels: &[String],
        mode: Option<ExtensionMode>,
        outcome: &mut Outcome,
    ) -> Result<()> {
        let generator =
            MigrationGenerator::new(&self.folder, &self.config.migrations.script_extension);
        let mode = mode.unwrap_or(self.config.migrations.mode);
        let files = generator.generate(at, labels, mode)?;

        let mut written = Vec::new();
        for file in &files {
            if let Err(e) = generator.write(file) {
                // Never leave half of a pair behind
                for path in &written {
                    let _ = std::fs::remove_file(path);
                }
                outcome.files.clear();
                return Err(e);
            }
            written.push(file.path.clone());
            self.sink.log(&format!("Create file {}", file.path.display()));
            outcome.files.push(file.file_name());
        }

        generator.verify(&files)
    }

    /// Apply pending migrations older than `until` (default: now).
    pub async fn up(&mut self, until: Option<NaiveDateTime>) -> Outcome {
        let mut outcome = Outcome::new(Operation::Up);
        let (ledger, executor) = (self.ledger(), self.executor());

        let result = self
            .reconciler(&ledger, &executor)
            .up(until, &mut outcome)
            .await;

        self.finish(&mut outcome, result);
        outcome
    }

    /// Revert the most recently applied migration.
    pub async fn down(&mut self) -> Outcome {
        let mut outcome = Outcome::new(Operation::Down);
        let (ledger, executor) = (self.ledger(), self.executor());

        let result = self.reconciler(&ledger, &executor).down(&mut outcome).await;

        self.finish(&mut outcome, result);
        outcome
    }

    /// Ledger contents and the files an `up` would apply now.
    pub async fn status(&self) -> Result<Status> {
        self.conn.ping().await?;
        let ledger = self.ledger();
        ledger.ensure_table().await?;

        let applied = ledger.entries().await?;
        let last = match applied.first() {
            Some(entry) => naming::decode(&entry.name).ok_or_else(|| {
                StratumError::Parse(format!(
                    "Ledger entry '{}' does not start with a YYYYMMDDHHmmss timestamp",
                    entry.name
                ))
            })?,
            None => naming::epoch(),
        };

        let files = scan_directory(&self.folder, &self.config.migrations.script_extension)?;
        let pending = plan_up(files, last, naming::instant())
            .into_iter()
            .map(|f| f.name)
            .collect();

        Ok(Status { applied, pending })
    }

    /// Release the database handle.
    pub async fn close(&self) {
        self.conn.close().await;
    }

    fn reconciler<'a>(&'a self, ledger: &'a Ledger, executor: &'a ScriptExecutor) -> Reconciler<'a> {
        Reconciler::new(
            self.conn.as_ref(),
            ledger,
            executor,
            &self.folder,
            &self.config.migrations.script_extension,
        )
    }

    fn finish(&self, outcome: &mut Outcome, result: Result<()>) {
        if let Err(e) = result {
            debug!("{:?} stopped: {}", outcome.operation, e);
            self.sink.error(&e);
            outcome.errors.push(e);
        }
    }
}
