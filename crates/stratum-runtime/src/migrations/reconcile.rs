//! Reconciliation: decide which files to run from the ledger, the migration
//! folder and an optional target instant, then run them.
//!
//! Runs are strictly sequential. One file and its ledger write complete
//! before the next begins. Only one run may target a database at a time.

use std::fmt;
use std::path::Path;

use chrono::NaiveDateTime;
use stratum_core::error::{Result, StratumError};
use stratum_core::migration::{self, FileKind, MigrationFile};
use stratum_core::naming;
use tracing::{debug, info};

use super::executor::ScriptExecutor;
use super::ledger::Ledger;
use super::Outcome;
use crate::db::Connection;

/// Direction of a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("up"),
            Direction::Down => f.write_str("down"),
        }
    }
}

/// List the migration files in `folder`, skipping anything that is not one.
///
/// The result is in directory order, which is unspecified.
pub fn scan_directory(folder: &Path, script_extension: &str) -> Result<Vec<MigrationFile>> {
    let entries = std::fs::read_dir(folder).map_err(|e| {
        StratumError::Migration(format!(
            "Failed to read migration folder {}: {}",
            folder.display(),
            e
        ))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        match MigrationFile::from_path(&path, script_extension) {
            Some(file) => files.push(file),
            None => debug!("Skipping non-migration file {}", path.display()),
        }
    }

    Ok(files)
}

/// Files an up run executes: timestamp strictly after `after` and strictly
/// before `before`, reverse halves excluded, in chronological order.
pub fn plan_up(
    files: Vec<MigrationFile>,
    after: NaiveDateTime,
    before: NaiveDateTime,
) -> Vec<MigrationFile> {
    let mut selected: Vec<_> = files
        .into_iter()
        .filter(|f| f.timestamp > after && f.timestamp < before)
        .filter(MigrationFile::is_ledger_eligible)
        .collect();

    // Directory order is arbitrary; execution order must not be.
    selected.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.name.cmp(&b.name)));
    selected
}

/// The file that reverts the ledger entry `ledger_name`, found by name.
pub fn plan_down<'a>(files: &'a [MigrationFile], ledger_name: &str) -> Option<&'a MigrationFile> {
    let wanted = migration::down_name(ledger_name);
    files
        .iter()
        .find(|f| f.name == wanted && matches!(f.kind, FileKind::Down | FileKind::Script))
}

/// Computes and executes the forward or backward migration set.
pub struct Reconciler<'a> {
    conn: &'a dyn Connection,
    ledger: &'a Ledger,
    executor: &'a ScriptExecutor,
    folder: &'a Path,
    script_extension: &'a str,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        conn: &'a dyn Connection,
        ledger: &'a Ledger,
        executor: &'a ScriptExecutor,
        folder: &'a Path,
        script_extension: &'a str,
    ) -> Self {
        Self {
            conn,
            ledger,
            executor,
            folder,
            script_extension,
        }
    }

    /// Apply every pending file up to (excluding) `until`, defaulting to now.
    ///
    /// Applied files and statement failures are appended to `outcome` as the
    /// run progresses, so a fatal error keeps the record of what already ran.
    pub async fn up(&self, until: Option<NaiveDateTime>, outcome: &mut Outcome) -> Result<()> {
        self.conn.ping().await?;
        self.ledger.ensure_table().await?;

        let last = match self.ledger.recent_names(1).await?.into_iter().next() {
            Some(name) => naming::decode(&name).ok_or_else(|| {
                StratumError::Parse(format!(
                    "Ledger entry '{}' does not start with a YYYYMMDDHHmmss timestamp",
                    name
                ))
            })?,
            None => naming::epoch(),
        };
        let until = until.unwrap_or_else(naming::instant);

        let files = scan_directory(self.folder, self.script_extension)?;
        let pending = plan_up(files, last, until);
        debug!(
            "Up window ({}, {}): {} file(s) pending",
            naming::encode(last),
            naming::encode(until),
            pending.len()
        );

        for file in &pending {
            let report = self.executor.run(file, Direction::Up).await?;
            outcome.errors.extend(report.failures);

            self.ledger.record(&file.name, naming::now()).await?;
            outcome.files.push(file.name.clone());
            info!("Applied {}", file.name);
        }

        Ok(())
    }

    /// Revert the single most recent ledger entry.
    pub async fn down(&self, outcome: &mut Outcome) -> Result<()> {
        self.conn.ping().await?;
        self.ledger.ensure_table().await?;

        let Some(last) = self.ledger.recent_names(1).await?.into_iter().next() else {
            debug!("Ledger is empty, nothing to revert");
            return Ok(());
        };

        let files = scan_directory(self.folder, self.script_extension)?;
        let file = plan_down(&files, &last).ok_or_else(|| {
            StratumError::NotFound(format!(
                "No file {} to revert {}",
                migration::down_name(&last),
                last
            ))
        })?;

        let report = self.executor.run(file, Direction::Down).await?;
        outcome.errors.extend(report.failures);

        self.ledger.erase(&migration::up_name(&file.name)).await?;
        outcome.files.push(file.name.clone());
        info!("Reverted {}", last);

        Ok(())
    }
}
