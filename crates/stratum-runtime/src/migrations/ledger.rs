//! Database-resident log of applied migrations.
//!
//! Table layout (the contract other tools may read):
//! `id` auto-increment primary key, `name` the exact file name that ran,
//! `run_on` the instant it ran.

use std::sync::Arc;

use chrono::NaiveDateTime;
use stratum_core::error::{Result, StratumError};
use stratum_core::migration::LedgerEntry;
use tracing::debug;

use crate::db::Connection;

const RUN_ON_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Applied-set ledger stored in a table of the target database.
pub struct Ledger {
    conn: Arc<dyn Connection>,
    table: String,
}

impl Ledger {
    pub fn new(conn: Arc<dyn Connection>, table: impl Into<String>) -> Self {
        Self {
            conn,
            table: table.into(),
        }
    }

    /// Create the ledger table if it does not exist. Safe to call on every run.
    pub async fn ensure_table(&self) -> Result<()> {
        let dialect = self.conn.dialect();
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({}, name VARCHAR(255) NOT NULL, run_on {} NOT NULL)",
            self.table,
            dialect.auto_increment_key("id"),
            dialect.datetime_type()
        );

        self.conn
            .execute(&sql, &[])
            .await
            .map_err(|e| ledger_error("Failed to create ledger table", e))?;
        Ok(())
    }

    /// Names of the `limit` most recent entries, most recent first.
    pub async fn recent_names(&self, limit: usize) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT name FROM {} ORDER BY run_on DESC, id DESC LIMIT {}",
            self.table, limit
        );

        let rows = self
            .conn
            .fetch(&sql, &[], &["name"])
            .await
            .map_err(|e| ledger_error("Failed to read ledger", e))?;

        Ok(rows.into_iter().filter_map(|row| row.into_iter().next()).collect())
    }

    /// All entries, most recent first.
    pub async fn entries(&self) -> Result<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT name, {} AS run_on FROM {} ORDER BY run_on DESC, id DESC",
            self.conn.dialect().timestamp_as_text("run_on"),
            self.table
        );

        let rows = self
            .conn
            .fetch(&sql, &[], &["name", "run_on"])
            .await
            .map_err(|e| ledger_error("Failed to read ledger", e))?;

        rows.into_iter()
            .map(|row| match row.as_slice() {
                [name, run_on] => Ok(LedgerEntry {
                    name: name.clone(),
                    applied_at: parse_run_on(run_on)?,
                }),
                _ => Err(StratumError::Database(
                    "Ledger row has unexpected shape".to_string(),
                )),
            })
            .collect()
    }

    /// Append an entry for `name` applied at `at`.
    pub async fn record(&self, name: &str, at: NaiveDateTime) -> Result<()> {
        let dialect = self.conn.dialect();
        let sql = format!(
            "INSERT INTO {} (name, run_on) VALUES ({}, {})",
            self.table,
            dialect.placeholder(1),
            dialect.timestamp_placeholder(2)
        );

        self.conn
            .execute(
                &sql,
                &[name.to_string(), at.format(RUN_ON_FORMAT).to_string()],
            )
            .await
            .map_err(|e| ledger_error(&format!("Failed to record {}", name), e))?;

        debug!("Recorded {} in {}", name, self.table);
        Ok(())
    }

    /// Delete the entries whose name is exactly `name`.
    pub async fn erase(&self, name: &str) -> Result<u64> {
        let sql = format!(
            "DELETE FROM {} WHERE name = {}",
            self.table,
            self.conn.dialect().placeholder(1)
        );

        let removed = self
            .conn
            .execute(&sql, &[name.to_string()])
            .await
            .map_err(|e| ledger_error(&format!("Failed to erase {}", name), e))?;

        debug!("Erased {} row(s) for {} from {}", removed, name, self.table);
        Ok(removed)
    }
}

fn ledger_error(context: &str, err: StratumError) -> StratumError {
    StratumError::Database(format!("{}: {}", context, err))
}

fn parse_run_on(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, RUN_ON_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|e| StratumError::Parse(format!("Invalid run_on value '{}': {}", value, e)))
}
