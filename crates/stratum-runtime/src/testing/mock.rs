//! In-memory database double.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use stratum_core::{Dialect, Result, StratumError};

use crate::db::Connection;

/// A recorded ledger row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockLedgerRow {
    pub id: i64,
    pub name: String,
    pub run_on: String,
}

#[derive(Default)]
struct MockState {
    executed: Vec<String>,
    failures: Vec<String>,
    offline: bool,
    table_created: bool,
    ledger: Vec<MockLedgerRow>,
    next_id: i64,
}

/// Mock connection for testing.
///
/// Statements against the ledger table are interpreted so that ledger state
/// behaves like a real table. Every other statement is recorded in order and
/// succeeds unless it contains a fragment registered with [`fail_on`].
///
/// [`fail_on`]: MockConnection::fail_on
#[derive(Clone)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
    table: String,
    dialect: Dialect,
}

impl MockConnection {
    /// Create a mock whose ledger table is `migrations`.
    pub fn new() -> Self {
        Self::with_table("migrations")
    }

    pub fn with_table(table: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            table: table.into(),
            dialect: Dialect::Mysql,
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every statement containing `fragment` fail.
    pub fn fail_on(&self, fragment: impl Into<String>) {
        self.state().failures.push(fragment.into());
    }

    /// Make `ping` fail, as if the server were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Insert a ledger row directly.
    pub fn seed_ledger(&self, name: &str, run_on: &str) {
        let mut state = self.state();
        state.next_id += 1;
        let id = state.next_id;
        state.ledger.push(MockLedgerRow {
            id,
            name: name.to_string(),
            run_on: run_on.to_string(),
        });
    }

    /// Ledger rows in insertion order.
    pub fn ledger(&self) -> Vec<MockLedgerRow> {
        self.state().ledger.clone()
    }

    /// Ledger names in insertion order.
    pub fn ledger_names(&self) -> Vec<String> {
        self.state().ledger.iter().map(|r| r.name.clone()).collect()
    }

    /// Non-ledger statements in execution order, failed ones included.
    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    pub fn table_created(&self) -> bool {
        self.state().table_created
    }

    fn check_failure(state: &MockState, sql: &str) -> Result<()> {
        match state.failures.iter().find(|f| sql.contains(f.as_str())) {
            Some(fragment) => Err(StratumError::Database(format!(
                "mock failure on '{}'",
                fragment
            ))),
            None => Ok(()),
        }
    }

    fn targets_ledger(&self, sql: &str) -> bool {
        sql.split_whitespace().any(|word| word == self.table)
    }
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

fn bind(binds: &[String], index: usize) -> Result<&str> {
    binds
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| StratumError::Database(format!("missing bind parameter {}", index + 1)))
}

fn parse_limit(sql: &str) -> Option<usize> {
    let upper = sql.to_ascii_uppercase();
    let position = upper.rfind("LIMIT")?;
    sql[position + "LIMIT".len()..].trim().parse().ok()
}

#[async_trait]
impl Connection for MockConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn ping(&self) -> Result<()> {
        if self.state().offline {
            return Err(StratumError::Database(
                "Failed to connect: connection refused".to_string(),
            ));
        }
        Ok(())
    }

    async fn close(&self) {
        self.state().offline = true;
    }

    async fn execute(&self, sql: &str, binds: &[String]) -> Result<u64> {
        let ledger = self.targets_ledger(sql);
        let mut state = self.state();

        if !ledger {
            state.executed.push(sql.to_string());
        }
        Self::check_failure(&state, sql)?;

        if !ledger {
            return Ok(0);
        }

        let verb = sql.trim_start().to_ascii_uppercase();
        if verb.starts_with("CREATE TABLE") {
            state.table_created = true;
            Ok(0)
        } else if verb.starts_with("INSERT") {
            let name = bind(binds, 0)?.to_string();
            let run_on = bind(binds, 1)?.to_string();
            state.next_id += 1;
            let id = state.next_id;
            state.ledger.push(MockLedgerRow { id, name, run_on });
            Ok(1)
        } else if verb.starts_with("DELETE") {
            let name = bind(binds, 0)?.to_string();
            let before = state.ledger.len();
            state.ledger.retain(|row| row.name != name);
            Ok((before - state.ledger.len()) as u64)
        } else {
            Err(StratumError::Database(format!(
                "mock cannot interpret ledger statement: {}",
                sql
            )))
        }
    }

    async fn fetch(&self, sql: &str, _binds: &[String], columns: &[&str]) -> Result<Vec<Vec<String>>> {
        let state = self.state();
        Self::check_failure(&state, sql)?;

        if !self.targets_ledger(sql) {
            return Ok(Vec::new());
        }

        let mut rows = state.ledger.clone();
        rows.sort_by(|a, b| b.run_on.cmp(&a.run_on).then(b.id.cmp(&a.id)));
        if let Some(limit) = parse_limit(sql) {
            rows.truncate(limit);
        }

        rows.into_iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|column| match *column {
                        "id" => Ok(row.id.to_string()),
                        "name" => Ok(row.name.clone()),
                        "run_on" => Ok(row.run_on.clone()),
                        other => Err(StratumError::Database(format!("no column named {}", other))),
                    })
                    .collect()
            })
            .collect()
    }
}
