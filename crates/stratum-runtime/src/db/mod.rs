//! Database capability used by the ledger and the script executor.

mod pool;

pub use pool::Database;

use async_trait::async_trait;
use stratum_core::{Dialect, Result};

/// Something that can run SQL against the target database.
///
/// Binds are passed as text; callers add casts through [`Dialect`] where a
/// column needs another type.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Dialect used to render placeholders and DDL.
    fn dialect(&self) -> Dialect;

    /// Check connectivity.
    async fn ping(&self) -> Result<()>;

    /// Execute a statement, returning the number of affected rows.
    async fn execute(&self, sql: &str, binds: &[String]) -> Result<u64>;

    /// Run a query and read the named columns of every row as text.
    async fn fetch(&self, sql: &str, binds: &[String], columns: &[&str]) -> Result<Vec<Vec<String>>>;

    /// Release the underlying connections. Later calls fail.
    async fn close(&self) {}
}
