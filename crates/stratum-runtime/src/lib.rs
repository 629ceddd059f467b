pub mod db;
pub mod migrations;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use db::{Connection, Database};
pub use migrations::{
    LogSink, MigrationGenerator, Migrator, Operation, Outcome, ScriptExecutor, ScriptMigration,
    ScriptRegistry, Status,
};
