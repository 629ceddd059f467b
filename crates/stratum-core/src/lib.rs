//! Core types for the stratum migration runner: configuration, errors,
//! the timestamp naming codec and the migration file model.

pub mod config;
pub mod error;
pub mod migration;
pub mod naming;

pub use config::{ConfigOverrides, DatabaseConfig, Dialect, MigrationsConfig, StratumConfig};
pub use error::{Result, StratumError};
pub use migration::{ExtensionMode, FileKind, LedgerEntry, MigrationFile};
