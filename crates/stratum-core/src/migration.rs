//! Migration file model.
//!
//! Two layouts are supported in a migration folder:
//! - script files: `<timestamp>[-<label>].<ext>`, one unit with up and down entry points
//! - statement-batch pairs: `<timestamp>[-<label>]_up.sql` and `..._down.sql`

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::naming;

/// Suffix of the forward half of a statement-batch pair.
pub const UP_SUFFIX: &str = "_up.sql";

/// Suffix of the reverse half of a statement-batch pair.
pub const DOWN_SUFFIX: &str = "_down.sql";

/// Which kind of files `create` generates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionMode {
    /// A single script file per migration.
    Script,
    /// An `_up.sql` / `_down.sql` pair per migration.
    #[default]
    Sql,
}

/// Role a migration file plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Script,
    Up,
    Down,
}

/// A file in the migration folder whose name carries a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// File name, also the identity recorded in the ledger.
    pub name: String,
    /// Instant embedded in the name.
    pub timestamp: NaiveDateTime,
    pub kind: FileKind,
    pub path: PathBuf,
}

impl MigrationFile {
    /// Build from a path, or `None` if the file is not a migration.
    ///
    /// Files without a leading timestamp are ignored, as are timestamped
    /// files that are neither a script nor half of a statement-batch pair.
    pub fn from_path(path: &Path, script_extension: &str) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let timestamp = naming::decode(name)?;
        let kind = classify(name, script_extension)?;

        Some(Self {
            name: name.to_string(),
            timestamp,
            kind,
            path: path.to_path_buf(),
        })
    }

    /// Whether running this file forward leaves a ledger entry.
    pub fn is_ledger_eligible(&self) -> bool {
        matches!(self.kind, FileKind::Script | FileKind::Up)
    }
}

/// Classify a file name by suffix.
pub fn classify(name: &str, script_extension: &str) -> Option<FileKind> {
    if name.ends_with(UP_SUFFIX) {
        Some(FileKind::Up)
    } else if name.ends_with(DOWN_SUFFIX) {
        Some(FileKind::Down)
    } else if Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == script_extension.trim_start_matches('.'))
    {
        Some(FileKind::Script)
    } else {
        None
    }
}

/// Name of the file that reverts a ledger entry.
///
/// Pairing is purely textual: the first `_up.sql` becomes `_down.sql`.
/// Script names have no suffix to replace and map to themselves.
pub fn down_name(ledger_name: &str) -> String {
    ledger_name.replacen(UP_SUFFIX, DOWN_SUFFIX, 1)
}

/// Ledger name recorded for a file, the inverse of [`down_name`].
pub fn up_name(file_name: &str) -> String {
    file_name.replacen(DOWN_SUFFIX, UP_SUFFIX, 1)
}

/// A row of the applied-set ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    /// Exact file name recorded when the migration ran.
    pub name: String,
    /// When it ran, distinct from the timestamp embedded in `name`.
    pub applied_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("20230101000000_up.sql", "rs"), Some(FileKind::Up));
        assert_eq!(
            classify("20230101000000-users_down.sql", "rs"),
            Some(FileKind::Down)
        );
        assert_eq!(classify("20230101000000-seed.rs", "rs"), Some(FileKind::Script));
        assert_eq!(classify("20230101000000-seed.rs", ".rs"), Some(FileKind::Script));
        assert_eq!(classify("20230101000000.sql", "rs"), None);
        assert_eq!(classify("20230101000000.txt", "rs"), None);
    }

    #[test]
    fn test_from_path_skips_non_migrations() {
        assert!(MigrationFile::from_path(Path::new("migrations/README.md"), "rs").is_none());
        assert!(MigrationFile::from_path(Path::new("migrations/notes_up.sql"), "rs").is_none());
        assert!(MigrationFile::from_path(Path::new("migrations/20230101000000.bak"), "rs").is_none());

        let file =
            MigrationFile::from_path(Path::new("migrations/20230201000000_up.sql"), "rs").unwrap();
        assert_eq!(file.name, "20230201000000_up.sql");
        assert_eq!(file.kind, FileKind::Up);
        assert_eq!(naming::encode(file.timestamp), "20230201000000");
        assert!(file.is_ledger_eligible());
    }

    #[test]
    fn test_down_file_is_not_ledger_eligible() {
        let file =
            MigrationFile::from_path(Path::new("20230201000000_down.sql"), "rs").unwrap();
        assert!(!file.is_ledger_eligible());
    }

    #[test]
    fn test_name_pairing() {
        assert_eq!(down_name("20230101000000_up.sql"), "20230101000000_down.sql");
        assert_eq!(up_name("20230101000000_down.sql"), "20230101000000_up.sql");
        assert_eq!(down_name("20230101000000-seed.rs"), "20230101000000-seed.rs");
        assert_eq!(up_name("20230101000000-seed.rs"), "20230101000000-seed.rs");
    }
}
