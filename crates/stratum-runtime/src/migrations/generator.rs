use std::path::PathBuf;

use chrono::NaiveDateTime;
use stratum_core::error::{Result, StratumError};
use stratum_core::migration::{ExtensionMode, DOWN_SUFFIX, UP_SUFFIX};
use stratum_core::naming;

/// A migration file about to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub content: String,
}

impl GeneratedFile {
    /// Final path component, as listed in an [`Outcome`](super::Outcome).
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Generates new, empty migration files named by timestamp.
pub struct MigrationGenerator {
    /// Output directory for migrations.
    output_dir: PathBuf,
    script_extension: String,
}

impl MigrationGenerator {
    pub fn new(output_dir: impl Into<PathBuf>, script_extension: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            script_extension: script_extension.into(),
        }
    }

    /// Base name `<timestamp>[-<label>-<label>...]`.
    pub fn stem(at: NaiveDateTime, labels: &[String]) -> Result<String> {
        let mut stem = naming::encode(at);
        for label in labels {
            let label = label.trim();
            if label.is_empty() {
                continue;
            }
            if label.contains(['/', '\\']) || label == "." || label == ".." {
                return Err(StratumError::InvalidArgument(format!(
                    "Migration name must not contain path separators: {}",
                    label
                )));
            }
            stem.push('-');
            stem.push_str(label);
        }
        Ok(stem)
    }

    /// Files for a new migration created at `at`.
    pub fn generate(
        &self,
        at: NaiveDateTime,
        labels: &[String],
        mode: ExtensionMode,
    ) -> Result<Vec<GeneratedFile>> {
        let stem = Self::stem(at, labels)?;

        let files = match mode {
            ExtensionMode::Sql => vec![
                GeneratedFile {
                    path: self.output_dir.join(format!("{}{}", stem, UP_SUFFIX)),
                    content: String::new(),
                },
                GeneratedFile {
                    path: self.output_dir.join(format!("{}{}", stem, DOWN_SUFFIX)),
                    content: String::new(),
                },
            ],
            ExtensionMode::Script => {
                let file_name = format!(
                    "{}.{}",
                    stem,
                    self.script_extension.trim_start_matches('.')
                );
                vec![GeneratedFile {
                    content: script_template(&file_name),
                    path: self.output_dir.join(file_name),
                }]
            }
        };

        Ok(files)
    }

    /// Write a file, creating the output directory if needed. Existing
    /// files are never overwritten.
    pub fn write(&self, file: &GeneratedFile) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;

        if file.path.exists() {
            return Err(StratumError::InvalidArgument(format!(
                "Migration file already exists: {}",
                file.path.display()
            )));
        }

        std::fs::write(&file.path, &file.content)?;
        Ok(())
    }

    /// Check every generated file is on disk, so a pair never ends up
    /// missing its reverse half.
    pub fn verify(&self, files: &[GeneratedFile]) -> Result<()> {
        match files.iter().find(|f| !f.path.is_file()) {
            Some(missing) => Err(StratumError::NotFound(format!(
                "Migration file was not created: {}",
                missing.path.display()
            ))),
            None => Ok(()),
        }
    }
}

fn script_template(file_name: &str) -> String {
    format!(
        r#"//! Migration {file_name}
//!
//! Register with `ScriptRegistry::register("{file_name}", Migration)`.

use async_trait::async_trait;
use stratum_core::Result;
use stratum_runtime::{{Connection, ScriptMigration}};

pub struct Migration;

#[async_trait]
impl ScriptMigration for Migration {{
    async fn up(&self, db: &dyn Connection) -> Result<()> {{
        let _ = db;
        Ok(())
    }}

    async fn down(&self, db: &dyn Connection) -> Result<()> {{
        let _ = db;
        Ok(())
    }}
}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn at() -> NaiveDateTime {
        naming::decode("20230102030405").unwrap()
    }

    #[test]
    fn test_stem_joins_labels() {
        assert_eq!(MigrationGenerator::stem(at(), &[]).unwrap(), "20230102030405");
        assert_eq!(
            MigrationGenerator::stem(at(), &["add".into(), "users".into()]).unwrap(),
            "20230102030405-add-users"
        );
        assert!(MigrationGenerator::stem(at(), &["../evil".into()]).is_err());
    }

    #[test]
    fn test_generate_sql_pair() {
        let generator = MigrationGenerator::new("/tmp/migrations", "rs");
        let files = generator
            .generate(at(), &["users".into()], ExtensionMode::Sql)
            .unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(
            files[0].path,
            PathBuf::from("/tmp/migrations/20230102030405-users_up.sql")
        );
        assert_eq!(
            files[1].path,
            PathBuf::from("/tmp/migrations/20230102030405-users_down.sql")
        );
        assert!(files.iter().all(|f| f.content.is_empty()));
    }

    #[test]
    fn test_generate_script() {
        let generator = MigrationGenerator::new("/tmp/migrations", ".rs");
        let files = generator.generate(at(), &[], ExtensionMode::Script).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, PathBuf::from("/tmp/migrations/20230102030405.rs"));
        assert!(files[0].content.contains("impl ScriptMigration for Migration"));
        assert!(files[0].content.contains("\"20230102030405.rs\""));
    }

    #[test]
    fn test_write_creates_directory_and_verifies() {
        let dir = TempDir::new().unwrap();
        let generator = MigrationGenerator::new(dir.path().join("nested"), "rs");
        let files = generator.generate(at(), &[], ExtensionMode::Sql).unwrap();

        assert!(generator.verify(&files).is_err());
        for file in &files {
            generator.write(file).unwrap();
        }
        generator.verify(&files).unwrap();

        let err = generator.write(&files[0]).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
