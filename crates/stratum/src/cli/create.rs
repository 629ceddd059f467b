use anyhow::Result;
use clap::Parser;
use stratum_core::ExtensionMode;

use super::{finish, print_header, Context};

/// Create a new migration.
#[derive(Parser)]
pub struct CreateCommand {
    /// Words appended to the timestamp, joined with `-`.
    pub names: Vec<String>,

    /// Create a script migration instead of an SQL pair.
    #[arg(long)]
    pub script: bool,
}

impl CreateCommand {
    pub async fn execute(self, ctx: &Context) -> Result<()> {
        let mut migrator = ctx.migrator()?;
        print_header("Create migration");

        let mode = self.script.then_some(ExtensionMode::Script);
        let outcome = migrator.create(&self.names, mode);
        migrator.close().await;

        finish(
            &outcome,
            &format!("Created {} file(s)", outcome.files.len()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_core::ConfigOverrides;
    use tempfile::TempDir;

    fn context(dir: &TempDir) -> Context {
        Context {
            config_path: Some(dir.path().join("missing-is-fine.toml")),
            overrides: ConfigOverrides::default(),
        }
    }

    #[tokio::test]
    async fn test_create_sql_pair() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("stratum.toml");
        let folder = dir.path().join("migrations");
        std::fs::write(
            &config,
            format!(
                "[migrations]\nfolder = {:?}\n\n[database]\ndialect = \"sqlite\"\ndatabase = \":memory:\"\n",
                folder.display().to_string()
            ),
        )
        .unwrap();

        let ctx = Context {
            config_path: Some(config),
            ..context(&dir)
        };
        let cmd = CreateCommand {
            names: vec!["add".into(), "users".into()],
            script: false,
        };
        cmd.execute(&ctx).await.unwrap();

        let mut names: Vec<_> = std::fs::read_dir(&folder)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();

        assert_eq!(names.len(), 2);
        assert!(names[0].ends_with("-add-users_down.sql"));
        assert!(names[1].ends_with("-add-users_up.sql"));
    }

    #[tokio::test]
    async fn test_create_requires_config_file() {
        let dir = TempDir::new().unwrap();
        let cmd = CreateCommand {
            names: vec![],
            script: true,
        };
        assert!(cmd.execute(&context(&dir)).await.is_err());
    }
}
