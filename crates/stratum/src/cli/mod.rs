mod create;
mod down;
mod show_config;
mod status;
mod up;

pub use create::CreateCommand;
pub use down::DownCommand;
pub use show_config::ShowConfigCommand;
pub use status::StatusCommand;
pub use up::UpCommand;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use stratum_core::{ConfigOverrides, Dialect, StratumConfig};
use stratum_runtime::{LogSink, Migrator, Outcome};
use tracing_subscriber::EnvFilter;

/// Configuration files picked up from the working directory when `--config`
/// is not given.
const DEFAULT_CONFIG_FILES: [&str; 2] = ["stratum.toml", "stratum.json"];

/// STRATUM - timestamped database migrations
#[derive(Parser)]
#[command(name = "stratum")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (TOML or JSON).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub overrides: ConfigArgs,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Create a new migration.
    Create(CreateCommand),

    /// Apply pending migrations.
    Up(UpCommand),

    /// Revert the most recently applied migration.
    Down(DownCommand),

    /// Show applied and pending migrations.
    Status(StatusCommand),

    /// Print the merged configuration.
    ShowConfig(ShowConfigCommand),
}

/// Overrides for values from the configuration file.
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// Create `_up.sql` / `_down.sql` pairs regardless of the configured mode.
    #[arg(long, global = true)]
    pub sql_file: bool,

    /// Migration folder.
    #[arg(long, global = true)]
    pub migration_dir: Option<PathBuf>,

    /// Database dialect (mysql, postgres, sqlite).
    #[arg(long, global = true)]
    pub database_dialect: Option<Dialect>,

    /// Full connection URL, used instead of the individual settings.
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[arg(long, global = true)]
    pub database_host: Option<String>,

    #[arg(long, global = true)]
    pub database_port: Option<u16>,

    #[arg(long, global = true)]
    pub database_username: Option<String>,

    #[arg(long, global = true)]
    pub database_password: Option<String>,

    #[arg(long, global = true)]
    pub database_name: Option<String>,
}

impl ConfigArgs {
    pub fn to_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            sql_file: self.sql_file,
            migration_dir: self.migration_dir.clone(),
            database_dialect: self.database_dialect,
            database_url: self.database_url.clone(),
            database_host: self.database_host.clone(),
            database_port: self.database_port,
            database_username: self.database_username.clone(),
            database_password: self.database_password.clone(),
            database_name: self.database_name.clone(),
        }
    }
}

/// Settings shared by every command.
pub struct Context {
    pub config_path: Option<PathBuf>,
    pub overrides: ConfigOverrides,
}

impl Context {
    /// Merge defaults, the configuration file and the command-line overrides.
    pub fn load_config(&self) -> Result<StratumConfig> {
        // Load .env if present
        dotenvy::dotenv().ok();

        let path = match &self.config_path {
            Some(path) => Some(path.clone()),
            None => DEFAULT_CONFIG_FILES
                .iter()
                .map(PathBuf::from)
                .find(|p| p.is_file()),
        };

        StratumConfig::load(path.as_deref(), &self.overrides).with_context(|| match &path {
            Some(path) => format!("Failed to load configuration from {}", path.display()),
            None => "Invalid configuration".to_string(),
        })
    }

    /// A migrator writing its progress to the console.
    pub fn migrator(&self) -> Result<Migrator> {
        let config = self.load_config()?;
        let migrator = Migrator::setup(config)?.with_sink(console_sink());
        Ok(migrator)
    }
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        init_tracing(self.verbose);

        let ctx = Context {
            config_path: self.config,
            overrides: self.overrides.to_overrides(),
        };

        match self.command {
            Commands::Create(cmd) => cmd.execute(&ctx).await,
            Commands::Up(cmd) => cmd.execute(&ctx).await,
            Commands::Down(cmd) => cmd.execute(&ctx).await,
            Commands::Status(cmd) => cmd.execute(&ctx).await,
            Commands::ShowConfig(cmd) => cmd.execute(&ctx).await,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second init (tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Sink printing migrator messages, errors on stderr.
pub fn console_sink() -> LogSink {
    LogSink::new(|message| match message.strip_prefix("Error : ") {
        Some(error) => eprintln!("  {} {}", style("✗").red(), error),
        None => println!("  {} {}", style("→").dim(), message),
    })
}

pub fn print_header(title: &str) {
    println!();
    println!("  {}  {}", style("STRATUM").bold().cyan(), title);
    println!();
}

/// Turn an outcome into the process result.
pub fn finish(outcome: &Outcome, done: &str) -> Result<()> {
    if outcome.is_success() {
        println!("  {} {}", style("✓").green(), done);
        println!();
        return Ok(());
    }

    println!();
    anyhow::bail!(
        "{:?} finished with {} error(s)",
        outcome.operation,
        outcome.errors.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse() {
        let cli = Cli::try_parse_from(["stratum", "up"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_parse_create_names() {
        let cli = Cli::try_parse_from(["stratum", "create", "add", "users"]).unwrap();
        match cli.command {
            Commands::Create(cmd) => assert_eq!(cmd.names, vec!["add", "users"]),
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn test_cli_parse_global_overrides() {
        let cli = Cli::try_parse_from([
            "stratum",
            "down",
            "--config",
            "db.json",
            "--database-dialect",
            "postgresql",
            "--database-port",
            "5433",
            "--sql-file",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("db.json")));
        let overrides = cli.overrides.to_overrides();
        assert_eq!(overrides.database_dialect, Some(Dialect::Postgres));
        assert_eq!(overrides.database_port, Some(5433));
        assert!(overrides.sql_file);
    }

    #[test]
    fn test_cli_rejects_bad_values() {
        assert!(Cli::try_parse_from(["stratum", "up", "--database-dialect", "oracle"]).is_err());
        assert!(Cli::try_parse_from(["stratum", "up", "--database-port", "high"]).is_err());
        assert!(Cli::try_parse_from(["stratum", "sideways"]).is_err());
    }

    #[test]
    fn test_load_config_with_overrides() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stratum.toml");
        std::fs::write(&path, "[database]\ndialect = \"sqlite\"\ndatabase = \"app.db\"\n").unwrap();

        let ctx = Context {
            config_path: Some(path),
            overrides: ConfigOverrides {
                database_name: Some("other.db".into()),
                ..Default::default()
            },
        };

        let config = ctx.load_config().unwrap();
        assert_eq!(config.database.dialect, Dialect::Sqlite);
        assert_eq!(config.database.database, "other.db");
    }

    #[test]
    fn test_load_config_missing_file() {
        let ctx = Context {
            config_path: Some(PathBuf::from("/nonexistent/stratum.toml")),
            overrides: ConfigOverrides::default(),
        };
        let err = ctx.load_config().unwrap_err();
        assert!(format!("{:#}", err).contains("does not exist"));
    }
}
