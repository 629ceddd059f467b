mod database;

pub use database::{DatabaseConfig, Dialect};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, StratumError};
use crate::migration::ExtensionMode;

/// Root configuration for one migration run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StratumConfig {
    /// Migration folder and file layout.
    #[serde(default)]
    pub migrations: MigrationsConfig,

    /// Target database.
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl StratumConfig {
    /// Load configuration from a TOML or JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StratumError::Config(format!(
                "\"{}\" does not exist",
                path.display()
            )));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)
            .map_err(|e| StratumError::Config(format!("Failed to read config file: {}", e)))?;

        match extension.as_deref() {
            Some("toml") => Self::parse_toml(&content),
            Some("json") => Self::parse_json(&content),
            _ => Err(StratumError::Config(
                "Config file must be TOML or JSON file".to_string(),
            )),
        }
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content);

        toml::from_str(&content)
            .map_err(|e| StratumError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Parse configuration from a JSON string.
    pub fn parse_json(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content);

        serde_json::from_str(&content)
            .map_err(|e| StratumError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Defaults, then the optional file, then command-line overrides.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides on top of this configuration.
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if overrides.sql_file {
            self.migrations.mode = ExtensionMode::Sql;
        }
        if let Some(dir) = &overrides.migration_dir {
            self.migrations.folder = dir.clone();
        }

        let db = &mut self.database;
        if let Some(dialect) = overrides.database_dialect {
            db.dialect = dialect;
        }
        if let Some(url) = &overrides.database_url {
            db.url = Some(url.clone());
        }
        if let Some(host) = &overrides.database_host {
            db.host = host.clone();
        }
        if let Some(port) = overrides.database_port {
            db.port = Some(port);
        }
        if let Some(username) = &overrides.database_username {
            db.username = username.clone();
        }
        if let Some(password) = &overrides.database_password {
            db.password = Some(password.clone());
        }
        if let Some(name) = &overrides.database_name {
            db.database = name.clone();
        }
    }

    /// Reject values that would produce broken SQL or paths.
    pub fn validate(&self) -> Result<()> {
        if !is_identifier(&self.migrations.table) {
            return Err(StratumError::Config(format!(
                "Invalid ledger table name: {}",
                self.migrations.table
            )));
        }
        if self.migrations.script_extension.trim_start_matches('.').is_empty() {
            return Err(StratumError::Config(
                "Script extension must not be empty".to_string(),
            ));
        }
        if self.database.pool_size == 0 {
            return Err(StratumError::Config(
                "Pool size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Copy safe to print.
    pub fn redacted(&self) -> Self {
        Self {
            migrations: self.migrations.clone(),
            database: self.database.redacted(),
        }
    }
}

/// Migration folder and file layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationsConfig {
    /// Folder holding the migration files.
    #[serde(default = "default_folder")]
    pub folder: PathBuf,

    /// Kind of files `create` generates.
    #[serde(default)]
    pub mode: ExtensionMode,

    /// Extension of script migrations.
    #[serde(default = "default_script_extension")]
    pub script_extension: String,

    /// Ledger table name.
    #[serde(default = "default_table")]
    pub table: String,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            folder: default_folder(),
            mode: ExtensionMode::default(),
            script_extension: default_script_extension(),
            table: default_table(),
        }
    }
}

fn default_folder() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_script_extension() -> String {
    "rs".to_string()
}

fn default_table() -> String {
    "migrations".to_string()
}

/// Values given on the command line, applied over the file configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Force `_up.sql` / `_down.sql` pairs.
    pub sql_file: bool,
    pub migration_dir: Option<PathBuf>,
    pub database_dialect: Option<Dialect>,
    pub database_url: Option<String>,
    pub database_host: Option<String>,
    pub database_port: Option<u16>,
    pub database_username: Option<String>,
    pub database_password: Option<String>,
    pub database_name: Option<String>,
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

static ENV_VAR: Lazy<regex_lite::Regex> = Lazy::new(|| {
    regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("env var pattern is valid")
});

/// Substitute environment variables in the format ${VAR_NAME}.
fn substitute_env_vars(content: &str) -> String {
    let mut result = content.to_string();

    for cap in ENV_VAR.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}
