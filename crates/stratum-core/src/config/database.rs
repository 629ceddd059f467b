use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, StratumError};

/// SQL dialect of the target database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Mysql,
    Postgres,
    Sqlite,
}

impl Dialect {
    /// URL scheme understood by the sqlx drivers.
    pub fn scheme(&self) -> &'static str {
        match self {
            Dialect::Mysql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Bind placeholder for the `n`th (1-based) parameter.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", n),
            Dialect::Mysql | Dialect::Sqlite => "?".to_string(),
        }
    }

    /// Placeholder for a timestamp bound as `YYYY-MM-DD HH:MM:SS` text.
    pub fn timestamp_placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("CAST(${} AS TIMESTAMP)", n),
            Dialect::Mysql | Dialect::Sqlite => "?".to_string(),
        }
    }

    /// Expression reading a timestamp column back as text.
    pub fn timestamp_as_text(&self, column: &str) -> String {
        match self {
            Dialect::Mysql => format!("CAST({} AS CHAR)", column),
            Dialect::Postgres | Dialect::Sqlite => format!("CAST({} AS TEXT)", column),
        }
    }

    /// Column definition for an auto-incrementing integer primary key.
    pub fn auto_increment_key(&self, column: &str) -> String {
        match self {
            Dialect::Mysql => format!("{} INT NOT NULL AUTO_INCREMENT PRIMARY KEY", column),
            Dialect::Postgres => format!("{} SERIAL PRIMARY KEY", column),
            Dialect::Sqlite => format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", column),
        }
    }

    /// Column type for a second-precision instant.
    pub fn datetime_type(&self) -> &'static str {
        match self {
            Dialect::Postgres => "TIMESTAMP",
            Dialect::Mysql | Dialect::Sqlite => "DATETIME",
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.scheme())
    }
}

impl std::str::FromStr for Dialect {
    type Err = StratumError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Dialect::Mysql),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(StratumError::Config(format!("Unknown dialect: {}", other))),
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub dialect: Dialect,

    /// Full connection URL; takes precedence over the individual fields.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_host")]
    pub host: String,

    /// Port, or the dialect's default when unset.
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default)]
    pub password: Option<String>,

    /// Database name, or the file path for SQLite (`:memory:` for in-memory).
    #[serde(default = "default_database")]
    pub database: String,

    /// Connection pool size. Migrations run on one handle.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Pool checkout timeout in seconds.
    #[serde(default = "default_pool_timeout")]
    pub pool_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            url: None,
            host: default_host(),
            port: None,
            username: default_username(),
            password: None,
            database: default_database(),
            pool_size: default_pool_size(),
            pool_timeout_secs: default_pool_timeout(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_username() -> String {
    "root".to_string()
}

fn default_database() -> String {
    "test".to_string()
}

fn default_pool_size() -> u32 {
    1
}

fn default_pool_timeout() -> u64 {
    30
}

impl DatabaseConfig {
    /// Connection URL for the configured dialect.
    pub fn connection_url(&self) -> Result<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }

        if self.dialect == Dialect::Sqlite {
            return Ok(match self.database.as_str() {
                ":memory:" => "sqlite::memory:".to_string(),
                path => format!("sqlite://{}?mode=rwc", path),
            });
        }

        let invalid = |what: &str| StratumError::Config(format!("Invalid database {}", what));

        let mut url = Url::parse(&format!("{}://{}", self.dialect.scheme(), self.host))
            .map_err(|e| StratumError::Config(format!("Invalid database host: {}", e)))?;
        url.set_username(&self.username)
            .map_err(|_| invalid("username"))?;
        url.set_password(self.password.as_deref())
            .map_err(|_| invalid("password"))?;
        url.set_port(self.port).map_err(|_| invalid("port"))?;
        url.set_path(&self.database);

        Ok(url.to_string())
    }

    /// Copy with the password hidden, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.password.is_some() {
            copy.password = Some("********".to_string());
        }
        if let Some(mut url) = copy.url.as_deref().and_then(|u| Url::parse(u).ok()) {
            if url.password().is_some() && url.set_password(Some("********")).is_ok() {
                copy.url = Some(url.to_string());
            }
        }
        copy
    }
}
