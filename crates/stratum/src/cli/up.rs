use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use clap::Parser;
use stratum_core::naming;

use super::{finish, print_header, Context};

/// Apply pending migrations.
#[derive(Parser)]
pub struct UpCommand {
    /// Only apply migrations stamped before this instant (UTC).
    ///
    /// Accepts `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD`, `YYYYMMDDHHmmss` or RFC 3339.
    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDateTime>,
}

impl UpCommand {
    pub async fn execute(self, ctx: &Context) -> Result<()> {
        let mut migrator = ctx.migrator()?;
        print_header("Migrations");

        let outcome = migrator.up(self.date).await;
        migrator.close().await;

        if outcome.is_noop() {
            println!("  {} Database is up to date", console::style("ℹ").blue());
            println!();
            return Ok(());
        }

        finish(
            &outcome,
            &format!("Applied {} migration(s)", outcome.files.len()),
        )
    }
}

fn parse_date(value: &str) -> std::result::Result<NaiveDateTime, String> {
    let value = value.trim();

    if let Ok(at) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Ok(at);
    }
    if let Ok(at) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(at);
    }
    if let Some(at) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(at);
    }
    if value.len() == naming::TIMESTAMP_LEN {
        if let Some(at) = naming::decode(value) {
            return Ok(at);
        }
    }

    DateTime::parse_from_rfc3339(value)
        .map(|at| at.naive_utc())
        .map_err(|_| format!("invalid date '{}', expected YYYY-MM-DDTHH:MM:SS", value))
}
