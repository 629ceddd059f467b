use anyhow::Result;
use clap::Parser;
use console::style;

use super::{finish, print_header, Context};

/// Revert the most recently applied migration.
#[derive(Parser)]
pub struct DownCommand {}

impl DownCommand {
    pub async fn execute(self, ctx: &Context) -> Result<()> {
        let mut migrator = ctx.migrator()?;
        print_header("Migrations");

        let outcome = migrator.down().await;
        migrator.close().await;

        if outcome.is_noop() {
            println!("  {} No migrations to rollback", style("ℹ").blue());
            println!();
            return Ok(());
        }

        let done = match outcome.files.first() {
            Some(name) => format!("Rolled back: {}", name),
            None => String::new(),
        };
        finish(&outcome, &done)
    }
}
