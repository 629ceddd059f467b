use anyhow::Result;
use clap::Parser;
use console::style;

use super::{print_header, Context};

/// Show applied and pending migrations.
#[derive(Parser)]
pub struct StatusCommand {
    /// Print as JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusCommand {
    pub async fn execute(self, ctx: &Context) -> Result<()> {
        let migrator = ctx.migrator()?;
        let status = migrator.status().await;
        migrator.close().await;
        let status = status?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&status)?);
            return Ok(());
        }

        print_header("Migration Status");

        if status.applied.is_empty() && status.pending.is_empty() {
            println!("  {} No migrations found", style("ℹ").blue());
            println!();
            return Ok(());
        }

        if !status.applied.is_empty() {
            println!("  {} Applied:", style("✓").green());
            for entry in &status.applied {
                println!(
                    "    {} {} ({})",
                    style(&entry.name).cyan(),
                    style("at").dim(),
                    entry.applied_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }

        if !status.pending.is_empty() {
            if !status.applied.is_empty() {
                println!();
            }
            println!("  {} Pending:", style("○").yellow());
            for name in &status.pending {
                println!("    {} {}", style("→").dim(), style(name).yellow());
            }
        }

        println!();
        println!(
            "  {} {} applied, {} pending",
            style("ℹ").blue(),
            status.applied.len(),
            status.pending.len()
        );
        println!();

        Ok(())
    }
}
