use anyhow::Result;
use clap::Parser;

use super::Context;

/// Print the merged configuration as JSON, password masked.
#[derive(Parser)]
pub struct ShowConfigCommand {}

impl ShowConfigCommand {
    pub async fn execute(self, ctx: &Context) -> Result<()> {
        let config = ctx.load_config()?;
        println!("{}", serde_json::to_string_pretty(&config.redacted())?);
        Ok(())
    }
}
