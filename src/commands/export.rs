use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;

use overhead::export::{self, read_document};

use super::AppContext;

/// Write a JSON backup to `output`, or stdout when no path is given
pub fn handle_export(ctx: &AppContext, output: Option<&Path>) -> Result<()> {
    let document = export::export(
        &ctx.locations(),
        &ctx.settings,
        &ctx.history(),
        Utc::now(),
    )?;
    let json = serde_json::to_string_pretty(&document)?;

    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
            println!("Exported to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

pub fn handle_import(ctx: &AppContext, input: &Path) -> Result<()> {
    let document = read_document(input)?;
    let summary = export::import(
        document,
        &ctx.locations(),
        &ctx.settings_path,
        &mut ctx.history(),
    )?;

    if let Some(count) = summary.locations {
        println!("Imported {} locations", count);
    }
    if summary.settings {
        println!("Imported settings");
    }
    if let Some(count) = summary.history {
        println!("Imported {} history entries", count);
    }
    Ok(())
}
