use std::path::Path;

use anyhow::{Context, Result};
use ecodan_common::daily::{daily_summaries, DailySelection};

use super::ReportContext;
use crate::export::write_daily_csv;

pub fn run(ctx: &ReportContext, output: Option<&Path>) -> Result<()> {
    let stream = ctx.load_stream()?;
    let days = daily_summaries(&stream, &DailySelection::default());
    if days.is_empty() {
        println!("No data found.");
        return Ok(());
    }

    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| ctx.data_folder.join("daily_energy.csv"));
    write_daily_csv(&path, &days).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Written {} ({} days)", path.display(), days.len());
    Ok(())
}
