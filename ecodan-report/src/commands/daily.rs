use anyhow::Result;
use ecodan_common::daily::{daily_summaries, DailySelection};

use super::ReportContext;
use crate::render;

pub fn run(ctx: &ReportContext) -> Result<()> {
    let stream = ctx.load_stream()?;
    let days = daily_summaries(&stream, &DailySelection::default());
    if days.is_empty() {
        println!("No data found.");
        return Ok(());
    }

    println!();
    print!("{}", render::daily_table(&days));
    if days.iter().any(|d| !d.energy.attributed.is_unavailable()) {
        println!("* unexplained energy attributed to heating");
    }
    println!();
    Ok(())
}
