use anyhow::Result;
use chrono::NaiveDateTime;
use ecodan_common::analysis::{analyze, compare};

use super::ReportContext;
use crate::render;

/// Analyse `[from, to)`; open bounds extend to the ends of the log
pub fn run(ctx: &ReportContext, from: Option<NaiveDateTime>, to: Option<NaiveDateTime>) -> Result<()> {
    let stream = ctx.load_stream()?;
    let slice = stream.range(from, to);
    match analyze(slice) {
        Some(report) => {
            let label = match (from, to) {
                (None, None) => "Whole log".to_string(),
                _ => "Selected period".to_string(),
            };
            print!("{}", render::period_report(&label, &report));
        }
        None => println!("No data found."),
    }
    Ok(())
}

/// Analyse both sides of a split instant
pub fn run_compare(ctx: &ReportContext, split: NaiveDateTime) -> Result<()> {
    let stream = ctx.load_stream()?;
    if stream.is_empty() {
        println!("No data found.");
        return Ok(());
    }
    print!("{}", render::comparison(&compare(&stream, split)));
    Ok(())
}
