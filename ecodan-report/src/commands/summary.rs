use anyhow::Result;
use ecodan_common::daily::{daily_summaries, DailySelection};
use ecodan_common::rollup::{monthly_report, monthly_summaries, yearly_report, yearly_summaries};

use super::ReportContext;
use crate::render;

/// Monthly and yearly totals, live data plus historical baseline
pub fn run(ctx: &ReportContext) -> Result<()> {
    let stream = ctx.load_stream()?;
    let baseline = ctx.baseline()?;
    let days = daily_summaries(&stream, &DailySelection::default());

    let months = monthly_report(&days, &baseline);
    if months.is_empty() {
        println!("No data found.");
        return Ok(());
    }
    let years = yearly_report(&months);

    println!();
    print!("{}", render::period_table("Monthly", &months, &monthly_summaries(&days)));
    println!();
    print!("{}", render::period_table("Yearly", &years, &yearly_summaries(&days)));
    println!();
    Ok(())
}
