//! Daily CSV export for spreadsheets

use std::fs;
use std::path::Path;

use ecodan_common::model::{Category, Channel, DailySummary};
use ecodan_common::Result;

use crate::render::{decimal, kwh, table_ratio, temperature};

pub const EXPORT_HEADER: [&str; 12] = [
    "Date",
    "Out \u{b0}C",
    "Comp %",
    "Htg Con kWh",
    "Htg Del kWh",
    "Htg COP",
    "DHW Con kWh",
    "DHW Del kWh",
    "DHW COP",
    "Total Con kWh",
    "Total Del kWh",
    "Total COP",
];

fn cell(value: String) -> String {
    // Missing values are empty cells, not the console placeholder
    if value == "-" {
        String::new()
    } else {
        value
    }
}

fn row(day: &DailySummary) -> Vec<String> {
    let mut cells = vec![
        day.date.format("%Y-%m-%d").to_string(),
        cell(temperature(day.average(Channel::OutsideTemp))),
        cell(decimal(day.active_percentage(Channel::CompressorOn), 0)),
    ];
    for category in [Category::Heating, Category::HotWater, Category::Total] {
        let flow = day.energy.get(category);
        cells.push(cell(kwh(flow.consumed)));
        cells.push(cell(kwh(flow.delivered)));
        cells.push(cell(table_ratio(flow.ratio())));
    }
    cells
}

/// Render the daily summaries as CSV text
pub fn daily_csv(days: &[DailySummary]) -> String {
    let mut out = EXPORT_HEADER.join(",");
    out.push('\n');
    for day in days {
        out.push_str(&row(day).join(","));
        out.push('\n');
    }
    out
}

/// Write the export, replacing any previous file
pub fn write_daily_csv(path: &Path, days: &[DailySummary]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, daily_csv(days))?;
    Ok(())
}
