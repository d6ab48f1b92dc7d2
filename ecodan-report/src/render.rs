//! Console rendering
//!
//! Everything here only formats. Values arrive unrounded from the engine and
//! are rounded for display: energy to 0.01 kWh, temperatures to 0.1, ratios
//! to 0.1 in tables and 0.01 in analysis output.

use std::collections::BTreeMap;
use std::fmt::Write;

use ecodan_common::analysis::{Comparison, CopStats, PeriodReport, RangeStats};
use ecodan_common::model::{
    Category, Channel, DailySummary, Energy, FlowTotals, PeriodKey, PeriodSummary, Segment,
};
use ecodan_common::rollup::ReconciledPeriod;
use ecodan_common::segment::SegmentStats;
use ecodan_common::time::format_timestamp;

const MISSING: &str = "-";

pub fn kwh(value: Option<Energy>) -> String {
    value.map_or_else(|| MISSING.to_string(), |e| format!("{:.2}", e.kwh()))
}

pub fn decimal(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| format!("{:.*}", decimals, v))
}

pub fn temperature(value: Option<f64>) -> String {
    decimal(value, 1)
}

pub fn table_ratio(value: Option<f64>) -> String {
    decimal(value, 1)
}

pub fn analysis_ratio(value: Option<f64>) -> String {
    decimal(value, 2)
}

const CATEGORIES: [(Category, &str); 3] = [
    (Category::Heating, "Htg"),
    (Category::HotWater, "DHW"),
    (Category::Total, "Tot"),
];

fn energy_header(out: &mut String) {
    for (_, label) in CATEGORIES {
        let _ = write!(out, " {:>8} {:>8} {:>5}", format!("{} In", label), format!("{} Out", label), "COP");
    }
}

fn energy_cells(out: &mut String, flow_of: impl Fn(Category) -> (Option<Energy>, Option<Energy>, Option<f64>)) {
    for (category, _) in CATEGORIES {
        let (consumed, delivered, ratio) = flow_of(category);
        let _ = write!(
            out,
            " {:>8} {:>8} {:>5}",
            kwh(consumed),
            kwh(delivered),
            table_ratio(ratio)
        );
    }
}

/// One row per day
pub fn daily_table(days: &[DailySummary]) -> String {
    let mut out = String::new();
    let _ = write!(out, "{:<12} {:>5} {:>6} {:>5}", "Date", "Hours", "Out", "Comp%");
    energy_header(&mut out);
    out.push('\n');
    let width = out.len().saturating_sub(1);
    out.push_str(&"-".repeat(width));
    out.push('\n');

    for day in days {
        let _ = write!(
            out,
            "{:<12} {:>5.1} {:>6} {:>5}",
            day.date.to_string(),
            day.duration_hours(),
            temperature(day.average(Channel::OutsideTemp)),
            decimal(day.active_percentage(Channel::CompressorOn), 0),
        );
        energy_cells(&mut out, |c| {
            let flow = day.energy.get(c);
            (flow.consumed, flow.delivered, flow.ratio())
        });
        if day.energy.attributed.consumed.is_some() || day.energy.attributed.delivered.is_some() {
            out.push_str(" *");
        }
        out.push('\n');
    }
    out
}

fn totals_row(totals: &FlowTotals) -> (Option<Energy>, Option<Energy>, Option<f64>) {
    (totals.consumed, totals.delivered, totals.ratio())
}

/// One row per reconciled month or year
///
/// `live` supplies the outside temperature average where live data exists.
pub fn period_table(
    title: &str,
    periods: &[ReconciledPeriod],
    live: &BTreeMap<PeriodKey, PeriodSummary>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", title);
    let _ = write!(out, "{:<8} {:>4} {:>6}", "Period", "Days", "Out");
    energy_header(&mut out);
    let _ = write!(out, " {:>9}", "Attrib In");
    out.push('\n');

    for period in periods {
        let outside = live.get(&period.key).and_then(|p| p.average(Channel::OutsideTemp));
        let _ = write!(
            out,
            "{:<8} {:>4} {:>6}",
            period.key.to_string(),
            period.days,
            temperature(outside)
        );
        energy_cells(&mut out, |c| totals_row(period.energy.get(c)));
        let _ = write!(out, " {:>9}", kwh(period.energy.attributed.consumed));
        if period.has_baseline {
            out.push_str(" (incl. historical)");
        }
        out.push('\n');
    }
    out
}

/// Segment list for one binary channel
pub fn cycles_table(channel: Channel, segments: &[Segment]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} segments", channel);
    let _ = writeln!(out, "{:<20} {:<20} {:>6} {:>9}", "Start", "End", "State", "Minutes");
    for seg in segments {
        let _ = writeln!(
            out,
            "{:<20} {:<20} {:>6} {:>9.1}",
            format_timestamp(&seg.start),
            format_timestamp(&seg.end),
            if seg.active { "ON" } else { "OFF" },
            seg.duration_minutes()
        );
    }
    let on = SegmentStats::of(segments, true);
    let off = SegmentStats::of(segments, false);
    let _ = writeln!(
        out,
        "ON: {} segments, {:.1} min total | OFF: {} segments, {:.1} min total",
        on.count, on.total_minutes, off.count, off.total_minutes
    );
    out
}

fn range_line(out: &mut String, label: &str, stats: Option<&RangeStats>, unit: &str) {
    match stats {
        Some(s) => {
            let _ = writeln!(
                out,
                "  {:<20} min {:>7.1}  avg {:>7.1}  max {:>7.1} {}",
                label, s.min, s.avg, s.max, unit
            );
        }
        None => {
            let _ = writeln!(out, "  {:<20} no data", label);
        }
    }
}

fn segment_line(out: &mut String, label: &str, stats: &SegmentStats) {
    let _ = writeln!(
        out,
        "  {:<20} {:>4} segments  min {}  avg {}  max {} min",
        label,
        stats.count,
        decimal(stats.min_minutes, 1),
        decimal(stats.average_minutes(), 1),
        decimal(stats.max_minutes, 1)
    );
}

fn cop_line(out: &mut String, channel: Channel, stats: &CopStats) {
    match &stats.nonzero {
        Some(s) => {
            let _ = writeln!(
                out,
                "  {:<20} min {:>5.2}  avg {:>5.2}  max {:>5.2}  ({} readings, {} zero)",
                channel.column(),
                s.min,
                s.avg,
                s.max,
                s.count,
                stats.zero_readings
            );
        }
        None => {
            let _ = writeln!(
                out,
                "  {:<20} no non-zero readings ({} zero)",
                channel.column(),
                stats.zero_readings
            );
        }
    }
}

/// Full diagnostic block for one analysed slice
pub fn period_report(label: &str, report: &PeriodReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ===", label);
    let _ = writeln!(
        out,
        "{} to {}: {} readings over {:.1} hours",
        format_timestamp(&report.from),
        format_timestamp(&report.to),
        report.readings,
        report.hours
    );

    let _ = writeln!(out, "\nTemperatures and flow");
    for (channel, stats) in &report.ranges {
        range_line(&mut out, channel.column(), Some(stats), "");
    }

    let _ = writeln!(out, "\nCompressor");
    let _ = writeln!(out, "  {:<20} {:.1}%", "on", report.compressor_on_pct);
    range_line(&mut out, "frequency (on)", report.frequency_on.as_ref(), "Hz");
    range_line(&mut out, "output power (on)", report.output_power_on.as_ref(), "kW");
    range_line(&mut out, "estimated power (on)", report.estimated_power_on.as_ref(), "kW");
    segment_line(&mut out, "on cycles", &report.compressor_on);
    segment_line(&mut out, "off periods", &report.compressor_off);
    let _ = writeln!(out, "  {:<20} {}", "starts per hour", analysis_ratio(report.starts_per_hour));
    let _ = writeln!(
        out,
        "  {:<20} {}",
        "lifetime starts/h",
        analysis_ratio(report.lifetime_starts_per_hour)
    );

    let _ = writeln!(out, "\nHot water and defrost");
    segment_line(&mut out, "hot water", &report.hot_water);
    segment_line(&mut out, "defrost", &report.defrost);

    if let Some(heat) = &report.heat_delivery {
        let _ = writeln!(
            out,
            "\nEstimated heat delivery (compressor on): {:.1} L/min x {:.1} K = {:.2} kW",
            heat.avg_flow_lmin, heat.avg_delta_t, heat.kw
        );
    }

    let _ = writeln!(out, "\nEnergy (kWh)");
    for (name, flow) in [
        ("heating", &report.heating),
        ("hot water", &report.hot_water_energy),
        ("total", &report.total),
    ] {
        let _ = writeln!(
            out,
            "  {:<20} in {:>8}  out {:>8}  COP {}",
            name,
            kwh(flow.consumed),
            kwh(flow.delivered),
            analysis_ratio(flow.ratio())
        );
    }

    let _ = writeln!(out, "\nReported COP");
    for (channel, stats) in &report.cop {
        cop_line(&mut out, *channel, stats);
    }

    let _ = writeln!(out, "\nCounter deltas");
    for (channel, delta) in &report.counter_deltas {
        let _ = writeln!(out, "  {:<24} {:>+10.2}", channel.column(), delta);
    }
    out
}

pub fn comparison(cmp: &Comparison) -> String {
    let mut out = String::new();
    let split = format_timestamp(&cmp.split);
    for (label, report) in [("Before", &cmp.before), ("After", &cmp.after)] {
        let title = format!("{} {}", label, split);
        match report {
            Some(r) => out.push_str(&period_report(&title, r)),
            None => {
                let _ = writeln!(out, "=== {} ===\nno readings", title);
            }
        }
        out.push('\n');
    }
    out
}
