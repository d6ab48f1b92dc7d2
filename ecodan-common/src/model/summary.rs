//! Derived shapes produced by the batch engine
//!
//! [`DailySummary`] is computed once per local date and never mutated
//! afterwards. [`PeriodSummary`] is the month/year rollup; its merge is plain
//! integer addition so any grouping of days yields the same totals.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::channel::Channel;
use super::energy::{add_available, Energy, MeanAccumulator};
use crate::efficiency::{self, PairedEnergy};
use crate::error::{Error, Result};

/// A maximal run of constant state for one binary channel, `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub channel: Channel,
    pub active: bool,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Segment {
    /// Wall-clock length in minutes
    pub fn duration_minutes(&self) -> f64 {
        (self.end - self.start).num_seconds() as f64 / 60.0
    }
}

/// Consumed/delivered delta for one category over one window
///
/// Either side may be unavailable independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyFlow {
    pub consumed: Option<Energy>,
    pub delivered: Option<Energy>,
}

impl EnergyFlow {
    pub fn new(consumed: Option<Energy>, delivered: Option<Energy>) -> Self {
        Self { consumed, delivered }
    }

    /// Guarded delivered/consumed ratio
    pub fn ratio(&self) -> Option<f64> {
        efficiency::ratio(self.delivered, self.consumed)
    }

    pub fn is_unavailable(&self) -> bool {
        self.consumed.is_none() && self.delivered.is_none()
    }
}

/// Energy categories the controller meters separately
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Heating,
    HotWater,
    Total,
}

/// Per-day energy after reconciliation
///
/// `heating` already includes `attributed`, the share of the total that no
/// breakdown counter explained. The measured heating delta is
/// `heating - attributed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyBreakdown {
    pub heating: EnergyFlow,
    pub hot_water: EnergyFlow,
    pub total: EnergyFlow,
    pub attributed: EnergyFlow,
}

impl EnergyBreakdown {
    pub fn get(&self, category: Category) -> &EnergyFlow {
        match category {
            Category::Heating => &self.heating,
            Category::HotWater => &self.hot_water,
            Category::Total => &self.total,
        }
    }
}

/// How many readings in a window had a binary channel active
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveShare {
    pub active: u64,
    pub total: u64,
}

impl ActiveShare {
    pub fn merge(&mut self, other: &ActiveShare) {
        self.active += other.active;
        self.total += other.total;
    }

    pub fn percentage(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.active as f64 * 100.0 / self.total as f64)
        }
    }
}

/// One calendar day of readings, reduced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub readings: usize,
    pub first: NaiveDateTime,
    pub last: NaiveDateTime,
    pub averages: BTreeMap<Channel, MeanAccumulator>,
    pub active: BTreeMap<Channel, ActiveShare>,
    pub energy: EnergyBreakdown,
}

impl DailySummary {
    /// Span between the first and last reading of the day, in hours
    pub fn duration_hours(&self) -> f64 {
        (self.last - self.first).num_seconds() as f64 / 3600.0
    }

    pub fn average(&self, channel: Channel) -> Option<f64> {
        self.averages.get(&channel).and_then(MeanAccumulator::mean)
    }

    pub fn active_percentage(&self, channel: Channel) -> Option<f64> {
        self.active.get(&channel).and_then(ActiveShare::percentage)
    }
}

/// Calendar window a [`PeriodSummary`] covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PeriodKey {
    Month { year: i32, month: u32 },
    Year(i32),
}

impl PeriodKey {
    pub fn month_of(date: NaiveDate) -> Self {
        PeriodKey::Month {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year_of(date: NaiveDate) -> Self {
        PeriodKey::Year(date.year())
    }

    pub fn year(&self) -> i32 {
        match *self {
            PeriodKey::Month { year, .. } | PeriodKey::Year(year) => year,
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKey::Month { year, month } => write!(f, "{:04}-{:02}", year, month),
            PeriodKey::Year(year) => write!(f, "{:04}", year),
        }
    }
}

impl FromStr for PeriodKey {
    type Err = Error;

    /// Accepts `YYYY-MM` or `YYYY`
    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::Parse(format!("invalid period key '{}'", s));
        match s.split_once('-') {
            Some((y, m)) => {
                let year: i32 = y.parse().map_err(|_| bad())?;
                let month: u32 = m.parse().map_err(|_| bad())?;
                if !(1..=12).contains(&month) {
                    return Err(bad());
                }
                Ok(PeriodKey::Month { year, month })
            }
            None => s.parse().map(PeriodKey::Year).map_err(|_| bad()),
        }
    }
}

/// Rollup accumulator for one energy category
///
/// `consumed`/`delivered` sum whatever each constituent reported; the ratio
/// comes from the paired sums only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowTotals {
    pub consumed: Option<Energy>,
    pub delivered: Option<Energy>,
    paired: PairedEnergy,
}

impl FlowTotals {
    pub fn merge(&mut self, other: &FlowTotals) {
        self.consumed = add_available(self.consumed, other.consumed);
        self.delivered = add_available(self.delivered, other.delivered);
        self.paired.merge(&other.paired);
    }

    /// Weighted ratio over the constituents that reported both sides
    pub fn ratio(&self) -> Option<f64> {
        self.paired.ratio()
    }

    pub fn as_flow(&self) -> EnergyFlow {
        EnergyFlow::new(self.consumed, self.delivered)
    }
}

impl From<EnergyFlow> for FlowTotals {
    fn from(flow: EnergyFlow) -> Self {
        Self {
            consumed: flow.consumed,
            delivered: flow.delivered,
            paired: std::iter::once(&flow).collect(),
        }
    }
}

/// Energy totals for a rollup window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodEnergy {
    pub heating: FlowTotals,
    pub hot_water: FlowTotals,
    pub total: FlowTotals,
    pub attributed: FlowTotals,
}

impl PeriodEnergy {
    pub fn merge(&mut self, other: &PeriodEnergy) {
        self.heating.merge(&other.heating);
        self.hot_water.merge(&other.hot_water);
        self.total.merge(&other.total);
        self.attributed.merge(&other.attributed);
    }

    pub fn get(&self, category: Category) -> &FlowTotals {
        match category {
            Category::Heating => &self.heating,
            Category::HotWater => &self.hot_water,
            Category::Total => &self.total,
        }
    }
}

impl From<&EnergyBreakdown> for PeriodEnergy {
    fn from(b: &EnergyBreakdown) -> Self {
        Self {
            heating: b.heating.into(),
            hot_water: b.hot_water.into(),
            total: b.total.into(),
            attributed: b.attributed.into(),
        }
    }
}

/// Month or year rollup of daily summaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub key: PeriodKey,
    pub days: u32,
    pub readings: u64,
    pub averages: BTreeMap<Channel, MeanAccumulator>,
    pub active: BTreeMap<Channel, ActiveShare>,
    pub energy: PeriodEnergy,
}

impl PeriodSummary {
    pub fn empty(key: PeriodKey) -> Self {
        Self {
            key,
            days: 0,
            readings: 0,
            averages: BTreeMap::new(),
            active: BTreeMap::new(),
            energy: PeriodEnergy::default(),
        }
    }

    pub fn from_day(key: PeriodKey, day: &DailySummary) -> Self {
        Self {
            key,
            days: 1,
            readings: day.readings as u64,
            averages: day.averages.clone(),
            active: day.active.clone(),
            energy: PeriodEnergy::from(&day.energy),
        }
    }

    /// Fold another summary for the same window into this one
    ///
    /// Every field is an integer sum, so merge order and grouping never
    /// change the result.
    pub fn merge(&mut self, other: &PeriodSummary) {
        self.days += other.days;
        self.readings += other.readings;
        for (channel, acc) in &other.averages {
            self.averages.entry(*channel).or_default().merge(acc);
        }
        for (channel, share) in &other.active {
            self.active.entry(*channel).or_default().merge(share);
        }
        self.energy.merge(&other.energy);
    }

    pub fn average(&self, channel: Channel) -> Option<f64> {
        self.averages.get(&channel).and_then(MeanAccumulator::mean)
    }

    pub fn active_percentage(&self, channel: Channel) -> Option<f64> {
        self.active.get(&channel).and_then(ActiveShare::percentage)
    }
}
