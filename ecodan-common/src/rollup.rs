//! Month and year rollups
//!
//! Daily summaries fold into [`PeriodSummary`] values by integer addition,
//! so rolling up days in any order or grouping gives identical totals.
//! Months that predate live collection come from a [`HistoricalBaseline`];
//! [`reconcile_month`] combines the two and applies the attribution rule to
//! the combined figure.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

use crate::model::{DailySummary, Energy, EnergyFlow, FlowTotals, PeriodEnergy, PeriodKey, PeriodSummary};
use crate::reconcile::{attribution, derive_total};
use crate::{Error, Result};

/// Previously known totals for one month, all in kWh
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineMonth {
    #[serde(default)]
    pub htg_consumed_kwh: Option<f64>,
    #[serde(default)]
    pub dhw_consumed_kwh: Option<f64>,
    #[serde(default)]
    pub htg_delivered_kwh: Option<f64>,
    #[serde(default)]
    pub dhw_delivered_kwh: Option<f64>,
    #[serde(default)]
    pub total_consumed_kwh: Option<f64>,
    #[serde(default)]
    pub total_delivered_kwh: Option<f64>,
}

fn energy(kwh: Option<f64>) -> Option<Energy> {
    kwh.filter(|v| v.is_finite()).map(Energy::from_kwh)
}

impl BaselineMonth {
    /// Baseline figures as rollup totals; a missing total is derived from the breakdown
    pub fn energy(&self) -> PeriodEnergy {
        let heating = EnergyFlow::new(energy(self.htg_consumed_kwh), energy(self.htg_delivered_kwh));
        let hot_water = EnergyFlow::new(energy(self.dhw_consumed_kwh), energy(self.dhw_delivered_kwh));
        let total = EnergyFlow::new(
            derive_total(energy(self.total_consumed_kwh), heating.consumed, hot_water.consumed),
            derive_total(energy(self.total_delivered_kwh), heating.delivered, hot_water.delivered),
        );
        PeriodEnergy {
            heating: heating.into(),
            hot_water: hot_water.into(),
            total: total.into(),
            attributed: FlowTotals::default(),
        }
    }
}

/// Externally supplied monthly totals keyed by month
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoricalBaseline {
    months: BTreeMap<PeriodKey, BaselineMonth>,
}

impl HistoricalBaseline {
    /// Load from a JSON map of `"YYYY-MM"` to [`BaselineMonth`]
    ///
    /// A missing file is an empty baseline.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No historical baseline at {}", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let baseline = Self::from_json_str(&text)?;
        debug!("Loaded {} historical months from {}", baseline.months.len(), path.display());
        Ok(baseline)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: BTreeMap<String, BaselineMonth> = serde_json::from_str(text)?;
        let mut months = BTreeMap::new();
        for (key, month) in raw {
            match key.parse::<PeriodKey>()? {
                k @ PeriodKey::Month { .. } => {
                    months.insert(k, month);
                }
                PeriodKey::Year(_) => {
                    return Err(Error::Parse(format!("baseline key '{}' is not a month", key)));
                }
            }
        }
        Ok(Self { months })
    }

    pub fn get(&self, key: &PeriodKey) -> Option<&BaselineMonth> {
        self.months.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &PeriodKey> {
        self.months.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }
}

/// Fold days into one summary per key
pub fn rollup<F>(days: &[DailySummary], key_of: F) -> BTreeMap<PeriodKey, PeriodSummary>
where
    F: Fn(NaiveDate) -> PeriodKey,
{
    let mut periods: BTreeMap<PeriodKey, PeriodSummary> = BTreeMap::new();
    for day in days {
        let key = key_of(day.date);
        let part = PeriodSummary::from_day(key, day);
        periods
            .entry(key)
            .and_modify(|p| p.merge(&part))
            .or_insert(part);
    }
    periods
}

pub fn monthly_summaries(days: &[DailySummary]) -> BTreeMap<PeriodKey, PeriodSummary> {
    rollup(days, PeriodKey::month_of)
}

pub fn yearly_summaries(days: &[DailySummary]) -> BTreeMap<PeriodKey, PeriodSummary> {
    rollup(days, PeriodKey::year_of)
}

/// Merge pre-aggregated parts of the same window
pub fn merge_parts<'a, I>(key: PeriodKey, parts: I) -> PeriodSummary
where
    I: IntoIterator<Item = &'a PeriodSummary>,
{
    let mut merged = PeriodSummary::empty(key);
    for part in parts {
        merged.merge(part);
    }
    merged
}

/// Final figures for one window after the baseline merge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledPeriod {
    pub key: PeriodKey,
    /// Days of live data in the window
    pub days: u32,
    pub energy: PeriodEnergy,
    pub has_baseline: bool,
}

impl ReconciledPeriod {
    /// Add another reconciled window's totals, e.g. months into a year
    pub fn absorb(&mut self, other: &ReconciledPeriod) {
        self.days += other.days;
        self.energy.merge(&other.energy);
        self.has_baseline |= other.has_baseline;
    }
}

/// `historical + sum(daily)` for one month, then the attribution rule
pub fn reconcile_month(
    key: PeriodKey,
    live: Option<&PeriodSummary>,
    baseline: Option<&BaselineMonth>,
) -> ReconciledPeriod {
    let mut energy = live.map(|p| p.energy).unwrap_or_default();
    if let Some(b) = baseline {
        energy.merge(&b.energy());
    }

    let extra = attribution(
        &energy.total.as_flow(),
        &energy.heating.as_flow(),
        &energy.hot_water.as_flow(),
    );
    if !extra.is_unavailable() {
        let extra = FlowTotals::from(extra);
        energy.heating.merge(&extra);
        energy.attributed.merge(&extra);
    }

    ReconciledPeriod {
        key,
        days: live.map_or(0, |p| p.days),
        energy,
        has_baseline: baseline.is_some(),
    }
}

/// Every month with live data or a baseline, reconciled, in order
pub fn monthly_report(days: &[DailySummary], baseline: &HistoricalBaseline) -> Vec<ReconciledPeriod> {
    let live = monthly_summaries(days);
    let keys: BTreeSet<PeriodKey> = live.keys().chain(baseline.keys()).copied().collect();
    keys.into_iter()
        .map(|key| reconcile_month(key, live.get(&key), baseline.get(&key)))
        .collect()
}

/// Sum of reconciled months per calendar year
pub fn yearly_report(months: &[ReconciledPeriod]) -> Vec<ReconciledPeriod> {
    let mut years: BTreeMap<i32, ReconciledPeriod> = BTreeMap::new();
    for month in months {
        let year = month.key.year();
        years
            .entry(year)
            .or_insert_with(|| ReconciledPeriod {
                key: PeriodKey::Year(year),
                days: 0,
                energy: PeriodEnergy::default(),
                has_baseline: false,
            })
            .absorb(month);
    }
    years.into_values().collect()
}
