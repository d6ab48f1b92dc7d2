//! Live collector
//!
//! Holds the most recent value of every channel while the transport pushes
//! updates, and turns it into one [`Reading`] per flush cycle.
//!
//! # Locking
//!
//! The latest-value table sits behind a single `std::sync::Mutex`. Every
//! operation holds it only long enough to copy or overwrite a fixed-size
//! array, so producers never wait on the flush path and the flush path never
//! waits on a producer. Everything slow (derived channels, the auxiliary
//! network fetch, the file append) happens on the copy after the lock is
//! released.
//!
//! Updates applied through [`LiveCollector::update_batch`] share one lock
//! acquisition, so a snapshot sees either none or all of them.

use chrono::NaiveDateTime;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::model::{Channel, ChannelOrigin, EntityId, Reading};
use crate::store::RecordSink;
use crate::time::now_local;
use crate::{efficiency, Error, Result};

#[derive(Debug)]
struct LatestValues {
    values: [Option<f64>; Channel::COUNT],
    updates: u64,
}

/// Most recent value per channel, shared between producers and the flush loop
#[derive(Debug)]
pub struct LiveCollector {
    latest: Mutex<LatestValues>,
}

/// Result of feeding one raw transport event to the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Value stored for the channel
    Updated(Channel),
    /// Payload did not parse; the channel is now absent
    Cleared(Channel),
    /// Entity is not in the channel table
    Ignored,
}

impl Default for LiveCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveCollector {
    pub fn new() -> Self {
        Self {
            latest: Mutex::new(LatestValues {
                values: [None; Channel::COUNT],
                updates: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LatestValues> {
        // A panicking holder cannot leave the array half-written
        self.latest.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Overwrite the stored value for one channel
    pub fn update(&self, channel: Channel, value: f64) {
        self.set(channel, Some(value).filter(|v| v.is_finite()));
    }

    fn set(&self, channel: Channel, value: Option<f64>) {
        let mut latest = self.lock();
        latest.values[channel.index()] = value;
        latest.updates += 1;
    }

    /// Apply several updates under one lock acquisition
    pub fn update_batch(&self, updates: &[(Channel, f64)]) {
        let mut latest = self.lock();
        for (channel, value) in updates {
            latest.values[channel.index()] = Some(*value).filter(|v| v.is_finite());
        }
        latest.updates += updates.len() as u64;
    }

    /// Map a transport entity through the channel table and store its payload
    ///
    /// Unknown entities are ignored. Derived and auxiliary channels cannot be
    /// written from the transport.
    pub fn ingest(&self, entity: &EntityId<'_>, payload: &str) -> IngestOutcome {
        let channel = match entity.channel() {
            Some(c) if matches!(c.origin(), ChannelOrigin::Inbound { .. }) => c,
            _ => {
                debug!(
                    "Ignoring unknown entity {}/{}",
                    entity.component.as_str(),
                    entity.object_id
                );
                return IngestOutcome::Ignored;
            }
        };

        match channel.kind().parse_payload(payload) {
            Some(value) => {
                self.set(channel, Some(value));
                IngestOutcome::Updated(channel)
            }
            None => {
                debug!("Unparseable payload '{}' for {}", payload, channel);
                self.set(channel, None);
                IngestOutcome::Cleared(channel)
            }
        }
    }

    /// Total number of updates applied since creation
    pub fn update_count(&self) -> u64 {
        self.lock().updates
    }

    /// Copy of the latest values at one instant
    ///
    /// Returns `None` while no channel holds a value, including when every
    /// update so far was a clear. Derived channels are not included; see
    /// [`apply_derived`].
    pub fn snapshot(&self, timestamp: NaiveDateTime) -> Option<Reading> {
        let values = self.lock().values;
        if values.iter().all(Option::is_none) {
            return None;
        }

        let mut reading = Reading::new(timestamp);
        for channel in Channel::ALL {
            reading.set(channel, values[channel.index()]);
        }
        Some(reading)
    }
}

/// Compute derived channels from an already-taken snapshot
pub fn apply_derived(reading: &mut Reading) {
    let delta_t = match (reading.get(Channel::FeedTemp), reading.get(Channel::ReturnTemp)) {
        (Some(feed), Some(ret)) => Some(round1(feed - ret)),
        _ => None,
    };
    reading.set(Channel::DeltaT, delta_t);
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Pull-based source of auxiliary channel values, queried once per cycle
pub trait AuxiliarySource: Send + Sync {
    fn fetch(&self) -> impl Future<Output = Result<Vec<(Channel, f64)>>> + Send;
}

/// Auxiliary source that never contributes anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuxiliary;

impl AuxiliarySource for NoAuxiliary {
    async fn fetch(&self) -> Result<Vec<(Channel, f64)>> {
        Ok(Vec::new())
    }
}

/// An optional source contributes nothing when disabled
impl<T: AuxiliarySource> AuxiliarySource for Option<T> {
    async fn fetch(&self) -> Result<Vec<(Channel, f64)>> {
        match self {
            Some(source) => source.fetch().await,
            None => Ok(Vec::new()),
        }
    }
}

/// What one flush cycle did
#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
    Written(Reading),
    NoData,
}

/// Run one cycle: snapshot, derive, augment, append
///
/// Auxiliary failures and timeouts omit the auxiliary channels and never
/// prevent the record from being written. Sink errors are returned.
pub async fn flush_once<S, A>(
    collector: &LiveCollector,
    sink: &mut S,
    auxiliary: &A,
    auxiliary_timeout: Duration,
    timestamp: NaiveDateTime,
) -> Result<FlushOutcome>
where
    S: RecordSink,
    A: AuxiliarySource,
{
    let mut reading = match collector.snapshot(timestamp) {
        Some(r) => r,
        None => return Ok(FlushOutcome::NoData),
    };
    apply_derived(&mut reading);

    match tokio::time::timeout(auxiliary_timeout, auxiliary.fetch()).await {
        Ok(Ok(values)) => {
            for (channel, value) in values {
                if channel.origin() == ChannelOrigin::Auxiliary {
                    reading.set(channel, Some(value));
                }
            }
        }
        Ok(Err(e)) => warn!("Auxiliary fetch failed: {}", e),
        Err(_) => warn!("Auxiliary fetch timed out after {:?}", auxiliary_timeout),
    }

    sink.append(&reading)?;
    Ok(FlushOutcome::Written(reading))
}

/// One-line operator status for a flushed record
pub fn status_line(reading: &Reading) -> String {
    fn fmt(value: Option<f64>, decimals: usize) -> String {
        value
            .map(|v| format!("{:.*}", decimals, v))
            .unwrap_or_else(|| "?".to_string())
    }

    let day_cop = efficiency::ratio_kwh(
        reading.get(Channel::DailyProducedKwh),
        reading.get(Channel::DailyConsumedKwh),
    );

    let short_cycle = if reading.is_active(Channel::ShortCycleLockout) {
        "LOCK"
    } else if reading.is_active(Channel::PredictiveBoost) {
        "BOOST"
    } else {
        "ok"
    };

    format!(
        "Out:{}C | Tgt:{}C | Feed:{}C | Ret:{}C | dT:{}C | Hz:{} | COP:{} | hCOP:{} | Day COP:{} | \
         Flow:{}L/m | Comp:{} | DHW:{} | SC:{} | Room:{}C",
        fmt(reading.get(Channel::OutsideTemp), 1),
        fmt(reading.get(Channel::FlowTargetTemp), 1),
        fmt(reading.get(Channel::FeedTemp), 1),
        fmt(reading.get(Channel::ReturnTemp), 1),
        fmt(reading.get(Channel::DeltaT), 1),
        fmt(reading.get(Channel::CompressorHz), 0),
        fmt(reading.get(Channel::EstimatedCop), 1),
        fmt(reading.get(Channel::HeatingCop), 1),
        fmt(day_cop, 1),
        fmt(reading.get(Channel::FlowRateLmin), 1),
        if reading.is_active(Channel::CompressorOn) { "ON" } else { "OFF" },
        if reading.is_active(Channel::DhwValve) { "ON" } else { "HTG" },
        short_cycle,
        fmt(reading.get(Channel::RoomTemp), 1),
    )
}

/// Flush loop timing
#[derive(Debug, Clone, Copy)]
pub struct FlushSchedule {
    pub interval: Duration,
    pub auxiliary_timeout: Duration,
}

/// Running flush loop; owns the sink until stopped
pub struct CollectorHandle<S> {
    cancel: CancellationToken,
    task: JoinHandle<S>,
}

impl<S> CollectorHandle<S> {
    /// Token that stops the loop when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the loop and hand back the sink
    ///
    /// A cycle already in progress completes first, so no record is cut short.
    pub async fn stop(self) -> Result<S> {
        self.cancel.cancel();
        self.task.await.map_err(|e| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("collector task failed: {}", e),
            ))
        })
    }
}

/// Spawn the periodic flush loop
///
/// The first cycle fires one interval after start. A silent producer yields a
/// "no data" log line; a failing sink is logged and retried next cycle. The
/// loop only ends when the handle is stopped.
pub fn start<S, A>(
    collector: Arc<LiveCollector>,
    mut sink: S,
    auxiliary: A,
    schedule: FlushSchedule,
) -> CollectorHandle<S>
where
    S: RecordSink + Send + 'static,
    A: AuxiliarySource + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let mut tick = interval_at(Instant::now() + schedule.interval, schedule.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Collector flush loop stopping");
                    break;
                }
                _ = tick.tick() => {}
            }

            let outcome = flush_once(
                &collector,
                &mut sink,
                &auxiliary,
                schedule.auxiliary_timeout,
                now_local(),
            )
            .await;

            match outcome {
                Ok(FlushOutcome::Written(reading)) => info!("{}", status_line(&reading)),
                Ok(FlushOutcome::NoData) => info!("No data received yet"),
                Err(e) => error!("Failed to write record: {}", e),
            }
        }

        sink
    });

    CollectorHandle { cancel, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 20)
            .unwrap()
            .and_hms_opt(5, 51, 0)
            .unwrap()
    }

    struct FailingAuxiliary;

    impl AuxiliarySource for FailingAuxiliary {
        async fn fetch(&self) -> Result<Vec<(Channel, f64)>> {
            Err(Error::Transport("connection refused".to_string()))
        }
    }

    struct FixedAuxiliary(f64);

    impl AuxiliarySource for FixedAuxiliary {
        async fn fetch(&self) -> Result<Vec<(Channel, f64)>> {
            // Inbound channels from an auxiliary source are dropped
            Ok(vec![(Channel::RoomTemp, self.0), (Channel::FeedTemp, 99.0)])
        }
    }

    struct SlowAuxiliary;

    impl AuxiliarySource for SlowAuxiliary {
        async fn fetch(&self) -> Result<Vec<(Channel, f64)>> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(vec![(Channel::RoomTemp, 21.0)])
        }
    }

    #[test]
    fn test_snapshot_empty_is_none() {
        let collector = LiveCollector::new();
        assert!(collector.snapshot(ts()).is_none());
    }

    #[test]
    fn test_update_overwrites() {
        let collector = LiveCollector::new();
        collector.update(Channel::FeedTemp, 30.0);
        collector.update(Channel::FeedTemp, 31.5);
        let snap = collector.snapshot(ts()).unwrap();
        assert_eq!(snap.get(Channel::FeedTemp), Some(31.5));
        assert_eq!(snap.get(Channel::ReturnTemp), None);
        assert_eq!(collector.update_count(), 2);
    }

    #[test]
    fn test_apply_derived_delta_t() {
        let mut reading = Reading::new(ts())
            .with(Channel::FeedTemp, 35.27)
            .with(Channel::ReturnTemp, 31.1);
        apply_derived(&mut reading);
        assert_eq!(reading.get(Channel::DeltaT), Some(4.2));

        let mut partial = Reading::new(ts()).with(Channel::FeedTemp, 35.0);
        apply_derived(&mut partial);
        assert_eq!(partial.get(Channel::DeltaT), None);
    }

    #[test]
    fn test_ingest_maps_and_ignores() {
        let collector = LiveCollector::new();
        let feed = EntityId::parse_sse("sensor-feed_temp").unwrap();
        assert_eq!(collector.ingest(&feed, "34.5"), IngestOutcome::Updated(Channel::FeedTemp));

        let unknown = EntityId::parse_sse("sensor-wifi_signal").unwrap();
        assert_eq!(collector.ingest(&unknown, "-60"), IngestOutcome::Ignored);

        collector.update(Channel::OutsideTemp, 2.0);
        assert_eq!(collector.ingest(&feed, "unavailable"), IngestOutcome::Cleared(Channel::FeedTemp));
        let snap = collector.snapshot(ts()).unwrap();
        assert_eq!(snap.get(Channel::FeedTemp), None);
        assert_eq!(snap.get(Channel::OutsideTemp), Some(2.0));
    }

    #[tokio::test]
    async fn test_flush_no_data() {
        let collector = LiveCollector::new();
        let mut sink: Vec<Reading> = Vec::new();
        let outcome = flush_once(&collector, &mut sink, &NoAuxiliary, Duration::from_secs(1), ts())
            .await
            .unwrap();
        assert_eq!(outcome, FlushOutcome::NoData);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_flush_only_cleared_values_is_no_data() {
        // Controllers report NA for sensors while booting
        let collector = LiveCollector::new();
        let feed = EntityId::parse_sse("sensor-feed_temp").unwrap();
        assert_eq!(collector.ingest(&feed, "NA"), IngestOutcome::Cleared(Channel::FeedTemp));
        collector.update(Channel::OutsideTemp, f64::NAN);
        assert_eq!(collector.update_count(), 2);

        let mut sink: Vec<Reading> = Vec::new();
        let outcome = flush_once(&collector, &mut sink, &NoAuxiliary, Duration::from_secs(1), ts())
            .await
            .unwrap();
        assert_eq!(outcome, FlushOutcome::NoData);
        assert!(sink.is_empty());

        collector.update(Channel::OutsideTemp, 1.5);
        let outcome = flush_once(&collector, &mut sink, &NoAuxiliary, Duration::from_secs(1), ts())
            .await
            .unwrap();
        assert!(matches!(outcome, FlushOutcome::Written(_)));
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_flush_failing_auxiliary_still_writes() {
        let collector = LiveCollector::new();
        collector.update(Channel::OutsideTemp, 2.0);
        let mut sink: Vec<Reading> = Vec::new();
        flush_once(&collector, &mut sink, &FailingAuxiliary, Duration::from_secs(1), ts())
            .await
            .unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].get(Channel::OutsideTemp), Some(2.0));
        assert_eq!(sink[0].get(Channel::RoomTemp), None);
    }

    #[tokio::test]
    async fn test_flush_auxiliary_values_added() {
        let collector = LiveCollector::new();
        collector.update(Channel::FeedTemp, 30.0);
        let mut sink: Vec<Reading> = Vec::new();
        flush_once(&collector, &mut sink, &FixedAuxiliary(21.3), Duration::from_secs(1), ts())
            .await
            .unwrap();
        assert_eq!(sink[0].get(Channel::RoomTemp), Some(21.3));
        assert_eq!(sink[0].get(Channel::FeedTemp), Some(30.0));
    }

    #[tokio::test]
    async fn test_flush_disabled_optional_source() {
        let collector = LiveCollector::new();
        collector.update(Channel::FeedTemp, 30.0);
        let mut sink: Vec<Reading> = Vec::new();
        let disabled: Option<FixedAuxiliary> = None;
        flush_once(&collector, &mut sink, &disabled, Duration::from_secs(1), ts())
            .await
            .unwrap();
        assert_eq!(sink[0].get(Channel::RoomTemp), None);

        let enabled = Some(FixedAuxiliary(20.5));
        flush_once(&collector, &mut sink, &enabled, Duration::from_secs(1), ts())
            .await
            .unwrap();
        assert_eq!(sink[1].get(Channel::RoomTemp), Some(20.5));
    }

    #[tokio::test]
    async fn test_flush_auxiliary_timeout_omits_field() {
        let collector = LiveCollector::new();
        collector.update(Channel::FeedTemp, 30.0);
        let mut sink: Vec<Reading> = Vec::new();
        flush_once(&collector, &mut sink, &SlowAuxiliary, Duration::from_millis(20), ts())
            .await
            .unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].get(Channel::RoomTemp), None);
    }

    #[test]
    fn test_status_line_marks_missing() {
        let reading = Reading::new(ts()).with(Channel::OutsideTemp, -3.04);
        let line = status_line(&reading);
        assert!(line.starts_with("Out:-3.0C | Tgt:?C"));
        assert!(line.contains("Day COP:?"));
        assert!(line.contains("Comp:OFF | DHW:HTG | SC:ok"));

        let locked = Reading::new(ts())
            .with(Channel::CompressorOn, 1.0)
            .with(Channel::ShortCycleLockout, 1.0)
            .with(Channel::PredictiveBoost, 1.0);
        assert!(status_line(&locked).contains("Comp:ON | DHW:HTG | SC:LOCK"));
    }
}
