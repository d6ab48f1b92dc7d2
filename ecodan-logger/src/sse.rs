//! ESPHome server-sent-events client
//!
//! The controller's web server pushes one `data: {json}` line per entity
//! state change on `/events`, starting with the full state of every entity
//! right after connecting. Each event is mapped through the channel table
//! and stored in the [`LiveCollector`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use ecodan_common::collector::{IngestOutcome, LiveCollector};
use ecodan_common::model::{Channel, EntityId};
use ecodan_common::{Error, Result};
use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A connection that delivers nothing for this long is considered dead
const IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// One decoded `state` event
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StateEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub state: Option<String>,
}

impl StateEvent {
    /// Raw payload string for the channel parser
    ///
    /// Sensors carry a number in `value`; binary sensors a bool. Anything
    /// else falls back to the human-readable `state` text.
    pub fn payload(&self) -> String {
        match &self.value {
            serde_json::Value::Bool(true) => "ON".to_string(),
            serde_json::Value::Bool(false) => "OFF".to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) => s.clone(),
            _ => self.state.clone().unwrap_or_default(),
        }
    }
}

/// Decode one stream line; `None` for comments, other fields and bad JSON
pub fn parse_data_line(line: &str) -> Option<StateEvent> {
    let body = line.trim().strip_prefix("data:")?.trim_start();
    if !body.starts_with('{') {
        return None;
    }
    match serde_json::from_str::<StateEvent>(body) {
        Ok(event) if !event.id.is_empty() => Some(event),
        Ok(_) => None,
        Err(e) => {
            debug!("Skipping malformed event: {}", e);
            None
        }
    }
}

/// Reassembles lines from arbitrarily split body chunks
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            lines.push(line.trim_end_matches(['\r', '\n']).to_string());
        }
        lines
    }
}

/// Client for one controller's event stream
#[derive(Debug, Clone)]
pub struct EventStreamClient {
    client: Client,
    url: String,
}

impl EventStreamClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::Transport(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn connect(&self) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| Error::Transport(format!("connect to {} failed: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "{} returned HTTP {}",
                self.url,
                response.status()
            )));
        }
        Ok(response)
    }

    async fn next_chunk(response: &mut reqwest::Response) -> Result<Option<Vec<u8>>> {
        match tokio::time::timeout(IDLE_TIMEOUT, response.chunk()).await {
            Ok(Ok(chunk)) => Ok(chunk.map(|b| b.to_vec())),
            Ok(Err(e)) => Err(Error::Transport(format!("stream read failed: {}", e))),
            Err(_) => Err(Error::Transport(format!(
                "no events for {}s",
                IDLE_TIMEOUT.as_secs()
            ))),
        }
    }

    /// Feed events into the collector until the stream ends or `cancel` fires
    ///
    /// Returns `Ok(())` only when cancelled. A closed or failed stream is an
    /// error so the caller can reconnect.
    pub async fn stream_into(&self, collector: &LiveCollector, cancel: &CancellationToken) -> Result<()> {
        let mut response = self.connect().await?;
        info!("Connected to {}", self.url);

        let mut lines = LineBuffer::new();
        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                chunk = Self::next_chunk(&mut response) => chunk?,
            };
            let chunk = match chunk {
                Some(c) => c,
                None => return Err(Error::Transport("stream closed by controller".to_string())),
            };

            for line in lines.push(&chunk) {
                if let Some(event) = parse_data_line(&line) {
                    ingest_event(collector, &event);
                }
            }
        }
    }

    /// Print every entity id once, stopping at the first repeat
    ///
    /// Ids the channel table knows are marked with spaces, unknown ones with `?`.
    pub async fn discover(&self) -> Result<DiscoveryReport> {
        let mut response = self.connect().await?;
        let mut lines = LineBuffer::new();
        let mut report = DiscoveryReport::default();

        'stream: while let Some(chunk) = Self::next_chunk(&mut response).await? {
            for line in lines.push(&chunk) {
                let Some(event) = parse_data_line(&line) else {
                    continue;
                };
                if !report.record(&event) {
                    break 'stream;
                }
            }
        }
        Ok(report)
    }
}

fn ingest_event(collector: &LiveCollector, event: &StateEvent) -> Option<IngestOutcome> {
    let entity = EntityId::parse_sse(&event.id)?;
    let outcome = collector.ingest(&entity, &event.payload());
    if let IngestOutcome::Cleared(channel) = outcome {
        debug!("{} reported '{}', recorded as absent", channel, event.payload());
    }
    Some(outcome)
}

/// Entity ids seen during discovery
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    seen: HashSet<String>,
    channels: HashSet<Channel>,
    pub entities: usize,
    pub unknown: usize,
}

impl DiscoveryReport {
    /// Record and print one event; `false` once an id repeats
    fn record(&mut self, event: &StateEvent) -> bool {
        if !self.seen.insert(event.id.clone()) {
            return false;
        }
        let channel = EntityId::parse_sse(&event.id).and_then(|e| e.channel());
        let known = channel.is_some();
        match channel {
            Some(c) => {
                self.channels.insert(c);
            }
            None => self.unknown += 1,
        }
        self.entities += 1;
        println!(
            "  {}{:55} value={}  state={}",
            if known { "  " } else { "? " },
            event.id,
            event.value,
            event.state.as_deref().unwrap_or("")
        );
        true
    }

    /// Required inbound channels the controller never announced
    pub fn missing_required(&self) -> Vec<Channel> {
        Channel::required_inbound()
            .filter(|c| !self.channels.contains(c))
            .collect()
    }
}

/// Keep a stream open until cancelled, reconnecting after every failure
pub async fn run_with_reconnect(
    client: EventStreamClient,
    collector: Arc<LiveCollector>,
    reconnect_delay: Duration,
    cancel: CancellationToken,
) {
    loop {
        match client.stream_into(&collector, &cancel).await {
            Ok(()) => break,
            Err(e) => warn!("Event stream error: {}; reconnecting in {:?}", e, reconnect_delay),
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }
    debug!("Event stream task stopped");
}
