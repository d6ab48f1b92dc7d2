//! Room temperature from Home Assistant thermostats
//!
//! Queried once per flush cycle. Each configured climate entity's
//! `current_temperature` attribute is scaled and averaged; entities that fail
//! or time out are skipped.

use std::path::Path;

use ecodan_common::collector::AuxiliarySource;
use ecodan_common::config::AuxiliaryConfig;
use ecodan_common::{Channel, Error, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct EntityState {
    #[serde(default)]
    attributes: Attributes,
}

#[derive(Debug, Default, Deserialize)]
struct Attributes {
    #[serde(default)]
    current_temperature: Option<f64>,
}

/// Extract `attributes.current_temperature` from a `/api/states/<entity>` body
pub fn parse_current_temperature(body: &str) -> Result<f64> {
    let state: EntityState = serde_json::from_str(body)?;
    state
        .attributes
        .current_temperature
        .filter(|t| t.is_finite())
        .ok_or_else(|| Error::Transport("entity has no current_temperature".to_string()))
}

/// Mean of the scaled readings, rounded to 0.1
pub fn average_scaled(readings: &[f64], scale: f64) -> Option<f64> {
    if readings.is_empty() {
        return None;
    }
    let mean = readings.iter().map(|t| t * scale).sum::<f64>() / readings.len() as f64;
    Some((mean * 10.0).round() / 10.0)
}

/// Home Assistant REST client for the room temperature channel
#[derive(Debug, Clone)]
pub struct HomeAssistantRoomTemp {
    client: Client,
    base_url: String,
    token: String,
    entities: Vec<String>,
    scale: f64,
}

impl HomeAssistantRoomTemp {
    pub fn new(config: &AuxiliaryConfig, token: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
            entities: config.entities.clone(),
            scale: config.scale,
        })
    }

    /// Build the source if a token is configured and readable
    ///
    /// No token file, or one that cannot be read, disables the source.
    pub fn from_config(config: &AuxiliaryConfig) -> Result<Option<Self>> {
        let Some(path) = &config.token_file else {
            info!("No Home Assistant token configured, room temperature disabled");
            return Ok(None);
        };
        match read_token(path) {
            Some(token) => {
                info!(
                    "Room temperature from {} ({} entities)",
                    config.base_url,
                    config.entities.len()
                );
                Self::new(config, token).map(Some)
            }
            None => {
                warn!(
                    "Home Assistant token {} unreadable or empty, room temperature disabled",
                    path.display()
                );
                Ok(None)
            }
        }
    }

    /// Number of entities queried per cycle
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    async fn fetch_entity(&self, entity: &str) -> Result<f64> {
        let url = format!("{}/api/states/{}", self.base_url, entity);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{}: {}", entity, e)))?;

        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "{}: HTTP {}",
                entity,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("{}: {}", entity, e)))?;
        parse_current_temperature(&body)
    }
}

fn read_token(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

impl AuxiliarySource for HomeAssistantRoomTemp {
    async fn fetch(&self) -> Result<Vec<(Channel, f64)>> {
        let mut readings = Vec::with_capacity(self.entities.len());
        for entity in &self.entities {
            match self.fetch_entity(entity).await {
                Ok(t) => readings.push(t),
                Err(e) => debug!("Skipping thermostat: {}", e),
            }
        }

        match average_scaled(&readings, self.scale) {
            Some(avg) => Ok(vec![(Channel::RoomTemp, avg)]),
            None => Err(Error::Transport("no thermostat responded".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_parse_current_temperature() {
        let body = r#"{"entity_id":"climate.ured","state":"heat",
                       "attributes":{"current_temperature":43.0,"temperature":44}}"#;
        assert_eq!(parse_current_temperature(body).unwrap(), 43.0);
    }

    #[test]
    fn test_parse_missing_attribute() {
        let err = parse_current_temperature(r#"{"state":"unavailable","attributes":{}}"#).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        let err = parse_current_temperature("<html>").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_average_scaled() {
        // Thermostats reporting double the real temperature
        assert_eq!(average_scaled(&[43.0, 44.0, 42.2], 0.5), Some(21.5));
        assert_eq!(average_scaled(&[20.26], 1.0), Some(20.3));
        assert_eq!(average_scaled(&[], 0.5), None);
    }

    #[test]
    fn test_no_token_disables_source() {
        let config = AuxiliaryConfig::default();
        assert!(HomeAssistantRoomTemp::from_config(&config).unwrap().is_none());

        let missing = AuxiliaryConfig {
            token_file: Some(PathBuf::from("/nonexistent/ha-token.txt")),
            ..AuxiliaryConfig::default()
        };
        assert!(HomeAssistantRoomTemp::from_config(&missing).unwrap().is_none());
    }

    #[test]
    fn test_token_file_enables_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  secret-token  ").unwrap();
        let config = AuxiliaryConfig {
            token_file: Some(file.path().to_path_buf()),
            base_url: "http://ha.local:8123/".to_string(),
            ..AuxiliaryConfig::default()
        };
        let source = HomeAssistantRoomTemp::from_config(&config).unwrap().unwrap();
        assert_eq!(source.token, "secret-token");
        assert_eq!(source.base_url, "http://ha.local:8123");
        assert_eq!(source.entity_count(), 3);
    }
}
