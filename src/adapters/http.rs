use crate::domain::model::{RecyclingZone, SubmissionRecord};
use crate::domain::ports::{MaterialClassifier, SubmissionSink, ZoneRegistry};
use crate::utils::error::{Result, XpError};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use std::time::Duration;

/// Classifier reached over HTTP with the workflow request body:
/// `{ api_key, inputs: { image: { type: "base64", value } } }`.
pub struct HttpClassifier {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpClassifier {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl MaterialClassifier for HttpClassifier {
    async fn classify_raw(&self, image: &[u8]) -> Result<serde_json::Value> {
        let body = serde_json::json!({
            "api_key": self.api_key,
            "inputs": {
                "image": {
                    "type": "base64",
                    "value": general_purpose::STANDARD.encode(image),
                }
            }
        });

        tracing::debug!("Making classifier request to: {}", self.endpoint);
        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        tracing::debug!("Classifier response status: {}", status);

        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(XpError::ClassifierError {
                message: format!("HTTP {}: {}", status, details.trim()),
            });
        }

        let text = response.text().await?;
        // 非 JSON 回應視為沒有任何預測
        match serde_json::from_str(&text) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::warn!("Classifier returned a non-JSON body: {}", e);
                Ok(serde_json::Value::Null)
            }
        }
    }
}

/// Zone list served as a bare array or wrapped as `{ "locations": [...] }`.
pub struct HttpZoneRegistry {
    client: Client,
    endpoint: String,
}

impl HttpZoneRegistry {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ZoneRegistry for HttpZoneRegistry {
    async fn fetch_zones(&self) -> Result<Vec<RecyclingZone>> {
        tracing::debug!("Fetching zones from: {}", self.endpoint);
        let response = self.client.get(&self.endpoint).send().await?;

        if !response.status().is_success() {
            tracing::warn!("Zone registry responded {}", response.status());
            return Ok(Vec::new());
        }

        let json_data: serde_json::Value = response.json().await?;
        Ok(parse_zone_list(json_data))
    }
}

/// Entries that do not deserialize as zones are skipped.
pub fn parse_zone_list(json_data: serde_json::Value) -> Vec<RecyclingZone> {
    let items = match json_data {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut obj) => match obj.remove("locations") {
            Some(serde_json::Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<RecyclingZone>(item) {
            Ok(zone) => Some(zone),
            Err(e) => {
                tracing::warn!("Skipping malformed zone entry: {}", e);
                None
            }
        })
        .collect()
}

/// Audit endpoint for confirmed attempts; expects `{ "success": true }`.
pub struct HttpSubmissionSink {
    client: Client,
    endpoint: String,
}

impl HttpSubmissionSink {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl SubmissionSink for HttpSubmissionSink {
    async fn record(&self, record: &SubmissionRecord) -> Result<()> {
        let response = self.client.post(&self.endpoint).json(record).send().await?;
        let status = response.status();
        let body: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);

        if status.is_success() && body.get("success").and_then(|v| v.as_bool()) == Some(true) {
            Ok(())
        } else {
            Err(XpError::SinkError {
                message: format!("HTTP {}: {}", status, body),
            })
        }
    }
}
