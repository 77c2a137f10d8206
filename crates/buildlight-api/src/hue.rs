// Philips Hue bridge client - discovery plus "make light number N this color"
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const HUE_DISCOVERY_URL: &str = "https://discovery.meethue.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum HueError {
    #[error("No Hue bridges found on this network")]
    NoBridge,

    #[error("Bridge rejected request: {0}")]
    Bridge(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, HueError>;

/// A bridge as reported by the discovery endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredBridge {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "internalipaddress")]
    pub internal_ip_address: String,
    #[serde(default)]
    pub port: Option<u16>,
}

/// Body of `PUT /api/{key}/lights/{id}/state`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightState {
    pub on: bool,
    pub bri: u8,
    pub hue: u16,
}

/// One entry of the array the bridge answers with
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum BridgeReply {
    #[allow(dead_code)]
    Success(serde_json::Value),
    Error(BridgeErrorBody),
}

#[derive(Debug, Deserialize)]
struct BridgeErrorBody {
    #[serde(rename = "type", default)]
    kind: Option<u32>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    description: String,
}

/// Ask the public discovery service for bridges on the local network
pub async fn discover_bridges() -> Result<Vec<DiscoveredBridge>> {
    discover_bridges_at(HUE_DISCOVERY_URL).await
}

/// Same as [`discover_bridges`] against a custom discovery endpoint
pub async fn discover_bridges_at(url: &str) -> Result<Vec<DiscoveredBridge>> {
    let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(HueError::Bridge(format!(
            "discovery answered {}",
            response.status()
        )));
    }

    let bridges: Vec<DiscoveredBridge> = response.json().await?;
    debug!("discovered {} bridge(s)", bridges.len());
    Ok(bridges)
}

/// Address of the first bridge discovery knows about
pub async fn discover_bridge_address() -> Result<String> {
    discover_bridge_address_at(HUE_DISCOVERY_URL).await
}

/// Same as [`discover_bridge_address`] against a custom discovery endpoint
pub async fn discover_bridge_address_at(url: &str) -> Result<String> {
    discover_bridges_at(url)
        .await?
        .into_iter()
        .next()
        .map(|bridge| bridge.internal_ip_address)
        .ok_or(HueError::NoBridge)
}

pub struct HueClient {
    client: reqwest::Client,
    address: String,
    api_key: String,
}

impl HueClient {
    pub fn new(address: String, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            address,
            api_key,
        })
    }

    fn light_state_url(&self, light_id: &str) -> String {
        let base = if self.address.starts_with("http://") || self.address.starts_with("https://") {
            self.address.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", self.address)
        };
        format!("{}/api/{}/lights/{}/state", base, self.api_key, light_id)
    }

    /// Turn the light on and set its state
    pub async fn set_light_state(&self, light_id: &str, state: LightState) -> Result<()> {
        let url = self.light_state_url(light_id);
        let response = self.client.put(&url).json(&state).send().await?;
        let status = response.status();
        debug!("light {} answered {}", light_id, status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HueError::Bridge(format!("Status {}: {}", status, body)));
        }

        // The bridge says 200 even when it refuses, the real answer is in the body
        let body = response.text().await?;
        check_bridge_reply(&body)
    }
}

/// Turn an `[{"error": {...}}]` reply into an error, anything else is fine
fn check_bridge_reply(body: &str) -> Result<()> {
    let replies: Vec<BridgeReply> = match serde_json::from_str(body) {
        Ok(replies) => replies,
        // Not every firmware answers with the array form
        Err(_) => return Ok(()),
    };

    let errors: Vec<String> = replies
        .into_iter()
        .filter_map(|reply| match reply {
            BridgeReply::Error(err) => Some(match (&err.kind, &err.address) {
                (Some(kind), Some(address)) => {
                    format!("{} (type {}, {})", err.description, kind, address)
                }
                _ => err.description,
            }),
            BridgeReply::Success(_) => None,
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(HueError::Bridge(errors.join("; ")))
    }
}
