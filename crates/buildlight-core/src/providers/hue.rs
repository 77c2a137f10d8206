// Hue provider - bridges the bridge client with Indicator
use async_trait::async_trait;
use buildlight_api::{HueClient, LightState};

use crate::{config::HueConfig, source::Indicator, Error, Result};

/// One Hue light, always switched on at a fixed brightness
pub struct HueIndicator {
    client: HueClient,
    light_id: String,
    brightness: u8,
}

impl HueIndicator {
    /// `address` is the bridge, either from config or from discovery
    pub fn new(address: String, config: &HueConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::ConfigError("Hue API key is required".into()))?;

        let client = HueClient::new(address, api_key)
            .map_err(|e| Error::ConfigError(format!("Failed to build Hue client: {}", e)))?;

        Ok(Self {
            client,
            light_id: config.light_id.clone(),
            brightness: config.brightness,
        })
    }

    fn state_for(&self, hue: u16) -> LightState {
        LightState {
            on: true,
            bri: self.brightness,
            hue,
        }
    }
}

#[async_trait]
impl Indicator for HueIndicator {
    async fn set_hue(&self, hue: u16) -> Result<()> {
        self.client
            .set_light_state(&self.light_id, self.state_for(hue))
            .await
            .map_err(|e| Error::IndicatorError(e.to_string()))
    }
}

/// Find the bridge address: configured one wins, otherwise ask discovery
pub async fn resolve_bridge_address(config: &HueConfig) -> Result<String> {
    if let Some(address) = config.bridge_addr.as_ref().filter(|a| !a.is_empty()) {
        return Ok(address.clone());
    }

    buildlight_api::hue::discover_bridge_address()
        .await
        .map_err(|e| Error::IndicatorError(format!("unable to discover hue bridge: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> HueConfig {
        HueConfig {
            api_key: Some("key".to_string()),
            brightness: 200,
            ..Default::default()
        }
    }

    #[test]
    fn test_state_uses_configured_brightness() {
        let indicator = HueIndicator::new("10.0.0.2".to_string(), &config()).unwrap();
        assert_eq!(
            indicator.state_for(15000),
            LightState {
                on: true,
                bri: 200,
                hue: 15000
            }
        );
        assert_eq!(indicator.light_id, "3");
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let config = HueConfig::default();
        assert!(matches!(
            HueIndicator::new("10.0.0.2".to_string(), &config),
            Err(Error::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_configured_bridge_skips_discovery() {
        let config = HueConfig {
            bridge_addr: Some("10.0.0.9".to_string()),
            ..config()
        };
        assert_eq!(resolve_bridge_address(&config).await.unwrap(), "10.0.0.9");
    }
}
