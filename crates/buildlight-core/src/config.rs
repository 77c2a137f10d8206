use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::indicator::{Palette, DEFAULT_TICK_INTERVAL};

/// Main configuration structure
///
/// Built once at startup from config file, env vars and CLI args, then
/// handed to the components. Nothing reads it from a global.
/// Priority: CLI > Env > File > Defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Time between polls of each repository
    #[serde(default = "default_poll_interval", with = "duration_str")]
    pub poll_interval: Duration,

    /// Time between light updates, also the blink rate
    #[serde(default = "default_tick_interval", with = "duration_str")]
    pub tick_interval: Duration,

    /// Repositories to watch, `owner/slug`
    #[serde(default)]
    pub repositories: Vec<String>,

    /// Extra logging
    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub bitbucket: BitbucketConfig,

    #[serde(default)]
    pub hue: HueConfig,

    #[serde(default)]
    pub palette: Palette,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_tick_interval() -> Duration {
    DEFAULT_TICK_INTERVAL
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            tick_interval: default_tick_interval(),
            repositories: Vec::new(),
            debug: false,
            bitbucket: BitbucketConfig::default(),
            hue: HueConfig::default(),
            palette: Palette::default(),
        }
    }
}

impl Config {
    /// Load config from `path`, or from the default location if it exists
    ///
    /// An explicit path that doesn't exist is an error, a missing default
    /// file just means defaults.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => match Self::config_path() {
                Some(default_path) if default_path.exists() => Self::load_from(&default_path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn load_from(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        toml::from_str(contents)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// `<config dir>/buildlight/config.toml`
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("buildlight").join("config.toml"))
    }

    /// Check everything the monitor needs to poll
    pub fn validate(&self) -> crate::Result<()> {
        if self.repositories.is_empty() {
            return Err(crate::Error::ConfigError(
                "No repositories to watch, pass at least one --repo".into(),
            ));
        }

        for repo in &self.repositories {
            let mut parts = repo.split('/');
            let valid = matches!(
                (parts.next(), parts.next(), parts.next()),
                (Some(owner), Some(slug), None) if !owner.is_empty() && !slug.is_empty()
            );
            if !valid {
                return Err(crate::Error::ConfigError(format!(
                    "Repository must look like owner/slug, got {:?}",
                    repo
                )));
            }
        }

        if self.poll_interval.is_zero() {
            return Err(crate::Error::ConfigError(
                "Poll interval must be greater than zero".into(),
            ));
        }

        if self.tick_interval.is_zero() {
            return Err(crate::Error::ConfigError(
                "Tick interval must be greater than zero".into(),
            ));
        }

        if !(1..=254).contains(&self.hue.brightness) {
            return Err(crate::Error::ConfigError(format!(
                "Brightness must be between 1 and 254, got {}",
                self.hue.brightness
            )));
        }

        Ok(())
    }

    /// [`Config::validate`] plus what's needed to drive the light
    pub fn validate_for_light(&self) -> crate::Result<()> {
        self.validate()?;

        if self.hue.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(crate::Error::ConfigError(
                "Hue API key is required, pass --api-key or set API_KEY".into(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BitbucketConfig {
    pub username: Option<String>,
    /// App password, not the account password
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HueConfig {
    /// Whitelisted username on the bridge
    pub api_key: Option<String>,

    /// Bridge address; discovered via meethue.com when unset
    #[serde(default)]
    pub bridge_addr: Option<String>,

    #[serde(default = "default_light_id")]
    pub light_id: String,

    #[serde(default = "default_brightness")]
    pub brightness: u8,
}

fn default_light_id() -> String {
    "3".to_string()
}

fn default_brightness() -> u8 {
    150
}

impl Default for HueConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            bridge_addr: None,
            light_id: default_light_id(),
            brightness: default_brightness(),
        }
    }
}

/// Parse `500ms`, `30s`, `1m`, `2h` or a bare number of seconds
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (number, unit) = input.split_at(split);

    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration {:?}", input))?;

    let seconds_per_unit = match unit.trim() {
        "ms" => return Ok(Duration::from_millis(value)),
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        other => return Err(format!("unknown duration unit {:?} in {:?}", other, input)),
    };

    value
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration {:?} is too large", input))
}

fn format_duration(duration: &Duration) -> String {
    let millis = duration.as_millis();
    if millis % 1000 != 0 {
        format!("{}ms", millis)
    } else if millis % 60_000 != 0 || millis == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{}m", millis / 60_000)
    }
}

/// Durations as human strings in the config file
mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
