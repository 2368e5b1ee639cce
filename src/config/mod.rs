//! Configuration management

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::client::{ClientSettings, IdleDrain};
use crate::protocol::ResponseShapes;
use crate::transport::{Endpoint, DEFAULT_HOST, DEFAULT_PORT};

/// Directory name under the platform config root
const CONFIG_DIR_NAME: &str = "mpd-control";

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub idle_drain: IdleDrain,

    #[serde(default)]
    pub shapes: ShapeConfig,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// All values in milliseconds. Absent optional values mean "no deadline".
#[derive(Debug, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default)]
    pub response_ms: Option<u64>,
    #[serde(default = "default_connect_ms")]
    pub connect_ms: u64,
    #[serde(default)]
    pub idle_ms: Option<u64>,
    #[serde(default = "default_drain_ms")]
    pub drain_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            response_ms: None,
            connect_ms: default_connect_ms(),
            idle_ms: None,
            drain_ms: default_drain_ms(),
        }
    }
}

fn default_connect_ms() -> u64 {
    5_000
}

fn default_drain_ms() -> u64 {
    100
}

/// Additions to the built-in response shape table
#[derive(Debug, Default, Deserialize)]
pub struct ShapeConfig {
    #[serde(default)]
    pub list_verbs: Vec<String>,
    /// verb -> grouping key
    #[serde(default)]
    pub grouping_keys: HashMap<String, String>,
}

impl Config {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    pub fn client_settings(&self) -> ClientSettings {
        let shapes = self
            .shapes
            .list_verbs
            .iter()
            .fold(ResponseShapes::default(), |shapes, verb| {
                shapes.with_list_verb(verb.as_str())
            });
        let shapes = self
            .shapes
            .grouping_keys
            .iter()
            .fold(shapes, |shapes, (verb, key)| {
                shapes.with_grouping_key(verb.as_str(), key.as_str())
            });

        ClientSettings {
            endpoint: self.endpoint(),
            password: self.password.clone(),
            response_timeout: self.timeouts.response_ms.map(Duration::from_millis),
            connect_timeout: Duration::from_millis(self.timeouts.connect_ms),
            idle_timeout: self.timeouts.idle_ms.map(Duration::from_millis),
            drain_timeout: Duration::from_millis(self.timeouts.drain_ms),
            idle_drain: self.idle_drain,
            shapes,
        }
    }
}

/// Get config directory (MPDC_CONFIG_DIR, XDG_CONFIG_HOME or platform default)
pub fn get_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MPDC_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library/Application Support")
                .join(CONFIG_DIR_NAME);
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join(CONFIG_DIR_NAME);
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".config").join(CONFIG_DIR_NAME);
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join(CONFIG_DIR_NAME);
        }
    }

    // Fallback to current directory
    PathBuf::from(".")
}

/// Split `MPD_HOST` into (password, host). `@name` (abstract socket) has no password.
pub fn parse_mpd_host(value: &str) -> (Option<String>, String) {
    match value.rsplit_once('@') {
        Some((password, host)) if !password.is_empty() => {
            (Some(password.to_string()), host.to_string())
        }
        _ => (None, value.to_string()),
    }
}

pub fn load_config() -> Result<Config> {
    let config_dir = get_config_dir();

    let mut builder = ::config::Config::builder()
        // Start with defaults
        .set_default("host", DEFAULT_HOST)?
        .set_default("port", DEFAULT_PORT as i64)?
        // Load from config file if it exists
        .add_source(
            ::config::File::with_name(&config_dir.join("config").to_string_lossy()).required(false),
        )
        // Override with environment variables (MPDC_HOST, MPDC_TIMEOUTS__IDLE_MS, etc.)
        .add_source(
            ::config::Environment::with_prefix("MPDC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    // Conventional MPD_HOST / MPD_PORT win over everything else
    if let Ok(value) = std::env::var("MPD_HOST") {
        let (password, host) = parse_mpd_host(&value);
        builder = builder.set_override("host", host)?;
        if let Some(password) = password {
            builder = builder.set_override("password", password)?;
        }
    }
    if let Ok(port) = std::env::var("MPD_PORT") {
        if let Ok(port_num) = port.parse::<u16>() {
            builder = builder.set_override("port", port_num as i64)?;
        }
    }

    let config = builder.build()?;

    Ok(config.try_deserialize()?)
}
