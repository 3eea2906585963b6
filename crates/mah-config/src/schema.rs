//! Gateway setting schema (`setting.yml` / `setting.toml` / `setting.json`).
//!
//! Top-level keys are read one by one from a [`Storage`] so a bad value is
//! reported against the key that holds it. Missing keys take the documented
//! defaults below.

use std::collections::BTreeMap;

use mah_core::{ConfigError, Destinations};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::auth_key::{AuthKeyProvider, SessionKeyGenerator};
use crate::storage::{RawDocument, Storage};
use crate::validate::validate_setting;

/// Persisted top-level keys.
pub mod keys {
    pub const CORS: &str = "cors";
    pub const HOST: &str = "host";
    pub const PORT: &str = "port";
    pub const AUTH_KEY: &str = "authKey";
    pub const CACHE_SIZE: &str = "cacheSize";
    pub const ENABLE_WEBSOCKET: &str = "enableWebsocket";
    pub const REPORT: &str = "report";
    pub const HEARTBEAT: &str = "heartbeat";

    pub const ALL: [&str; 8] = [
        CORS,
        HOST,
        PORT,
        AUTH_KEY,
        CACHE_SIZE,
        ENABLE_WEBSOCKET,
        REPORT,
        HEARTBEAT,
    ];
}

/// Keys whose runtime changes only take effect after the HTTP server restarts.
pub const RESTART_REQUIRED_KEYS: &[&str] = &[
    keys::CORS,
    keys::HOST,
    keys::PORT,
    keys::ENABLE_WEBSOCKET,
];

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_CACHE_SIZE: u32 = 4096;
pub const DEFAULT_HEARTBEAT_DELAY_MS: i64 = 1000;
pub const DEFAULT_HEARTBEAT_PERIOD_MS: i64 = 15000;

/// Header or body augmentation map. Keys are case-sensitive and unique.
pub type ExtraMap = BTreeMap<String, String>;

/// Per-category report toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reportable {
    pub report: bool,
}

impl Reportable {
    pub const fn new(report: bool) -> Self {
        Self { report }
    }
}

/// Webhook report configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Master switch. When false nothing is reported.
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "default_reportable")]
    pub group_message: Reportable,
    #[serde(default = "default_reportable")]
    pub friend_message: Reportable,
    #[serde(default = "default_reportable")]
    pub temp_message: Reportable,
    #[serde(default = "default_reportable")]
    pub event_message: Reportable,
    #[serde(default)]
    pub destinations: Destinations,
    /// Added verbatim to every outbound report request.
    #[serde(default)]
    pub extra_headers: ExtraMap,
}

impl Default for Report {
    fn default() -> Self {
        Self {
            enable: false,
            group_message: default_reportable(),
            friend_message: default_reportable(),
            temp_message: default_reportable(),
            event_message: default_reportable(),
            destinations: Vec::new(),
            extra_headers: ExtraMap::new(),
        }
    }
}

fn default_reportable() -> Reportable {
    Reportable::new(true)
}

/// Heartbeat ping configuration. Times are in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartBeat {
    #[serde(default)]
    pub enable: bool,
    /// Delay before the first ping.
    #[serde(default = "default_heartbeat_delay")]
    pub delay: i64,
    /// Interval between pings. Must be > 0 while enabled.
    #[serde(default = "default_heartbeat_period")]
    pub period: i64,
    #[serde(default)]
    pub destinations: Destinations,
    /// Merged into every ping payload.
    #[serde(default)]
    pub extra_body: ExtraMap,
    #[serde(default)]
    pub extra_headers: ExtraMap,
}

impl Default for HeartBeat {
    fn default() -> Self {
        Self {
            enable: false,
            delay: default_heartbeat_delay(),
            period: default_heartbeat_period(),
            destinations: Vec::new(),
            extra_body: ExtraMap::new(),
            extra_headers: ExtraMap::new(),
        }
    }
}

fn default_heartbeat_delay() -> i64 {
    DEFAULT_HEARTBEAT_DELAY_MS
}

fn default_heartbeat_period() -> i64 {
    DEFAULT_HEARTBEAT_PERIOD_MS
}

/// Root gateway setting.
///
/// Only built through [`Setting::load`] so a fresh configuration always goes
/// through auth key generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    /// Allowed CORS origins.
    pub cors: Vec<String>,
    pub host: String,
    pub port: u16,
    /// Shared secret API clients authenticate with.
    pub auth_key: String,
    /// Opaque buffer size handed to the caching layer.
    pub cache_size: u32,
    pub enable_websocket: bool,
    pub report: Report,
    pub heartbeat: HeartBeat,
}

fn default_cors() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

/// Read one top-level key, falling back to `default` when absent.
///
/// An explicit `null` (e.g. `port:` with no value in YAML) counts as absent.
fn read_field<T: DeserializeOwned>(
    storage: &dyn Storage,
    key: &str,
    default: impl FnOnce() -> T,
) -> Result<T, ConfigError> {
    match storage.read(key) {
        None | Some(Value::Null) => Ok(default()),
        Some(raw) => serde_json::from_value(raw).map_err(|e| ConfigError::parse(key, e)),
    }
}

impl Setting {
    /// Load the setting from storage, generating and persisting an auth key
    /// when none is stored yet.
    pub fn load(
        storage: &dyn Storage,
        generator: &dyn SessionKeyGenerator,
    ) -> Result<Self, ConfigError> {
        Self::load_with(storage, || AuthKeyProvider::new(generator).generate())
    }

    /// Load the setting, calling `missing_key` only if `authKey` is absent.
    ///
    /// Whatever `missing_key` returns is written back to storage so it is
    /// never produced twice for the same configuration.
    pub fn load_with(
        storage: &dyn Storage,
        missing_key: impl FnOnce() -> String,
    ) -> Result<Self, ConfigError> {
        let stored_key: Option<String> = read_field(storage, keys::AUTH_KEY, || None)?;

        let mut setting = Self {
            cors: read_field(storage, keys::CORS, default_cors)?,
            host: read_field(storage, keys::HOST, default_host)?,
            port: read_field(storage, keys::PORT, || DEFAULT_PORT)?,
            auth_key: String::new(),
            cache_size: read_field(storage, keys::CACHE_SIZE, || DEFAULT_CACHE_SIZE)?,
            enable_websocket: read_field(storage, keys::ENABLE_WEBSOCKET, || false)?,
            report: read_field(storage, keys::REPORT, Report::default)?,
            heartbeat: read_field(storage, keys::HEARTBEAT, HeartBeat::default)?,
        };

        let generated = stored_key.is_none();
        setting.auth_key = stored_key.unwrap_or_else(missing_key);
        validate_setting(&setting)?;

        if generated {
            storage.write(keys::AUTH_KEY, Value::String(setting.auth_key.clone()))?;
            info!(storage = %storage.describe(), "generated initial auth key");
        }
        debug!(storage = %storage.describe(), "loaded setting");
        Ok(setting)
    }

    /// Write every field back to storage as one atomic replacement.
    pub fn save(&self, storage: &dyn Storage) -> Result<(), ConfigError> {
        storage.replace(self.to_document()?)?;
        debug!(storage = %storage.describe(), "saved setting");
        Ok(())
    }

    /// Serialize into the persisted key-value document.
    pub fn to_document(&self) -> Result<RawDocument, ConfigError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(ConfigError::persist(
                "setting",
                format!("expected a document, serialized to {other}"),
            )),
            Err(e) => Err(ConfigError::persist("setting", e)),
        }
    }

    /// Top-level keys whose values differ between `self` and `other`.
    pub fn changed_keys(&self, other: &Setting) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.cors != other.cors {
            changed.push(keys::CORS);
        }
        if self.host != other.host {
            changed.push(keys::HOST);
        }
        if self.port != other.port {
            changed.push(keys::PORT);
        }
        if self.auth_key != other.auth_key {
            changed.push(keys::AUTH_KEY);
        }
        if self.cache_size != other.cache_size {
            changed.push(keys::CACHE_SIZE);
        }
        if self.enable_websocket != other.enable_websocket {
            changed.push(keys::ENABLE_WEBSOCKET);
        }
        if self.report != other.report {
            changed.push(keys::REPORT);
        }
        if self.heartbeat != other.heartbeat {
            changed.push(keys::HEARTBEAT);
        }
        changed
    }

    /// `host:port` the HTTP server should bind.
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Commented YAML template for a fresh `setting.yml`.
    pub fn default_template(auth_key: &str) -> String {
        format!(
            r#"# mirai-api-http setting
#
# Missing keys fall back to the defaults shown here.

# Origins allowed to make cross-origin requests.
cors:
  - "*"
host: "{DEFAULT_HOST}"
port: {DEFAULT_PORT}
# Shared secret API clients must present. Keep it private.
authKey: "{auth_key}"
cacheSize: {DEFAULT_CACHE_SIZE}
enableWebsocket: false

# Webhook delivery of incoming messages and events.
report:
  enable: false
  groupMessage:
    report: true
  friendMessage:
    report: true
  tempMessage:
    report: true
  eventMessage:
    report: true
  destinations: []
  # extraHeaders:
  #   Authorization: "Bearer ..."
  extraHeaders: {{}}

# Periodic liveness pings. delay/period are in milliseconds.
heartbeat:
  enable: false
  delay: {DEFAULT_HEARTBEAT_DELAY_MS}
  period: {DEFAULT_HEARTBEAT_PERIOD_MS}
  destinations: []
  extraBody: {{}}
  extraHeaders: {{}}
"#
        )
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
