use serde::{Deserialize, Serialize};

use crate::transport::query::ArrayFormat;

/// Root configuration container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub prefetch: PrefetchConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub poll: PollConfig,
}

/// Wire-protocol settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Origin visits are resolved against (scheme + host + port).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Known asset version at boot; normally taken from the initial page.
    #[serde(default)]
    pub version: Option<String>,
    /// Query-string array serialization format.
    #[serde(default)]
    pub array_format: ArrayFormat,
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Connection timeout in seconds (default: 5).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

/// Prefetch cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefetchConfig {
    /// Default entry lifetime in milliseconds (default: 30000).
    #[serde(default = "default_cache_for_ms")]
    pub cache_for_ms: u64,
}

/// History persistence settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Encrypt every stored page payload, not only ones the server flags.
    #[serde(default)]
    pub encrypt: bool,
}

/// Polling defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// While backgrounded without keep-alive, only every Nth tick fires
    /// (default: 10).
    #[serde(default = "default_background_tick_divisor")]
    pub background_tick_divisor: u32,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    30
}

fn default_cache_for_ms() -> u64 {
    30_000
}

fn default_background_tick_divisor() -> u32 {
    10
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            version: None,
            array_format: ArrayFormat::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: default_connect_timeout(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            cache_for_ms: default_cache_for_ms(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            background_tick_divisor: default_background_tick_divisor(),
        }
    }
}
