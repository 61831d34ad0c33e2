//! Engine configuration: typed settings with serde defaults, TOML file
//! loading, and validation.

pub mod loader;
pub mod types;

pub use loader::ConfigError;
pub use types::{Config, HistoryConfig, PollConfig, PrefetchConfig, ProtocolConfig, TransportConfig};
