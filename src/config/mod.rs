//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → command-line overrides (main.rs)
//!     → RelayConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults so the relay runs with no settings file
//! - The device list lives in its own YAML file (see `device`)

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    DevicesConfig, DispatchConfig, HttpConfig, MqttConfig, ObservabilityConfig, RelayConfig,
    ShutdownConfig,
};
