//! Configuration module for serial-hub.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `SERIAL_HUB_CONFIG` environment variable (explicit path)
//! 2. `./serial-hub.toml` (current directory)
//! 3. `~/.config/serial-hub/serial-hub.toml` (XDG on Linux/macOS)
//! 4. `%APPDATA%\serial-hub\serial-hub.toml` (Windows)
//! 5. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! Any scalar value can be overridden via environment variables.
//! The pattern is: `SERIAL_HUB_<SECTION>_<KEY>`
//!
//! Examples:
//! - `SERIAL_HUB_SERIAL_READ_TIMEOUT_MS=500`
//! - `SERIAL_HUB_SERIAL_DRAIN_PER_EVENT=false`
//! - `SERIAL_HUB_LOGGING_LEVEL=debug`
//!
//! # Example
//!
//! ```rust,no_run
//! use serial_hub::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let config = loader.config();
//!
//! println!("Read timeout: {:?}", config.serial.read_timeout());
//! # Ok::<(), serial_hub::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader};
pub use schema::{Config, LogFormat, LoggingConfig, SerialConfig};
