// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the flagcast services.
//!
//! This crate provides:
//! - Layered configuration from defaults, a TOML file and the environment
//! - Type-safe resolved sections with validation
//! - Consistent environment variable naming (`FLAGCAST_*`)
//!
//! # Usage
//!
//! ```ignore
//! use flagcast_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("listening on {}", config.socket_addr());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use std::path::PathBuf;

use tracing::{debug, info};

/// Fully resolved configuration shared by the producer and the gateway.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub stream: StreamConfig,
	pub subscription: SubscriptionConfig,
}

impl ServerConfig {
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`FLAGCAST_*`)
/// 2. Config file (`/etc/flagcast/flagcast.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource::new()),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource::new()),
	])
}

/// Merge the given sources in precedence order and finalize the result.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize();
	let database = layer.database.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let stream = layer.stream.unwrap_or_default().finalize();
	let subscription = layer.subscription.unwrap_or_default().finalize();

	if stream.channel_capacity == 0 {
		return Err(ConfigError::Validation(
			"stream.channel_capacity must be greater than zero".to_string(),
		));
	}
	subscription.validate()?;

	info!(
		host = %http.host,
		port = http.port,
		database = %database.url,
		channel_capacity = stream.channel_capacity,
		service_url = %subscription.service_url,
		subscribed_flags = subscription.subscribed.len(),
		refresh_interval_secs = subscription.refresh_interval.as_secs(),
		"configuration loaded"
	);

	Ok(ServerConfig {
		http,
		database,
		logging,
		stream,
		subscription,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use std::time::Duration;

	#[test]
	fn defaults_only() {
		let config = load_from_sources(vec![Box::new(DefaultsSource)]).unwrap();
		assert_eq!(config.socket_addr(), "0.0.0.0:8080");
		assert_eq!(config.subscription.refresh_interval, Duration::from_secs(300));
	}

	#[test]
	fn environment_overrides_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			r#"
[http]
host = "127.0.0.1"
port = 7000
"#
		)
		.unwrap();

		let config = load_from_sources(vec![
			Box::new(EnvSource::from_vars([("FLAGCAST_PORT", "7100")])),
			Box::new(TomlSource::new(file.path())),
			Box::new(DefaultsSource),
		])
		.unwrap();

		assert_eq!(config.http.host, "127.0.0.1");
		assert_eq!(config.http.port, 7100);
	}

	#[test]
	fn invalid_subscription_fails_to_load() {
		let err = load_from_sources(vec![Box::new(EnvSource::from_vars([
			("FLAGCAST_FLAG_REFRESH_INTERVAL_SECS", "5"),
			("FLAGCAST_FLAG_REQUEST_TIMEOUT_SECS", "10"),
		]))])
		.unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn zero_capacity_is_rejected() {
		let err = load_from_sources(vec![Box::new(EnvSource::from_vars([(
			"FLAGCAST_STREAM_CHANNEL_CAPACITY",
			"0",
		)]))])
		.unwrap_err();
		assert!(err.to_string().contains("channel_capacity"));
	}
}
