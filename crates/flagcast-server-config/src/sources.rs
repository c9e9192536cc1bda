// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, TOML files and environment variables.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	parse_subscribed_flags, DatabaseConfigLayer, HttpConfigLayer, LoggingConfigLayer,
	StreamConfigLayer, SubscriptionConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults. Defaults are applied during finalize, so this layer is empty.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file source. A missing file yields an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/flagcast/flagcast.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `FLAGCAST_<FIELD>`, with `FLAGCAST_FLAG_*` for the
/// subscription section. Empty values are treated as unset.
#[derive(Default)]
pub struct EnvSource {
	overrides: Option<HashMap<String, String>>,
}

impl EnvSource {
	/// Reads from the process environment.
	pub fn new() -> Self {
		Self::default()
	}

	/// Reads from a fixed set of variables instead of the process environment.
	pub fn from_vars<I, K, V>(vars: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			overrides: Some(
				vars
					.into_iter()
					.map(|(k, v)| (k.into(), v.into()))
					.collect(),
			),
		}
	}

	fn var(&self, name: &str) -> Option<String> {
		let value = match &self.overrides {
			Some(vars) => vars.get(name).cloned(),
			None => std::env::var(name).ok(),
		};
		value.filter(|v| !v.trim().is_empty())
	}

	fn parsed<T: FromStr>(&self, name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
		match self.var(name) {
			Some(v) => v
				.trim()
				.parse()
				.map(Some)
				.map_err(|_| ConfigError::InvalidValue {
					key: name.to_string(),
					message: format!("invalid {kind} value '{v}'"),
				}),
			None => Ok(None),
		}
	}

	fn subscribed(&self) -> Result<Option<std::collections::BTreeMap<String, bool>>, ConfigError> {
		const KEY: &str = "FLAGCAST_SUBSCRIBED_FLAGS";
		match self.var(KEY) {
			Some(raw) => parse_subscribed_flags(&raw)
				.map(Some)
				.map_err(|message| ConfigError::InvalidValue {
					key: KEY.to_string(),
					message,
				}),
			None => Ok(None),
		}
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			http: Some(HttpConfigLayer {
				host: self.var("FLAGCAST_HOST"),
				port: self.parsed("FLAGCAST_PORT", "u16")?,
			}),
			database: Some(DatabaseConfigLayer {
				url: self.var("FLAGCAST_DATABASE_URL"),
			}),
			logging: Some(LoggingConfigLayer {
				level: self.var("FLAGCAST_LOG_LEVEL"),
			}),
			stream: Some(StreamConfigLayer {
				channel_capacity: self.parsed("FLAGCAST_STREAM_CHANNEL_CAPACITY", "usize")?,
				heartbeat_secs: self.parsed("FLAGCAST_STREAM_HEARTBEAT_SECS", "u64")?,
			}),
			subscription: Some(SubscriptionConfigLayer {
				service_url: self.var("FLAGCAST_FLAG_SERVICE_URL"),
				subscribed: self.subscribed()?,
				refresh_interval_secs: self.parsed("FLAGCAST_FLAG_REFRESH_INTERVAL_SECS", "u64")?,
				request_timeout_secs: self.parsed("FLAGCAST_FLAG_REQUEST_TIMEOUT_SECS", "u64")?,
				maintenance_flag: self.var("FLAGCAST_FLAG_MAINTENANCE_NAME"),
			}),
		})
	}
}
