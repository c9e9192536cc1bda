// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Consumer-side flag subscription.
//!
//! Names the flags a consumer keeps reconciled, the default value used when a
//! flag has never been observed, and how often the batch snapshot is fetched.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_MAINTENANCE_FLAG: &str = "maintenance_mode";

const DEFAULT_SERVICE_URL: &str = "http://localhost:8080";
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionConfig {
	/// Base URL of the producer's flag API.
	pub service_url: String,
	/// Flag name to default value.
	pub subscribed: BTreeMap<String, bool>,
	pub refresh_interval: Duration,
	pub request_timeout: Duration,
	/// Flag consulted by the maintenance gate.
	pub maintenance_flag: String,
}

impl Default for SubscriptionConfig {
	fn default() -> Self {
		Self {
			service_url: DEFAULT_SERVICE_URL.to_string(),
			subscribed: default_subscribed(),
			refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
			request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
			maintenance_flag: DEFAULT_MAINTENANCE_FLAG.to_string(),
		}
	}
}

impl SubscriptionConfig {
	pub fn flag_names(&self) -> Vec<String> {
		self.subscribed.keys().cloned().collect()
	}

	pub fn default_for(&self, flag_name: &str) -> Option<bool> {
		self.subscribed.get(flag_name).copied()
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.refresh_interval.is_zero() {
			return Err(ConfigError::Validation(
				"subscription.refresh_interval_secs must be greater than zero".to_string(),
			));
		}
		if self.request_timeout.is_zero() {
			return Err(ConfigError::Validation(
				"subscription.request_timeout_secs must be greater than zero".to_string(),
			));
		}
		if self.request_timeout >= self.refresh_interval {
			return Err(ConfigError::Validation(format!(
				"subscription.request_timeout_secs ({}) must be shorter than refresh_interval_secs ({})",
				self.request_timeout.as_secs(),
				self.refresh_interval.as_secs()
			)));
		}
		if self.maintenance_flag.trim().is_empty() {
			return Err(ConfigError::Validation(
				"subscription.maintenance_flag must not be empty".to_string(),
			));
		}
		Ok(())
	}
}

fn default_subscribed() -> BTreeMap<String, bool> {
	BTreeMap::from([(DEFAULT_MAINTENANCE_FLAG.to_string(), false)])
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionConfigLayer {
	#[serde(default)]
	pub service_url: Option<String>,
	#[serde(default)]
	pub subscribed: Option<BTreeMap<String, bool>>,
	#[serde(default)]
	pub refresh_interval_secs: Option<u64>,
	#[serde(default)]
	pub request_timeout_secs: Option<u64>,
	#[serde(default)]
	pub maintenance_flag: Option<String>,
}

impl SubscriptionConfigLayer {
	/// A `subscribed` map in `other` replaces the whole map, it is not merged key by key.
	pub fn merge(&mut self, other: SubscriptionConfigLayer) {
		if other.service_url.is_some() {
			self.service_url = other.service_url;
		}
		if other.subscribed.is_some() {
			self.subscribed = other.subscribed;
		}
		if other.refresh_interval_secs.is_some() {
			self.refresh_interval_secs = other.refresh_interval_secs;
		}
		if other.request_timeout_secs.is_some() {
			self.request_timeout_secs = other.request_timeout_secs;
		}
		if other.maintenance_flag.is_some() {
			self.maintenance_flag = other.maintenance_flag;
		}
	}

	pub fn finalize(self) -> SubscriptionConfig {
		SubscriptionConfig {
			service_url: self
				.service_url
				.map(|url| url.trim_end_matches('/').to_string())
				.unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string()),
			subscribed: self.subscribed.unwrap_or_else(default_subscribed),
			refresh_interval: Duration::from_secs(
				self
					.refresh_interval_secs
					.unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS),
			),
			request_timeout: Duration::from_secs(
				self
					.request_timeout_secs
					.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
			),
			maintenance_flag: self
				.maintenance_flag
				.unwrap_or_else(|| DEFAULT_MAINTENANCE_FLAG.to_string()),
		}
	}
}

/// Parses `name=bool,name=bool`. Whitespace around entries is ignored and an
/// empty string yields an empty map.
pub fn parse_subscribed_flags(raw: &str) -> Result<BTreeMap<String, bool>, String> {
	let mut flags = BTreeMap::new();
	for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
		let (name, value) = entry
			.split_once('=')
			.ok_or_else(|| format!("expected name=bool, got '{entry}'"))?;
		let name = name.trim();
		if name.is_empty() {
			return Err(format!("missing flag name in '{entry}'"));
		}
		let value = match value.trim().to_ascii_lowercase().as_str() {
			"true" | "1" => true,
			"false" | "0" => false,
			other => return Err(format!("invalid default '{other}' for flag '{name}'")),
		};
		flags.insert(name.to_string(), value);
	}
	Ok(flags)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_subscribe_to_maintenance_mode() {
		let config = SubscriptionConfigLayer::default().finalize();
		assert_eq!(config.service_url, "http://localhost:8080");
		assert_eq!(config.default_for("maintenance_mode"), Some(false));
		assert_eq!(config.refresh_interval, Duration::from_secs(300));
		assert_eq!(config.request_timeout, Duration::from_secs(10));
		assert_eq!(config.maintenance_flag, "maintenance_mode");
		assert!(config.validate().is_ok());
	}

	#[test]
	fn trailing_slash_is_trimmed() {
		let config = SubscriptionConfigLayer {
			service_url: Some("http://flags:8080/".to_string()),
			..Default::default()
		}
		.finalize();
		assert_eq!(config.service_url, "http://flags:8080");
	}

	#[test]
	fn timeout_must_be_shorter_than_interval() {
		let config = SubscriptionConfigLayer {
			refresh_interval_secs: Some(10),
			request_timeout_secs: Some(10),
			..Default::default()
		}
		.finalize();
		let err = config.validate().unwrap_err();
		assert!(err.to_string().contains("must be shorter"));
	}

	#[test]
	fn zero_interval_is_rejected() {
		let config = SubscriptionConfigLayer {
			refresh_interval_secs: Some(0),
			..Default::default()
		}
		.finalize();
		assert!(config.validate().is_err());
	}

	#[test]
	fn overlay_replaces_subscribed_map() {
		let mut layer = SubscriptionConfigLayer {
			subscribed: Some(BTreeMap::from([("a".to_string(), true)])),
			..Default::default()
		};
		layer.merge(SubscriptionConfigLayer {
			subscribed: Some(BTreeMap::from([("b".to_string(), false)])),
			..Default::default()
		});
		let config = layer.finalize();
		assert_eq!(config.flag_names(), vec!["b".to_string()]);
	}

	#[test]
	fn empty_subscription_is_allowed() {
		let config = SubscriptionConfigLayer {
			subscribed: Some(BTreeMap::new()),
			..Default::default()
		}
		.finalize();
		assert!(config.flag_names().is_empty());
		assert!(config.validate().is_ok());
	}

	#[test]
	fn parses_subscribed_list() {
		let flags = parse_subscribed_flags(" maintenance_mode=false, dark_mode = TRUE ,beta=1").unwrap();
		assert_eq!(flags.len(), 3);
		assert_eq!(flags["maintenance_mode"], false);
		assert_eq!(flags["dark_mode"], true);
		assert_eq!(flags["beta"], true);
	}

	#[test]
	fn rejects_malformed_subscribed_list() {
		assert!(parse_subscribed_flags("maintenance_mode").is_err());
		assert!(parse_subscribed_flags("=true").is_err());
		assert!(parse_subscribed_flags("a=maybe").is_err());
		assert!(parse_subscribed_flags("").unwrap().is_empty());
	}
}
