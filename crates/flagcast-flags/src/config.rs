// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Which flags a consumer reconciles and what it assumes when it has not seen them.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{FlagsClientError, Result};

pub const DEFAULT_MAINTENANCE_FLAG: &str = "maintenance_mode";

const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(300);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Flag subscription of one consumer process.
///
/// An empty set of flags is valid; reconciliation then has nothing to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
	defaults: BTreeMap<String, bool>,
	pub refresh_interval: Duration,
	/// Bound on a single reconciliation fetch.
	pub request_timeout: Duration,
	pub maintenance_flag: String,
}

impl Default for Subscription {
	fn default() -> Self {
		Self {
			defaults: BTreeMap::new(),
			refresh_interval: DEFAULT_REFRESH_INTERVAL,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			maintenance_flag: DEFAULT_MAINTENANCE_FLAG.to_string(),
		}
	}
}

impl Subscription {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds `flag_name` with the value assumed until it is observed.
	pub fn flag(mut self, flag_name: impl Into<String>, default: bool) -> Self {
		self.defaults.insert(flag_name.into(), default);
		self
	}

	pub fn flags<I, S>(mut self, flags: I) -> Self
	where
		I: IntoIterator<Item = (S, bool)>,
		S: Into<String>,
	{
		self
			.defaults
			.extend(flags.into_iter().map(|(name, default)| (name.into(), default)));
		self
	}

	pub fn refresh_interval(mut self, interval: Duration) -> Self {
		self.refresh_interval = interval;
		self
	}

	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}

	pub fn maintenance_flag(mut self, flag_name: impl Into<String>) -> Self {
		self.maintenance_flag = flag_name.into();
		self
	}

	/// Subscribed names in sorted order.
	pub fn flag_names(&self) -> Vec<String> {
		self.defaults.keys().cloned().collect()
	}

	pub fn default_for(&self, flag_name: &str) -> Option<bool> {
		self.defaults.get(flag_name).copied()
	}

	pub fn is_empty(&self) -> bool {
		self.defaults.is_empty()
	}

	pub fn validate(&self) -> Result<()> {
		if self.refresh_interval.is_zero() {
			return Err(FlagsClientError::InvalidConfig(
				"refresh interval must be greater than zero".to_string(),
			));
		}
		if self.request_timeout.is_zero() || self.request_timeout >= self.refresh_interval {
			return Err(FlagsClientError::InvalidConfig(format!(
				"request timeout {:?} must be non-zero and shorter than the refresh interval {:?}",
				self.request_timeout, self.refresh_interval
			)));
		}
		if self.maintenance_flag.trim().is_empty() {
			return Err(FlagsClientError::InvalidConfig(
				"maintenance flag name must not be empty".to_string(),
			));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults() {
		let subscription = Subscription::default();
		assert!(subscription.is_empty());
		assert_eq!(subscription.refresh_interval, Duration::from_secs(300));
		assert_eq!(subscription.request_timeout, Duration::from_secs(10));
		assert_eq!(subscription.maintenance_flag, "maintenance_mode");
		assert!(subscription.validate().is_ok());
	}

	#[test]
	fn builder_collects_flags() {
		let subscription = Subscription::new()
			.flag("maintenance_mode", false)
			.flags([("beta", true), ("alpha", false)]);

		assert_eq!(subscription.flag_names(), vec!["alpha", "beta", "maintenance_mode"]);
		assert_eq!(subscription.default_for("beta"), Some(true));
		assert_eq!(subscription.default_for("unknown"), None);
	}

	#[test]
	fn timeout_must_be_shorter_than_interval() {
		let subscription = Subscription::new()
			.refresh_interval(Duration::from_secs(5))
			.request_timeout(Duration::from_secs(5));
		assert!(matches!(
			subscription.validate(),
			Err(FlagsClientError::InvalidConfig(_))
		));

		let subscription = Subscription::new().refresh_interval(Duration::ZERO);
		assert!(subscription.validate().is_err());
	}

	#[test]
	fn blank_maintenance_flag_is_invalid() {
		let subscription = Subscription::new().maintenance_flag(" ");
		assert!(subscription.validate().is_err());
	}
}
