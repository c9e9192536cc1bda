// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request admission driven by a cached maintenance flag.
//!
//! [`MaintenanceGate::admit`] runs on every request. It reads the cache
//! synchronously and never performs I/O.

use std::sync::Arc;

use tracing::error;

use crate::cache::FlagCache;
use crate::config::Subscription;

pub const MAINTENANCE_REASON: &str = "Service is currently under maintenance. Please try again later.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
	Allow,
	Reject { reason: String },
}

impl GateDecision {
	pub fn is_allowed(&self) -> bool {
		matches!(self, GateDecision::Allow)
	}
}

#[derive(Debug, Clone)]
pub struct MaintenanceGate {
	cache: FlagCache,
	subscription: Arc<Subscription>,
}

impl MaintenanceGate {
	pub fn new(cache: FlagCache, subscription: Arc<Subscription>) -> Self {
		Self { cache, subscription }
	}

	pub fn maintenance_flag(&self) -> &str {
		&self.subscription.maintenance_flag
	}

	/// Rejects while the maintenance flag resolves to enabled.
	pub fn admit(&self) -> GateDecision {
		if self.is_flag_enabled(&self.subscription.maintenance_flag) {
			GateDecision::Reject {
				reason: MAINTENANCE_REASON.to_string(),
			}
		} else {
			GateDecision::Allow
		}
	}

	/// Cached value, else the subscribed default, else `false`.
	pub fn is_flag_enabled(&self, flag_name: &str) -> bool {
		if let Some(enabled) = self.cache.get(flag_name) {
			return enabled;
		}
		match self.subscription.default_for(flag_name) {
			Some(default) => default,
			None => {
				error!(
					flag_name = %flag_name,
					"No default value configured for flag, using false"
				);
				false
			}
		}
	}
}
