// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Local in-memory cache of flag states.
//!
//! Writers are the event listener and the reconciliation task; readers are
//! request handlers on the hot path. Reads are synchronous, never block on
//! I/O and always return copies, so callers never see a live view of the map.
//!
//! Conflict policy is last-applied-wins. Event timestamps are not compared;
//! the only guard is the message id check in [`FlagCache::apply_update`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;

/// Cached state of one flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagState {
	pub flag_name: String,
	pub enabled: bool,
	/// Message id of the event that produced this state. `None` after reconciliation.
	pub last_message_id: Option<String>,
	/// Local time the state was applied.
	pub last_updated: DateTime<Utc>,
}

/// Result of [`FlagCache::apply_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
	Applied,
	/// Same message id as the current state; nothing changed.
	Duplicate,
}

/// Concurrent flag name to state map. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct FlagCache {
	inner: Arc<DashMap<String, FlagState>>,
}

impl FlagCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Replaces the state of `flag_name` unless `message_id` is present and
	/// equal to the id already stored for it.
	///
	/// The check and the replace happen under the entry lock for that key, so
	/// two concurrent deliveries of the same message cannot both apply. A
	/// `None` message id always overwrites.
	pub fn apply_update(
		&self,
		flag_name: &str,
		enabled: bool,
		message_id: Option<&str>,
	) -> ApplyOutcome {
		let state = FlagState {
			flag_name: flag_name.to_string(),
			enabled,
			last_message_id: message_id.map(str::to_string),
			last_updated: Utc::now(),
		};

		match self.inner.entry(flag_name.to_string()) {
			Entry::Occupied(mut entry) => {
				if message_id.is_some() && entry.get().last_message_id.as_deref() == message_id {
					return ApplyOutcome::Duplicate;
				}
				entry.insert(state);
				ApplyOutcome::Applied
			}
			Entry::Vacant(entry) => {
				entry.insert(state);
				ApplyOutcome::Applied
			}
		}
	}

	/// Removes the entry. Returns true if one existed.
	pub fn remove(&self, flag_name: &str) -> bool {
		self.inner.remove(flag_name).is_some()
	}

	pub fn get(&self, flag_name: &str) -> Option<bool> {
		self.inner.get(flag_name).map(|state| state.enabled)
	}

	pub fn get_state(&self, flag_name: &str) -> Option<FlagState> {
		self.inner.get(flag_name).map(|state| state.clone())
	}

	/// Point-in-time copy of every cached value.
	pub fn get_all(&self) -> HashMap<String, bool> {
		self
			.inner
			.iter()
			.map(|entry| (entry.key().clone(), entry.value().enabled))
			.collect()
	}

	pub fn get_all_with_metadata(&self) -> HashMap<String, FlagState> {
		self
			.inner
			.iter()
			.map(|entry| (entry.key().clone(), entry.value().clone()))
			.collect()
	}

	/// Values for the requested names that are cached. Missing names are absent.
	pub fn get_many<S: AsRef<str>>(&self, flag_names: &[S]) -> HashMap<String, bool> {
		flag_names
			.iter()
			.filter_map(|name| {
				let name = name.as_ref();
				self.get(name).map(|enabled| (name.to_string(), enabled))
			})
			.collect()
	}

	pub fn is_enabled_or(&self, flag_name: &str, default: bool) -> bool {
		self.get(flag_name).unwrap_or(default)
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}
}
