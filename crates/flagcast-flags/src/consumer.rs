// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Applies decoded flag events to the local cache.
//!
//! Handling never fails: undecodable payloads, unsupported versions and
//! unknown event types are logged, counted and dropped, and the caller moves
//! on to the next message.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use flagcast_flags_core::{FlagEvent, FlagEventType};

use crate::cache::{ApplyOutcome, FlagCache};

/// What happened to one channel message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
	Applied,
	Duplicate,
	Removed,
	/// Decoded but not applicable (unknown type, future version, missing state).
	Ignored,
	Malformed,
}

#[derive(Debug, Default)]
pub struct ConsumerStats {
	received: AtomicU64,
	applied: AtomicU64,
	duplicate: AtomicU64,
	removed: AtomicU64,
	ignored: AtomicU64,
	malformed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerStatsSnapshot {
	pub received: u64,
	pub applied: u64,
	pub duplicate: u64,
	pub removed: u64,
	pub ignored: u64,
	pub malformed: u64,
}

impl ConsumerStats {
	fn record(&self, outcome: HandleOutcome) {
		self.received.fetch_add(1, Ordering::Relaxed);
		let counter = match outcome {
			HandleOutcome::Applied => &self.applied,
			HandleOutcome::Duplicate => &self.duplicate,
			HandleOutcome::Removed => &self.removed,
			HandleOutcome::Ignored => &self.ignored,
			HandleOutcome::Malformed => &self.malformed,
		};
		counter.fetch_add(1, Ordering::Relaxed);
	}

	pub fn snapshot(&self) -> ConsumerStatsSnapshot {
		ConsumerStatsSnapshot {
			received: self.received.load(Ordering::Relaxed),
			applied: self.applied.load(Ordering::Relaxed),
			duplicate: self.duplicate.load(Ordering::Relaxed),
			removed: self.removed.load(Ordering::Relaxed),
			ignored: self.ignored.load(Ordering::Relaxed),
			malformed: self.malformed.load(Ordering::Relaxed),
		}
	}
}

/// Decodes channel messages and applies them to a [`FlagCache`].
#[derive(Debug, Clone)]
pub struct EventConsumer {
	cache: FlagCache,
	stats: Arc<ConsumerStats>,
}

impl EventConsumer {
	pub fn new(cache: FlagCache) -> Self {
		Self {
			cache,
			stats: Arc::new(ConsumerStats::default()),
		}
	}

	pub fn cache(&self) -> &FlagCache {
		&self.cache
	}

	pub fn stats(&self) -> ConsumerStatsSnapshot {
		self.stats.snapshot()
	}

	/// Handles one raw channel payload.
	pub fn handle_message(&self, payload: &str) -> HandleOutcome {
		let outcome = match FlagEvent::from_json(payload) {
			Ok(event) => self.apply(&event),
			Err(e) => {
				error!(error = %e, payload = %payload, "Failed to decode flag event, dropping");
				HandleOutcome::Malformed
			}
		};
		self.stats.record(outcome);
		outcome
	}

	/// Handles an already decoded event.
	pub fn handle_event(&self, event: &FlagEvent) -> HandleOutcome {
		let outcome = self.apply(event);
		self.stats.record(outcome);
		outcome
	}

	fn apply(&self, event: &FlagEvent) -> HandleOutcome {
		if !event.is_supported_version() {
			warn!(
				flag_name = %event.flag_name,
				version = %event.version(),
				message_id = ?event.message_id,
				"Ignoring flag event with unsupported version"
			);
			return HandleOutcome::Ignored;
		}

		if event.flag_name.is_empty() {
			warn!(event_type = %event.event_type, "Ignoring flag event without a flag name");
			return HandleOutcome::Ignored;
		}

		match event.event_type {
			FlagEventType::Created | FlagEventType::Updated => {
				let Some(enabled) = event.enabled else {
					warn!(
						flag_name = %event.flag_name,
						event_type = %event.event_type,
						message_id = ?event.message_id,
						"Flag event has no enabled state, dropping"
					);
					return HandleOutcome::Ignored;
				};

				match self
					.cache
					.apply_update(&event.flag_name, enabled, event.message_id.as_deref())
				{
					ApplyOutcome::Applied => {
						info!(
							flag_name = %event.flag_name,
							enabled,
							event_type = %event.event_type,
							message_id = ?event.message_id,
							"Flag state updated"
						);
						HandleOutcome::Applied
					}
					ApplyOutcome::Duplicate => {
						debug!(
							flag_name = %event.flag_name,
							message_id = ?event.message_id,
							"Duplicate flag event dropped"
						);
						HandleOutcome::Duplicate
					}
				}
			}
			FlagEventType::Deleted => {
				let existed = self.cache.remove(&event.flag_name);
				info!(
					flag_name = %event.flag_name,
					existed,
					message_id = ?event.message_id,
					"Flag removed from cache"
				);
				HandleOutcome::Removed
			}
			FlagEventType::Unknown => {
				warn!(
					flag_name = %event.flag_name,
					message_id = ?event.message_id,
					"Ignoring flag event with unknown type"
				);
				HandleOutcome::Ignored
			}
		}
	}
}
