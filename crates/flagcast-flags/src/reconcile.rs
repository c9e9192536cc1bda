// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Periodic re-sync of subscribed flags from the flag store.
//!
//! Every tick fetches the subscribed names in one batch and overwrites the
//! cached values with a `None` message id. Because the dedup guard needs a
//! message id on both sides, reconciliation always wins over whatever the
//! listener applied before, including an event that landed while the fetch
//! was in flight. Entries are never removed here; only delete events do that.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::FlagCache;
use crate::config::Subscription;
use crate::error::{FlagsClientError, Result};
use crate::source::BatchFlagSource;

/// Result of one reconciliation tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
	/// Nothing subscribed.
	Skipped,
	Applied { count: usize },
	/// The store returned no flags; the cache was left alone.
	Empty,
	Failed { error: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileStats {
	pub runs: u64,
	pub failures: u64,
	pub flags_applied: u64,
}

#[derive(Debug, Default)]
struct Counters {
	runs: AtomicU64,
	failures: AtomicU64,
	flags_applied: AtomicU64,
}

#[derive(Clone)]
struct Reconciler {
	cache: FlagCache,
	source: Arc<dyn BatchFlagSource>,
	subscription: Arc<Subscription>,
	counters: Arc<Counters>,
}

impl Reconciler {
	async fn run_once(&self) -> ReconcileOutcome {
		let names = self.subscription.flag_names();
		if names.is_empty() {
			debug!("No subscribed flags, skipping reconciliation");
			return ReconcileOutcome::Skipped;
		}

		self.counters.runs.fetch_add(1, Ordering::Relaxed);
		let budget = self.source.fetch_budget(self.subscription.request_timeout);

		let response = match tokio::time::timeout(budget, self.source.fetch_flags(&names)).await {
			Ok(Ok(response)) => response,
			Ok(Err(e)) => return self.failed(e),
			Err(_) => return self.failed(FlagsClientError::Timeout(budget)),
		};

		if response.is_empty() {
			warn!(
				requested = names.len(),
				"Flag store returned no flags, cache left unchanged"
			);
			return ReconcileOutcome::Empty;
		}

		let mut count = 0;
		for (name, info) in &response.flags {
			match info.enabled {
				Some(enabled) => {
					self.cache.apply_update(name, enabled, None);
					count += 1;
				}
				None => debug!(flag_name = %name, "Batch entry has no enabled state, skipping"),
			}
		}

		let missing: Vec<&str> = names
			.iter()
			.filter(|name| !response.flags.contains_key(name.as_str()))
			.map(String::as_str)
			.collect();
		if !missing.is_empty() {
			debug!(?missing, "Subscribed flags unknown to the flag store");
		}

		self
			.counters
			.flags_applied
			.fetch_add(count as u64, Ordering::Relaxed);
		info!(
			requested = names.len(),
			applied = count,
			"Reconciled flags from flag store"
		);
		ReconcileOutcome::Applied { count }
	}

	fn failed(&self, e: FlagsClientError) -> ReconcileOutcome {
		self.counters.failures.fetch_add(1, Ordering::Relaxed);
		error!(error = %e, "Flag reconciliation failed, cache left unchanged");
		ReconcileOutcome::Failed {
			error: e.to_string(),
		}
	}
}

/// Runs reconciliation immediately on start and then every refresh interval.
pub struct ReconciliationScheduler {
	reconciler: Reconciler,
	shutdown_tx: broadcast::Sender<()>,
	handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ReconciliationScheduler {
	/// Fails with [`FlagsClientError::InvalidConfig`] if `subscription` does not validate.
	pub fn new(
		cache: FlagCache,
		source: Arc<dyn BatchFlagSource>,
		subscription: Subscription,
	) -> Result<Self> {
		subscription.validate()?;
		let (shutdown_tx, _) = broadcast::channel(1);
		Ok(Self {
			reconciler: Reconciler {
				cache,
				source,
				subscription: Arc::new(subscription),
				counters: Arc::new(Counters::default()),
			},
			shutdown_tx,
			handles: Mutex::new(Vec::new()),
		})
	}

	pub fn subscription(&self) -> &Subscription {
		&self.reconciler.subscription
	}

	/// Runs one reconciliation pass now.
	pub async fn run_once(&self) -> ReconcileOutcome {
		self.reconciler.run_once().await
	}

	/// Spawns the periodic task. Calling it again while running is a no-op.
	#[instrument(skip(self))]
	pub async fn start(&self) {
		let mut handles = self.handles.lock().await;
		if !handles.is_empty() {
			warn!("Reconciliation scheduler already running");
			return;
		}

		let reconciler = self.reconciler.clone();
		let period = reconciler.subscription.refresh_interval;
		let mut shutdown_rx = self.shutdown_tx.subscribe();

		let handle = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(period);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				tokio::select! {
					_ = ticker.tick() => {
						reconciler.run_once().await;
					}
					_ = shutdown_rx.recv() => {
						info!("Shutting down reconciliation scheduler");
						break;
					}
				}
			}
		});

		handles.push(handle);
		info!(
			refresh_interval_secs = period.as_secs(),
			flags = self.reconciler.subscription.flag_names().len(),
			"Reconciliation scheduler started"
		);
	}

	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		let _ = self.shutdown_tx.send(());

		let mut handles = self.handles.lock().await;
		for handle in handles.drain(..) {
			let _ = handle.await;
		}
	}

	pub fn stats(&self) -> ReconcileStats {
		let counters = &self.reconciler.counters;
		ReconcileStats {
			runs: counters.runs.load(Ordering::Relaxed),
			failures: counters.failures.load(Ordering::Relaxed),
			flags_applied: counters.flags_applied.load(Ordering::Relaxed),
		}
	}
}
