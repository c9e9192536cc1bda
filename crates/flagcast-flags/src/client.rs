// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Consumer-side flags client.
//!
//! Wires the cache to its two writers (the event listener and the
//! reconciliation scheduler) and exposes the synchronous read side.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::info;

use flagcast_common_http::RetryConfig;

use crate::cache::{FlagCache, FlagState};
use crate::config::Subscription;
use crate::consumer::{ConsumerStatsSnapshot, EventConsumer};
use crate::error::{FlagsClientError, Result};
use crate::gate::MaintenanceGate;
use crate::listener::spawn_channel_listener;
use crate::reconcile::{ReconcileOutcome, ReconcileStats, ReconciliationScheduler};
use crate::source::{BatchFlagSource, HttpBatchFlagSource};
use crate::sse::{SseConfig, SseListener, STREAM_PATH};

/// Builder for constructing a [`FlagsClient`].
pub struct FlagsClientBuilder {
	service_url: Option<String>,
	subscription: Subscription,
	sse_config: SseConfig,
	retry_config: RetryConfig,
	enable_streaming: bool,
	enable_reconciliation: bool,
	seed_defaults: bool,
	channel_receiver: Option<broadcast::Receiver<String>>,
	batch_source: Option<Arc<dyn BatchFlagSource>>,
}

impl FlagsClientBuilder {
	pub fn new() -> Self {
		Self {
			service_url: None,
			subscription: Subscription::default(),
			sse_config: SseConfig::default(),
			retry_config: RetryConfig::default(),
			enable_streaming: true,
			enable_reconciliation: true,
			seed_defaults: false,
			channel_receiver: None,
			batch_source: None,
		}
	}

	/// Base URL of the flag service, e.g. `http://flags.internal:8080`.
	pub fn service_url(mut self, url: impl Into<String>) -> Self {
		self.service_url = Some(url.into());
		self
	}

	pub fn subscription(mut self, subscription: Subscription) -> Self {
		self.subscription = subscription;
		self
	}

	pub fn sse_config(mut self, config: SseConfig) -> Self {
		self.sse_config = config;
		self
	}

	/// Retry policy for batch fetches.
	pub fn retry_config(mut self, config: RetryConfig) -> Self {
		self.retry_config = config;
		self
	}

	/// Enables or disables listening for flag events.
	pub fn enable_streaming(mut self, enable: bool) -> Self {
		self.enable_streaming = enable;
		self
	}

	pub fn enable_reconciliation(mut self, enable: bool) -> Self {
		self.enable_reconciliation = enable;
		self
	}

	/// Writes every subscribed default into the cache before anything else runs.
	pub fn seed_defaults(mut self, enable: bool) -> Self {
		self.seed_defaults = enable;
		self
	}

	/// Listens on an in-process channel instead of the SSE stream.
	pub fn channel_receiver(mut self, receiver: broadcast::Receiver<String>) -> Self {
		self.channel_receiver = Some(receiver);
		self
	}

	/// Uses `source` for reconciliation instead of the HTTP batch endpoint.
	pub fn batch_source(mut self, source: Arc<dyn BatchFlagSource>) -> Self {
		self.batch_source = Some(source);
		self
	}

	/// Builds the client and starts its background tasks.
	///
	/// Reconciliation runs its first pass immediately in the background; the
	/// returned client serves defaults until it or an event fills the cache.
	pub async fn build(self) -> Result<FlagsClient> {
		self.subscription.validate()?;

		let service_url = match self.service_url {
			Some(url) => {
				let url = url.trim().trim_end_matches('/').to_string();
				if url.is_empty() {
					return Err(FlagsClientError::InvalidServiceUrl);
				}
				Some(url)
			}
			None => None,
		};

		let needs_url = (self.enable_streaming && self.channel_receiver.is_none())
			|| (self.enable_reconciliation && self.batch_source.is_none());
		if needs_url && service_url.is_none() {
			return Err(FlagsClientError::InvalidServiceUrl);
		}

		let cache = FlagCache::new();
		if self.seed_defaults {
			for name in self.subscription.flag_names() {
				if let Some(default) = self.subscription.default_for(&name) {
					cache.apply_update(&name, default, None);
				}
			}
		}

		let subscription = Arc::new(self.subscription);
		let consumer = EventConsumer::new(cache.clone());
		let gate = MaintenanceGate::new(cache.clone(), Arc::clone(&subscription));
		let (shutdown_tx, _) = broadcast::channel(1);

		let mut channel_task = None;
		let mut sse = None;
		if self.enable_streaming {
			if let Some(receiver) = self.channel_receiver {
				channel_task = Some(spawn_channel_listener(
					receiver,
					consumer.clone(),
					shutdown_tx.subscribe(),
				));
			} else if let Some(url) = &service_url {
				let mut listener = SseListener::new();
				listener
					.start(format!("{url}{STREAM_PATH}"), consumer.clone(), self.sse_config)
					.await?;
				sse = Some(RwLock::new(listener));
			}
		}

		let mut scheduler = None;
		if self.enable_reconciliation {
			let source: Arc<dyn BatchFlagSource> = match self.batch_source {
				Some(source) => source,
				None => {
					let url = service_url.as_deref().ok_or(FlagsClientError::InvalidServiceUrl)?;
					Arc::new(
						HttpBatchFlagSource::new(url, subscription.request_timeout)?
							.with_retry_config(self.retry_config),
					)
				}
			};
			let reconciliation =
				ReconciliationScheduler::new(cache.clone(), source, (*subscription).clone())?;
			reconciliation.start().await;
			scheduler = Some(reconciliation);
		}

		info!(
			service_url = ?service_url,
			subscribed = subscription.flag_names().len(),
			streaming = self.enable_streaming,
			"Flags client started"
		);

		Ok(FlagsClient {
			cache,
			consumer,
			gate,
			subscription,
			sse,
			channel_task: Mutex::new(channel_task),
			scheduler,
			shutdown_tx,
			closed: AtomicBool::new(false),
		})
	}
}

impl Default for FlagsClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientStats {
	pub cached_flags: usize,
	pub consumer: ConsumerStatsSnapshot,
	pub reconciliation: Option<ReconcileStats>,
}

/// Event-driven flag cache with periodic reconciliation.
pub struct FlagsClient {
	cache: FlagCache,
	consumer: EventConsumer,
	gate: MaintenanceGate,
	subscription: Arc<Subscription>,
	sse: Option<RwLock<SseListener>>,
	channel_task: Mutex<Option<JoinHandle<()>>>,
	scheduler: Option<ReconciliationScheduler>,
	shutdown_tx: broadcast::Sender<()>,
	closed: AtomicBool,
}

impl FlagsClient {
	pub fn builder() -> FlagsClientBuilder {
		FlagsClientBuilder::new()
	}

	pub fn cache(&self) -> &FlagCache {
		&self.cache
	}

	pub fn consumer(&self) -> &EventConsumer {
		&self.consumer
	}

	pub fn gate(&self) -> &MaintenanceGate {
		&self.gate
	}

	pub fn subscription(&self) -> &Subscription {
		&self.subscription
	}

	pub fn get(&self, flag_name: &str) -> Option<bool> {
		self.cache.get(flag_name)
	}

	/// Resolves through the cache, then the subscribed default, then `false`.
	pub fn is_enabled(&self, flag_name: &str) -> bool {
		self.gate.is_flag_enabled(flag_name)
	}

	pub fn get_all(&self) -> HashMap<String, bool> {
		self.cache.get_all()
	}

	pub fn get_all_with_metadata(&self) -> HashMap<String, FlagState> {
		self.cache.get_all_with_metadata()
	}

	pub fn stats(&self) -> ClientStats {
		ClientStats {
			cached_flags: self.cache.len(),
			consumer: self.consumer.stats(),
			reconciliation: self.scheduler.as_ref().map(ReconciliationScheduler::stats),
		}
	}

	/// Runs a reconciliation pass now, outside the periodic schedule.
	pub async fn reconcile_now(&self) -> Result<ReconcileOutcome> {
		if self.is_closed() {
			return Err(FlagsClientError::ClientClosed);
		}
		let scheduler = self.scheduler.as_ref().ok_or_else(|| {
			FlagsClientError::InvalidConfig("reconciliation is disabled".to_string())
		})?;
		Ok(scheduler.run_once().await)
	}

	pub async fn is_streaming(&self) -> bool {
		match &self.sse {
			Some(sse) => sse.read().await.is_connected(),
			None => self.channel_task.lock().await.is_some() && !self.is_closed(),
		}
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// Stops the listener and the scheduler. The cache stays readable.
	pub async fn close(&self) {
		if self.closed.swap(true, Ordering::SeqCst) {
			return;
		}

		let _ = self.shutdown_tx.send(());
		if let Some(handle) = self.channel_task.lock().await.take() {
			let _ = handle.await;
		}
		if let Some(sse) = &self.sse {
			sse.write().await.stop().await;
		}
		if let Some(scheduler) = &self.scheduler {
			scheduler.shutdown().await;
		}
		info!("Flags client closed");
	}
}
