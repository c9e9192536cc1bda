// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Single-topic broadcast channel for flag events.
//!
//! # Architecture
//!
//! ```text
//! FlagService ──> EventPublisher ──> FlagEventSink::send("feature-flag-events", json)
//!                                              │
//!                                  FlagsBroadcaster (tokio broadcast)
//!                                              │
//!                   ┌──────────────────────────┼──────────────────────────┐
//!                   ▼                          ▼                          ▼
//!             SSE subscriber             SSE subscriber            in-process consumer
//! ```
//!
//! Delivery is at-most-once: a subscriber only sees messages sent while it is
//! subscribed, and a subscriber that falls more than `channel_capacity`
//! messages behind loses the oldest ones.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};

use flagcast_flags_core::FLAG_EVENTS_CHANNEL;

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Transport failures when handing a message to the channel.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
	#[error("unknown channel '{0}'")]
	UnknownChannel(String),

	#[error("channel transport error: {0}")]
	Transport(String),
}

/// Anything that can carry serialized flag events to subscribers.
pub trait FlagEventSink: Send + Sync {
	/// Sends `payload` on `channel` and returns how many subscribers it reached.
	fn send(&self, channel: &str, payload: String) -> Result<usize, ChannelError>;
}

#[derive(Debug, Clone)]
pub struct BroadcasterConfig {
	pub channel_capacity: usize,
	/// Keep-alive interval for streaming subscribers.
	pub heartbeat_interval: Duration,
}

impl Default for BroadcasterConfig {
	fn default() -> Self {
		Self {
			channel_capacity: DEFAULT_CHANNEL_CAPACITY,
			heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcasterStats {
	pub channel: String,
	pub current_receivers: usize,
	pub total_events_sent: u64,
	pub total_subscriptions: u64,
}

/// In-process fan-out of serialized flag events on one channel.
pub struct FlagsBroadcaster {
	channel: String,
	config: BroadcasterConfig,
	sender: broadcast::Sender<String>,
	total_events: AtomicU64,
	total_subscriptions: AtomicU64,
}

impl FlagsBroadcaster {
	pub fn new(config: BroadcasterConfig) -> Self {
		let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
		Self {
			channel: FLAG_EVENTS_CHANNEL.to_string(),
			config,
			sender,
			total_events: AtomicU64::new(0),
			total_subscriptions: AtomicU64::new(0),
		}
	}

	pub fn with_defaults() -> Self {
		Self::new(BroadcasterConfig::default())
	}

	pub fn channel(&self) -> &str {
		&self.channel
	}

	/// Subscribes to messages sent from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<String> {
		self.total_subscriptions.fetch_add(1, Ordering::Relaxed);
		let receiver = self.sender.subscribe();
		debug!(
			channel = %self.channel,
			receiver_count = self.sender.receiver_count(),
			"subscriber attached"
		);
		receiver
	}

	pub fn receiver_count(&self) -> usize {
		self.sender.receiver_count()
	}

	pub fn heartbeat_interval(&self) -> Duration {
		self.config.heartbeat_interval
	}

	pub fn stats(&self) -> BroadcasterStats {
		BroadcasterStats {
			channel: self.channel.clone(),
			current_receivers: self.sender.receiver_count(),
			total_events_sent: self.total_events.load(Ordering::Relaxed),
			total_subscriptions: self.total_subscriptions.load(Ordering::Relaxed),
		}
	}
}

impl FlagEventSink for FlagsBroadcaster {
	fn send(&self, channel: &str, payload: String) -> Result<usize, ChannelError> {
		if channel != self.channel {
			return Err(ChannelError::UnknownChannel(channel.to_string()));
		}

		self.total_events.fetch_add(1, Ordering::Relaxed);

		// `send` only fails when there are no receivers.
		match self.sender.send(payload) {
			Ok(count) => {
				debug!(channel, receiver_count = count, "broadcast message");
				Ok(count)
			}
			Err(_) => {
				info!(channel, "no subscribers connected, message dropped");
				Ok(0)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tokio::sync::broadcast::error::RecvError;
	use tokio::time::timeout;

	#[tokio::test]
	async fn subscribers_receive_messages() {
		let broadcaster = FlagsBroadcaster::with_defaults();
		let mut r1 = broadcaster.subscribe();
		let mut r2 = broadcaster.subscribe();

		let count = broadcaster
			.send(FLAG_EVENTS_CHANNEL, "hello".to_string())
			.unwrap();
		assert_eq!(count, 2);

		for receiver in [&mut r1, &mut r2] {
			let msg = timeout(Duration::from_millis(100), receiver.recv())
				.await
				.unwrap()
				.unwrap();
			assert_eq!(msg, "hello");
		}
	}

	#[test]
	fn send_without_subscribers_reaches_nobody() {
		let broadcaster = FlagsBroadcaster::with_defaults();
		assert_eq!(broadcaster.send(FLAG_EVENTS_CHANNEL, "x".to_string()), Ok(0));
		assert_eq!(broadcaster.stats().total_events_sent, 1);
	}

	#[test]
	fn rejects_other_channels() {
		let broadcaster = FlagsBroadcaster::with_defaults();
		let err = broadcaster.send("other", "x".to_string()).unwrap_err();
		assert_eq!(err, ChannelError::UnknownChannel("other".to_string()));
		assert_eq!(broadcaster.stats().total_events_sent, 0);
	}

	#[tokio::test]
	async fn late_subscribers_miss_earlier_messages() {
		let broadcaster = FlagsBroadcaster::with_defaults();
		let _early = broadcaster.subscribe();
		broadcaster
			.send(FLAG_EVENTS_CHANNEL, "first".to_string())
			.unwrap();

		let mut late = broadcaster.subscribe();
		broadcaster
			.send(FLAG_EVENTS_CHANNEL, "second".to_string())
			.unwrap();

		assert_eq!(late.recv().await.unwrap(), "second");
	}

	#[tokio::test]
	async fn lagging_subscriber_loses_oldest() {
		let broadcaster = FlagsBroadcaster::new(BroadcasterConfig {
			channel_capacity: 2,
			..Default::default()
		});
		let mut receiver = broadcaster.subscribe();
		for i in 0..4 {
			broadcaster
				.send(FLAG_EVENTS_CHANNEL, format!("m{i}"))
				.unwrap();
		}

		assert!(matches!(receiver.recv().await, Err(RecvError::Lagged(2))));
		assert_eq!(receiver.recv().await.unwrap(), "m2");
	}

	#[test]
	fn stats_track_subscriptions() {
		let broadcaster = FlagsBroadcaster::with_defaults();
		let r1 = broadcaster.subscribe();
		let _r2 = broadcaster.subscribe();
		drop(r1);

		let stats = broadcaster.stats();
		assert_eq!(stats.channel, "feature-flag-events");
		assert_eq!(stats.current_receivers, 1);
		assert_eq!(stats.total_subscriptions, 2);
	}
}
