// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Broadcast channel and SSE stream settings for the producer.

use serde::Deserialize;

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
const DEFAULT_HEARTBEAT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
	/// Messages buffered per subscriber before it starts lagging.
	pub channel_capacity: usize,
	/// Interval between SSE keep-alive comments.
	pub heartbeat_secs: u64,
}

impl Default for StreamConfig {
	fn default() -> Self {
		StreamConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamConfigLayer {
	#[serde(default)]
	pub channel_capacity: Option<usize>,
	#[serde(default)]
	pub heartbeat_secs: Option<u64>,
}

impl StreamConfigLayer {
	pub fn merge(&mut self, other: StreamConfigLayer) {
		if other.channel_capacity.is_some() {
			self.channel_capacity = other.channel_capacity;
		}
		if other.heartbeat_secs.is_some() {
			self.heartbeat_secs = other.heartbeat_secs;
		}
	}

	pub fn finalize(self) -> StreamConfig {
		StreamConfig {
			channel_capacity: self.channel_capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY),
			heartbeat_secs: self.heartbeat_secs.unwrap_or(DEFAULT_HEARTBEAT_SECS),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults() {
		let config = StreamConfig::default();
		assert_eq!(config.channel_capacity, 1024);
		assert_eq!(config.heartbeat_secs, 30);
	}
}
