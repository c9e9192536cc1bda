// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

/// Doubling reconnect delay for long-lived connections.
///
/// Starts at `initial`, doubles after every failure, and never exceeds `max`.
/// [`Backoff::reset`] returns to `initial` once a connection is established.
#[derive(Debug, Clone)]
pub struct Backoff {
	initial: Duration,
	max: Duration,
	current: Duration,
}

impl Backoff {
	pub fn new(initial: Duration, max: Duration) -> Self {
		let initial = initial.min(max);
		Self {
			initial,
			max,
			current: initial,
		}
	}

	/// Returns the delay to wait now and advances the schedule.
	pub fn next_delay(&mut self) -> Duration {
		let delay = self.current;
		self.current = (self.current * 2).min(self.max);
		delay
	}

	pub fn reset(&mut self) {
		self.current = self.initial;
	}

	pub fn current(&self) -> Duration {
		self.current
	}
}
