// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bounded retries with exponential backoff for request/response calls.

use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryConfig {
	/// Total attempts including the first one.
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
	pub backoff_factor: f64,
	pub jitter: bool,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::from_millis(200),
			max_delay: Duration::from_secs(5),
			backoff_factor: 2.0,
			jitter: true,
		}
	}
}

impl RetryConfig {
	/// Upper bound on the wall time of [`retry`] when each attempt is capped
	/// at `per_attempt`: every attempt plus the longest possible sleep between
	/// them, jitter included.
	pub fn total_budget(&self, per_attempt: Duration) -> Duration {
		let max_attempts = self.max_attempts.max(1);
		let jitter_ceiling = if self.jitter { 1.5 } else { 1.0 };
		let sleeps: f64 = (0..max_attempts - 1)
			.map(|retry_index| {
				let exponential =
					self.base_delay.as_secs_f64() * self.backoff_factor.powi(retry_index as i32);
				exponential.min(self.max_delay.as_secs_f64()) * jitter_ceiling
			})
			.sum();
		per_attempt * max_attempts + Duration::from_secs_f64(sleeps)
	}

	pub(crate) fn delay_for(&self, retry_index: u32) -> Duration {
		let exponential = self.base_delay.as_secs_f64() * self.backoff_factor.powi(retry_index as i32);
		let capped = exponential.min(self.max_delay.as_secs_f64());
		let delay = if self.jitter {
			capped * (0.5 + fastrand::f64())
		} else {
			capped
		};
		Duration::from_secs_f64(delay)
	}
}

/// Classifies errors that are worth another attempt.
pub trait RetryableError {
	fn is_retryable(&self) -> bool;
}

/// Statuses that indicate a transient server-side condition.
pub fn is_retryable_status(status: StatusCode) -> bool {
	matches!(
		status,
		StatusCode::TOO_MANY_REQUESTS
			| StatusCode::REQUEST_TIMEOUT
			| StatusCode::INTERNAL_SERVER_ERROR
			| StatusCode::BAD_GATEWAY
			| StatusCode::SERVICE_UNAVAILABLE
			| StatusCode::GATEWAY_TIMEOUT
	)
}

impl RetryableError for reqwest::Error {
	fn is_retryable(&self) -> bool {
		self.is_timeout() || self.is_connect() || self.status().is_some_and(is_retryable_status)
	}
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent. The last error is returned on exhaustion.
pub async fn retry<F, Fut, T, E>(cfg: &RetryConfig, mut op: F) -> Result<T, E>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
	E: RetryableError + std::fmt::Display,
{
	let max_attempts = cfg.max_attempts.max(1);
	let mut attempt = 0;

	loop {
		attempt += 1;
		let err = match op().await {
			Ok(value) => return Ok(value),
			Err(err) => err,
		};

		if !err.is_retryable() {
			debug!(error = %err, attempt, "giving up on non-retryable error");
			return Err(err);
		}

		if attempt >= max_attempts {
			warn!(error = %err, attempt, max_attempts, "retry attempts exhausted");
			return Err(err);
		}

		let delay = cfg.delay_for(attempt - 1);
		warn!(
			error = %err,
			attempt,
			max_attempts,
			delay_ms = delay.as_millis() as u64,
			"request failed, retrying"
		);
		tokio::time::sleep(delay).await;
	}
}
