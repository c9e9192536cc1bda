// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authoritative flag reads used by reconciliation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use flagcast_common_http::{retry, RetryConfig};
use flagcast_flags_core::BatchFlagsResponse;

use crate::error::{FlagsClientError, Result};

/// Path of the batch read endpoint relative to the flag service URL.
pub const BATCH_PATH: &str = "/flags/batch";

/// Reads the current state of a set of flags from the flag store.
#[async_trait]
pub trait BatchFlagSource: Send + Sync {
	/// Names the store does not know are absent from the response.
	async fn fetch_flags(&self, flag_names: &[String]) -> Result<BatchFlagsResponse>;

	/// Wall-time allowance for one `fetch_flags` call, given the per-request
	/// timeout. Sources that retry internally widen it to cover every attempt.
	fn fetch_budget(&self, request_timeout: Duration) -> Duration {
		request_timeout
	}
}

/// [`BatchFlagSource`] backed by the producer's HTTP batch endpoint.
#[derive(Debug, Clone)]
pub struct HttpBatchFlagSource {
	client: Client,
	batch_url: String,
	retry_config: RetryConfig,
}

impl HttpBatchFlagSource {
	/// `service_url` is the producer base URL; a trailing slash is ignored.
	pub fn new(service_url: &str, request_timeout: Duration) -> Result<Self> {
		let service_url = service_url.trim().trim_end_matches('/');
		if service_url.is_empty() {
			return Err(FlagsClientError::InvalidServiceUrl);
		}

		let client = flagcast_common_http::new_client_with_timeout(request_timeout)
			.map_err(FlagsClientError::ConnectionFailed)?;

		Ok(Self {
			client,
			batch_url: format!("{service_url}{BATCH_PATH}"),
			retry_config: RetryConfig::default(),
		})
	}

	pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
		self.retry_config = retry_config;
		self
	}

	pub fn batch_url(&self) -> &str {
		&self.batch_url
	}

	async fn fetch_once(&self, flag_names: &[String]) -> Result<BatchFlagsResponse> {
		let response = self
			.client
			.post(&self.batch_url)
			.json(flag_names)
			.send()
			.await
			.map_err(FlagsClientError::RequestFailed)?;

		if !response.status().is_success() {
			return Err(FlagsClientError::ServerError {
				status: response.status().as_u16(),
				message: response.text().await.unwrap_or_default(),
			});
		}

		response
			.json::<BatchFlagsResponse>()
			.await
			.map_err(|e| FlagsClientError::ParseFailed(e.to_string()))
	}
}

#[async_trait]
impl BatchFlagSource for HttpBatchFlagSource {
	async fn fetch_flags(&self, flag_names: &[String]) -> Result<BatchFlagsResponse> {
		debug!(url = %self.batch_url, count = flag_names.len(), "Fetching flag batch");
		retry(&self.retry_config, || self.fetch_once(flag_names)).await
	}

	fn fetch_budget(&self, request_timeout: Duration) -> Duration {
		self.retry_config.total_budget(request_timeout)
	}
}
