// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP client construction with the flagcast User-Agent.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// Returns a client builder carrying the flagcast User-Agent.
///
/// # Example
/// ```ignore
/// let client = flagcast_common_http::builder()
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Builds a client with a per-request timeout.
pub fn new_client_with_timeout(timeout: Duration) -> reqwest::Result<Client> {
	builder().timeout(timeout).build()
}

/// Format: `flagcast/{version}/{os}-{arch}`
pub fn user_agent() -> String {
	format!(
		"flagcast/{}/{}-{}",
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}
