// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the flags SDK.

use std::time::Duration;

use flagcast_common_http::{is_retryable_status, RetryableError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlagsClientError>;

#[derive(Error, Debug)]
pub enum FlagsClientError {
	#[error("Invalid or missing service URL")]
	InvalidServiceUrl,

	#[error("Failed to connect to flag service: {0}")]
	ConnectionFailed(#[source] reqwest::Error),

	#[error("HTTP request failed: {0}")]
	RequestFailed(#[source] reqwest::Error),

	#[error("Failed to parse flag service response: {0}")]
	ParseFailed(String),

	#[error("Flag service returned an error: {status} - {message}")]
	ServerError { status: u16, message: String },

	#[error("SSE stream error: {0}")]
	SseStreamError(String),

	#[error("Request timed out after {0:?}")]
	Timeout(Duration),

	#[error("Invalid client configuration: {0}")]
	InvalidConfig(String),

	#[error("Client has been closed")]
	ClientClosed,
}

impl FlagsClientError {
	pub fn is_retryable(&self) -> bool {
		match self {
			FlagsClientError::ConnectionFailed(_) | FlagsClientError::SseStreamError(_) => true,
			FlagsClientError::RequestFailed(e) => e.is_timeout() || e.is_connect(),
			FlagsClientError::ServerError { status, .. } => reqwest::StatusCode::from_u16(*status)
				.map(is_retryable_status)
				.unwrap_or(false),
			_ => false,
		}
	}
}

impl RetryableError for FlagsClientError {
	fn is_retryable(&self) -> bool {
		FlagsClientError::is_retryable(self)
	}
}
