// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Errors that can occur when building, encoding or decoding flag data.
#[derive(Debug, Error)]
pub enum FlagsError {
	#[error("invalid flag name: {0}")]
	InvalidFlagName(String),

	#[error("invalid flag description: {0}")]
	InvalidDescription(String),

	#[error("unsupported event version: {0}")]
	UnsupportedVersion(String),

	#[error("serialization error: {0}")]
	Serialization(String),
}

impl From<serde_json::Error> for FlagsError {
	fn from(err: serde_json::Error) -> Self {
		FlagsError::Serialization(err.to_string())
	}
}

pub type Result<T> = std::result::Result<T, FlagsError>;
