// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Errors raised by the flag store and the mutation service.
#[derive(Debug, Error)]
pub enum FlagsServerError {
	#[error(transparent)]
	Core(#[from] flagcast_flags_core::FlagsError),

	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("feature flag not found: {0}")]
	NotFound(String),

	#[error("feature flag already exists: {0}")]
	AlreadyExists(String),

	#[error("validation failed: {0}")]
	Validation(String),

	#[error("internal error: {0}")]
	Internal(String),
}

pub type Result<T> = std::result::Result<T, FlagsServerError>;
