// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP error mapping.
//!
//! Every error response carries `{code, error, message, timestamp}` where
//! `error` is the [`ErrorCode`] name and `code` its numeric value.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use flagcast_flags_core::timestamp::{self, now_millis};
use flagcast_flags_core::FlagsError;
use flagcast_server_flags::FlagsServerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
	InternalServerError,
	InvalidParameter,
	FlagNotFound,
	FlagAlreadyExists,
	FlagNameInvalid,
	FlagDescriptionInvalid,
}

impl ErrorCode {
	pub fn code(self) -> u16 {
		match self {
			ErrorCode::InternalServerError => 500,
			ErrorCode::InvalidParameter => 400,
			ErrorCode::FlagNotFound => 1001,
			ErrorCode::FlagAlreadyExists => 1002,
			ErrorCode::FlagNameInvalid => 1003,
			ErrorCode::FlagDescriptionInvalid => 1004,
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			ErrorCode::InternalServerError => "INTERNAL_SERVER_ERROR",
			ErrorCode::InvalidParameter => "INVALID_PARAMETER",
			ErrorCode::FlagNotFound => "FLAG_NOT_FOUND",
			ErrorCode::FlagAlreadyExists => "FLAG_ALREADY_EXISTS",
			ErrorCode::FlagNameInvalid => "FLAG_NAME_INVALID",
			ErrorCode::FlagDescriptionInvalid => "FLAG_DESCRIPTION_INVALID",
		}
	}

	pub fn status(self) -> StatusCode {
		match self {
			ErrorCode::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
			ErrorCode::FlagNotFound => StatusCode::NOT_FOUND,
			ErrorCode::FlagAlreadyExists => StatusCode::CONFLICT,
			ErrorCode::InvalidParameter
			| ErrorCode::FlagNameInvalid
			| ErrorCode::FlagDescriptionInvalid => StatusCode::BAD_REQUEST,
		}
	}
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorResponse {
	pub code: u16,
	pub error: String,
	pub message: String,
	pub timestamp: String,
}

impl ErrorResponse {
	pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
		Self {
			code: code.code(),
			error: code.name().to_string(),
			message: message.into(),
			timestamp: timestamp::format(&now_millis()),
		}
	}
}

#[derive(Debug, Error)]
pub enum ApiError {
	#[error(transparent)]
	Flags(#[from] FlagsServerError),

	#[error("{0}")]
	BadRequest(String),
}

impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		ApiError::BadRequest(rejection.body_text())
	}
}

impl From<QueryRejection> for ApiError {
	fn from(rejection: QueryRejection) -> Self {
		ApiError::BadRequest(rejection.body_text())
	}
}

impl ApiError {
	fn code_and_message(&self) -> (ErrorCode, String) {
		match self {
			ApiError::BadRequest(msg) => (ErrorCode::InvalidParameter, msg.clone()),
			ApiError::Flags(e) => match e {
				FlagsServerError::NotFound(name) => (
					ErrorCode::FlagNotFound,
					format!("Feature flag not found: {name}"),
				),
				FlagsServerError::AlreadyExists(name) => (
					ErrorCode::FlagAlreadyExists,
					format!("Feature flag already exists: {name}"),
				),
				FlagsServerError::Core(FlagsError::InvalidFlagName(msg)) => {
					(ErrorCode::FlagNameInvalid, msg.clone())
				}
				FlagsServerError::Core(FlagsError::InvalidDescription(msg)) => {
					(ErrorCode::FlagDescriptionInvalid, msg.clone())
				}
				FlagsServerError::Validation(msg) => (ErrorCode::InvalidParameter, msg.clone()),
				FlagsServerError::Core(_)
				| FlagsServerError::Database(_)
				| FlagsServerError::Internal(_) => (
					ErrorCode::InternalServerError,
					"An internal server error occurred".to_string(),
				),
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let (code, message) = self.code_and_message();
		if code == ErrorCode::InternalServerError {
			error!(error = %self, "request failed");
		} else {
			warn!(error = %self, code = code.code(), "request rejected");
		}
		(code.status(), Json(ErrorResponse::new(code, message))).into_response()
	}
}
