// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Health check handler.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
	pub status: &'static str,
	pub timestamp: String,
	pub flag_count: Option<u64>,
	pub stream_subscribers: usize,
}

/// GET /health - 503 when the flag store cannot be queried.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
	let flag_count = match state.repository.count().await {
		Ok(count) => Some(count),
		Err(e) => {
			error!(error = %e, "health check: flag store unavailable");
			None
		}
	};

	let (status, http_status) = match flag_count {
		Some(_) => ("healthy", StatusCode::OK),
		None => ("unhealthy", StatusCode::SERVICE_UNAVAILABLE),
	};

	let response = HealthResponse {
		status,
		timestamp: chrono::Utc::now().to_rfc3339(),
		flag_count,
		stream_subscribers: state.broadcaster.receiver_count(),
	};

	(http_status, Json(response))
}
