// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Maintenance gate middleware.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::warn;

use flagcast_flags::GateDecision;

use crate::GatewayState;

pub const MAINTENANCE_MODE_CODE: u16 = 2007;

/// The only path served while the maintenance flag is on.
pub const HEALTH_PATH: &str = "/health";

#[derive(Debug, Serialize)]
pub struct MaintenanceResponse {
	pub code: u16,
	pub error: &'static str,
	pub message: String,
	pub timestamp: String,
}

/// Rejects with 503 while the maintenance flag is enabled. Applied as an
/// outer layer so unmatched paths are gated too.
pub async fn maintenance_gate(
	State(state): State<GatewayState>,
	request: Request,
	next: Next,
) -> Response {
	if request.uri().path() == HEALTH_PATH {
		return next.run(request).await;
	}

	match state.client.gate().admit() {
		GateDecision::Allow => next.run(request).await,
		GateDecision::Reject { reason } => {
			warn!(
				method = %request.method(),
				path = %request.uri().path(),
				"Request blocked due to maintenance mode"
			);
			(
				StatusCode::SERVICE_UNAVAILABLE,
				Json(MaintenanceResponse {
					code: MAINTENANCE_MODE_CODE,
					error: "MAINTENANCE_MODE",
					message: reason,
					timestamp: chrono::Utc::now().naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string(),
				}),
			)
				.into_response()
		}
	}
}
