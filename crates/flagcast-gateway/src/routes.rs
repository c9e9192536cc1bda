// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cache read handlers.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use flagcast_flags::ClientStats;

use crate::GatewayState;

#[derive(Debug, Serialize)]
pub struct FlagValue {
	pub name: String,
	pub enabled: bool,
}

/// GET /api/flags - Snapshot of every cached flag.
pub async fn list_flags(State(state): State<GatewayState>) -> Json<BTreeMap<String, bool>> {
	Json(state.client.get_all().into_iter().collect())
}

/// GET /api/flags/{name} - Cached value, 404 if the flag has not been seen.
pub async fn get_flag(State(state): State<GatewayState>, Path(name): Path<String>) -> Response {
	match state.client.get(&name) {
		Some(enabled) => Json(FlagValue { name, enabled }).into_response(),
		None => (
			StatusCode::NOT_FOUND,
			Json(json!({
				"error": "FLAG_NOT_FOUND",
				"message": format!("Feature flag not found: {name}"),
			})),
		)
			.into_response(),
	}
}

/// GET /api/flags/stats
pub async fn client_stats(State(state): State<GatewayState>) -> Json<ClientStats> {
	Json(state.client.stats())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
	pub status: &'static str,
	pub timestamp: String,
	pub streaming: bool,
	pub cached_flags: usize,
	pub maintenance: bool,
}

/// GET /health - Never gated. Reports degraded while the event stream is down.
pub async fn health_check(State(state): State<GatewayState>) -> Json<HealthResponse> {
	let streaming = state.client.is_streaming().await;
	Json(HealthResponse {
		status: if streaming { "healthy" } else { "degraded" },
		timestamp: chrono::Utc::now().to_rfc3339(),
		streaming,
		cached_flags: state.client.cache().len(),
		maintenance: !state.client.gate().admit().is_allowed(),
	})
}
