// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flag CRUD and batch read handlers.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tracing::instrument;

use flagcast_server_flags::{CreateFlagRequest, UpdateFlagRequest, DEFAULT_PAGE_SIZE};

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
	#[serde(default)]
	pub page: Option<i64>,
	#[serde(default)]
	pub size: Option<i64>,
}

/// GET /flags - Paged list; out-of-range values fall back to defaults.
#[instrument(skip(state, params))]
pub async fn list_flags(
	State(state): State<AppState>,
	params: Result<Query<ListParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
	let Query(params) = params?;
	let response = state
		.service
		.list_flags(
			params.page.unwrap_or(0),
			params.size.unwrap_or(DEFAULT_PAGE_SIZE),
		)
		.await?;
	Ok(Json(response))
}

/// GET /flags/{name}
#[instrument(skip(state))]
pub async fn get_flag(
	State(state): State<AppState>,
	Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
	Ok(Json(state.service.get_flag(&name).await?))
}

/// POST /flags
#[instrument(skip(state, payload))]
pub async fn create_flag(
	State(state): State<AppState>,
	payload: Result<Json<CreateFlagRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
	let Json(request) = payload?;
	let flag = state.service.create_flag(request).await?;
	Ok((StatusCode::CREATED, Json(flag)))
}

/// PUT /flags/{name} - Absent fields keep their stored values.
#[instrument(skip(state, payload))]
pub async fn update_flag(
	State(state): State<AppState>,
	Path(name): Path<String>,
	payload: Result<Json<UpdateFlagRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
	let Json(request) = payload?;
	Ok(Json(state.service.update_flag(&name, request).await?))
}

/// DELETE /flags/{name}
#[instrument(skip(state))]
pub async fn delete_flag(
	State(state): State<AppState>,
	Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
	state.service.delete_flag(&name).await?;
	Ok(StatusCode::NO_CONTENT)
}

/// POST /flags/batch - Body is a JSON array of names. Unknown names are omitted.
#[instrument(skip(state, payload))]
pub async fn get_flags_batch(
	State(state): State<AppState>,
	payload: Result<Json<Vec<String>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
	let Json(names) = payload?;
	Ok(Json(state.service.get_flags_batch(&names).await?))
}
