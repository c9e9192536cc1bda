// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP surface of the flagcast producer.
//!
//! | Route | Purpose |
//! |---|---|
//! | `GET /flags?page&size` | paged flag list |
//! | `POST /flags` | create (201) |
//! | `GET/PUT/DELETE /flags/{name}` | read, partial update, delete (204) |
//! | `POST /flags/batch` | batch read used by consumer reconciliation |
//! | `GET /api/flags/stream` | SSE feed of the flag event channel |
//! | `GET /api/flags/stream/stats` | broadcaster counters |
//! | `GET /health` | database and channel health |

pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;

use flagcast_server_config::ServerConfig;
use flagcast_server_flags::{
	connect, BroadcasterConfig, EventPublisher, FlagService, FlagsBroadcaster, FlagsRepository,
	SqliteFlagsRepository,
};

pub use error::{ApiError, ErrorCode, ErrorResponse};

#[derive(Clone)]
pub struct AppState {
	pub service: FlagService,
	pub repository: Arc<dyn FlagsRepository>,
	pub broadcaster: Arc<FlagsBroadcaster>,
}

impl AppState {
	pub fn new(repository: Arc<dyn FlagsRepository>, broadcaster: Arc<FlagsBroadcaster>) -> Self {
		let publisher = EventPublisher::new(broadcaster.clone());
		Self {
			service: FlagService::new(Arc::clone(&repository), publisher),
			repository,
			broadcaster,
		}
	}
}

/// Opens the database, runs migrations and builds the broadcaster.
pub async fn create_app_state(
	config: &ServerConfig,
) -> Result<AppState, flagcast_server_flags::FlagsServerError> {
	let pool = connect(&config.database.url).await?;
	let repository = SqliteFlagsRepository::new(pool);
	repository.migrate().await?;

	let broadcaster = FlagsBroadcaster::new(BroadcasterConfig {
		channel_capacity: config.stream.channel_capacity,
		heartbeat_interval: Duration::from_secs(config.stream.heartbeat_secs),
	});

	Ok(AppState::new(Arc::new(repository), Arc::new(broadcaster)))
}

pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(routes::health::health_check))
		.route(
			"/flags",
			get(routes::flags::list_flags).post(routes::flags::create_flag),
		)
		.route("/flags/batch", post(routes::flags::get_flags_batch))
		.route(
			"/flags/{name}",
			get(routes::flags::get_flag)
				.put(routes::flags::update_flag)
				.delete(routes::flags::delete_flag),
		)
		.route("/api/flags/stream", get(routes::stream::stream_events))
		.route("/api/flags/stream/stats", get(routes::stream::stream_stats))
		.with_state(state)
}
