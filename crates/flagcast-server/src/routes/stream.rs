// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SSE bridge for the flag event channel.
//!
//! Every channel message becomes one SSE event named after the channel. A
//! subscriber only receives messages sent after it connected.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::Stream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use flagcast_server_flags::BroadcasterStats;

use crate::AppState;

/// GET /api/flags/stream
pub async fn stream_events(
	State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
	let channel = state.broadcaster.channel().to_string();
	let rx = state.broadcaster.subscribe();
	info!(
		channel = %channel,
		subscribers = state.broadcaster.receiver_count(),
		"flag event stream opened"
	);

	let events = BroadcastStream::new(rx).filter_map(move |result| match result {
		Ok(payload) => Some(Ok(Event::default().event(channel.as_str()).data(payload))),
		Err(BroadcastStreamRecvError::Lagged(skipped)) => {
			warn!(skipped, "flag event stream subscriber lagged, messages dropped");
			None
		}
	});

	Sse::new(events).keep_alive(
		KeepAlive::new()
			.interval(state.broadcaster.heartbeat_interval())
			.text("keep-alive"),
	)
}

/// GET /api/flags/stream/stats
pub async fn stream_stats(State(state): State<AppState>) -> Json<BroadcasterStats> {
	Json(state.broadcaster.stats())
}
