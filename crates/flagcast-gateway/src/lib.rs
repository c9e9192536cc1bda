// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Consumer-side HTTP service.
//!
//! Every request except `/health` passes through the maintenance gate,
//! including paths with no route. Flag reads are answered from the local cache.

pub mod gate;
pub mod routes;

use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;

use flagcast_flags::{FlagsClient, Subscription};
use flagcast_server_config::SubscriptionConfig;

#[derive(Clone)]
pub struct GatewayState {
	pub client: Arc<FlagsClient>,
}

impl GatewayState {
	pub fn new(client: Arc<FlagsClient>) -> Self {
		Self { client }
	}
}

/// Builds the SDK subscription from the resolved `subscription` config section.
pub fn subscription_from_config(config: &SubscriptionConfig) -> Subscription {
	Subscription::new()
		.flags(config.subscribed.iter().map(|(name, default)| (name.clone(), *default)))
		.refresh_interval(config.refresh_interval)
		.request_timeout(config.request_timeout)
		.maintenance_flag(config.maintenance_flag.clone())
}

pub fn create_router(state: GatewayState) -> Router {
	Router::new()
		.route(gate::HEALTH_PATH, get(routes::health_check))
		.route("/api/flags", get(routes::list_flags))
		.route("/api/flags/stats", get(routes::client_stats))
		.route("/api/flags/{name}", get(routes::get_flag))
		.layer(from_fn_with_state(state.clone(), gate::maintenance_gate))
		.with_state(state)
}
