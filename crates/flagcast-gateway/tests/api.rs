// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tokio::sync::broadcast;
use tower::ServiceExt;

use flagcast_flags::{FlagEvent, FlagsClient, Subscription, MAINTENANCE_REASON};
use flagcast_gateway::{create_router, GatewayState};

struct Harness {
	client: Arc<FlagsClient>,
	events: broadcast::Sender<String>,
	router: Router,
}

async fn harness() -> Harness {
	let (events, receiver) = broadcast::channel(16);
	let client = FlagsClient::builder()
		.subscription(
			Subscription::new()
				.flag("maintenance_mode", false)
				.flag("dark_mode", true),
		)
		.channel_receiver(receiver)
		.enable_reconciliation(false)
		.build()
		.await
		.unwrap();
	let client = Arc::new(client);
	let router = create_router(GatewayState::new(Arc::clone(&client)));
	Harness {
		client,
		events,
		router,
	}
}

async fn get(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
	let response = router
		.clone()
		.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
		.await
		.unwrap();
	let status = response.status();
	let body = axum::body::to_bytes(response.into_body(), usize::MAX)
		.await
		.unwrap();
	(status, serde_json::from_slice(&body).unwrap())
}

async fn wait_for(client: &FlagsClient, name: &str, expected: bool) {
	for _ in 0..100 {
		if client.get(name) == Some(expected) {
			return;
		}
		tokio::time::sleep(std::time::Duration::from_millis(10)).await;
	}
	panic!("{name} never became {expected}");
}

#[tokio::test]
async fn requests_pass_while_maintenance_is_off() {
	let h = harness().await;
	h.client.cache().apply_update("dark_mode", false, None);

	let (status, body) = get(&h.router, "/api/flags/dark_mode").await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["name"], "dark_mode");
	assert_eq!(body["enabled"], false);

	let (status, body) = get(&h.router, "/api/flags").await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["dark_mode"], false);
}

#[tokio::test]
async fn maintenance_rejects_with_503() {
	let h = harness().await;
	h.client.cache().apply_update("maintenance_mode", true, None);

	let (status, body) = get(&h.router, "/api/flags").await;
	assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
	assert_eq!(body["code"], 2007);
	assert_eq!(body["error"], "MAINTENANCE_MODE");
	assert_eq!(body["message"], MAINTENANCE_REASON);

	let (status, _) = get(&h.router, "/api/flags/dark_mode").await;
	assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn health_is_never_gated() {
	let h = harness().await;
	h.client.cache().apply_update("maintenance_mode", true, None);

	let (status, body) = get(&h.router, "/health").await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["status"], "healthy");
	assert_eq!(body["streaming"], true);
	assert_eq!(body["maintenance"], true);
}

#[tokio::test]
async fn unrouted_paths_are_gated() {
	let h = harness().await;

	let response = h
		.router
		.clone()
		.oneshot(Request::builder().uri("/orders/42").body(Body::empty()).unwrap())
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::NOT_FOUND);

	h.client.cache().apply_update("maintenance_mode", true, None);
	let (status, body) = get(&h.router, "/orders/42").await;
	assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
	assert_eq!(body["code"], 2007);

	let (status, _) = get(&h.router, "/health").await;
	assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unseen_flag_is_not_found() {
	let h = harness().await;
	let (status, body) = get(&h.router, "/api/flags/nope").await;
	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(body["error"], "FLAG_NOT_FOUND");
}

#[tokio::test]
async fn events_toggle_the_gate() {
	let h = harness().await;
	let now = flagcast_flags_core::timestamp::now_millis();

	let on = FlagEvent::updated("maintenance_mode", None, true, "ops", now, "m-on");
	h.events.send(on.to_json().unwrap()).unwrap();
	wait_for(&h.client, "maintenance_mode", true).await;
	let (status, _) = get(&h.router, "/api/flags").await;
	assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

	let off = FlagEvent::updated("maintenance_mode", None, false, "ops", now, "m-off");
	h.events.send(off.to_json().unwrap()).unwrap();
	wait_for(&h.client, "maintenance_mode", false).await;
	let (status, body) = get(&h.router, "/api/flags/stats").await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["consumer"]["applied"], 2);
}
