// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Producer service to consumer cache over the in-process broadcast channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flagcast_flags::{
	BatchFlagSource, BatchFlagsResponse, FlagsClient, FlagsClientError, GateDecision,
	ReconcileOutcome, Subscription,
};
use flagcast_server_flags::{
	connect, CreateFlagRequest, EventPublisher, FlagService, FlagsBroadcaster,
	SqliteFlagsRepository, UpdateFlagRequest,
};

/// Batch source reading straight from the producer service.
struct ServiceSource(FlagService);

#[async_trait]
impl BatchFlagSource for ServiceSource {
	async fn fetch_flags(&self, flag_names: &[String]) -> flagcast_flags::Result<BatchFlagsResponse> {
		self
			.0
			.get_flags_batch(flag_names)
			.await
			.map_err(|e| FlagsClientError::ServerError {
				status: 500,
				message: e.to_string(),
			})
	}
}

async fn producer() -> (FlagService, Arc<FlagsBroadcaster>) {
	let repo = SqliteFlagsRepository::new(connect("sqlite::memory:").await.unwrap());
	repo.migrate().await.unwrap();
	let broadcaster = Arc::new(FlagsBroadcaster::with_defaults());
	let service = FlagService::new(Arc::new(repo), EventPublisher::new(broadcaster.clone()));
	(service, broadcaster)
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
	tokio::time::timeout(Duration::from_secs(2), async {
		while !condition() {
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
	})
	.await
	.expect("condition not reached in time");
}

fn create(name: &str, enabled: bool) -> CreateFlagRequest {
	CreateFlagRequest {
		name: Some(name.to_string()),
		description: None,
		enabled: Some(enabled),
	}
}

#[tokio::test]
async fn mutations_reach_the_consumer_cache() {
	let (service, broadcaster) = producer().await;
	let client = FlagsClient::builder()
		.subscription(Subscription::new().flag("maintenance_mode", false))
		.channel_receiver(broadcaster.subscribe())
		.enable_reconciliation(false)
		.build()
		.await
		.unwrap();

	service.create_flag(create("feature_x", true)).await.unwrap();
	wait_for(|| client.get("feature_x") == Some(true)).await;

	service
		.update_flag(
			"feature_x",
			UpdateFlagRequest {
				description: None,
				enabled: Some(false),
			},
		)
		.await
		.unwrap();
	wait_for(|| client.get("feature_x") == Some(false)).await;

	service.delete_flag("feature_x").await.unwrap();
	wait_for(|| client.get("feature_x").is_none()).await;

	let stats = client.stats();
	assert_eq!(stats.consumer.applied, 2);
	assert_eq!(stats.consumer.removed, 1);
	client.close().await;
}

#[tokio::test]
async fn redelivered_event_is_dropped() {
	let (_service, broadcaster) = producer().await;
	let client = FlagsClient::builder()
		.channel_receiver(broadcaster.subscribe())
		.enable_reconciliation(false)
		.build()
		.await
		.unwrap();

	let send = |enabled: bool, id: &str| {
		let payload = format!(
			r#"{{"eventType":"UPDATED","flagName":"feature_x","enabled":{enabled},"version":"1.0","messageId":"{id}"}}"#
		);
		flagcast_server_flags::FlagEventSink::send(
			broadcaster.as_ref(),
			flagcast_server_flags::FLAG_EVENTS_CHANNEL,
			payload,
		)
		.unwrap();
	};

	send(true, "a");
	wait_for(|| client.get("feature_x") == Some(true)).await;

	send(false, "a");
	send(false, "b");
	wait_for(|| client.stats().consumer.received == 3).await;

	assert_eq!(client.get("feature_x"), Some(false));
	assert_eq!(client.stats().consumer.duplicate, 1);
	client.close().await;
}

#[tokio::test]
async fn reconciliation_turns_on_maintenance() {
	let (service, _broadcaster) = producer().await;
	service.create_flag(create("maintenance_mode", true)).await.unwrap();

	let client = FlagsClient::builder()
		.subscription(Subscription::new().flag("maintenance_mode", false))
		.enable_streaming(false)
		.batch_source(Arc::new(ServiceSource(service.clone())))
		.build()
		.await
		.unwrap();

	wait_for(|| client.get("maintenance_mode").is_some()).await;
	assert!(matches!(client.gate().admit(), GateDecision::Reject { .. }));
	client.close().await;
}

#[tokio::test]
async fn reconciliation_overwrites_newer_event_value() {
	let (service, broadcaster) = producer().await;
	service.create_flag(create("feature_x", false)).await.unwrap();

	let client = FlagsClient::builder()
		.subscription(Subscription::new().flag("feature_x", false))
		.channel_receiver(broadcaster.subscribe())
		.batch_source(Arc::new(ServiceSource(service.clone())))
		.build()
		.await
		.unwrap();
	wait_for(|| client.get("feature_x") == Some(false)).await;

	// An event the store never saw, e.g. from a producer whose commit was rolled back.
	client.cache().apply_update("feature_x", true, Some("m1"));
	assert_eq!(client.get("feature_x"), Some(true));

	let outcome = client.reconcile_now().await.unwrap();
	assert_eq!(outcome, ReconcileOutcome::Applied { count: 1 });
	let state = client.cache().get_state("feature_x").unwrap();
	assert!(!state.enabled);
	assert_eq!(state.last_message_id, None);
	client.close().await;
}

#[tokio::test]
async fn reconciliation_never_removes_entries() {
	let (service, broadcaster) = producer().await;
	let client = FlagsClient::builder()
		.subscription(Subscription::new().flag("feature_x", false))
		.channel_receiver(broadcaster.subscribe())
		.batch_source(Arc::new(ServiceSource(service.clone())))
		.build()
		.await
		.unwrap();

	client.cache().apply_update("orphan", true, Some("m1"));
	let outcome = client.reconcile_now().await.unwrap();

	assert_eq!(outcome, ReconcileOutcome::Empty);
	assert_eq!(client.get("orphan"), Some(true));
	client.close().await;
}
