// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flag mutations with post-commit event publication.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use flagcast_flags_core::timestamp::now_millis;
use flagcast_flags_core::{validate_description, validate_flag_name, BatchFlagsResponse, FlagInfo};

use crate::error::{FlagsServerError, Result};
use crate::publisher::EventPublisher;
use crate::repository::{FlagRecord, FlagsRepository, NewFlag};

/// Actor recorded for mutations made through the service.
pub const SYSTEM_ACTOR: &str = "system";

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateFlagRequest {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub enabled: Option<bool>,
}

/// Partial update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFlagRequest {
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagListResponse {
	pub flags: Vec<FlagRecord>,
	pub total: u64,
	pub page: i64,
	pub size: i64,
	pub total_pages: u64,
}

#[derive(Clone)]
pub struct FlagService {
	repository: Arc<dyn FlagsRepository>,
	publisher: EventPublisher,
}

impl FlagService {
	pub fn new(repository: Arc<dyn FlagsRepository>, publisher: EventPublisher) -> Self {
		Self {
			repository,
			publisher,
		}
	}

	pub async fn create_flag(&self, request: CreateFlagRequest) -> Result<FlagRecord> {
		let name = request.name.unwrap_or_default();
		validate_flag_name(&name)?;
		validate_description(request.description.as_deref())?;
		let enabled = request
			.enabled
			.ok_or_else(|| FlagsServerError::Validation("enabled is required".to_string()))?;

		if self.repository.exists_by_name(&name).await? {
			return Err(FlagsServerError::AlreadyExists(name));
		}

		let flag = self
			.repository
			.insert(NewFlag {
				name,
				description: request.description,
				enabled,
				actor: SYSTEM_ACTOR.to_string(),
				at: now_millis(),
			})
			.await?;

		info!(flag_name = %flag.name, enabled = flag.enabled, "created flag");
		self.publisher.publish_created(&flag);
		Ok(flag)
	}

	pub async fn update_flag(&self, name: &str, request: UpdateFlagRequest) -> Result<FlagRecord> {
		validate_description(request.description.as_deref())?;

		let mut flag = self
			.repository
			.get_by_name(name)
			.await?
			.ok_or_else(|| FlagsServerError::NotFound(name.to_string()))?;

		if let Some(description) = request.description {
			flag.description = Some(description);
		}
		if let Some(enabled) = request.enabled {
			flag.enabled = enabled;
		}
		flag.updated_at = now_millis();
		flag.updated_by = SYSTEM_ACTOR.to_string();

		if !self.repository.update(&flag).await? {
			return Err(FlagsServerError::NotFound(name.to_string()));
		}

		info!(flag_name = %flag.name, enabled = flag.enabled, "updated flag");
		self.publisher.publish_updated(&flag);
		Ok(flag)
	}

	pub async fn delete_flag(&self, name: &str) -> Result<()> {
		let flag = self
			.repository
			.get_by_name(name)
			.await?
			.ok_or_else(|| FlagsServerError::NotFound(name.to_string()))?;

		if !self.repository.delete_by_id(flag.id).await? {
			return Err(FlagsServerError::NotFound(name.to_string()));
		}

		info!(flag_name = %flag.name, "deleted flag");
		self.publisher
			.publish_deleted(&flag, SYSTEM_ACTOR, now_millis());
		Ok(())
	}

	pub async fn get_flag(&self, name: &str) -> Result<FlagRecord> {
		self
			.repository
			.get_by_name(name)
			.await?
			.ok_or_else(|| FlagsServerError::NotFound(name.to_string()))
	}

	/// Negative pages become 0, sizes outside 1..=100 become 20.
	pub async fn list_flags(&self, page: i64, size: i64) -> Result<FlagListResponse> {
		let (page, size) = normalize_paging(page, size);

		let offset = (page as u64).saturating_mul(size as u64);
		let flags = self.repository.list(offset, size as u64).await?;
		let total = self.repository.count().await?;

		Ok(FlagListResponse {
			flags,
			total,
			page,
			size,
			total_pages: total.div_ceil(size as u64),
		})
	}

	/// Snapshot of the requested flags. Unknown names are absent from the map.
	pub async fn get_flags_batch(&self, names: &[String]) -> Result<BatchFlagsResponse> {
		let mut unique: Vec<String> = names.to_vec();
		unique.sort();
		unique.dedup();

		let records = self.repository.find_by_names(&unique).await?;
		debug!(requested = unique.len(), found = records.len(), "batch flag lookup");

		let flags: HashMap<String, FlagInfo> = records
			.into_iter()
			.map(|flag| {
				(
					flag.name.clone(),
					FlagInfo {
						enabled: Some(flag.enabled),
						timestamp: Some(flag.updated_at),
						name: flag.name,
						description: flag.description,
					},
				)
			})
			.collect();

		Ok(BatchFlagsResponse::new(flags, now_millis()))
	}
}

fn normalize_paging(page: i64, size: i64) -> (i64, i64) {
	let size = if (1..=MAX_PAGE_SIZE).contains(&size) {
		size
	} else {
		DEFAULT_PAGE_SIZE
	};
	(page.max(0), size)
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use crate::broadcast::{ChannelError, FlagEventSink, FlagsBroadcaster};
	use crate::repository::tests::test_repository;
	use flagcast_flags_core::{FlagEvent, FlagEventType, FlagsError};
	use tokio::sync::broadcast::Receiver;

	async fn service() -> (FlagService, Receiver<String>) {
		let broadcaster = Arc::new(FlagsBroadcaster::with_defaults());
		let receiver = broadcaster.subscribe();
		let service = FlagService::new(
			Arc::new(test_repository().await),
			EventPublisher::new(broadcaster),
		);
		(service, receiver)
	}

	fn create(name: &str, enabled: bool) -> CreateFlagRequest {
		CreateFlagRequest {
			name: Some(name.to_string()),
			description: None,
			enabled: Some(enabled),
		}
	}

	fn next_event(receiver: &mut Receiver<String>) -> FlagEvent {
		FlagEvent::from_json(&receiver.try_recv().unwrap()).unwrap()
	}

	#[tokio::test]
	async fn create_publishes_created_event() {
		let (service, mut events) = service().await;
		let flag = service.create_flag(create("feature_x", true)).await.unwrap();
		assert_eq!(flag.created_by, "system");

		let event = next_event(&mut events);
		assert_eq!(event.event_type, FlagEventType::Created);
		assert_eq!(event.flag_name, "feature_x");
		assert_eq!(event.enabled, Some(true));
	}

	#[tokio::test]
	async fn create_rejects_duplicates_without_publishing() {
		let (service, mut events) = service().await;
		service.create_flag(create("feature_x", true)).await.unwrap();
		next_event(&mut events);

		let err = service
			.create_flag(create("feature_x", false))
			.await
			.unwrap_err();
		assert!(matches!(err, FlagsServerError::AlreadyExists(_)));
		assert!(events.try_recv().is_err());
	}

	#[tokio::test]
	async fn create_validates_input() {
		let (service, _events) = service().await;

		let err = service.create_flag(create("bad-name", true)).await.unwrap_err();
		assert!(matches!(
			err,
			FlagsServerError::Core(FlagsError::InvalidFlagName(_))
		));

		let err = service
			.create_flag(CreateFlagRequest {
				name: Some("ok".to_string()),
				description: None,
				enabled: None,
			})
			.await
			.unwrap_err();
		assert!(matches!(err, FlagsServerError::Validation(_)));

		let err = service
			.create_flag(CreateFlagRequest {
				name: Some("ok".to_string()),
				description: Some("d".repeat(501)),
				enabled: Some(true),
			})
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			FlagsServerError::Core(FlagsError::InvalidDescription(_))
		));
	}

	#[tokio::test]
	async fn update_is_partial_and_published() {
		let (service, mut events) = service().await;
		service
			.create_flag(CreateFlagRequest {
				name: Some("feature_x".to_string()),
				description: Some("keep me".to_string()),
				enabled: Some(true),
			})
			.await
			.unwrap();
		next_event(&mut events);

		let flag = service
			.update_flag(
				"feature_x",
				UpdateFlagRequest {
					description: None,
					enabled: Some(false),
				},
			)
			.await
			.unwrap();
		assert!(!flag.enabled);
		assert_eq!(flag.description.as_deref(), Some("keep me"));

		let event = next_event(&mut events);
		assert_eq!(event.event_type, FlagEventType::Updated);
		assert_eq!(event.enabled, Some(false));
		assert_eq!(event.description.as_deref(), Some("keep me"));
	}

	#[tokio::test]
	async fn unknown_flags_are_not_found() {
		let (service, mut events) = service().await;
		assert!(matches!(
			service.update_flag("missing", UpdateFlagRequest::default()).await,
			Err(FlagsServerError::NotFound(_))
		));
		assert!(matches!(
			service.delete_flag("missing").await,
			Err(FlagsServerError::NotFound(_))
		));
		assert!(matches!(
			service.get_flag("missing").await,
			Err(FlagsServerError::NotFound(_))
		));
		assert!(events.try_recv().is_err());
	}

	#[tokio::test]
	async fn delete_publishes_deleted_event() {
		let (service, mut events) = service().await;
		service.create_flag(create("feature_x", true)).await.unwrap();
		next_event(&mut events);

		service.delete_flag("feature_x").await.unwrap();
		let event = next_event(&mut events);
		assert_eq!(event.event_type, FlagEventType::Deleted);
		assert!(service.get_flag("feature_x").await.is_err());
	}

	#[tokio::test]
	async fn mutation_succeeds_when_broadcast_fails() {
		struct DownSink;
		impl FlagEventSink for DownSink {
			fn send(&self, _: &str, _: String) -> std::result::Result<usize, ChannelError> {
				Err(ChannelError::Transport("broker unreachable".to_string()))
			}
		}

		let service = FlagService::new(
			Arc::new(test_repository().await),
			EventPublisher::new(Arc::new(DownSink)),
		);

		service.create_flag(create("feature_x", true)).await.unwrap();
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
		assert!(!service.get_flag("feature_x").await.unwrap().enabled);
		service.delete_flag("feature_x").await.unwrap();
	}

	#[tokio::test]
	async fn list_clamps_paging() {
		let (service, _events) = service().await;
		for i in 0..25 {
			service
				.create_flag(create(&format!("flag_{i:02}"), i % 2 == 0))
				.await
				.unwrap();
		}

		let page = service.list_flags(-3, 0).await.unwrap();
		assert_eq!(page.page, 0);
		assert_eq!(page.size, 20);
		assert_eq!(page.flags.len(), 20);
		assert_eq!(page.total, 25);
		assert_eq!(page.total_pages, 2);

		let page = service.list_flags(1, 20).await.unwrap();
		assert_eq!(page.flags.len(), 5);

		let page = service.list_flags(0, 500).await.unwrap();
		assert_eq!(page.size, 20);
	}

	#[tokio::test]
	async fn batch_returns_known_flags_only() {
		let (service, _events) = service().await;
		service
			.create_flag(create("maintenance_mode", true))
			.await
			.unwrap();

		let response = service
			.get_flags_batch(&[
				"maintenance_mode".to_string(),
				"maintenance_mode".to_string(),
				"unknown".to_string(),
			])
			.await
			.unwrap();

		assert_eq!(response.flags.len(), 1);
		let info = &response.flags["maintenance_mode"];
		assert_eq!(info.enabled, Some(true));
		assert_eq!(info.name, "maintenance_mode");
		assert!(info.timestamp.is_some());
		assert!(response.response_timestamp.is_some());

		let empty = service.get_flags_batch(&[]).await.unwrap();
		assert!(empty.flags.is_empty());
	}

	proptest! {
		#[test]
		fn paging_is_always_in_range(page in any::<i64>(), size in any::<i64>()) {
			let (page, normalized) = normalize_paging(page, size);
			prop_assert!(page >= 0);
			prop_assert!((1..=MAX_PAGE_SIZE).contains(&normalized));
			if (1..=MAX_PAGE_SIZE).contains(&size) {
				prop_assert_eq!(normalized, size);
			} else {
				prop_assert_eq!(normalized, DEFAULT_PAGE_SIZE);
			}
		}

		#[test]
		fn pages_cover_every_flag(total in 0u64..10_000, size in 1i64..=MAX_PAGE_SIZE) {
			let pages = total.div_ceil(size as u64);
			prop_assert!(pages * size as u64 >= total);
			if pages > 0 {
				prop_assert!((pages - 1) * (size as u64) < total);
			}
		}
	}
}
