// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Best-effort publication of flag mutation events.
//!
//! Publishing runs after the mutation has been committed. It makes exactly one
//! send attempt and reports the result as a [`PublishOutcome`]; it never
//! returns an error to the caller.

use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{error, info, warn};

use flagcast_flags_core::{generate_message_id, FlagEvent, FlagEventType, FLAG_EVENTS_CHANNEL};

use crate::broadcast::FlagEventSink;
use crate::repository::FlagRecord;

/// Result of one publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
	Sent { message_id: String, receivers: usize },
	Failed { message_id: String, error: String },
}

impl PublishOutcome {
	pub fn is_sent(&self) -> bool {
		matches!(self, PublishOutcome::Sent { .. })
	}

	pub fn message_id(&self) -> &str {
		match self {
			PublishOutcome::Sent { message_id, .. } | PublishOutcome::Failed { message_id, .. } => {
				message_id
			}
		}
	}
}

#[derive(Clone)]
pub struct EventPublisher {
	sink: Arc<dyn FlagEventSink>,
	channel: String,
}

impl EventPublisher {
	pub fn new(sink: Arc<dyn FlagEventSink>) -> Self {
		Self::with_channel(sink, FLAG_EVENTS_CHANNEL)
	}

	pub fn with_channel(sink: Arc<dyn FlagEventSink>, channel: impl Into<String>) -> Self {
		Self {
			sink,
			channel: channel.into(),
		}
	}

	/// Builds an event with a fresh message id and sends it once.
	///
	/// `enabled` is required for created and updated events; if it is missing
	/// the publish fails without sending.
	pub fn publish(
		&self,
		kind: FlagEventType,
		flag_name: &str,
		description: Option<&str>,
		enabled: Option<bool>,
		actor: &str,
		timestamp: NaiveDateTime,
	) -> PublishOutcome {
		let message_id = generate_message_id(flag_name);
		let description = description.map(str::to_string);

		let event = match (kind, enabled) {
			(FlagEventType::Created, Some(enabled)) => {
				FlagEvent::created(flag_name, description, enabled, actor, timestamp, &message_id)
			}
			(FlagEventType::Updated, Some(enabled)) => {
				FlagEvent::updated(flag_name, description, enabled, actor, timestamp, &message_id)
			}
			(FlagEventType::Deleted, _) => FlagEvent::deleted(flag_name, actor, timestamp, &message_id),
			(FlagEventType::Created | FlagEventType::Updated, None) => {
				return self.failed(kind, flag_name, message_id, "enabled is required".to_string());
			}
			(FlagEventType::Unknown, _) => {
				return self.failed(
					kind,
					flag_name,
					message_id,
					"cannot publish unknown event type".to_string(),
				);
			}
		};

		let payload = match event.to_json() {
			Ok(payload) => payload,
			Err(e) => return self.failed(kind, flag_name, message_id, e.to_string()),
		};

		match self.sink.send(&self.channel, payload) {
			Ok(receivers) => {
				info!(
					event_type = %kind,
					flag_name,
					message_id = %message_id,
					receivers,
					"published flag event"
				);
				PublishOutcome::Sent {
					message_id,
					receivers,
				}
			}
			Err(e) => self.failed(kind, flag_name, message_id, e.to_string()),
		}
	}

	pub fn publish_created(&self, flag: &FlagRecord) -> PublishOutcome {
		self.publish(
			FlagEventType::Created,
			&flag.name,
			flag.description.as_deref(),
			Some(flag.enabled),
			&flag.created_by,
			flag.created_at,
		)
	}

	pub fn publish_updated(&self, flag: &FlagRecord) -> PublishOutcome {
		self.publish(
			FlagEventType::Updated,
			&flag.name,
			flag.description.as_deref(),
			Some(flag.enabled),
			&flag.updated_by,
			flag.updated_at,
		)
	}

	pub fn publish_deleted(&self, flag: &FlagRecord, actor: &str, at: NaiveDateTime) -> PublishOutcome {
		self.publish(FlagEventType::Deleted, &flag.name, None, None, actor, at)
	}

	fn failed(
		&self,
		kind: FlagEventType,
		flag_name: &str,
		message_id: String,
		error: String,
	) -> PublishOutcome {
		if kind == FlagEventType::Unknown {
			warn!(flag_name, error = %error, "refusing to publish flag event");
		} else {
			error!(
				event_type = %kind,
				flag_name,
				message_id = %message_id,
				error = %error,
				"failed to publish flag event"
			);
		}
		PublishOutcome::Failed { message_id, error }
	}
}
