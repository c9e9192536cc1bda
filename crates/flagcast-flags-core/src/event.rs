// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flag mutation events carried on the broadcast channel.
//!
//! # Wire format
//!
//! Events are UTF-8 JSON objects with camelCase field names:
//!
//! ```json
//! {
//!   "eventType": "UPDATED",
//!   "flagName": "maintenance_mode",
//!   "description": "Blocks inbound traffic",
//!   "enabled": true,
//!   "triggeredBy": "system",
//!   "timestamp": "2025-03-14T09:26:53.589",
//!   "version": "1.0",
//!   "metadata": null,
//!   "messageId": "flag-maintenance_mode-1741944413589-1a2b3c4d"
//! }
//! ```
//!
//! # Example
//!
//! ```
//! use flagcast_flags_core::{FlagEvent, FlagEventType};
//! use flagcast_flags_core::timestamp::now_millis;
//!
//! let event = FlagEvent::updated("dark_mode", None, true, "system", now_millis(), "m-1");
//! let json = event.to_json().unwrap();
//! let decoded = FlagEvent::from_json(&json).unwrap();
//! assert_eq!(decoded.event_type, FlagEventType::Updated);
//! ```

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Schema version written by this crate.
pub const EVENT_VERSION: &str = "1.0";

/// Highest major schema version a consumer understands.
pub const SUPPORTED_MAJOR_VERSION: u32 = 1;

/// The single channel all flag events are published on.
pub const FLAG_EVENTS_CHANNEL: &str = "feature-flag-events";

/// Kind of mutation an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagEventType {
	Created,
	Updated,
	Deleted,
	/// Any type this build does not know about.
	#[serde(other)]
	Unknown,
}

impl FlagEventType {
	pub fn as_str(&self) -> &'static str {
		match self {
			FlagEventType::Created => "CREATED",
			FlagEventType::Updated => "UPDATED",
			FlagEventType::Deleted => "DELETED",
			FlagEventType::Unknown => "UNKNOWN",
		}
	}
}

impl std::fmt::Display for FlagEventType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A structured notification of one flag mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagEvent {
	pub event_type: FlagEventType,
	pub flag_name: String,
	#[serde(default)]
	pub description: Option<String>,
	/// Present for created and updated events.
	#[serde(default)]
	pub enabled: Option<bool>,
	#[serde(default)]
	pub triggered_by: Option<String>,
	/// Mutation time at the producer. Informational only.
	#[serde(default, with = "crate::timestamp::option_millis")]
	pub timestamp: Option<NaiveDateTime>,
	#[serde(default)]
	pub version: Option<String>,
	#[serde(default)]
	pub metadata: Option<String>,
	/// Deduplication token for this logical mutation.
	#[serde(default)]
	pub message_id: Option<String>,
}

impl FlagEvent {
	/// Creates an event for a newly created flag.
	pub fn created(
		flag_name: impl Into<String>,
		description: Option<String>,
		enabled: bool,
		triggered_by: impl Into<String>,
		timestamp: NaiveDateTime,
		message_id: impl Into<String>,
	) -> Self {
		Self::mutation(
			FlagEventType::Created,
			flag_name.into(),
			description,
			Some(enabled),
			triggered_by.into(),
			timestamp,
			message_id.into(),
		)
	}

	/// Creates an event for an updated flag.
	pub fn updated(
		flag_name: impl Into<String>,
		description: Option<String>,
		enabled: bool,
		triggered_by: impl Into<String>,
		timestamp: NaiveDateTime,
		message_id: impl Into<String>,
	) -> Self {
		Self::mutation(
			FlagEventType::Updated,
			flag_name.into(),
			description,
			Some(enabled),
			triggered_by.into(),
			timestamp,
			message_id.into(),
		)
	}

	/// Creates an event for a deleted flag. Deleted events carry no state.
	pub fn deleted(
		flag_name: impl Into<String>,
		triggered_by: impl Into<String>,
		timestamp: NaiveDateTime,
		message_id: impl Into<String>,
	) -> Self {
		Self::mutation(
			FlagEventType::Deleted,
			flag_name.into(),
			None,
			None,
			triggered_by.into(),
			timestamp,
			message_id.into(),
		)
	}

	fn mutation(
		event_type: FlagEventType,
		flag_name: String,
		description: Option<String>,
		enabled: Option<bool>,
		triggered_by: String,
		timestamp: NaiveDateTime,
		message_id: String,
	) -> Self {
		Self {
			event_type,
			flag_name,
			description,
			enabled,
			triggered_by: Some(triggered_by),
			timestamp: Some(timestamp),
			version: Some(EVENT_VERSION.to_string()),
			metadata: None,
			message_id: Some(message_id),
		}
	}

	/// Attaches free-form metadata.
	pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
		self.metadata = Some(metadata.into());
		self
	}

	/// Serializes the event to its wire representation.
	pub fn to_json(&self) -> Result<String> {
		Ok(serde_json::to_string(self)?)
	}

	/// Decodes an event from its wire representation.
	pub fn from_json(payload: &str) -> Result<Self> {
		Ok(serde_json::from_str(payload)?)
	}

	/// Returns the schema version, treating a missing version as the current one.
	pub fn version(&self) -> &str {
		self.version.as_deref().unwrap_or(EVENT_VERSION)
	}

	/// Parses the major component of the schema version.
	pub fn major_version(&self) -> Option<u32> {
		self.version().split('.').next()?.trim().parse().ok()
	}

	/// Returns true if a consumer built against this crate can apply the event.
	pub fn is_supported_version(&self) -> bool {
		matches!(self.major_version(), Some(major) if major <= SUPPORTED_MAJOR_VERSION)
	}
}
