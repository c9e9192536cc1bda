// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Batch read API types.
//!
//! The request body is a JSON array of flag names. Names the producer does not
//! know are simply absent from `flags`; absence is not an error.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Snapshot of a single flag in a batch response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagInfo {
	#[serde(default)]
	pub enabled: Option<bool>,
	/// Last update time recorded by the flag store.
	#[serde(default, with = "crate::timestamp::option_millis")]
	pub timestamp: Option<NaiveDateTime>,
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub description: Option<String>,
}

/// Response of the batch read API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFlagsResponse {
	#[serde(default)]
	pub flags: HashMap<String, FlagInfo>,
	#[serde(default, with = "crate::timestamp::option_millis")]
	pub response_timestamp: Option<NaiveDateTime>,
}

impl BatchFlagsResponse {
	pub fn new(flags: HashMap<String, FlagInfo>, response_timestamp: NaiveDateTime) -> Self {
		Self {
			flags,
			response_timestamp: Some(response_timestamp),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.flags.is_empty()
	}
}
