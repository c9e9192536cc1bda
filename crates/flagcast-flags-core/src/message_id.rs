// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Message identifiers for event deduplication.
//!
//! A message id names one logical mutation. Consumers compare ids for
//! equality only; the embedded name and time exist for log readability.

use chrono::Utc;
use uuid::Uuid;

/// Generates a message id of the form `flag-{name}-{epoch_millis}-{8 hex}`.
pub fn generate_message_id(flag_name: &str) -> String {
	let millis = Utc::now().timestamp_millis();
	let random = Uuid::new_v4().simple().to_string();
	format!("flag-{}-{}-{}", flag_name, millis, &random[..8])
}
