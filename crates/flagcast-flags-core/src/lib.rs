// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the flagcast feature flag distribution system.
//!
//! This crate provides the types shared between the producer
//! (`flagcast-server-flags`) and the consumer SDK (`flagcast-flags`):
//!
//! - [`FlagEvent`]: the mutation event broadcast on [`FLAG_EVENTS_CHANNEL`]
//! - [`BatchFlagsResponse`]: the snapshot returned by the batch read API
//! - message id generation for consumer-side deduplication
//! - flag name and description validation
//! - the zone-less millisecond timestamp format used on the wire

pub mod batch;
pub mod error;
pub mod event;
pub mod flag;
pub mod message_id;
pub mod timestamp;

pub use batch::{BatchFlagsResponse, FlagInfo};
pub use error::{FlagsError, Result};
pub use event::{
	FlagEvent, FlagEventType, EVENT_VERSION, FLAG_EVENTS_CHANNEL, SUPPORTED_MAJOR_VERSION,
};
pub use flag::{
	is_valid_flag_name, validate_description, validate_flag_name, MAX_DESCRIPTION_LEN,
	MAX_FLAG_NAME_LEN,
};
pub use message_id::generate_message_id;
