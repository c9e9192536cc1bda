// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Producer side of flagcast.
//!
//! # Architecture
//!
//! - `repository` - authoritative flag records in SQLite
//! - `service` - create/update/delete with validation, then one best-effort publish
//! - `publisher` - turns a committed mutation into a [`FlagEvent`] and sends it
//! - `broadcast` - the single-topic channel subscribers attach to
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use flagcast_server_flags::{
//!     connect, EventPublisher, FlagService, FlagsBroadcaster, SqliteFlagsRepository,
//! };
//!
//! let repo = SqliteFlagsRepository::new(connect("sqlite::memory:").await?);
//! repo.migrate().await?;
//! let broadcaster = Arc::new(FlagsBroadcaster::with_defaults());
//! let service = FlagService::new(Arc::new(repo), EventPublisher::new(broadcaster.clone()));
//! ```

pub mod broadcast;
pub mod error;
pub mod publisher;
pub mod repository;
pub mod service;

pub use broadcast::{BroadcasterConfig, BroadcasterStats, ChannelError, FlagEventSink, FlagsBroadcaster};
pub use error::{FlagsServerError, Result};
pub use publisher::{EventPublisher, PublishOutcome};
pub use repository::{connect, FlagRecord, FlagsRepository, NewFlag, SqliteFlagsRepository};
pub use service::{
	CreateFlagRequest, FlagListResponse, FlagService, UpdateFlagRequest, DEFAULT_PAGE_SIZE,
	MAX_PAGE_SIZE, SYSTEM_ACTOR,
};

pub use flagcast_flags_core::*;
