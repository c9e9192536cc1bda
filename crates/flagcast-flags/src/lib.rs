// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Consumer SDK for flagcast.
//!
//! Keeps a local, eventually consistent copy of the flags a service cares
//! about and answers flag reads from memory.
//!
//! # Features
//!
//! - **Event-driven updates**: flag events from the producer's SSE stream (or
//!   an in-process channel) are applied as they arrive
//! - **Deduplication**: a redelivered event with the same message id is dropped
//! - **Reconciliation**: subscribed flags are re-fetched in one batch on start
//!   and then periodically, repairing anything the event channel lost
//! - **Maintenance gate**: synchronous request admission driven by a cached flag
//!
//! # Example
//!
//! ```ignore
//! use flagcast_flags::{FlagsClient, Subscription};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = FlagsClient::builder()
//!         .service_url("http://flags.internal:8080")
//!         .subscription(
//!             Subscription::new()
//!                 .flag("maintenance_mode", false)
//!                 .flag("dark_mode", false),
//!         )
//!         .build()
//!         .await?;
//!
//!     if !client.gate().admit().is_allowed() {
//!         // reject the request
//!     }
//!     let dark = client.is_enabled("dark_mode");
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

mod cache;
mod client;
mod config;
mod consumer;
mod error;
mod gate;
mod listener;
mod reconcile;
mod source;
mod sse;

pub use cache::{ApplyOutcome, FlagCache, FlagState};
pub use client::{ClientStats, FlagsClient, FlagsClientBuilder};
pub use config::{Subscription, DEFAULT_MAINTENANCE_FLAG};
pub use consumer::{ConsumerStats, ConsumerStatsSnapshot, EventConsumer, HandleOutcome};
pub use error::{FlagsClientError, Result};
pub use gate::{GateDecision, MaintenanceGate, MAINTENANCE_REASON};
pub use listener::{run_message_loop, spawn_channel_listener, LoopExit};
pub use reconcile::{ReconcileOutcome, ReconcileStats, ReconciliationScheduler};
pub use source::{BatchFlagSource, HttpBatchFlagSource, BATCH_PATH};
pub use sse::{SseConfig, SseListener, STREAM_PATH};

// Re-export core types for convenience
pub use flagcast_flags_core::{BatchFlagsResponse, FlagEvent, FlagEventType, FlagInfo};
