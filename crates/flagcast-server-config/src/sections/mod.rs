// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod database;
mod http;
mod logging;
mod stream;
mod subscription;

pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use http::{HttpConfig, HttpConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use stream::{StreamConfig, StreamConfigLayer};
pub use subscription::{
	parse_subscribed_flags, SubscriptionConfig, SubscriptionConfigLayer, DEFAULT_MAINTENANCE_FLAG,
};
