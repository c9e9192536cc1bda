// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for flagcast.
//!
//! This crate provides:
//! - A pre-configured HTTP client builder with a consistent User-Agent header
//! - Retry logic with exponential backoff for transient request failures
//! - A reconnect backoff schedule for long-lived streaming connections

mod backoff;
mod client;
mod retry;

pub use backoff::Backoff;
pub use client::{builder, new_client_with_timeout, user_agent};
pub use retry::{is_retryable_status, retry, RetryConfig, RetryableError};
