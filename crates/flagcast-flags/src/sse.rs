// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SSE subscription to the producer's flag event stream.
//!
//! Each SSE event on the stream carries one channel message: the event name is
//! the channel and the data is the serialized flag event. The listener
//! reconnects with exponential backoff for as long as it runs. Messages sent
//! while it is disconnected are lost; reconciliation repairs the cache.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use eventsource_stream::{Event, Eventsource};
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use flagcast_common_http::Backoff;
use flagcast_flags_core::FLAG_EVENTS_CHANNEL;

use crate::consumer::EventConsumer;
use crate::error::{FlagsClientError, Result};

/// Path of the event stream relative to the flag service URL.
pub const STREAM_PATH: &str = "/api/flags/stream";

/// Configuration for SSE connection behavior.
#[derive(Debug, Clone)]
pub struct SseConfig {
	pub reconnect_base_delay: Duration,
	pub reconnect_max_delay: Duration,
	/// Consecutive failures before giving up (0 = unlimited).
	pub max_reconnect_attempts: u32,
	/// Channel whose events are applied. Other event names are skipped.
	pub channel: String,
}

impl Default for SseConfig {
	fn default() -> Self {
		Self {
			reconnect_base_delay: Duration::from_secs(1),
			reconnect_max_delay: Duration::from_secs(30),
			max_reconnect_attempts: 0,
			channel: FLAG_EVENTS_CHANNEL.to_string(),
		}
	}
}

/// Background SSE connection feeding an [`EventConsumer`].
#[derive(Debug)]
pub struct SseListener {
	connected: Arc<AtomicBool>,
	reconnect_attempts: Arc<AtomicU64>,
	events_received: Arc<AtomicU64>,
	task_handle: Option<JoinHandle<()>>,
	shutdown_tx: Option<broadcast::Sender<()>>,
}

impl SseListener {
	pub fn new() -> Self {
		Self {
			connected: Arc::new(AtomicBool::new(false)),
			reconnect_attempts: Arc::new(AtomicU64::new(0)),
			events_received: Arc::new(AtomicU64::new(0)),
			task_handle: None,
			shutdown_tx: None,
		}
	}

	/// Starts the connection loop in a background task, replacing any running one.
	pub async fn start(
		&mut self,
		stream_url: String,
		consumer: EventConsumer,
		config: SseConfig,
	) -> Result<()> {
		self.stop().await;

		let client = flagcast_common_http::builder()
			.build()
			.map_err(FlagsClientError::ConnectionFailed)?;

		let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
		self.shutdown_tx = Some(shutdown_tx);

		let state = LoopState {
			client,
			stream_url,
			consumer,
			config,
			connected: Arc::clone(&self.connected),
			reconnect_attempts: Arc::clone(&self.reconnect_attempts),
			events_received: Arc::clone(&self.events_received),
		};

		self.task_handle = Some(tokio::spawn(run_sse_loop(state, shutdown_rx)));
		Ok(())
	}

	pub async fn stop(&mut self) {
		if let Some(tx) = self.shutdown_tx.take() {
			let _ = tx.send(());
		}
		if let Some(handle) = self.task_handle.take() {
			handle.abort();
			let _ = handle.await;
		}
		self.connected.store(false, Ordering::SeqCst);
	}

	pub fn is_connected(&self) -> bool {
		self.connected.load(Ordering::SeqCst)
	}

	pub fn reconnect_attempts(&self) -> u64 {
		self.reconnect_attempts.load(Ordering::SeqCst)
	}

	pub fn events_received(&self) -> u64 {
		self.events_received.load(Ordering::SeqCst)
	}
}

impl Default for SseListener {
	fn default() -> Self {
		Self::new()
	}
}

impl Drop for SseListener {
	fn drop(&mut self) {
		if let Some(handle) = self.task_handle.take() {
			handle.abort();
		}
	}
}

struct LoopState {
	client: reqwest::Client,
	stream_url: String,
	consumer: EventConsumer,
	config: SseConfig,
	connected: Arc<AtomicBool>,
	reconnect_attempts: Arc<AtomicU64>,
	events_received: Arc<AtomicU64>,
}

async fn run_sse_loop(state: LoopState, mut shutdown_rx: broadcast::Receiver<()>) {
	let mut backoff = Backoff::new(
		state.config.reconnect_base_delay,
		state.config.reconnect_max_delay,
	);
	let mut consecutive_failures: u32 = 0;

	loop {
		info!(url = %state.stream_url, "Connecting to flag event stream");

		let result = tokio::select! {
			result = connect_and_process(&state) => result,
			_ = shutdown_rx.recv() => {
				info!("Flag event stream received shutdown signal");
				break;
			}
		};

		// A stream that got past the handshake starts a fresh failure budget.
		let was_connected = state.connected.swap(false, Ordering::SeqCst);
		if was_connected {
			consecutive_failures = 0;
			backoff.reset();
		}

		match result {
			Ok(()) => debug!("Flag event stream ended"),
			Err(e) if was_connected => {
				warn!(error = %e, "Flag event stream dropped after connecting");
			}
			Err(e) => {
				error!(error = %e, "Flag event stream connection error");
				consecutive_failures += 1;
			}
		}

		if state.config.max_reconnect_attempts > 0
			&& consecutive_failures >= state.config.max_reconnect_attempts
		{
			error!(
				attempts = consecutive_failures,
				"Max reconnection attempts reached, stopping flag event stream"
			);
			break;
		}

		let delay = backoff.next_delay();
		state.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
		warn!(
			delay_ms = delay.as_millis() as u64,
			attempts = consecutive_failures,
			"Reconnecting to flag event stream"
		);

		tokio::select! {
			_ = tokio::time::sleep(delay) => {}
			_ = shutdown_rx.recv() => {
				info!("Flag event stream received shutdown signal during reconnect wait");
				break;
			}
		}
	}
}

async fn connect_and_process(state: &LoopState) -> Result<()> {
	let response = state
		.client
		.get(&state.stream_url)
		.header("Accept", "text/event-stream")
		.header("Cache-Control", "no-cache")
		.send()
		.await
		.map_err(FlagsClientError::ConnectionFailed)?;

	if !response.status().is_success() {
		return Err(FlagsClientError::ServerError {
			status: response.status().as_u16(),
			message: response.text().await.unwrap_or_default(),
		});
	}

	state.connected.store(true, Ordering::SeqCst);
	info!(url = %state.stream_url, "Flag event stream connected");

	let mut events = response.bytes_stream().eventsource();
	while let Some(event) = events.next().await {
		let event = event.map_err(|e| FlagsClientError::SseStreamError(e.to_string()))?;
		if let Some(payload) = channel_payload(&event, &state.config.channel) {
			state.events_received.fetch_add(1, Ordering::SeqCst);
			state.consumer.handle_message(payload);
		}
	}

	Ok(())
}

/// Returns the data of events on `channel`. Unnamed events are treated as
/// belonging to the channel; empty data is skipped.
fn channel_payload<'a>(event: &'a Event, channel: &str) -> Option<&'a str> {
	if event.data.is_empty() {
		return None;
	}
	let on_channel = event.event.is_empty() || event.event == "message" || event.event == channel;
	if !on_channel {
		debug!(event = %event.event, "Skipping event from another channel");
		return None;
	}
	Some(event.data.as_str())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cache::FlagCache;
	use wiremock::matchers::{header, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn sse_event(name: &str, data: &str) -> Event {
		Event {
			event: name.to_string(),
			data: data.to_string(),
			id: String::new(),
			retry: None,
		}
	}

	#[test]
	fn channel_payload_filters_by_event_name() {
		let channel = FLAG_EVENTS_CHANNEL;
		assert_eq!(
			channel_payload(&sse_event(channel, "{}"), channel),
			Some("{}")
		);
		assert_eq!(channel_payload(&sse_event("", "{}"), channel), Some("{}"));
		assert_eq!(channel_payload(&sse_event("message", "{}"), channel), Some("{}"));
		assert_eq!(channel_payload(&sse_event("other", "{}"), channel), None);
		assert_eq!(channel_payload(&sse_event(channel, ""), channel), None);
	}

	#[tokio::test]
	async fn applies_events_from_stream() {
		let server = MockServer::start().await;
		let body = format!(
			"event: {FLAG_EVENTS_CHANNEL}\ndata: {}\n\n: keep-alive\n\nevent: other\ndata: {}\n\n",
			r#"{"eventType":"CREATED","flagName":"feature_x","enabled":true,"messageId":"a"}"#,
			r#"{"eventType":"CREATED","flagName":"ignored","enabled":true,"messageId":"b"}"#,
		);
		Mock::given(method("GET"))
			.and(path(STREAM_PATH))
			.and(header("Accept", "text/event-stream"))
			.respond_with(
				ResponseTemplate::new(200)
					.insert_header("Content-Type", "text/event-stream")
					.set_body_string(body),
			)
			.mount(&server)
			.await;

		let consumer = EventConsumer::new(FlagCache::new());
		let config = SseConfig {
			reconnect_base_delay: Duration::from_millis(20),
			reconnect_max_delay: Duration::from_millis(50),
			..SseConfig::default()
		};
		let mut listener = SseListener::new();
		listener
			.start(format!("{}{STREAM_PATH}", server.uri()), consumer.clone(), config)
			.await
			.unwrap();

		tokio::time::timeout(Duration::from_secs(5), async {
			while consumer.cache().get("feature_x").is_none() {
				tokio::time::sleep(Duration::from_millis(10)).await;
			}
		})
		.await
		.unwrap();

		assert_eq!(consumer.cache().get("feature_x"), Some(true));
		assert_eq!(consumer.cache().get("ignored"), None);
		assert!(listener.events_received() >= 1);

		listener.stop().await;
		assert!(!listener.is_connected());
	}

	#[tokio::test]
	async fn gives_up_after_max_attempts() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path(STREAM_PATH))
			.respond_with(ResponseTemplate::new(500))
			.mount(&server)
			.await;

		let config = SseConfig {
			reconnect_base_delay: Duration::from_millis(5),
			reconnect_max_delay: Duration::from_millis(10),
			max_reconnect_attempts: 2,
			..SseConfig::default()
		};
		let mut listener = SseListener::new();
		listener
			.start(
				format!("{}{STREAM_PATH}", server.uri()),
				EventConsumer::new(FlagCache::new()),
				config,
			)
			.await
			.unwrap();

		let handle = listener.task_handle.take().unwrap();
		tokio::time::timeout(Duration::from_secs(5), handle)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(listener.reconnect_attempts(), 1);
		assert!(!listener.is_connected());
	}

	/// Serves one event per connection, then cuts the body short.
	async fn spawn_truncating_server(connections: Arc<AtomicU64>) -> String {
		use tokio::io::{AsyncReadExt, AsyncWriteExt};

		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			loop {
				let (mut socket, _) = listener.accept().await.unwrap();
				connections.fetch_add(1, Ordering::SeqCst);
				let mut request = [0u8; 2048];
				let _ = socket.read(&mut request).await;
				let event = format!(
					"event: {FLAG_EVENTS_CHANNEL}\ndata: {}\n\n",
					r#"{"eventType":"UPDATED","flagName":"feature_x","enabled":true}"#
				);
				let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nContent-Length: 4096\r\n\r\n";
				let _ = socket.write_all(head.as_bytes()).await;
				let _ = socket.write_all(event.as_bytes()).await;
				let _ = socket.shutdown().await;
			}
		});
		format!("http://{addr}{STREAM_PATH}")
	}

	#[tokio::test]
	async fn drops_after_connecting_do_not_exhaust_attempts() {
		let connections = Arc::new(AtomicU64::new(0));
		let url = spawn_truncating_server(Arc::clone(&connections)).await;

		let consumer = EventConsumer::new(FlagCache::new());
		let config = SseConfig {
			reconnect_base_delay: Duration::from_millis(5),
			reconnect_max_delay: Duration::from_millis(10),
			max_reconnect_attempts: 1,
			..SseConfig::default()
		};
		let mut listener = SseListener::new();
		listener.start(url, consumer.clone(), config).await.unwrap();

		tokio::time::timeout(Duration::from_secs(5), async {
			while connections.load(Ordering::SeqCst) < 3 {
				tokio::time::sleep(Duration::from_millis(10)).await;
			}
		})
		.await
		.unwrap();

		assert_eq!(consumer.cache().get("feature_x"), Some(true));
		assert!(listener.reconnect_attempts() >= 2);
		listener.stop().await;
	}
}
