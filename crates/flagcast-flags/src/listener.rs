// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Message loops that feed channel payloads into an [`EventConsumer`].

use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use crate::consumer::EventConsumer;

/// Why a message loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
	Shutdown,
	StreamEnded,
}

/// Drains `messages` into `consumer` until the stream ends or shutdown fires.
///
/// Returns the number of messages handled.
pub async fn run_message_loop<S>(
	messages: S,
	consumer: &EventConsumer,
	mut shutdown_rx: broadcast::Receiver<()>,
) -> (LoopExit, u64)
where
	S: Stream<Item = String>,
{
	let mut messages = std::pin::pin!(messages);
	let mut handled = 0u64;

	loop {
		tokio::select! {
			_ = shutdown_rx.recv() => {
				debug!(handled, "Message loop received shutdown signal");
				return (LoopExit::Shutdown, handled);
			}
			next = messages.next() => match next {
				Some(payload) => {
					consumer.handle_message(&payload);
					handled += 1;
				}
				None => return (LoopExit::StreamEnded, handled),
			}
		}
	}
}

/// Spawns a listener on an in-process broadcast receiver.
///
/// Lagged receivers skip the lost messages and keep going; reconciliation
/// repairs whatever was missed.
pub fn spawn_channel_listener(
	receiver: broadcast::Receiver<String>,
	consumer: EventConsumer,
	shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
	tokio::spawn(async move {
		info!("In-process flag event listener started");
		let messages = BroadcastStream::new(receiver).filter_map(|item| async move {
			match item {
				Ok(payload) => Some(payload),
				Err(BroadcastStreamRecvError::Lagged(skipped)) => {
					warn!(skipped, "Flag event listener lagged, messages lost");
					None
				}
			}
		});

		let (exit, handled) = run_message_loop(messages, &consumer, shutdown_rx).await;
		info!(?exit, handled, "In-process flag event listener stopped");
	})
}
