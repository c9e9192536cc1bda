// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! flagcast gateway binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use flagcast_flags::FlagsClient;
use flagcast_gateway::{create_router, subscription_from_config, GatewayState};
use tower_http::{
	cors::{Any, CorsLayer},
	trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// flagcast gateway - serves traffic behind the maintenance gate.
#[derive(Parser, Debug)]
#[command(name = "flagcast-gateway", about = "Consumer service gated on cached feature flags", version)]
struct Args {
	/// Path to a TOML config file (defaults to /etc/flagcast/flagcast.toml)
	#[arg(short, long, env = "FLAGCAST_CONFIG")]
	config: Option<PathBuf>,

	/// Seed the cache with subscribed defaults before the first event arrives
	#[arg(long, env = "FLAGCAST_SEED_DEFAULTS")]
	seed_defaults: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	let config = match args.config {
		Some(path) => flagcast_server_config::load_config_with_file(path)?,
		None => flagcast_server_config::load_config()?,
	};

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		service_url = %config.subscription.service_url,
		maintenance_flag = %config.subscription.maintenance_flag,
		"starting flagcast-gateway"
	);

	let client = FlagsClient::builder()
		.service_url(config.subscription.service_url.clone())
		.subscription(subscription_from_config(&config.subscription))
		.seed_defaults(args.seed_defaults)
		.build()
		.await
		.context("failed to start flags client")?;
	let client = Arc::new(client);

	let app = create_router(GatewayState::new(Arc::clone(&client)))
		.layer(TraceLayer::new_for_http())
		.layer(
			CorsLayer::new()
				.allow_origin(Any)
				.allow_methods(Any)
				.allow_headers(Any),
		);

	let addr = config.socket_addr();
	let listener = tokio::net::TcpListener::bind(&addr)
		.await
		.with_context(|| format!("failed to bind {addr}"))?;
	tracing::info!("listening on {}", addr);

	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "Server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Received shutdown signal");
		}
	}

	client.close().await;
	tracing::info!("Gateway shutdown complete");
	Ok(())
}
