#![feature(error_generic_member_access)]

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::isochrone::http_engine::HttpIsochroneEngine;
use crate::server::{AppState, build_router};

mod generate;
mod isochrone;
mod loader;
mod map;
mod model;
mod server;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    _ = dotenv();

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let appender = tracing_appender::rolling::daily("./logs", "isochrone_map.log");
    let (non_blocking_appender, _guard) = tracing_appender::non_blocking(appender);

    // A layer that logs events to rolling files.
    let file_log = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_appender)
        .with_ansi(false)
        .pretty();

    let stdout_log = tracing_subscriber::fmt::layer();

    Registry::default()
        .with(stdout_log)
        .with(file_log)
        .with(env_filter)
        .init();

    let engine_url =
        env::var("ISOCHRONE_API_URL").unwrap_or_else(|_| "http://localhost:8002".to_string());
    let bind_address = env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    let state = Arc::new(AppState {
        engine: HttpIsochroneEngine::new(&engine_url),
    });

    info!("using isochrone engine at {engine_url}");

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("couldn't bind {bind_address}"))?;
    info!("listening on {bind_address}");

    axum::serve(listener, build_router(state)).await?;

    Ok(())
}
