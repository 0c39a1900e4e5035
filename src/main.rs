use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use swarm_tracker::config::AppConfig;
use swarm_tracker::events::{BroadcastSink, EmitterConfig, SwarmEventEmitter};
use swarm_tracker::http::{self, state::AppState};
use swarm_tracker::query::QueryService;
use swarm_tracker::tracker::SwarmTracker;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = std::env::var("SWARM_TRACKER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("swarm-tracker.json"));
    let config = AppConfig::load(&config_path).expect("Failed to load config");

    // Shared state: store, event fan-out, emitter
    let tracker = Arc::new(SwarmTracker::new(config.retention.max_completed));
    let sink = Arc::new(BroadcastSink::new(config.emitter.channel_capacity));
    let events = sink.sender();
    let emitter = Arc::new(SwarmEventEmitter::new(
        sink,
        EmitterConfig {
            throttle: Duration::from_millis(config.emitter.throttle_ms),
            flush_tick: Duration::from_millis(config.emitter.flush_tick_ms),
        },
    ));
    emitter.start();

    if config.api.enabled {
        let state = Arc::new(AppState::new(
            QueryService::new(Arc::clone(&tracker)),
            events,
        ));
        let port = config.api.port;
        tokio::spawn(async move {
            if let Err(e) = http::serve(state, port).await {
                tracing::error!("HTTP server error: {}", e);
            }
        });
    }

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
    tracing::info!("Shutting down, draining pending events");
    emitter.stop().await;
}
