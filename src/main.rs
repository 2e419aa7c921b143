use log::{error, info, warn};
use serde_json::Value;
use service::{config::Config, logging::Logger};
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use web::{EventServer, SseServer};

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to start logger: {e}");
    }

    let server: Arc<SseServer<Value>> = Arc::new(SseServer::from_config(&config));

    if let Err(e) = server.start().await {
        error!("Failed to start SSE server: {e}");
        std::process::exit(1);
    }

    let keepalive = config.keepalive_interval().map(|period| {
        info!("Sending keepalive every {period:?}");
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                server.keepalive();
            }
        })
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Unable to listen for shutdown signal: {e}");
    }
    info!("Shutdown signal received, stopping SSE server");

    if let Some(keepalive) = keepalive {
        keepalive.abort();
    }

    if let Err(e) = server.stop().await {
        error!("Failed to stop SSE server cleanly: {e}");
        std::process::exit(1);
    }
}
