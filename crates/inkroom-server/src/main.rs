use inkroom_server::{ServerConfig, memory_hub, serve};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkroom_server=info,tower_http=info".into()),
        )
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    let listener = match tokio::net::TcpListener::bind(config.addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", config.addr, e);
            std::process::exit(1);
        }
    };

    info!("Inkroom server listening on {}", config.addr);
    info!("WebSocket endpoint: ws://{}/ws?token=<jwt>", config.addr);
    info!("{} room(s) seeded, replay limit {}", config.rooms.len(), config.replay_limit);

    if let Err(e) = serve(listener, memory_hub(&config)).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
