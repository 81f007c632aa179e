use tracing_subscriber::EnvFilter;

use amphi_server::build_app;
use amphi_server::config::ServerConfig;
use amphi_server::game_loop::GameCommand;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::load();
    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    }

    let listen_addr = config.listen_addr.clone();
    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %listen_addr, error = %e, "Failed to bind");
            std::process::exit(1);
        },
    };

    let (app, state, game_loop) = build_app(config);
    tracing::info!(addr = %listen_addr, "Amphi server listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
        })
        .await;
    if let Err(e) = served {
        tracing::error!(error = %e, "Server error");
    }

    let _ = state.commands.send(GameCommand::Stop);
    let _ = game_loop.await;
}
