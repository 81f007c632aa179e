pub mod api;
pub mod config;
pub mod error;
pub mod game_loop;
pub mod health;
pub mod lineup;
pub mod session;
pub mod state;
pub mod ws;

use axum::Router;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use config::ServerConfig;
use session::GameSession;
use state::AppState;

/// Build the Axum router and application state from a config.
///
/// Spawns the game tick loop, so this must run inside a tokio runtime.
/// The returned handle completes once a `GameCommand::Stop` is processed.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState, JoinHandle<()>) {
    let web_root = config.web_root.clone();
    let session = GameSession::new(config.session.clone(), config.minigames.clone());
    let (commands, game_loop) = game_loop::spawn_game_loop(session);
    let state = AppState::new(config, commands);

    let api_routes = Router::new()
        .route("/state", axum::routing::get(api::get_state))
        .route(
            "/participants/{id}",
            axum::routing::get(api::get_participant),
        )
        .layer(CorsLayer::permissive());

    let app = Router::new()
        .route("/ws", axum::routing::get(ws::ws_handler))
        .route("/health", axum::routing::get(health::health_check))
        .nest("/api/v1", api_routes)
        .fallback_service(ServeDir::new(&web_root))
        .with_state(state.clone());

    (app, state, game_loop)
}
