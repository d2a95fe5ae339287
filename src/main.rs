use actix_web::{web, App, HttpServer};
use actix_cors::Cors;
use voicebridge_server::{api, AppError, AppState, BridgeServer, Settings};
use dotenv::dotenv;
use std::net::TcpListener;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn build_cors(config: &Settings) -> Cors {
    if config.cors.allows_any_origin() {
        return Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);
    }

    config
        .cors
        .allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST"])
        .allowed_headers(vec!["Authorization", "Content-Type"])
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> voicebridge_server::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    // Load configuration
    let config = Settings::new()?;
    info!("Configuration loaded successfully ({})", config.environment);
    if config.realtime.api_key.is_empty() {
        warn!("realtime.api_key is empty, upstream connections will be rejected");
    }

    let state = AppState::new(config.clone())?;
    let state = web::Data::new(state);

    // Bridge listener runs beside the HTTP server on its own port
    let bridge_listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.bridge.host, config.bridge.port)).await?;
    let bridge = Arc::new(BridgeServer::new(state.config.clone()));
    tokio::spawn(bridge.serve(bridge_listener));

    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;
    info!("Starting HTTP server at {}:{}", config.server.host, config.server.port);

    let workers = config.server.workers.max(1) as usize;
    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&config))
            .app_data(state.clone())
            .configure(api::configure)
    })
    .listen(listener)?
    .workers(workers)
    .run()
    .await
    .map_err(|e| AppError::InternalError(e.to_string()))?;

    Ok(())
}
