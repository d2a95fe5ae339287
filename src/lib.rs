pub mod api;
pub mod bot;
pub mod bridge;
pub mod config;
pub mod error;

use std::sync::Arc;
use actix_web::HttpResponse;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use bot::BotClient;
pub use bridge::{BridgeServer, Session, SessionState};

/// Health check endpoint handler
/// Returns a fixed JSON body used by the hosting platform's liveness check
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy"
    }))
}

/// Application state shared across all HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub bots: Arc<BotClient>,
}

impl AppState {
    pub fn new(config: Settings) -> Result<Self> {
        let bots = BotClient::new(&config)?;

        Ok(Self {
            config: Arc::new(config),
            bots: Arc::new(bots),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_creation() {
        let config = Settings::defaults().expect("Failed to load test config");
        let state = AppState::new(config).expect("Failed to build state");
        assert_eq!(state.config.bridge.route, "/bridge");
    }

    #[test]
    fn test_app_state_rejects_unusable_bot_config() {
        let mut config = Settings::defaults().unwrap();
        config.bot.credential_schemes.clear();
        let state = AppState::new(config);
        assert!(matches!(state, Err(AppError::BotApi(_))));
    }

    #[test]
    fn test_app_state_clone() {
        let config = Settings::defaults().unwrap();
        let state = AppState::new(config).unwrap();
        let cloned = state.clone();

        assert!(Arc::ptr_eq(&state.config, &cloned.config));
        assert!(Arc::ptr_eq(&state.bots, &cloned.bots));
    }
}
