use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{error, info};

use crate::bot::BotResponse;
use crate::error::AppError;
use crate::AppState;

/// Registers every HTTP route served next to the bridge.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(crate::health_check))
        .route("/webhook", web::post().to(webhook))
        .route("/bots", web::get().to(list_bots))
        .route("/bots", web::post().to(create_bot))
        .route("/bots/{id}/end", web::post().to(end_bot));
}

/// Lifecycle events from the bot provider. Logged and acknowledged, nothing else.
/// Any body is accepted, whatever its content type.
pub async fn webhook(body: web::Bytes) -> HttpResponse {
    match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(payload) => {
            let event = payload.get("event").and_then(|e| e.as_str()).unwrap_or("unknown");
            info!("Webhook event {}: {}", event, payload);
        }
        Err(_) => info!("Webhook event with non-JSON body: {}", String::from_utf8_lossy(&body)),
    }
    HttpResponse::Ok().json(serde_json::json!({ "received": true }))
}

#[derive(Debug, Deserialize)]
pub struct CreateBotRequest {
    pub meeting_url: String,
}

pub async fn list_bots(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let response = state.bots.list_bots().await.map_err(|e| {
        error!("Listing bots failed: {}", e);
        AppError::from(e)
    })?;
    Ok(relay(response))
}

pub async fn create_bot(
    req: web::Json<CreateBotRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let meeting_url = req.meeting_url.trim();
    if meeting_url.is_empty() {
        return Err(AppError::ValidationError("meeting_url is required".into()));
    }

    info!("Received bot create request for meeting: {}", meeting_url);
    let response = state.bots.create_bot(meeting_url).await.map_err(|e| {
        error!("Creating bot for {} failed: {}", meeting_url, e);
        AppError::from(e)
    })?;
    Ok(relay(response))
}

pub async fn end_bot(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let bot_id = path.into_inner();
    info!("Received end request for bot: {}", bot_id);
    let response = state.bots.end_bot(&bot_id).await.map_err(|e| {
        error!("Ending bot {} failed: {}", bot_id, e);
        AppError::from(e)
    })?;
    Ok(relay(response))
}

/// Passes the bot API's status and body straight through.
fn relay(response: BotResponse) -> HttpResponse {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    HttpResponse::build(status).json(response.body)
}
