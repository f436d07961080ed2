use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Form, Json, Router,
};
use domain::conversations::ConversationEngine;
use serde_json::json;

use crate::twilio::{twiml, TwilioMessage};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ConversationEngine>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook-whatsapp", post(receive_message))
        .route("/health", get(health))
        .with_state(state)
}

// Incoming WhatsApp message
async fn receive_message(
    State(state): State<AppState>,
    Form(message): Form<TwilioMessage>,
) -> impl IntoResponse {
    tracing::info!(
        "Message from {} (media: {})",
        message.from,
        message.media_content_type.as_deref().unwrap_or("none")
    );

    let reply = state.engine.handle(message.into()).await;

    ([(header::CONTENT_TYPE, "text/xml")], twiml(&reply.body))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
