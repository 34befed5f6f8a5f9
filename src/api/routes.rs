use axum::{
    http::{HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers::{automation, handoff, health, mailbox, messages, pages, profiles};
use super::state::AppState;
use super::websocket::ws_handler;

pub fn create_router(state: Arc<AppState>) -> Router {
    // SECURITY: the sidecar only serves local callers
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:1420"),
            HeaderValue::from_static("http://localhost:5173"),
            HeaderValue::from_static("http://127.0.0.1:1420"),
            HeaderValue::from_static("http://127.0.0.1:5173"),
        ])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(tower_http::cors::Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Site profiles
        .route("/profiles", get(profiles::list_profiles))
        .route("/profiles/:host", get(profiles::get_profile))
        // Mailbox
        .route("/mailbox/:key", put(mailbox::put_payload))
        .route("/mailbox/:key/take", post(mailbox::take_payload))
        // Handoff to a receiving site
        .route("/handoff", post(handoff::create_handoff))
        // Pages
        .route("/pages", post(pages::create_page))
        .route(
            "/pages/:page_id",
            get(pages::get_page)
                .put(pages::update_page)
                .delete(pages::delete_page),
        )
        .route("/pages/:page_id/message", post(messages::post_message))
        .route(
            "/pages/:page_id/frame-message",
            post(messages::post_frame_message),
        )
        // Automation tasks
        .route("/automation/track", post(automation::track_automation))
        // WebSocket
        .route("/ws/:client_id", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
