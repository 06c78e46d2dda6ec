pub mod dispatch;
pub mod webhook;

use axum::{Router, routing::post};

use crate::AppState;

pub fn build_router() -> Router<AppState> {
    Router::new()
        .route("/api/github/webhook", post(webhook::webhook))
        .route("/api/dispatch/{owner}/{repo}", post(dispatch::dispatch))
}
