//! HTTP surface of the KindMatch backend.

pub mod conversations;
pub mod error;
pub mod gateway;
pub mod inbox;
pub mod jobs;
pub mod matches;
pub mod middleware;
pub mod state;
pub mod users;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};

use crate::state::AppState;

/// All routes. Everything except `/health` and the gateway upgrade sits
/// behind bearer-token auth; the gateway checks its token itself.
pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/users/me", get(users::get_profile).put(users::upsert_profile))
        .route("/jobs", get(jobs::list_job_posts).post(jobs::create_job_post))
        .route("/jobs/{job_id}/close", post(jobs::close_job_post))
        .route(
            "/jobs/{job_id}/applications",
            get(jobs::list_applications).post(jobs::apply),
        )
        .route("/applications/{application_id}/accept", post(jobs::accept_application))
        .route("/applications/{application_id}/reject", post(jobs::reject_application))
        .route("/matches", get(matches::list_matches))
        .route("/matches/{match_id}", delete(matches::delete_match))
        .route("/matches/{match_id}/open", post(matches::open_match))
        .route(
            "/matches/{match_id}/conversation",
            post(matches::get_or_create_conversation),
        )
        .route("/inbox", get(inbox::get_inbox))
        .route(
            "/conversations",
            get(conversations::list_conversations).post(conversations::create_direct_conversation),
        )
        .route(
            "/conversations/{thread}/messages",
            get(conversations::get_messages).post(conversations::send_message),
        )
        .route("/conversations/{thread}/read", post(conversations::mark_read))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/gateway", get(gateway::ws_upgrade))
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
