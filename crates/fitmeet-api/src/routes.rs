use axum::{
    Json, Router, middleware,
    routing::{get, post, put},
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{events, messages, plans, ratings, trainers, users};

/// The whole REST surface. Reads of public listings need no token;
/// everything that writes or is personal goes through `require_auth`.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/events", get(events::list_events))
        .route("/events/{id}", get(events::get_event))
        .route("/trainers", get(trainers::list_trainers))
        .route("/trainers/{id}", get(trainers::get_trainer))
        .route("/workout-plans", get(plans::list_plans))
        .route("/workout-plans/{id}", get(plans::get_plan))
        .route("/ratings/{user_id}", get(ratings::get_user_ratings))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/events", post(events::create_event))
        .route("/events/{id}", put(events::update_event).delete(events::delete_event))
        .route("/events/{id}/join", post(events::join_event))
        .route("/events/{id}/leave", post(events::leave_event))
        .route("/trainers", post(trainers::become_trainer))
        .route("/trainers/{id}", put(trainers::update_trainer).delete(trainers::delete_trainer))
        .route("/workout-plans", post(plans::create_plan))
        .route("/workout-plans/{id}", put(plans::update_plan).delete(plans::delete_plan))
        .route("/ratings", post(ratings::submit_rating))
        .route("/messages", post(messages::send_message))
        .route("/messages/conversation/{user_id}", get(messages::get_conversation))
        .route("/messages/conversations", get(messages::get_conversations))
        .route("/users/profile", get(users::get_profile).put(users::update_profile))
        .route("/users/buddies", get(users::get_buddies))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
