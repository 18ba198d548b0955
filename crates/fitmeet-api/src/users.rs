use axum::{
    Extension, Json,
    extract::State,
    response::IntoResponse,
};
use serde::Deserialize;

use fitmeet_db::UserRow;
use fitmeet_types::api::{Buddy, Claims, UpdateProfileRequest, UserProfile};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{Payload, QueryParams};
use crate::{clamp_limit, run_db, validate};

#[derive(Debug, Deserialize)]
pub struct BuddyQuery {
    pub limit: Option<u32>,
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let me = claims.sub;
    let row = run_db(&state, move |db| db.get_user_by_id(me))
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(user_profile(row)))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Payload(mut req): Payload<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.display_name = validate::optional("display_name", req.display_name.as_deref(), 64)?;
    req.avatar_url = validate::optional("avatar_url", req.avatar_url.as_deref(), 500)?;
    req.bio = validate::optional("bio", req.bio.as_deref(), 2000)?;
    req.fitness_level = validate::optional("fitness_level", req.fitness_level.as_deref(), 30)?;
    req.location = validate::optional("location", req.location.as_deref(), 200)?;
    req.interests = req
        .interests
        .as_deref()
        .map(|i| validate::list("interests", i, 30))
        .transpose()?;

    let me = claims.sub;
    let row = run_db(&state, move |db| db.update_profile(me, &req))
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(user_profile(row)))
}

/// GET /users/buddies: people the caller has shared events with.
pub async fn get_buddies(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    QueryParams(query): QueryParams<BuddyQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let me = claims.sub;
    let limit = clamp_limit(query.limit);
    let rows = run_db(&state, move |db| db.get_buddies(me, limit)).await?;

    let buddies: Vec<Buddy> = rows
        .into_iter()
        .map(|row| Buddy {
            profile: row.profile,
            shared_events: row.shared_events,
        })
        .collect();
    Ok(Json(buddies))
}

fn user_profile(row: UserRow) -> UserProfile {
    UserProfile {
        id: row.id,
        username: row.username,
        email: row.email,
        role: row.role,
        display_name: row.display_name,
        avatar_url: row.avatar_url,
        bio: row.bio,
        fitness_level: row.fitness_level,
        interests: row.interests,
        location: row.location,
        average_rating: row.average_rating,
        rating_count: row.rating_count,
        created_at: row.created_at,
    }
}
