use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use fitmeet_db::{Owned, UserRow};
use fitmeet_types::UserId;
use fitmeet_types::api::{BecomeTrainerRequest, Claims, TrainerProfile, UpdateTrainerRequest};

use crate::auth::AppState;
use crate::error::{ApiError, owned};
use crate::extract::{PathParam, Payload, QueryParams, parse_json};
use crate::{clamp_limit, run_db, validate};

#[derive(Debug, Deserialize)]
pub struct TrainerQuery {
    pub specialty: Option<String>,
    pub limit: Option<u32>,
}

pub async fn list_trainers(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<TrainerQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = clamp_limit(query.limit);
    let specialty = query.specialty.filter(|s| !s.trim().is_empty());
    let rows = run_db(&state, move |db| db.list_trainers(specialty.as_deref().map(str::trim), limit)).await?;
    Ok(Json(rows.into_iter().map(trainer_profile).collect::<Vec<_>>()))
}

pub async fn get_trainer(
    State(state): State<AppState>,
    PathParam(id): PathParam<UserId>,
) -> Result<impl IntoResponse, ApiError> {
    let row = run_db(&state, move |db| db.get_trainer(id))
        .await?
        .ok_or(ApiError::NotFound("trainer"))?;
    Ok(Json(trainer_profile(row)))
}

/// POST /trainers: list the caller in the trainer directory.
pub async fn become_trainer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Payload(mut req): Payload<BecomeTrainerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.specialties.is_empty() {
        return Err(ApiError::validation("at least one specialty is required"));
    }
    req.specialties = validate::list("specialties", &req.specialties, 20)?;
    req.certifications = validate::list("certifications", &req.certifications, 20)?;
    req.email = req.email.as_deref().map(validate::email).transpose()?;
    req.bio = validate::optional("bio", req.bio.as_deref(), 2000)?;
    check_rate(req.hourly_rate)?;

    let user = claims.sub;
    let outcome = run_db(&state, move |db| db.promote_to_trainer(user, &req)).await?;
    let row = trainer_outcome(outcome, "user")?;

    info!("{} is now listed as a trainer", claims.username);
    Ok((StatusCode::CREATED, Json(trainer_profile(row))))
}

pub async fn update_trainer(
    State(state): State<AppState>,
    PathParam(id): PathParam<UserId>,
    Extension(claims): Extension<Claims>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let caller = claims.sub;
    run_db(&state, move |db| db.get_trainer(id))
        .await?
        .ok_or(ApiError::NotFound("trainer"))?;
    if id != caller {
        return Err(ApiError::NotAuthorized);
    }

    let mut req: UpdateTrainerRequest = parse_json(&body)?;
    if let Some(specialties) = req.specialties.take() {
        if specialties.is_empty() {
            return Err(ApiError::validation("at least one specialty is required"));
        }
        req.specialties = Some(validate::list("specialties", &specialties, 20)?);
    }
    req.certifications = req
        .certifications
        .as_deref()
        .map(|c| validate::list("certifications", c, 20))
        .transpose()?;
    req.email = req.email.as_deref().map(validate::email).transpose()?;
    req.bio = validate::optional("bio", req.bio.as_deref(), 2000)?;
    check_rate(req.hourly_rate)?;

    let outcome = run_db(&state, move |db| db.update_trainer(caller, id, &req)).await?;
    let row = trainer_outcome(outcome, "trainer")?;
    Ok(Json(trainer_profile(row)))
}

/// DELETE /trainers/{id}: leave the directory; the account stays.
pub async fn delete_trainer(
    State(state): State<AppState>,
    PathParam(id): PathParam<UserId>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = claims.sub;
    owned(run_db(&state, move |db| db.demote_trainer(caller, id)).await?, "trainer")?;

    info!("{} left the trainer directory", claims.username);
    Ok(StatusCode::NO_CONTENT)
}

/// Trainer conflicts (already listed, email in use) are duplicates.
fn trainer_outcome<T>(outcome: Owned<T>, what: &'static str) -> Result<T, ApiError> {
    match outcome {
        Owned::Conflict(msg) => Err(ApiError::Duplicate(msg)),
        other => owned(other, what),
    }
}

fn check_rate(rate: Option<f64>) -> Result<(), ApiError> {
    match rate {
        Some(r) if !r.is_finite() || r < 0.0 => {
            Err(ApiError::validation("hourly_rate must be a non-negative number"))
        }
        _ => Ok(()),
    }
}

fn trainer_profile(row: UserRow) -> TrainerProfile {
    TrainerProfile {
        id: row.id,
        display_name: row.display_name,
        avatar_url: row.avatar_url,
        bio: row.bio,
        location: row.location,
        email: row.email,
        specialties: row.specialties,
        certifications: row.certifications,
        hourly_rate: row.hourly_rate,
        average_rating: row.average_rating,
        rating_count: row.rating_count,
    }
}
