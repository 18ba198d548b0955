use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use fitmeet_db::{EventRow, JoinOutcome, LeaveOutcome};
use fitmeet_types::EventId;
use fitmeet_types::api::{Claims, CreateEventRequest, EventResponse, UpdateEventRequest};

use crate::auth::AppState;
use crate::error::{ApiError, owned};
use crate::extract::{PathParam, Payload, QueryParams, parse_json};
use crate::{clamp_limit, run_db, validate};

const MAX_CAPACITY: u32 = 10_000;
const MAX_DURATION_MINUTES: u32 = 24 * 60;

#[derive(Debug, Deserialize)]
pub struct EventQuery {
    pub activity_type: Option<String>,
    /// Only events that have not started yet.
    #[serde(default)]
    pub upcoming: bool,
    pub limit: Option<u32>,
}

pub async fn list_events(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<EventQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = clamp_limit(query.limit);
    let starting_after = query.upcoming.then(Utc::now);
    let activity_type = query.activity_type;

    let rows = run_db(&state, move |db| {
        db.list_events(activity_type.as_deref(), starting_after, limit)
    })
    .await?;

    Ok(Json(rows.into_iter().map(event_response).collect::<Vec<_>>()))
}

pub async fn get_event(
    State(state): State<AppState>,
    PathParam(id): PathParam<EventId>,
) -> Result<impl IntoResponse, ApiError> {
    let row = run_db(&state, move |db| db.get_event(id))
        .await?
        .ok_or(ApiError::NotFound("event"))?;
    Ok(Json(event_response(row)))
}

pub async fn create_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Payload(mut req): Payload<CreateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.name = validate::required("name", &req.name, 100)?;
    req.location = validate::required("location", &req.location, 200)?;
    req.description = validate::optional("description", req.description.as_deref(), 2000)?;
    req.activity_type = validate::optional("activity_type", req.activity_type.as_deref(), 50)?;
    check_capacity(req.max_participants)?;
    check_duration(req.duration_minutes)?;
    check_coordinates(req.latitude, req.longitude)?;

    let id = EventId::generate();
    let host = claims.sub;
    let row = run_db(&state, move |db| db.create_event(id, host, &req, Utc::now())).await?;

    info!("Event {} '{}' created by {}", row.id, row.name, claims.username);
    Ok((StatusCode::CREATED, Json(event_response(row))))
}

/// Host-only partial update. Existence and ownership are settled before the
/// body is looked at.
pub async fn update_event(
    State(state): State<AppState>,
    PathParam(id): PathParam<EventId>,
    Extension(claims): Extension<Claims>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let caller = claims.sub;
    let current = run_db(&state, move |db| db.get_event(id))
        .await?
        .ok_or(ApiError::NotFound("event"))?;
    if current.host_id != caller {
        return Err(ApiError::NotAuthorized);
    }

    let mut req: UpdateEventRequest = parse_json(&body)?;
    req.name = validate::optional("name", req.name.as_deref(), 100)?;
    req.location = validate::optional("location", req.location.as_deref(), 200)?;
    req.description = validate::optional("description", req.description.as_deref(), 2000)?;
    req.activity_type = validate::optional("activity_type", req.activity_type.as_deref(), 50)?;
    if let Some(max) = req.max_participants {
        check_capacity(max)?;
    }
    if let Some(duration) = req.duration_minutes {
        check_duration(duration)?;
    }
    check_coordinates(req.latitude, req.longitude)?;

    let outcome = run_db(&state, move |db| db.update_event(caller, id, &req)).await?;
    let row = owned(outcome, "event")?;
    Ok(Json(event_response(row)))
}

pub async fn delete_event(
    State(state): State<AppState>,
    PathParam(id): PathParam<EventId>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = claims.sub;
    owned(run_db(&state, move |db| db.delete_event(caller, id)).await?, "event")?;

    info!("Event {} deleted by {}", id, claims.username);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn join_event(
    State(state): State<AppState>,
    PathParam(id): PathParam<EventId>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user = claims.sub;
    match run_db(&state, move |db| db.join_event(id, user, Utc::now())).await? {
        JoinOutcome::Joined(row) => {
            info!(
                "{} joined event {} ({}/{})",
                claims.username, id, row.participant_count, row.max_participants
            );
            Ok(Json(event_response(row)))
        }
        JoinOutcome::NotFound => Err(ApiError::NotFound("event")),
        JoinOutcome::AlreadyJoined => Err(ApiError::AlreadyJoined),
        JoinOutcome::Full => Err(ApiError::CapacityExceeded),
    }
}

pub async fn leave_event(
    State(state): State<AppState>,
    PathParam(id): PathParam<EventId>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user = claims.sub;
    match run_db(&state, move |db| db.leave_event(id, user)).await? {
        LeaveOutcome::Left(row) => Ok(Json(event_response(row))),
        LeaveOutcome::NotFound => Err(ApiError::NotFound("event")),
        LeaveOutcome::NotJoined => Err(ApiError::NotFound("participation")),
    }
}

fn check_capacity(max: u32) -> Result<(), ApiError> {
    if max == 0 || max > MAX_CAPACITY {
        return Err(ApiError::validation(format!(
            "max_participants must be between 1 and {}",
            MAX_CAPACITY
        )));
    }
    Ok(())
}

fn check_duration(minutes: u32) -> Result<(), ApiError> {
    if minutes == 0 || minutes > MAX_DURATION_MINUTES {
        return Err(ApiError::validation(format!(
            "duration_minutes must be between 1 and {}",
            MAX_DURATION_MINUTES
        )));
    }
    Ok(())
}

fn check_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Result<(), ApiError> {
    if let Some(lat) = latitude {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(ApiError::validation("latitude must be between -90 and 90"));
        }
    }
    if let Some(lng) = longitude {
        if !(-180.0..=180.0).contains(&lng) {
            return Err(ApiError::validation("longitude must be between -180 and 180"));
        }
    }
    Ok(())
}

fn event_response(row: EventRow) -> EventResponse {
    EventResponse {
        id: row.id,
        host_id: row.host_id,
        name: row.name,
        description: row.description,
        activity_type: row.activity_type,
        starts_at: row.starts_at,
        duration_minutes: row.duration_minutes,
        location: row.location,
        latitude: row.latitude,
        longitude: row.longitude,
        max_participants: row.max_participants,
        participant_count: row.participant_count,
        participants: row.participants,
        created_at: row.created_at,
    }
}
