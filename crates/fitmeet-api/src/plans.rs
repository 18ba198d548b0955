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

use fitmeet_db::PlanRow;
use fitmeet_types::api::{Claims, CreatePlanRequest, PlanResponse, UpdatePlanRequest};
use fitmeet_types::{Exercise, PlanId, UserId};

use crate::auth::AppState;
use crate::error::{ApiError, owned};
use crate::extract::{PathParam, Payload, QueryParams, parse_json};
use crate::{clamp_limit, run_db, validate};

const MAX_EXERCISES: usize = 100;

#[derive(Debug, Deserialize)]
pub struct PlanQuery {
    pub creator: Option<UserId>,
    pub limit: Option<u32>,
}

pub async fn list_plans(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<PlanQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = clamp_limit(query.limit);
    let creator = query.creator;
    let rows = run_db(&state, move |db| db.list_plans(creator, limit)).await?;
    Ok(Json(rows.into_iter().map(plan_response).collect::<Vec<_>>()))
}

pub async fn get_plan(
    State(state): State<AppState>,
    PathParam(id): PathParam<PlanId>,
) -> Result<impl IntoResponse, ApiError> {
    let row = run_db(&state, move |db| db.get_plan(id))
        .await?
        .ok_or(ApiError::NotFound("workout plan"))?;
    Ok(Json(plan_response(row)))
}

pub async fn create_plan(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Payload(mut req): Payload<CreatePlanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.name = validate::required("name", &req.name, 100)?;
    req.description = validate::optional("description", req.description.as_deref(), 2000)?;
    req.difficulty = validate::optional("difficulty", req.difficulty.as_deref(), 30)?;
    req.exercises = check_exercises(req.exercises)?;

    let id = PlanId::generate();
    let creator = claims.sub;
    let row = run_db(&state, move |db| db.create_plan(id, creator, &req, Utc::now())).await?;

    info!("Workout plan {} created by {}", row.id, claims.username);
    Ok((StatusCode::CREATED, Json(plan_response(row))))
}

pub async fn update_plan(
    State(state): State<AppState>,
    PathParam(id): PathParam<PlanId>,
    Extension(claims): Extension<Claims>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let caller = claims.sub;
    let current = run_db(&state, move |db| db.get_plan(id))
        .await?
        .ok_or(ApiError::NotFound("workout plan"))?;
    if current.creator_id != caller {
        return Err(ApiError::NotAuthorized);
    }

    let mut req: UpdatePlanRequest = parse_json(&body)?;
    req.name = validate::optional("name", req.name.as_deref(), 100)?;
    req.description = validate::optional("description", req.description.as_deref(), 2000)?;
    req.difficulty = validate::optional("difficulty", req.difficulty.as_deref(), 30)?;
    req.exercises = req.exercises.map(check_exercises).transpose()?;

    let outcome = run_db(&state, move |db| db.update_plan(caller, id, &req, Utc::now())).await?;
    Ok(Json(plan_response(owned(outcome, "workout plan")?)))
}

pub async fn delete_plan(
    State(state): State<AppState>,
    PathParam(id): PathParam<PlanId>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = claims.sub;
    owned(run_db(&state, move |db| db.delete_plan(caller, id)).await?, "workout plan")?;

    info!("Workout plan {} deleted by {}", id, claims.username);
    Ok(StatusCode::NO_CONTENT)
}

fn check_exercises(exercises: Vec<Exercise>) -> Result<Vec<Exercise>, ApiError> {
    if exercises.is_empty() {
        return Err(ApiError::validation("a plan needs at least one exercise"));
    }
    if exercises.len() > MAX_EXERCISES {
        return Err(ApiError::validation(format!(
            "a plan may hold at most {} exercises",
            MAX_EXERCISES
        )));
    }

    exercises
        .into_iter()
        .map(|mut exercise| {
            exercise.name = validate::required("exercise name", &exercise.name, 100)?;
            if !(1..=100).contains(&exercise.sets) {
                return Err(ApiError::validation("sets must be between 1 and 100"));
            }
            if !(1..=1000).contains(&exercise.reps) {
                return Err(ApiError::validation("reps must be between 1 and 1000"));
            }
            if exercise.duration_seconds == Some(0) {
                return Err(ApiError::validation("duration_seconds must be positive"));
            }
            Ok(exercise)
        })
        .collect()
}

fn plan_response(row: PlanRow) -> PlanResponse {
    PlanResponse {
        id: row.id,
        creator_id: row.creator_id,
        name: row.name,
        description: row.description,
        difficulty: row.difficulty,
        exercises: row.exercises,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}
