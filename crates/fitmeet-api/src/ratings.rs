use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;

use fitmeet_db::RatingOutcome;
use fitmeet_types::api::{Claims, CreateRatingRequest, RatingResponse, SubmittedRating, UserRatingsResponse};
use fitmeet_types::{RatingId, UserId};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{PathParam, Payload};
use crate::{run_db, validate};

pub async fn submit_rating(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Payload(req): Payload<CreateRatingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !(1..=5).contains(&req.score) {
        return Err(ApiError::validation("score must be between 1 and 5"));
    }
    if req.rated_user_id == claims.sub {
        return Err(ApiError::validation("you cannot rate yourself"));
    }
    let comment = validate::optional("comment", req.comment.as_deref(), 1000)?;

    let id = RatingId::generate();
    let rater = claims.sub;
    let rated = req.rated_user_id;
    let score = req.score;
    let outcome = run_db(&state, move |db| {
        db.submit_rating(id, rater, rated, score, comment.as_deref(), Utc::now())
    })
    .await?;

    match outcome {
        RatingOutcome::Recorded {
            rating,
            average_rating,
            rating_count,
        } => {
            info!(
                "{} rated {} {}/5 (average now {:.2} over {})",
                claims.username, rated, score, average_rating, rating_count
            );
            Ok((
                StatusCode::CREATED,
                Json(SubmittedRating {
                    id: rating.id,
                    rater_id: rating.rater_id,
                    rated_id: rating.rated_id,
                    score: rating.score,
                    comment: rating.comment,
                    created_at: rating.created_at,
                    average_rating,
                    rating_count,
                }),
            ))
        }
        RatingOutcome::UnknownUser => Err(ApiError::NotFound("user")),
        RatingOutcome::Duplicate => Err(ApiError::Duplicate("you have already rated this user")),
    }
}

/// GET /ratings/{user_id}: everything a user has been rated, newest first.
pub async fn get_user_ratings(
    State(state): State<AppState>,
    PathParam(user_id): PathParam<UserId>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, ratings) = run_db(&state, move |db| {
        let Some(user) = db.get_user_by_id(user_id)? else {
            return Ok((None, Vec::new()));
        };
        Ok((Some(user), db.get_ratings_for_user(user_id)?))
    })
    .await?;
    let user = user.ok_or(ApiError::NotFound("user"))?;

    Ok(Json(UserRatingsResponse {
        user_id: user.id,
        average_rating: user.average_rating,
        rating_count: user.rating_count,
        ratings: ratings
            .into_iter()
            .map(|r| RatingResponse {
                id: r.rating.id,
                rater: r.rater,
                score: r.rating.score,
                comment: r.rating.comment,
                created_at: r.rating.created_at,
            })
            .collect(),
    }))
}
