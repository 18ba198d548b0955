use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{EventId, MessageId, PlanId, RatingId, UserId};
use crate::models::{Exercise, PublicProfile, Role};

// -- JWT Claims --

/// JWT claims issued at register/login and checked by the bearer middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub username: String,
    pub exp: usize,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user_id: UserId,
    pub username: String,
    pub token: String,
}

// -- Users --

#[derive(Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub fitness_level: Option<String>,
    pub interests: Vec<String>,
    pub location: Option<String>,
    pub average_rating: f64,
    pub rating_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Profile fields a user may change about themselves. Anything else in the
/// body (role, id, ratings) is rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub fitness_level: Option<String>,
    pub interests: Option<Vec<String>>,
    pub location: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Buddy {
    #[serde(flatten)]
    pub profile: PublicProfile,
    pub shared_events: u32,
}

// -- Trainers --

#[derive(Debug, Serialize, Deserialize)]
pub struct TrainerProfile {
    pub id: UserId,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub email: String,
    pub specialties: Vec<String>,
    pub certifications: Vec<String>,
    pub hourly_rate: Option<f64>,
    pub average_rating: f64,
    pub rating_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BecomeTrainerRequest {
    /// Contact address for the directory; defaults to the account email.
    #[serde(default)]
    pub email: Option<String>,
    pub specialties: Vec<String>,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub hourly_rate: Option<f64>,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTrainerRequest {
    pub email: Option<String>,
    pub specialties: Option<Vec<String>>,
    pub certifications: Option<Vec<String>>,
    pub hourly_rate: Option<f64>,
    pub bio: Option<String>,
}

// -- Events --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateEventRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub activity_type: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub location: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub max_participants: u32,
}

/// Host-editable event fields. Participants and counters are not listed, so
/// a client cannot overwrite them.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateEventRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub activity_type: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<u32>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub max_participants: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventResponse {
    pub id: EventId,
    pub host_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub activity_type: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub max_participants: u32,
    pub participant_count: u32,
    pub participants: Vec<UserId>,
    pub created_at: DateTime<Utc>,
}

// -- Workout plans --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePlanRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    pub exercises: Vec<Exercise>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePlanRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub difficulty: Option<String>,
    pub exercises: Option<Vec<Exercise>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlanResponse {
    pub id: PlanId,
    pub creator_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub difficulty: Option<String>,
    pub exercises: Vec<Exercise>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Ratings --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRatingRequest {
    pub rated_user_id: UserId,
    pub score: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Returned after a rating lands, with the rated user's recomputed average.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmittedRating {
    pub id: RatingId,
    pub rater_id: UserId,
    pub rated_id: UserId,
    pub score: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub average_rating: f64,
    pub rating_count: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RatingResponse {
    pub id: RatingId,
    pub rater: PublicProfile,
    pub score: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserRatingsResponse {
    pub user_id: UserId,
    pub average_rating: f64,
    pub rating_count: u32,
    pub ratings: Vec<RatingResponse>,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub recipient_id: UserId,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: MessageId,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// One row of the inbox: the counterpart and the latest message exchanged.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub partner: PublicProfile,
    pub last_message: MessageResponse,
}
