//! Database row types: these map directly to SQLite rows.
//! Distinct from fitmeet-types API models to keep the DB layer independent.
use chrono::{DateTime, Utc};
use fitmeet_types::{EventId, Exercise, MessageId, PlanId, PublicProfile, RatingId, Role, UserId};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub fitness_level: Option<String>,
    pub interests: Vec<String>,
    pub location: Option<String>,
    pub specialties: Vec<String>,
    pub certifications: Vec<String>,
    pub hourly_rate: Option<f64>,
    pub average_rating: f64,
    pub rating_count: u32,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    pub fn public_profile(&self) -> PublicProfile {
        PublicProfile {
            id: self.id,
            display_name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventRow {
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
    /// In join order.
    pub participants: Vec<UserId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PlanRow {
    pub id: PlanId,
    pub creator_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub difficulty: Option<String>,
    pub exercises: Vec<Exercise>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RatingRow {
    pub id: RatingId,
    pub rater_id: UserId,
    pub rated_id: UserId,
    pub score: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A rating as seen from the rated user's side, with who left it.
#[derive(Debug, Clone)]
pub struct ReceivedRating {
    pub rating: RatingRow,
    pub rater: PublicProfile,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: MessageId,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Latest message exchanged with one counterpart.
#[derive(Debug, Clone)]
pub struct ConversationRow {
    pub partner: PublicProfile,
    pub last_message: MessageRow,
}

#[derive(Debug, Clone)]
pub struct BuddyRow {
    pub profile: PublicProfile,
    pub shared_events: u32,
}

// -- Write outcomes --
//
// Expected domain results come back as `Ok(outcome)`; `Err` is reserved for
// storage failures.

/// Result of a write that only the record's owner may perform.
#[derive(Debug)]
pub enum Owned<T> {
    Done(T),
    Missing,
    NotOwner,
    /// The write would break a stored invariant; the message says which.
    Conflict(&'static str),
}

#[derive(Debug)]
pub enum NewUserOutcome {
    Created(UserRow),
    UsernameTaken,
    EmailTaken,
}

#[derive(Debug)]
pub enum JoinOutcome {
    Joined(EventRow),
    NotFound,
    AlreadyJoined,
    Full,
}

#[derive(Debug)]
pub enum LeaveOutcome {
    Left(EventRow),
    NotFound,
    NotJoined,
}

#[derive(Debug)]
pub enum RatingOutcome {
    Recorded {
        rating: RatingRow,
        average_rating: f64,
        rating_count: u32,
    },
    UnknownUser,
    Duplicate,
}
