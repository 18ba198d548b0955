pub mod api;
pub mod ids;
pub mod models;

pub use ids::{EventId, MessageId, PlanId, RatingId, UserId};
pub use models::{Exercise, PublicProfile, Role};
