use anyhow::Result;
use chrono::{DateTime, Utc};

use fitmeet_types::{PublicProfile, RatingId, UserId};

use super::OptionalExt;
use crate::Database;
use crate::models::{RatingOutcome, RatingRow, ReceivedRating};

impl Database {
    /// Record `rater`'s score for `rated` and recompute the rated user's
    /// average from every rating they hold.
    ///
    /// One edge per (rater, rated) is enforced by the UNIQUE constraint; the
    /// insert, the recount and the user update share a transaction.
    pub fn submit_rating(
        &self,
        id: RatingId,
        rater: UserId,
        rated: UserId,
        score: u8,
        comment: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<RatingOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let exists = tx
                .query_row("SELECT 1 FROM users WHERE id = ?1", [rated], |_| Ok(()))
                .optional()?
                .is_some();
            if !exists {
                return Ok(RatingOutcome::UnknownUser);
            }

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO ratings (id, rater_id, rated_id, score, comment, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, rater, rated, score, comment, now],
            )?;
            if inserted == 0 {
                return Ok(RatingOutcome::Duplicate);
            }

            let (sum, count): (i64, u32) = tx.query_row(
                "SELECT COALESCE(SUM(score), 0), COUNT(*) FROM ratings WHERE rated_id = ?1",
                [rated],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            let average = sum as f64 / count as f64;

            tx.execute(
                "UPDATE users SET average_rating = ?2, rating_count = ?3 WHERE id = ?1",
                rusqlite::params![rated, average, count],
            )?;
            tx.commit()?;

            Ok(RatingOutcome::Recorded {
                rating: RatingRow {
                    id,
                    rater_id: rater,
                    rated_id: rated,
                    score,
                    comment: comment.map(str::to_string),
                    created_at: now,
                },
                average_rating: average,
                rating_count: count,
            })
        })
    }

    /// Ratings addressed to `rated`, newest first, with the rater's profile.
    pub fn get_ratings_for_user(&self, rated: UserId) -> Result<Vec<ReceivedRating>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.rater_id, r.rated_id, r.score, r.comment, r.created_at,
                        u.display_name, u.avatar_url
                 FROM ratings r
                 JOIN users u ON u.id = r.rater_id
                 WHERE r.rated_id = ?1
                 ORDER BY r.created_at DESC, r.rowid DESC",
            )?;

            let rows = stmt
                .query_map([rated], |row| {
                    let rater_id: UserId = row.get(1)?;
                    Ok(ReceivedRating {
                        rating: RatingRow {
                            id: row.get(0)?,
                            rater_id,
                            rated_id: row.get(2)?,
                            score: row.get(3)?,
                            comment: row.get(4)?,
                            created_at: row.get(5)?,
                        },
                        rater: PublicProfile {
                            id: rater_id,
                            display_name: row.get(6)?,
                            avatar_url: row.get(7)?,
                        },
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}
