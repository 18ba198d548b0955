use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};

use fitmeet_types::api::{BecomeTrainerRequest, UpdateProfileRequest, UpdateTrainerRequest};
use fitmeet_types::{PublicProfile, Role, UserId};

use super::{OptionalExt, json_column, to_json};
use crate::Database;
use crate::models::{BuddyRow, NewUserOutcome, Owned, UserRow};

const USER_COLUMNS: &str = "id, username, email, password, role, display_name, avatar_url, bio, \
     fitness_level, interests, location, specialties, certifications, hourly_rate, \
     average_rating, rating_count, created_at";

impl Database {
    // -- Accounts --

    /// Insert a member account. Username and email uniqueness are checked
    /// under the write lock, so two registrations cannot both win.
    pub fn create_user(
        &self,
        id: UserId,
        username: &str,
        email: &str,
        password_hash: &str,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> Result<NewUserOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let username_taken = tx
                .query_row("SELECT 1 FROM users WHERE username = ?1", [username], |_| Ok(()))
                .optional()?
                .is_some();
            if username_taken {
                return Ok(NewUserOutcome::UsernameTaken);
            }
            if email_in_use(&tx, email, None)? {
                return Ok(NewUserOutcome::EmailTaken);
            }

            tx.execute(
                "INSERT INTO users (id, username, email, password, role, display_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![id, username, email, password_hash, Role::Member, display_name, now],
            )?;
            let user = query_user_by_id(&tx, id)?
                .ok_or_else(|| anyhow::anyhow!("User {} vanished after insert", id))?;
            tx.commit()?;
            Ok(NewUserOutcome::Created(user))
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS);
            conn.query_row(&sql, [username], map_user).optional()
        })
    }

    pub fn get_user_by_id(&self, id: UserId) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    /// Apply the whitelisted profile fields; absent fields keep their value.
    pub fn update_profile(&self, id: UserId, changes: &UpdateProfileRequest) -> Result<Option<UserRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(mut user) = query_user_by_id(&tx, id)? else {
                return Ok(None);
            };

            if let Some(display_name) = &changes.display_name {
                user.display_name = display_name.clone();
            }
            if let Some(avatar_url) = &changes.avatar_url {
                user.avatar_url = Some(avatar_url.clone());
            }
            if let Some(bio) = &changes.bio {
                user.bio = Some(bio.clone());
            }
            if let Some(fitness_level) = &changes.fitness_level {
                user.fitness_level = Some(fitness_level.clone());
            }
            if let Some(interests) = &changes.interests {
                user.interests = interests.clone();
            }
            if let Some(location) = &changes.location {
                user.location = Some(location.clone());
            }

            tx.execute(
                "UPDATE users
                 SET display_name = ?2, avatar_url = ?3, bio = ?4, fitness_level = ?5,
                     interests = ?6, location = ?7
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    user.display_name,
                    user.avatar_url,
                    user.bio,
                    user.fitness_level,
                    to_json(&user.interests)?,
                    user.location,
                ],
            )?;
            tx.commit()?;
            Ok(Some(user))
        })
    }

    /// Other users sharing at least one event with `user`, hosted or joined,
    /// ranked by how many events they share.
    pub fn get_buddies(&self, user: UserId, limit: u32) -> Result<Vec<BuddyRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "WITH attendance(event_id, user_id) AS (
                     SELECT event_id, user_id FROM event_participants
                     UNION
                     SELECT id, host_id FROM events
                 )
                 SELECT u.id, u.display_name, u.avatar_url, COUNT(DISTINCT mine.event_id) AS shared
                 FROM attendance mine
                 JOIN attendance other ON other.event_id = mine.event_id
                 JOIN users u ON u.id = other.user_id
                 WHERE mine.user_id = ?1 AND other.user_id <> ?1
                 GROUP BY u.id
                 ORDER BY shared DESC, u.display_name ASC
                 LIMIT ?2",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![user, limit], |row| {
                    Ok(BuddyRow {
                        profile: PublicProfile {
                            id: row.get(0)?,
                            display_name: row.get(1)?,
                            avatar_url: row.get(2)?,
                        },
                        shared_events: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Trainers --

    /// Trainers, best rated first. `specialty` is a case-insensitive
    /// substring match against any listed specialty.
    pub fn list_trainers(&self, specialty: Option<&str>, limit: u32) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM users u
                 WHERE role = 'trainer'
                   AND (?1 IS NULL OR EXISTS (
                        SELECT 1 FROM json_each(u.specialties)
                        WHERE lower(json_each.value) LIKE '%' || lower(?1) || '%'))
                 ORDER BY average_rating DESC, rating_count DESC, display_name ASC
                 LIMIT ?2",
                USER_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![specialty, limit], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_trainer(&self, id: UserId) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            Ok(query_user_by_id(conn, id)?.filter(|u| u.role == Role::Trainer))
        })
    }

    /// List `user` in the trainer directory.
    pub fn promote_to_trainer(&self, user: UserId, profile: &BecomeTrainerRequest) -> Result<Owned<UserRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(mut row) = query_user_by_id(&tx, user)? else {
                return Ok(Owned::Missing);
            };
            if row.role == Role::Trainer {
                return Ok(Owned::Conflict("already registered as a trainer"));
            }
            if let Some(email) = &profile.email {
                if email_in_use(&tx, email, Some(user))? {
                    return Ok(Owned::Conflict("email already in use"));
                }
                row.email = email.clone();
            }

            row.role = Role::Trainer;
            row.specialties = profile.specialties.clone();
            row.certifications = profile.certifications.clone();
            row.hourly_rate = profile.hourly_rate;
            if let Some(bio) = &profile.bio {
                row.bio = Some(bio.clone());
            }

            write_trainer_fields(&tx, &row)?;
            tx.commit()?;
            Ok(Owned::Done(row))
        })
    }

    pub fn update_trainer(
        &self,
        caller: UserId,
        trainer: UserId,
        changes: &UpdateTrainerRequest,
    ) -> Result<Owned<UserRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(mut row) = query_user_by_id(&tx, trainer)?.filter(|u| u.role == Role::Trainer) else {
                return Ok(Owned::Missing);
            };
            if row.id != caller {
                return Ok(Owned::NotOwner);
            }
            if let Some(email) = &changes.email {
                if email_in_use(&tx, email, Some(trainer))? {
                    return Ok(Owned::Conflict("email already in use"));
                }
                row.email = email.clone();
            }
            if let Some(specialties) = &changes.specialties {
                row.specialties = specialties.clone();
            }
            if let Some(certifications) = &changes.certifications {
                row.certifications = certifications.clone();
            }
            if let Some(rate) = changes.hourly_rate {
                row.hourly_rate = Some(rate);
            }
            if let Some(bio) = &changes.bio {
                row.bio = Some(bio.clone());
            }

            write_trainer_fields(&tx, &row)?;
            tx.commit()?;
            Ok(Owned::Done(row))
        })
    }

    /// Drop `trainer` from the directory. The account and its ratings stay.
    pub fn demote_trainer(&self, caller: UserId, trainer: UserId) -> Result<Owned<()>> {
        self.with_conn_mut(|conn| {
            let Some(row) = query_user_by_id(conn, trainer)?.filter(|u| u.role == Role::Trainer) else {
                return Ok(Owned::Missing);
            };
            if row.id != caller {
                return Ok(Owned::NotOwner);
            }
            conn.execute(
                "UPDATE users
                 SET role = 'member', specialties = '[]', certifications = '[]', hourly_rate = NULL
                 WHERE id = ?1",
                [trainer],
            )?;
            Ok(Owned::Done(()))
        })
    }
}

fn write_trainer_fields(conn: &Connection, row: &UserRow) -> Result<()> {
    conn.execute(
        "UPDATE users
         SET role = ?2, email = ?3, specialties = ?4, certifications = ?5, hourly_rate = ?6, bio = ?7
         WHERE id = ?1",
        rusqlite::params![
            row.id,
            row.role,
            row.email,
            to_json(&row.specialties)?,
            to_json(&row.certifications)?,
            row.hourly_rate,
            row.bio,
        ],
    )?;
    Ok(())
}

fn email_in_use(conn: &Connection, email: &str, except: Option<UserId>) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM users WHERE email = ?1 AND (?2 IS NULL OR id <> ?2)",
            rusqlite::params![email, except],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn query_user_by_id(conn: &Connection, id: UserId) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    conn.query_row(&sql, [id], map_user).optional()
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        role: row.get(4)?,
        display_name: row.get(5)?,
        avatar_url: row.get(6)?,
        bio: row.get(7)?,
        fitness_level: row.get(8)?,
        interests: json_column(row, 9)?,
        location: row.get(10)?,
        specialties: json_column(row, 11)?,
        certifications: json_column(row, 12)?,
        hourly_rate: row.get(13)?,
        average_rating: row.get(14)?,
        rating_count: row.get(15)?,
        created_at: row.get(16)?,
    })
}
