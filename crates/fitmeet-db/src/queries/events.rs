use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use tracing::debug;

use fitmeet_types::api::{CreateEventRequest, UpdateEventRequest};
use fitmeet_types::{EventId, UserId};

use super::OptionalExt;
use crate::Database;
use crate::models::{EventRow, JoinOutcome, LeaveOutcome, Owned};

const EVENT_COLUMNS: &str = "id, host_id, name, description, activity_type, starts_at, \
     duration_minutes, location, latitude, longitude, max_participants, participant_count, created_at";

impl Database {
    pub fn create_event(
        &self,
        id: EventId,
        host: UserId,
        req: &CreateEventRequest,
        now: DateTime<Utc>,
    ) -> Result<EventRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO events (id, host_id, name, description, activity_type, starts_at,
                     duration_minutes, location, latitude, longitude, max_participants, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    id,
                    host,
                    req.name,
                    req.description,
                    req.activity_type,
                    req.starts_at,
                    req.duration_minutes,
                    req.location,
                    req.latitude,
                    req.longitude,
                    req.max_participants,
                    now,
                ],
            )?;
            query_event(conn, id)?.ok_or_else(|| anyhow::anyhow!("Event {} vanished after insert", id))
        })
    }

    pub fn get_event(&self, id: EventId) -> Result<Option<EventRow>> {
        self.with_conn(|conn| query_event(conn, id))
    }

    /// Events ordered by start time. `starting_after` keeps only events that
    /// start at or after the given instant.
    pub fn list_events(
        &self,
        activity_type: Option<&str>,
        starting_after: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<EventRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM events
                 WHERE (?1 IS NULL OR lower(activity_type) = lower(?1))
                   AND (?2 IS NULL OR starts_at >= ?2)
                 ORDER BY starts_at ASC
                 LIMIT ?3",
                EVENT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut events = stmt
                .query_map(rusqlite::params![activity_type, starting_after, limit], map_event)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            // One participants query for the whole page (no N+1)
            let ids: Vec<EventId> = events.iter().map(|e| e.id).collect();
            let mut by_event = participants_for_events(conn, &ids)?;
            for event in &mut events {
                event.participants = by_event.remove(&event.id).unwrap_or_default();
            }

            Ok(events)
        })
    }

    /// Host-only partial update. Capacity may not drop below the number of
    /// people already signed up.
    pub fn update_event(
        &self,
        caller: UserId,
        id: EventId,
        changes: &UpdateEventRequest,
    ) -> Result<Owned<EventRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(mut event) = query_event(&tx, id)? else {
                return Ok(Owned::Missing);
            };
            if event.host_id != caller {
                return Ok(Owned::NotOwner);
            }

            if let Some(max) = changes.max_participants {
                if max < event.participant_count {
                    return Ok(Owned::Conflict(
                        "max_participants cannot be lower than the current participant count",
                    ));
                }
                event.max_participants = max;
            }
            if let Some(name) = &changes.name {
                event.name = name.clone();
            }
            if let Some(description) = &changes.description {
                event.description = Some(description.clone());
            }
            if let Some(activity_type) = &changes.activity_type {
                event.activity_type = Some(activity_type.clone());
            }
            if let Some(starts_at) = changes.starts_at {
                event.starts_at = starts_at;
            }
            if let Some(duration) = changes.duration_minutes {
                event.duration_minutes = duration;
            }
            if let Some(location) = &changes.location {
                event.location = location.clone();
            }
            if let Some(latitude) = changes.latitude {
                event.latitude = Some(latitude);
            }
            if let Some(longitude) = changes.longitude {
                event.longitude = Some(longitude);
            }

            tx.execute(
                "UPDATE events
                 SET name = ?2, description = ?3, activity_type = ?4, starts_at = ?5,
                     duration_minutes = ?6, location = ?7, latitude = ?8, longitude = ?9,
                     max_participants = ?10
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    event.name,
                    event.description,
                    event.activity_type,
                    event.starts_at,
                    event.duration_minutes,
                    event.location,
                    event.latitude,
                    event.longitude,
                    event.max_participants,
                ],
            )?;
            tx.commit()?;
            Ok(Owned::Done(event))
        })
    }

    /// Host-only delete. Participant rows go with the event.
    pub fn delete_event(&self, caller: UserId, id: EventId) -> Result<Owned<()>> {
        self.with_conn_mut(|conn| {
            let host: Option<UserId> = conn
                .query_row("SELECT host_id FROM events WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;
            match host {
                None => Ok(Owned::Missing),
                Some(host) if host != caller => Ok(Owned::NotOwner),
                Some(_) => {
                    conn.execute("DELETE FROM events WHERE id = ?1", [id])?;
                    Ok(Owned::Done(()))
                }
            }
        })
    }

    /// Add `user` to the event's participants.
    ///
    /// The duplicate check is the participants primary key and the capacity
    /// check is a conditional increment, both inside one transaction: if the
    /// increment matches no row the insert is rolled back.
    pub fn join_event(&self, id: EventId, user: UserId, now: DateTime<Utc>) -> Result<JoinOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let exists = tx
                .query_row("SELECT 1 FROM events WHERE id = ?1", [id], |_| Ok(()))
                .optional()?
                .is_some();
            if !exists {
                return Ok(JoinOutcome::NotFound);
            }

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO event_participants (event_id, user_id, joined_at)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![id, user, now],
            )?;
            if inserted == 0 {
                return Ok(JoinOutcome::AlreadyJoined);
            }

            let claimed = tx.execute(
                "UPDATE events SET participant_count = participant_count + 1
                 WHERE id = ?1 AND participant_count < max_participants",
                [id],
            )?;
            if claimed == 0 {
                debug!("Event {} is full, rejecting {}", id, user);
                return Ok(JoinOutcome::Full);
            }

            let event = query_event(&tx, id)?
                .ok_or_else(|| anyhow::anyhow!("Event {} vanished during join", id))?;
            tx.commit()?;
            Ok(JoinOutcome::Joined(event))
        })
    }

    pub fn leave_event(&self, id: EventId, user: UserId) -> Result<LeaveOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let exists = tx
                .query_row("SELECT 1 FROM events WHERE id = ?1", [id], |_| Ok(()))
                .optional()?
                .is_some();
            if !exists {
                return Ok(LeaveOutcome::NotFound);
            }

            let removed = tx.execute(
                "DELETE FROM event_participants WHERE event_id = ?1 AND user_id = ?2",
                rusqlite::params![id, user],
            )?;
            if removed == 0 {
                return Ok(LeaveOutcome::NotJoined);
            }
            tx.execute(
                "UPDATE events SET participant_count = participant_count - 1 WHERE id = ?1",
                [id],
            )?;

            let event = query_event(&tx, id)?
                .ok_or_else(|| anyhow::anyhow!("Event {} vanished during leave", id))?;
            tx.commit()?;
            Ok(LeaveOutcome::Left(event))
        })
    }
}

fn query_event(conn: &Connection, id: EventId) -> Result<Option<EventRow>> {
    let sql = format!("SELECT {} FROM events WHERE id = ?1", EVENT_COLUMNS);
    let Some(mut event) = conn.query_row(&sql, [id], map_event).optional()? else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT user_id FROM event_participants WHERE event_id = ?1 ORDER BY joined_at, rowid",
    )?;
    event.participants = stmt
        .query_map([id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Some(event))
}

/// Batch-fetch participants for a set of events, keyed by event.
fn participants_for_events(conn: &Connection, ids: &[EventId]) -> Result<HashMap<EventId, Vec<UserId>>> {
    let mut grouped: HashMap<EventId, Vec<UserId>> = HashMap::new();
    if ids.is_empty() {
        return Ok(grouped);
    }

    let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT event_id, user_id FROM event_participants
         WHERE event_id IN ({})
         ORDER BY joined_at, rowid",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn rusqlite::types::ToSql> =
        ids.iter().map(|id| id as &dyn rusqlite::types::ToSql).collect();

    let pairs = stmt
        .query_map(params.as_slice(), |row| Ok((row.get::<_, EventId>(0)?, row.get::<_, UserId>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for (event_id, user_id) in pairs {
        grouped.entry(event_id).or_default().push(user_id);
    }
    Ok(grouped)
}

fn map_event(row: &Row<'_>) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        id: row.get(0)?,
        host_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        activity_type: row.get(4)?,
        starts_at: row.get(5)?,
        duration_minutes: row.get(6)?,
        location: row.get(7)?,
        latitude: row.get(8)?,
        longitude: row.get(9)?,
        max_participants: row.get(10)?,
        participant_count: row.get(11)?,
        participants: Vec::new(),
        created_at: row.get(12)?,
    })
}
