use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Row;

use fitmeet_types::{MessageId, PublicProfile, UserId};

use crate::Database;
use crate::models::{ConversationRow, MessageRow};

impl Database {
    pub fn insert_message(
        &self,
        id: MessageId,
        sender: UserId,
        recipient: UserId,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (id, sender_id, recipient_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, sender, recipient, content, now],
            )?;
            Ok(MessageRow {
                id,
                sender_id: sender,
                recipient_id: recipient,
                content: content.to_string(),
                created_at: now,
            })
        })
    }

    /// Messages exchanged between `user` and `other`, newest first.
    ///
    /// `before` pages backwards from the oldest message already seen, given
    /// as its `(created_at, id)`. Messages sharing that timestamp but sorting
    /// below the id still come through. Without an id the cursor is a plain
    /// timestamp and excludes everything sent at that instant.
    pub fn get_thread(
        &self,
        user: UserId,
        other: UserId,
        limit: u32,
        before: Option<(DateTime<Utc>, Option<MessageId>)>,
    ) -> Result<Vec<MessageRow>> {
        let (before_at, before_id) = match before {
            Some((at, id)) => (Some(at), id),
            None => (None, None),
        };
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, sender_id, recipient_id, content, created_at
                 FROM messages
                 WHERE ((sender_id = ?1 AND recipient_id = ?2)
                     OR (sender_id = ?2 AND recipient_id = ?1))
                   AND (?3 IS NULL
                        OR created_at < ?3
                        OR (created_at = ?3 AND ?4 IS NOT NULL AND id < ?4))
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?5",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![user, other, before_at, before_id, limit], |row| map_message(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// The inbox: one row per counterpart of `user`, holding the most recent
    /// message exchanged with them, most recent conversation first.
    pub fn get_conversations(&self, user: UserId) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "WITH mine AS (
                     SELECT id, sender_id, recipient_id, content, created_at,
                            CASE WHEN sender_id = ?1 THEN recipient_id ELSE sender_id END AS partner_id
                     FROM messages
                     WHERE sender_id = ?1 OR recipient_id = ?1
                 ),
                 ranked AS (
                     SELECT *,
                            ROW_NUMBER() OVER (
                                PARTITION BY partner_id
                                ORDER BY created_at DESC, id DESC
                            ) AS rn
                     FROM mine
                 )
                 SELECT r.id, r.sender_id, r.recipient_id, r.content, r.created_at,
                        u.id, u.display_name, u.avatar_url
                 FROM ranked r
                 JOIN users u ON u.id = r.partner_id
                 WHERE r.rn = 1
                 ORDER BY r.created_at DESC, r.id DESC",
            )?;

            let rows = stmt
                .query_map([user], |row| {
                    Ok(ConversationRow {
                        last_message: map_message(row, 0)?,
                        partner: PublicProfile {
                            id: row.get(5)?,
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

fn map_message(row: &Row<'_>, offset: usize) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(offset)?,
        sender_id: row.get(offset + 1)?,
        recipient_id: row.get(offset + 2)?,
        content: row.get(offset + 3)?,
        created_at: row.get(offset + 4)?,
    })
}
