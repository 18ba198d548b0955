use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};

use fitmeet_types::api::{CreatePlanRequest, UpdatePlanRequest};
use fitmeet_types::{PlanId, UserId};

use super::{OptionalExt, json_column, to_json};
use crate::Database;
use crate::models::{Owned, PlanRow};

const PLAN_COLUMNS: &str =
    "id, creator_id, name, description, difficulty, exercises, created_at, updated_at";

impl Database {
    pub fn create_plan(
        &self,
        id: PlanId,
        creator: UserId,
        req: &CreatePlanRequest,
        now: DateTime<Utc>,
    ) -> Result<PlanRow> {
        let exercises = to_json(&req.exercises)?;
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO workout_plans
                     (id, creator_id, name, description, difficulty, exercises, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                rusqlite::params![id, creator, req.name, req.description, req.difficulty, exercises, now],
            )?;
            query_plan(conn, id)?.ok_or_else(|| anyhow::anyhow!("Plan {} vanished after insert", id))
        })
    }

    pub fn get_plan(&self, id: PlanId) -> Result<Option<PlanRow>> {
        self.with_conn(|conn| query_plan(conn, id))
    }

    /// Newest first, optionally only one creator's plans.
    pub fn list_plans(&self, creator: Option<UserId>, limit: u32) -> Result<Vec<PlanRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM workout_plans
                 WHERE (?1 IS NULL OR creator_id = ?1)
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2",
                PLAN_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![creator, limit], map_plan)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_plan(
        &self,
        caller: UserId,
        id: PlanId,
        changes: &UpdatePlanRequest,
        now: DateTime<Utc>,
    ) -> Result<Owned<PlanRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(mut plan) = query_plan(&tx, id)? else {
                return Ok(Owned::Missing);
            };
            if plan.creator_id != caller {
                return Ok(Owned::NotOwner);
            }

            if let Some(name) = &changes.name {
                plan.name = name.clone();
            }
            if let Some(description) = &changes.description {
                plan.description = Some(description.clone());
            }
            if let Some(difficulty) = &changes.difficulty {
                plan.difficulty = Some(difficulty.clone());
            }
            if let Some(exercises) = &changes.exercises {
                plan.exercises = exercises.clone();
            }
            plan.updated_at = now;

            tx.execute(
                "UPDATE workout_plans
                 SET name = ?2, description = ?3, difficulty = ?4, exercises = ?5, updated_at = ?6
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    plan.name,
                    plan.description,
                    plan.difficulty,
                    to_json(&plan.exercises)?,
                    plan.updated_at,
                ],
            )?;
            tx.commit()?;
            Ok(Owned::Done(plan))
        })
    }

    pub fn delete_plan(&self, caller: UserId, id: PlanId) -> Result<Owned<()>> {
        self.with_conn_mut(|conn| {
            let creator: Option<UserId> = conn
                .query_row("SELECT creator_id FROM workout_plans WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;
            match creator {
                None => Ok(Owned::Missing),
                Some(creator) if creator != caller => Ok(Owned::NotOwner),
                Some(_) => {
                    conn.execute("DELETE FROM workout_plans WHERE id = ?1", [id])?;
                    Ok(Owned::Done(()))
                }
            }
        })
    }
}

fn query_plan(conn: &Connection, id: PlanId) -> Result<Option<PlanRow>> {
    let sql = format!("SELECT {} FROM workout_plans WHERE id = ?1", PLAN_COLUMNS);
    conn.query_row(&sql, [id], map_plan).optional()
}

fn map_plan(row: &Row<'_>) -> rusqlite::Result<PlanRow> {
    Ok(PlanRow {
        id: row.get(0)?,
        creator_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        difficulty: row.get(4)?,
        exercises: json_column(row, 5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
