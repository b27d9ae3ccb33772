//! Plan and step persistence.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::utils::{
    json_at, optional_timestamp_at, optional_timestamp_str, parse_at, sql_count, timestamp_at,
    timestamp_str, to_json,
};
use crate::{
    error::{DatabaseResultExt, Result},
    models::{Plan, PlanFilter, PlanStatus, PlanStep},
};

const UPSERT_PLAN_SQL: &str = "INSERT INTO plans (id, goal, status, provider, created_at, updated_at, started_at, completed_at, current_step_index, error, metadata) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
     ON CONFLICT(id) DO UPDATE SET goal = excluded.goal, status = excluded.status, provider = excluded.provider, \
     updated_at = excluded.updated_at, started_at = excluded.started_at, completed_at = excluded.completed_at, \
     current_step_index = excluded.current_step_index, error = excluded.error, metadata = excluded.metadata";
const DELETE_PLAN_STEPS_SQL: &str = "DELETE FROM plan_steps WHERE plan_id = ?1";
const INSERT_STEP_SQL: &str = "INSERT INTO plan_steps (plan_id, position, id, name, description, inputs, outputs, challenges, mitigations, status, started_at, completed_at, error, result) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)";
const SELECT_PLAN_SQL: &str = "SELECT id, goal, status, provider, created_at, updated_at, started_at, completed_at, current_step_index, error, metadata FROM plans WHERE id = ?1";
const SELECT_STEPS_BY_PLAN_SQL: &str = "SELECT id, name, description, inputs, outputs, challenges, mitigations, status, started_at, completed_at, error, result FROM plan_steps WHERE plan_id = ?1 ORDER BY position";
const PLAN_COLUMNS: &str = "id, goal, status, provider, created_at, updated_at, started_at, completed_at, current_step_index, error, metadata";

/// Inserts or updates the plan row and rewrites its steps atomically.
pub(super) fn save_plan(conn: &mut Connection, plan: &Plan) -> Result<()> {
    let metadata = to_json(&plan.metadata)?;
    let current_step_index = plan.current_step_index.map(|index| index as i64);

    let tx = conn.transaction().db_context("Failed to begin transaction")?;

    tx.execute(
        UPSERT_PLAN_SQL,
        params![
            plan.id,
            plan.goal,
            plan.status.as_str(),
            plan.provider,
            timestamp_str(&plan.created_at),
            timestamp_str(&plan.updated_at),
            optional_timestamp_str(plan.started_at.as_ref()),
            optional_timestamp_str(plan.completed_at.as_ref()),
            current_step_index,
            plan.error,
            metadata,
        ],
    )
    .db_context("Failed to save plan")?;

    tx.execute(DELETE_PLAN_STEPS_SQL, params![plan.id])
        .db_context("Failed to clear plan steps")?;

    {
        let mut stmt = tx
            .prepare(INSERT_STEP_SQL)
            .db_context("Failed to prepare step insert")?;
        for (position, step) in plan.steps.iter().enumerate() {
            stmt.execute(params![
                plan.id,
                position as i64,
                step.id,
                step.name,
                step.description,
                to_json(&step.inputs)?,
                to_json(&step.outputs)?,
                to_json(&step.challenges)?,
                to_json(&step.mitigations)?,
                step.status.as_str(),
                optional_timestamp_str(step.started_at.as_ref()),
                optional_timestamp_str(step.completed_at.as_ref()),
                step.error,
                to_json(&step.result)?,
            ])
            .db_context("Failed to insert plan step")?;
        }
    }

    tx.commit().db_context("Failed to commit transaction")
}

fn build_plan_from_row(row: &Row) -> rusqlite::Result<Plan> {
    Ok(Plan {
        id: row.get(0)?,
        goal: row.get(1)?,
        status: parse_at(row, 2)?,
        provider: row.get(3)?,
        created_at: timestamp_at(row, 4)?,
        updated_at: timestamp_at(row, 5)?,
        started_at: optional_timestamp_at(row, 6)?,
        completed_at: optional_timestamp_at(row, 7)?,
        current_step_index: row
            .get::<_, Option<i64>>(8)?
            .map(|index| index as usize),
        error: row.get(9)?,
        metadata: json_at(row, 10)?,
        steps: Vec::new(),
    })
}

fn build_step_from_row(row: &Row) -> rusqlite::Result<PlanStep> {
    Ok(PlanStep {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        inputs: json_at(row, 3)?,
        outputs: json_at(row, 4)?,
        challenges: json_at(row, 5)?,
        mitigations: json_at(row, 6)?,
        status: parse_at(row, 7)?,
        started_at: optional_timestamp_at(row, 8)?,
        completed_at: optional_timestamp_at(row, 9)?,
        error: row.get(10)?,
        result: json_at(row, 11)?,
    })
}

fn load_steps(conn: &Connection, plan_id: &str) -> Result<Vec<PlanStep>> {
    let mut stmt = conn
        .prepare_cached(SELECT_STEPS_BY_PLAN_SQL)
        .db_context("Failed to prepare step query")?;
    let steps = stmt
        .query_map(params![plan_id], build_step_from_row)
        .db_context("Failed to query plan steps")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .db_context("Failed to read plan steps")?;
    Ok(steps)
}

/// Runs a plan query and eagerly loads each plan's steps.
fn query_plans(conn: &Connection, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<Plan>> {
    let mut stmt = conn.prepare(sql).db_context("Failed to prepare query")?;
    let mut plans = stmt
        .query_map(args, build_plan_from_row)
        .db_context("Failed to query plans")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .db_context("Failed to read plans")?;

    for plan in &mut plans {
        plan.steps = load_steps(conn, &plan.id)?;
    }
    Ok(plans)
}

pub(super) fn get_plan(conn: &Connection, id: &str) -> Result<Option<Plan>> {
    let mut plan = conn
        .query_row(SELECT_PLAN_SQL, params![id], build_plan_from_row)
        .optional()
        .db_context("Failed to query plan")?;

    if let Some(ref mut plan) = plan {
        plan.steps = load_steps(conn, &plan.id)?;
    }
    Ok(plan)
}

pub(super) fn get_plans(conn: &Connection, filter: &PlanFilter) -> Result<Vec<Plan>> {
    let limit = sql_count(filter.limit);
    let skip = sql_count(filter.skip);

    match filter.status {
        Some(status) => query_plans(
            conn,
            &format!(
                "SELECT {PLAN_COLUMNS} FROM plans WHERE status = ?1 \
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3"
            ),
            &[&status.as_str(), &limit, &skip],
        ),
        None => query_plans(
            conn,
            &format!(
                "SELECT {PLAN_COLUMNS} FROM plans \
                 ORDER BY created_at DESC, rowid DESC LIMIT ?1 OFFSET ?2"
            ),
            &[&limit, &skip],
        ),
    }
}

pub(super) fn get_active_plans(conn: &Connection) -> Result<Vec<Plan>> {
    let placeholders = PlanStatus::ACTIVE
        .iter()
        .map(|status| format!("'{}'", status.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    query_plans(
        conn,
        &format!(
            "SELECT {PLAN_COLUMNS} FROM plans WHERE status IN ({placeholders}) \
             ORDER BY created_at DESC, rowid DESC"
        ),
        &[],
    )
}
