//! Task persistence.

use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};

use super::utils::{
    json_at, optional_json_at, optional_timestamp_at, optional_timestamp_str, parse_at, sql_count,
    timestamp_at, timestamp_str, to_json,
};
use crate::{
    error::{DatabaseResultExt, Result},
    models::{Task, TaskFilter, TaskStatus},
};

const UPSERT_TASK_SQL: &str = "INSERT INTO tasks (id, description, plan_id, step_id, status, created_at, started_at, completed_at, result, error, environment_id, metadata) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
     ON CONFLICT(id) DO UPDATE SET description = excluded.description, plan_id = excluded.plan_id, step_id = excluded.step_id, \
     status = excluded.status, started_at = excluded.started_at, completed_at = excluded.completed_at, result = excluded.result, \
     error = excluded.error, environment_id = excluded.environment_id, metadata = excluded.metadata";
const TASK_COLUMNS: &str = "id, description, plan_id, step_id, status, created_at, started_at, completed_at, result, error, environment_id, metadata";

pub(super) fn save_task(conn: &mut Connection, task: &Task) -> Result<()> {
    let result = task.result.as_ref().map(to_json).transpose()?;

    conn.execute(
        UPSERT_TASK_SQL,
        params![
            task.id,
            task.description,
            task.plan_id,
            task.step_id,
            task.status.as_str(),
            timestamp_str(&task.created_at),
            optional_timestamp_str(task.started_at.as_ref()),
            optional_timestamp_str(task.completed_at.as_ref()),
            result,
            task.error,
            task.environment_id,
            to_json(&task.metadata)?,
        ],
    )
    .db_context("Failed to save task")?;
    Ok(())
}

fn build_task_from_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        description: row.get(1)?,
        plan_id: row.get(2)?,
        step_id: row.get(3)?,
        status: parse_at(row, 4)?,
        created_at: timestamp_at(row, 5)?,
        started_at: optional_timestamp_at(row, 6)?,
        completed_at: optional_timestamp_at(row, 7)?,
        result: optional_json_at(row, 8)?,
        error: row.get(9)?,
        environment_id: row.get(10)?,
        metadata: json_at(row, 11)?,
    })
}

fn query_tasks(conn: &Connection, sql: &str, args: &[&dyn ToSql]) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(sql).db_context("Failed to prepare query")?;
    let tasks = stmt
        .query_map(args, build_task_from_row)
        .db_context("Failed to query tasks")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .db_context("Failed to read tasks")?;
    Ok(tasks)
}

pub(super) fn get_task(conn: &Connection, id: &str) -> Result<Option<Task>> {
    conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
        params![id],
        build_task_from_row,
    )
    .optional()
    .db_context("Failed to query task")
}

pub(super) fn get_tasks(conn: &Connection, filter: &TaskFilter) -> Result<Vec<Task>> {
    let mut conditions = Vec::new();
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(ref plan_id) = filter.plan_id {
        conditions.push("plan_id = ?");
        args.push(Box::new(plan_id.clone()));
    }
    if let Some(status) = filter.status {
        conditions.push("status = ?");
        args.push(Box::new(status.as_str()));
    }

    let mut query = format!("SELECT {TASK_COLUMNS} FROM tasks");
    if !conditions.is_empty() {
        query.push_str(" WHERE ");
        query.push_str(&conditions.join(" AND "));
    }
    query.push_str(" ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?");
    args.push(Box::new(sql_count(filter.limit)));
    args.push(Box::new(sql_count(filter.skip)));

    let arg_refs: Vec<&dyn ToSql> = args.iter().map(|b| &**b).collect();
    query_tasks(conn, &query, &arg_refs)
}

pub(super) fn get_active_tasks(conn: &Connection, plan_id: Option<&str>) -> Result<Vec<Task>> {
    let statuses = TaskStatus::ACTIVE
        .iter()
        .map(|status| format!("'{}'", status.as_str()))
        .collect::<Vec<_>>()
        .join(", ");

    match plan_id {
        Some(plan_id) => query_tasks(
            conn,
            &format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE status IN ({statuses}) AND plan_id = ?1 \
                 ORDER BY created_at, rowid"
            ),
            &[&plan_id],
        ),
        None => query_tasks(
            conn,
            &format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE status IN ({statuses}) \
                 ORDER BY created_at, rowid"
            ),
            &[],
        ),
    }
}

pub(super) fn get_plan_tasks(conn: &Connection, plan_id: &str) -> Result<Vec<Task>> {
    query_tasks(
        conn,
        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE plan_id = ?1 ORDER BY created_at, rowid"),
        &[&plan_id],
    )
}
