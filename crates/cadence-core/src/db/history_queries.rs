//! Append-only history persistence.

use rusqlite::{params, Connection, Row, ToSql};

use super::utils::{json_at, parse_at, sql_count, timestamp_at, timestamp_str, to_json};
use crate::{
    error::{DatabaseResultExt, Result},
    models::{history::PLAN_ID_KEY, EntityType, HistoryEntry, HistoryFilter},
};

const INSERT_HISTORY_SQL: &str = "INSERT OR IGNORE INTO history (id, timestamp, entity_type, entity_id, action, details, metadata, plan_id) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";
const HISTORY_COLUMNS: &str = "id, timestamp, entity_type, entity_id, action, details, metadata";

/// Stores the entry. Returns false when an entry with the same id exists.
pub(super) fn add_history_entry(conn: &mut Connection, entry: &HistoryEntry) -> Result<bool> {
    // plan entries index themselves; step entries carry their plan in metadata
    let plan_id = match entry.entity_type {
        EntityType::Plan => Some(entry.entity_id.clone()),
        EntityType::Step | EntityType::Task => entry
            .metadata
            .get(PLAN_ID_KEY)
            .and_then(|v| v.as_str())
            .map(String::from),
    };

    let inserted = conn
        .execute(
            INSERT_HISTORY_SQL,
            params![
                entry.id,
                timestamp_str(&entry.timestamp),
                entry.entity_type.as_str(),
                entry.entity_id,
                entry.action.as_str(),
                entry.details,
                to_json(&entry.metadata)?,
                plan_id,
            ],
        )
        .db_context("Failed to insert history entry")?;
    Ok(inserted == 1)
}

fn build_entry_from_row(row: &Row) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        id: row.get(0)?,
        timestamp: timestamp_at(row, 1)?,
        entity_type: parse_at(row, 2)?,
        entity_id: row.get(3)?,
        action: parse_at(row, 4)?,
        details: row.get(5)?,
        metadata: json_at(row, 6)?,
    })
}

fn query_history(conn: &Connection, sql: &str, args: &[&dyn ToSql]) -> Result<Vec<HistoryEntry>> {
    let mut stmt = conn.prepare(sql).db_context("Failed to prepare query")?;
    let entries = stmt
        .query_map(args, build_entry_from_row)
        .db_context("Failed to query history")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .db_context("Failed to read history")?;
    Ok(entries)
}

pub(super) fn get_history(conn: &Connection, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>> {
    let mut conditions = Vec::new();
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(entity_type) = filter.entity_type {
        conditions.push("entity_type = ?");
        args.push(Box::new(entity_type.as_str()));
    }
    if let Some(ref entity_id) = filter.entity_id {
        conditions.push("entity_id = ?");
        args.push(Box::new(entity_id.clone()));
    }

    let mut query = format!("SELECT {HISTORY_COLUMNS} FROM history");
    if !conditions.is_empty() {
        query.push_str(" WHERE ");
        query.push_str(&conditions.join(" AND "));
    }
    query.push_str(" ORDER BY timestamp DESC, rowid DESC LIMIT ? OFFSET ?");
    args.push(Box::new(sql_count(filter.limit)));
    args.push(Box::new(sql_count(filter.skip)));

    let arg_refs: Vec<&dyn ToSql> = args.iter().map(|b| &**b).collect();
    query_history(conn, &query, &arg_refs)
}

pub(super) fn get_plan_history(
    conn: &Connection,
    plan_id: &str,
    limit: usize,
) -> Result<Vec<HistoryEntry>> {
    query_history(
        conn,
        &format!(
            "SELECT {HISTORY_COLUMNS} FROM history WHERE plan_id = ?1 \
             ORDER BY timestamp DESC, rowid DESC LIMIT ?2"
        ),
        &[&plan_id, &sql_count(limit)],
    )
}

pub(super) fn get_task_history(
    conn: &Connection,
    task_id: &str,
    limit: usize,
) -> Result<Vec<HistoryEntry>> {
    query_history(
        conn,
        &format!(
            "SELECT {HISTORY_COLUMNS} FROM history WHERE entity_type = 'task' AND entity_id = ?1 \
             ORDER BY timestamp DESC, rowid DESC LIMIT ?2"
        ),
        &[&task_id, &sql_count(limit)],
    )
}
