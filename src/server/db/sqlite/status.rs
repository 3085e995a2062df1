use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};

use crate::server::db::{DatePolicy, LevelPolicy, StatusRecord, SweepPattern, WriteScope};
use crate::time::current_timestamp;
use crate::types::level::{AccessLevel, LEVEL_ORDER};

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS access_status (
    resource_id INTEGER PRIMARY KEY REFERENCES resource(id) ON DELETE CASCADE,
    level TEXT NOT NULL,
    embargo_start INTEGER,
    embargo_end INTEGER,
    update_time INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_status_level ON access_status(level);
CREATE INDEX IF NOT EXISTS idx_status_embargo_end ON access_status(embargo_end);
"#;

const SELECT_FIELDS: &str = "resource_id, level, embargo_start, embargo_end, update_time";

pub fn create_status_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLES)?;
    Ok(())
}

pub fn upsert_status(tx: &Transaction, status: StatusRecord) -> Result<()> {
    tx.execute(
        "INSERT INTO access_status (resource_id, level, embargo_start, embargo_end, update_time)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT (resource_id) DO UPDATE SET
             level = excluded.level,
             embargo_start = excluded.embargo_start,
             embargo_end = excluded.embargo_end,
             update_time = excluded.update_time",
        params![
            status.resource,
            status.level,
            status.embargo_start,
            status.embargo_end,
            current_timestamp()
        ],
    )?;
    Ok(())
}

pub fn get_status(tx: &Transaction, resource: u64) -> Result<Option<StatusRecord>> {
    let sql = format!("SELECT {SELECT_FIELDS} FROM access_status WHERE resource_id = ?");
    let mut stmt = tx.prepare(&sql)?;
    let status = stmt
        .query_row(params![resource], |row| {
            Ok(StatusRecord {
                resource: row.get(0)?,
                level: row.get(1)?,
                embargo_start: row.get(2)?,
                embargo_end: row.get(3)?,
                update_time: row.get(4)?,
            })
        })
        .optional()?;
    Ok(status)
}

pub fn list_statuses(tx: &Transaction, limit: usize, offset: usize) -> Result<Vec<StatusRecord>> {
    let sql = format!(
        "SELECT {SELECT_FIELDS} FROM access_status ORDER BY resource_id ASC LIMIT ? OFFSET ?"
    );
    let mut stmt = tx.prepare(&sql)?;
    let statuses = stmt
        .query_map(params![limit, offset], |row| {
            Ok(StatusRecord {
                resource: row.get(0)?,
                level: row.get(1)?,
                embargo_start: row.get(2)?,
                embargo_end: row.get(3)?,
                update_time: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(statuses)
}

pub fn delete_status(tx: &Transaction, resource: u64) -> Result<()> {
    tx.execute(
        "DELETE FROM access_status WHERE resource_id = ?",
        params![resource],
    )?;
    Ok(())
}

pub fn count_statuses(tx: &Transaction) -> Result<usize> {
    let mut stmt = tx.prepare("SELECT COUNT(*) FROM access_status")?;
    let count: i64 = stmt.query_row([], |row| row.get(0))?;
    Ok(count as usize)
}

pub fn backfill_statuses(
    tx: &Transaction,
    public_level: AccessLevel,
    private_level: AccessLevel,
) -> Result<usize> {
    let count = tx.execute(
        "INSERT INTO access_status (resource_id, level, embargo_start, embargo_end, update_time)
         SELECT r.id, CASE WHEN r.public = 1 THEN ? ELSE ? END, NULL, NULL, ?
         FROM resource r
         LEFT JOIN access_status s ON s.resource_id = r.id
         WHERE s.resource_id IS NULL
         ON CONFLICT (resource_id) DO NOTHING",
        params![public_level, private_level, current_timestamp()],
    )?;
    Ok(count)
}

pub fn cascade_children(
    tx: &Transaction,
    parent: u64,
    status: &StatusRecord,
    scope: &WriteScope,
) -> Result<usize> {
    let selector = "r.parent_id = ?".to_string();
    cascade(tx, &selector, vec![Value::Integer(parent as i64)], status, scope)
}

pub fn cascade_grandchildren(
    tx: &Transaction,
    root: u64,
    status: &StatusRecord,
    scope: &WriteScope,
) -> Result<usize> {
    let selector = "r.parent_id IN (SELECT id FROM resource WHERE parent_id = ?)".to_string();
    cascade(tx, &selector, vec![Value::Integer(root as i64)], status, scope)
}

fn cascade(
    tx: &Transaction,
    selector: &str,
    selector_params: Vec<Value>,
    status: &StatusRecord,
    scope: &WriteScope,
) -> Result<usize> {
    let (scope_cond, scope_params) = scope.sql_condition("r");
    let sql = format!(
        "INSERT INTO access_status (resource_id, level, embargo_start, embargo_end, update_time)
         SELECT r.id, ?, ?, ?, ? FROM resource r
         WHERE {selector} AND {scope_cond}
         ON CONFLICT (resource_id) DO UPDATE SET
             level = excluded.level,
             embargo_start = excluded.embargo_start,
             embargo_end = excluded.embargo_end,
             update_time = excluded.update_time"
    );

    let mut params: Vec<Value> = vec![
        Value::Text(status.level.as_str().to_string()),
        optional_integer(status.embargo_start),
        optional_integer(status.embargo_end),
        Value::Integer(current_timestamp() as i64),
    ];
    params.extend(selector_params);
    params.extend(scope_params);

    let count = tx.execute(&sql, params_from_iter(params))?;
    Ok(count)
}

pub fn sweep_statuses(
    tx: &Transaction,
    pattern: SweepPattern,
    level_policy: LevelPolicy,
    date_policy: DatePolicy,
    now: u64,
) -> Result<usize> {
    if level_policy == LevelPolicy::Keep && date_policy == DatePolicy::Keep {
        return Ok(0);
    }

    let where_clause = match pattern {
        SweepPattern::StartOnly => {
            "embargo_start IS NOT NULL AND embargo_end IS NULL AND embargo_start <= ?"
        }
        SweepPattern::EndOnly => {
            "embargo_start IS NULL AND embargo_end IS NOT NULL AND embargo_end < ?"
        }
        SweepPattern::BothPastEnd => {
            "embargo_start IS NOT NULL AND embargo_end IS NOT NULL AND embargo_end <= ?"
        }
    };

    let level_expr = match level_policy {
        LevelPolicy::Free => format!("'{}'", AccessLevel::Free.as_str()),
        LevelPolicy::Under => step_down_case(),
        LevelPolicy::Keep => "level".to_string(),
    };
    let (start_expr, end_expr) = match date_policy {
        DatePolicy::Clear => ("NULL", "NULL"),
        DatePolicy::Keep => ("embargo_start", "embargo_end"),
    };

    let sql = format!(
        "UPDATE access_status SET level = {level_expr}, embargo_start = {start_expr},
         embargo_end = {end_expr}, update_time = ? WHERE {where_clause}"
    );
    let count = tx.execute(&sql, params![now, now])?;
    Ok(count)
}

/// SQL CASE expression implementing the step-down table of [`AccessLevel`].
fn step_down_case() -> String {
    let mut case = String::from("CASE level");
    for level in LEVEL_ORDER {
        case.push_str(&format!(
            " WHEN '{}' THEN '{}'",
            level.as_str(),
            level.step_down().as_str()
        ));
    }
    case.push_str(" ELSE level END");
    case
}

fn optional_integer(value: Option<u64>) -> Value {
    match value {
        Some(v) => Value::Integer(v as i64),
        None => Value::Null,
    }
}
