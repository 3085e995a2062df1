use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};

use crate::server::db::{GrantIdent, GrantRecord};
use crate::time::current_timestamp;
use crate::types::grant::GrantStatus;
use crate::types::request::Query;

// Note: access_grant_resource carries no foreign key to resource on purpose.
// Deleting a resource must not silently delete grants referencing it.
const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS access_grant (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user TEXT,
    email TEXT,
    token TEXT,
    status TEXT NOT NULL,
    enabled INTEGER NOT NULL,
    recursive INTEGER NOT NULL,
    start_time INTEGER,
    end_time INTEGER,
    create_time INTEGER NOT NULL,
    update_time INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_grant_user ON access_grant(user);
CREATE INDEX IF NOT EXISTS idx_grant_email ON access_grant(email);
CREATE UNIQUE INDEX IF NOT EXISTS idx_grant_token ON access_grant(token);

CREATE TABLE IF NOT EXISTS access_grant_resource (
    grant_id INTEGER NOT NULL REFERENCES access_grant(id) ON DELETE CASCADE,
    resource_id INTEGER NOT NULL,
    PRIMARY KEY (grant_id, resource_id)
);

CREATE INDEX IF NOT EXISTS idx_grant_resource ON access_grant_resource(resource_id);
"#;

const SELECT_FIELDS: &str =
    "id, user, email, token, status, enabled, recursive, start_time, end_time, create_time, update_time";

pub fn create_grant_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLES)?;
    Ok(())
}

pub fn create_grant(tx: &Transaction, mut grant: GrantRecord) -> Result<GrantRecord> {
    let now = current_timestamp();
    grant.enabled = grant.status == GrantStatus::Accepted;
    tx.execute(
        "INSERT INTO access_grant (user, email, token, status, enabled, recursive, start_time, end_time, create_time, update_time)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            grant.user,
            grant.email,
            grant.token,
            grant.status,
            grant.enabled,
            grant.recursive,
            grant.start_time,
            grant.end_time,
            now,
            now
        ],
    )?;
    grant.id = tx.last_insert_rowid() as u64;
    grant.create_time = now;
    grant.update_time = now;

    insert_resource_links(tx, grant.id, &grant.resources)?;
    Ok(grant)
}

pub fn get_grant(tx: &Transaction, id: u64) -> Result<Option<GrantRecord>> {
    let sql = format!("SELECT {SELECT_FIELDS} FROM access_grant WHERE id = ?");
    let mut stmt = tx.prepare(&sql)?;
    let grant = stmt
        .query_row(params![id], |row| row_to_grant(row))
        .optional()?;

    match grant {
        Some(mut grant) => {
            grant.resources = list_resource_links(tx, grant.id)?;
            Ok(Some(grant))
        }
        None => Ok(None),
    }
}

pub fn list_grants(tx: &Transaction, query: Query) -> Result<Vec<GrantRecord>> {
    let where_clause = query.generate_where();
    let limit_clause = query.generate_limit();
    let params = query.params();

    let sql = format!(
        "SELECT {SELECT_FIELDS} FROM access_grant {where_clause} ORDER BY id DESC {limit_clause}"
    );
    let mut stmt = tx.prepare(&sql)?;
    let mut grants = stmt
        .query_map(params_from_iter(params.iter()), |row| row_to_grant(row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for grant in grants.iter_mut() {
        grant.resources = list_resource_links(tx, grant.id)?;
    }
    Ok(grants)
}

pub fn update_grant(tx: &Transaction, grant: &GrantRecord) -> Result<()> {
    let enabled = grant.status == GrantStatus::Accepted;
    tx.execute(
        "UPDATE access_grant SET user = ?, email = ?, token = ?, status = ?, enabled = ?,
         recursive = ?, start_time = ?, end_time = ?, update_time = ? WHERE id = ?",
        params![
            grant.user,
            grant.email,
            grant.token,
            grant.status,
            enabled,
            grant.recursive,
            grant.start_time,
            grant.end_time,
            current_timestamp(),
            grant.id
        ],
    )?;

    tx.execute(
        "DELETE FROM access_grant_resource WHERE grant_id = ?",
        params![grant.id],
    )?;
    insert_resource_links(tx, grant.id, &grant.resources)?;
    Ok(())
}

pub fn update_grant_status(tx: &Transaction, id: u64, status: GrantStatus) -> Result<()> {
    let enabled = status == GrantStatus::Accepted;
    tx.execute(
        "UPDATE access_grant SET status = ?, enabled = ?, update_time = ? WHERE id = ?",
        params![status, enabled, current_timestamp(), id],
    )?;
    Ok(())
}

pub fn delete_grant(tx: &Transaction, id: u64) -> Result<()> {
    tx.execute("DELETE FROM access_grant WHERE id = ?", params![id])?;
    Ok(())
}

pub fn is_token_exists(tx: &Transaction, token: &str) -> Result<bool> {
    let mut stmt = tx.prepare("SELECT COUNT(*) FROM access_grant WHERE token = ?")?;
    let count: i64 = stmt.query_row(params![token], |row| row.get(0))?;
    Ok(count > 0)
}

pub fn find_enabled_grants(
    tx: &Transaction,
    ident: &GrantIdent,
    resources: &[u64],
    recursive_only: bool,
) -> Result<Vec<GrantRecord>> {
    if ident.is_empty() || resources.is_empty() {
        return Ok(vec![]);
    }

    let mut ident_clause = vec![];
    let mut params: Vec<Value> = vec![];
    if let Some(ref user) = ident.user {
        ident_clause.push("g.user = ?");
        params.push(Value::Text(user.clone()));
    }
    if let Some(ref email) = ident.email {
        ident_clause.push("g.email = ?");
        params.push(Value::Text(email.clone()));
    }
    if let Some(ref token) = ident.token {
        ident_clause.push("g.token = ?");
        params.push(Value::Text(token.clone()));
    }
    let ident_clause = ident_clause.join(" OR ");

    let placeholders = vec!["?"; resources.len()].join(",");
    params.extend(resources.iter().map(|id| Value::Integer(*id as i64)));

    let recursive_clause = if recursive_only {
        "AND g.recursive = 1"
    } else {
        ""
    };

    let sql = format!(
        "SELECT DISTINCT g.id, g.user, g.email, g.token, g.status, g.enabled, g.recursive,
             g.start_time, g.end_time, g.create_time, g.update_time
         FROM access_grant g
         JOIN access_grant_resource gr ON gr.grant_id = g.id
         WHERE g.enabled = 1 AND ({ident_clause}) AND gr.resource_id IN ({placeholders})
         {recursive_clause} ORDER BY g.id ASC"
    );
    let mut stmt = tx.prepare(&sql)?;
    let mut grants = stmt
        .query_map(params_from_iter(params), |row| row_to_grant(row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for grant in grants.iter_mut() {
        grant.resources = list_resource_links(tx, grant.id)?;
    }
    Ok(grants)
}

fn insert_resource_links(tx: &Transaction, grant_id: u64, resources: &[u64]) -> Result<()> {
    for resource in resources {
        tx.execute(
            "INSERT OR IGNORE INTO access_grant_resource (grant_id, resource_id) VALUES (?, ?)",
            params![grant_id, resource],
        )?;
    }
    Ok(())
}

fn list_resource_links(tx: &Transaction, grant_id: u64) -> Result<Vec<u64>> {
    let mut stmt = tx.prepare(
        "SELECT resource_id FROM access_grant_resource WHERE grant_id = ? ORDER BY resource_id ASC",
    )?;
    let ids = stmt
        .query_map(params![grant_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<u64>>>()?;
    Ok(ids)
}

fn row_to_grant(row: &rusqlite::Row) -> rusqlite::Result<GrantRecord> {
    Ok(GrantRecord {
        id: row.get(0)?,
        user: row.get(1)?,
        email: row.get(2)?,
        token: row.get(3)?,
        status: row.get(4)?,
        enabled: row.get(5)?,
        recursive: row.get(6)?,
        resources: vec![],
        start_time: row.get(7)?,
        end_time: row.get(8)?,
        create_time: row.get(9)?,
        update_time: row.get(10)?,
    })
}
