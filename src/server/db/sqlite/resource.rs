use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::server::db::ResourceRecord;
use crate::time::current_timestamp;

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS resource (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    parent_id INTEGER REFERENCES resource(id) ON DELETE SET NULL,
    public INTEGER NOT NULL,
    owner TEXT NOT NULL,
    create_time INTEGER NOT NULL,
    update_time INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_resource_parent ON resource(parent_id);
CREATE INDEX IF NOT EXISTS idx_resource_owner ON resource(owner);
"#;

const SELECT_FIELDS: &str = "id, kind, parent_id, public, owner, create_time, update_time";

pub fn create_resource_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLES)?;
    Ok(())
}

pub fn create_resource(tx: &Transaction, mut resource: ResourceRecord) -> Result<ResourceRecord> {
    let now = current_timestamp();
    tx.execute(
        "INSERT INTO resource (kind, parent_id, public, owner, create_time, update_time) VALUES (?, ?, ?, ?, ?, ?)",
        params![
            resource.kind,
            resource.parent,
            resource.public,
            resource.owner,
            now,
            now
        ],
    )?;
    resource.id = tx.last_insert_rowid() as u64;
    resource.create_time = now;
    resource.update_time = now;
    Ok(resource)
}

pub fn get_resource(tx: &Transaction, id: u64) -> Result<Option<ResourceRecord>> {
    let sql = format!("SELECT {SELECT_FIELDS} FROM resource WHERE id = ?");
    let mut stmt = tx.prepare(&sql)?;
    let resource = stmt
        .query_row(params![id], |row| {
            Ok(ResourceRecord {
                id: row.get(0)?,
                kind: row.get(1)?,
                parent: row.get(2)?,
                public: row.get(3)?,
                owner: row.get(4)?,
                create_time: row.get(5)?,
                update_time: row.get(6)?,
            })
        })
        .optional()?;
    Ok(resource)
}

pub fn list_resources(tx: &Transaction) -> Result<Vec<ResourceRecord>> {
    let sql = format!("SELECT {SELECT_FIELDS} FROM resource ORDER BY id ASC");
    let mut stmt = tx.prepare(&sql)?;
    let resources = stmt
        .query_map([], |row| {
            Ok(ResourceRecord {
                id: row.get(0)?,
                kind: row.get(1)?,
                parent: row.get(2)?,
                public: row.get(3)?,
                owner: row.get(4)?,
                create_time: row.get(5)?,
                update_time: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(resources)
}

pub fn list_child_ids(tx: &Transaction, parent: u64) -> Result<Vec<u64>> {
    let mut stmt = tx.prepare("SELECT id FROM resource WHERE parent_id = ? ORDER BY id ASC")?;
    let ids = stmt
        .query_map([parent], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<u64>>>()?;
    Ok(ids)
}

pub fn update_resource_parent(tx: &Transaction, id: u64, parent: Option<u64>) -> Result<()> {
    tx.execute(
        "UPDATE resource SET parent_id = ?, update_time = ? WHERE id = ?",
        params![parent, current_timestamp(), id],
    )?;
    Ok(())
}

pub fn update_resource_visibility(tx: &Transaction, id: u64, public: bool) -> Result<()> {
    tx.execute(
        "UPDATE resource SET public = ?, update_time = ? WHERE id = ?",
        params![public, current_timestamp(), id],
    )?;
    Ok(())
}

pub fn delete_resource(tx: &Transaction, id: u64) -> Result<()> {
    tx.execute("DELETE FROM resource WHERE id = ?", params![id])?;
    Ok(())
}

pub fn count_resources(tx: &Transaction) -> Result<usize> {
    let mut stmt = tx.prepare("SELECT COUNT(*) FROM resource")?;
    let count: i64 = stmt.query_row([], |row| row.get(0))?;
    Ok(count as usize)
}
