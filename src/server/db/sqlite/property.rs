use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Transaction};

use crate::server::db::PropertyRecord;

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS property (
    resource_id INTEGER NOT NULL,
    field TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (resource_id, field)
);

CREATE INDEX IF NOT EXISTS idx_property_field ON property(field);
"#;

pub fn create_property_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLES)?;
    Ok(())
}

pub fn delete_properties(tx: &Transaction, fields: &[String]) -> Result<usize> {
    if fields.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; fields.len()].join(",");
    let sql = format!("DELETE FROM property WHERE field IN ({placeholders})");
    let count = tx.execute(&sql, params_from_iter(fields.iter()))?;
    Ok(count)
}

pub fn insert_properties(tx: &Transaction, props: &[PropertyRecord]) -> Result<usize> {
    if props.is_empty() {
        return Ok(0);
    }

    let placeholders = vec!["(?, ?, ?)"; props.len()].join(",");
    let sql =
        format!("INSERT OR REPLACE INTO property (resource_id, field, value) VALUES {placeholders}");

    let mut params: Vec<Value> = Vec::with_capacity(props.len() * 3);
    for prop in props {
        params.push(Value::Integer(prop.resource as i64));
        params.push(Value::Text(prop.field.clone()));
        params.push(Value::Text(prop.value.clone()));
    }

    let count = tx.execute(&sql, params_from_iter(params))?;
    Ok(count)
}

pub fn list_properties(tx: &Transaction, fields: &[String]) -> Result<Vec<PropertyRecord>> {
    if fields.is_empty() {
        return Ok(vec![]);
    }
    let placeholders = vec!["?"; fields.len()].join(",");
    let sql = format!(
        "SELECT resource_id, field, value FROM property WHERE field IN ({placeholders})
         ORDER BY resource_id ASC, field ASC"
    );
    let mut stmt = tx.prepare(&sql)?;
    let props = stmt
        .query_map(params_from_iter(fields.iter()), |row| {
            Ok(PropertyRecord {
                resource: row.get(0)?,
                field: row.get(1)?,
                value: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(props)
}
