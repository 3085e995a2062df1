mod grant;
mod property;
mod resource;
mod status;

pub mod config;
pub mod factory;

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::types::grant::GrantStatus;
use crate::types::level::AccessLevel;
use crate::types::request::Query;

use super::{
    DatePolicy, GrantIdent, GrantRecord, LevelPolicy, PropertyRecord, ResourceRecord,
    StatusRecord, SweepPattern, WriteScope,
};

pub struct Sqlite {
    conn: Connection,
}

impl Sqlite {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("open sqlite database '{}'", path.as_ref().display()))?;
        Self::init(conn)
    }

    pub fn memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("enable sqlite foreign keys")?;

        resource::create_resource_tables(&conn)?;
        status::create_status_tables(&conn)?;
        grant::create_grant_tables(&conn)?;
        property::create_property_tables(&conn)?;

        Ok(Self { conn })
    }
}

impl<'a> super::Connection<'a, SqliteTransaction<'a>> for Sqlite {
    fn transaction(&'a mut self) -> Result<SqliteTransaction<'a>> {
        let tx = self.conn.transaction()?;
        Ok(SqliteTransaction { tx })
    }
}

pub struct SqliteTransaction<'a> {
    tx: rusqlite::Transaction<'a>,
}

impl super::Transaction for SqliteTransaction<'_> {
    fn create_resource(&self, resource: ResourceRecord) -> Result<ResourceRecord> {
        resource::create_resource(&self.tx, resource)
    }

    fn get_resource(&self, id: u64) -> Result<Option<ResourceRecord>> {
        resource::get_resource(&self.tx, id)
    }

    fn list_resources(&self) -> Result<Vec<ResourceRecord>> {
        resource::list_resources(&self.tx)
    }

    fn list_child_ids(&self, parent: u64) -> Result<Vec<u64>> {
        resource::list_child_ids(&self.tx, parent)
    }

    fn update_resource_parent(&self, id: u64, parent: Option<u64>) -> Result<()> {
        resource::update_resource_parent(&self.tx, id, parent)
    }

    fn update_resource_visibility(&self, id: u64, public: bool) -> Result<()> {
        resource::update_resource_visibility(&self.tx, id, public)
    }

    fn delete_resource(&self, id: u64) -> Result<()> {
        resource::delete_resource(&self.tx, id)
    }

    fn count_resources(&self) -> Result<usize> {
        resource::count_resources(&self.tx)
    }

    fn upsert_status(&self, status: StatusRecord) -> Result<()> {
        status::upsert_status(&self.tx, status)
    }

    fn get_status(&self, resource: u64) -> Result<Option<StatusRecord>> {
        status::get_status(&self.tx, resource)
    }

    fn list_statuses(&self, limit: usize, offset: usize) -> Result<Vec<StatusRecord>> {
        status::list_statuses(&self.tx, limit, offset)
    }

    fn delete_status(&self, resource: u64) -> Result<()> {
        status::delete_status(&self.tx, resource)
    }

    fn count_statuses(&self) -> Result<usize> {
        status::count_statuses(&self.tx)
    }

    fn backfill_statuses(
        &self,
        public_level: AccessLevel,
        private_level: AccessLevel,
    ) -> Result<usize> {
        status::backfill_statuses(&self.tx, public_level, private_level)
    }

    fn cascade_children(
        &self,
        parent: u64,
        status: &StatusRecord,
        scope: &WriteScope,
    ) -> Result<usize> {
        status::cascade_children(&self.tx, parent, status, scope)
    }

    fn cascade_grandchildren(
        &self,
        root: u64,
        status: &StatusRecord,
        scope: &WriteScope,
    ) -> Result<usize> {
        status::cascade_grandchildren(&self.tx, root, status, scope)
    }

    fn sweep_statuses(
        &self,
        pattern: SweepPattern,
        level_policy: LevelPolicy,
        date_policy: DatePolicy,
        now: u64,
    ) -> Result<usize> {
        status::sweep_statuses(&self.tx, pattern, level_policy, date_policy, now)
    }

    fn create_grant(&self, grant: GrantRecord) -> Result<GrantRecord> {
        grant::create_grant(&self.tx, grant)
    }

    fn get_grant(&self, id: u64) -> Result<Option<GrantRecord>> {
        grant::get_grant(&self.tx, id)
    }

    fn list_grants(&self, query: Query) -> Result<Vec<GrantRecord>> {
        grant::list_grants(&self.tx, query)
    }

    fn update_grant(&self, grant: &GrantRecord) -> Result<()> {
        grant::update_grant(&self.tx, grant)
    }

    fn update_grant_status(&self, id: u64, status: GrantStatus) -> Result<()> {
        grant::update_grant_status(&self.tx, id, status)
    }

    fn delete_grant(&self, id: u64) -> Result<()> {
        grant::delete_grant(&self.tx, id)
    }

    fn is_token_exists(&self, token: &str) -> Result<bool> {
        grant::is_token_exists(&self.tx, token)
    }

    fn find_enabled_grants(
        &self,
        ident: &GrantIdent,
        resources: &[u64],
        recursive_only: bool,
    ) -> Result<Vec<GrantRecord>> {
        grant::find_enabled_grants(&self.tx, ident, resources, recursive_only)
    }

    fn delete_properties(&self, fields: &[String]) -> Result<usize> {
        property::delete_properties(&self.tx, fields)
    }

    fn insert_properties(&self, props: &[PropertyRecord]) -> Result<usize> {
        property::insert_properties(&self.tx, props)
    }

    fn list_properties(&self, fields: &[String]) -> Result<Vec<PropertyRecord>> {
        property::list_properties(&self.tx, fields)
    }

    fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }

    fn rollback(self) -> Result<()> {
        self.tx.rollback()?;
        Ok(())
    }
}
