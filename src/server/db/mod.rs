mod sqlite;

#[cfg(test)]
mod tests;

pub mod config;
pub mod factory;

use std::cell::RefCell;
use std::sync::Mutex;

use anyhow::{bail, Result};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use sqlite::{Sqlite, SqliteTransaction};

use crate::types::grant::GrantStatus;
use crate::types::level::AccessLevel;
use crate::types::request::Query;
use crate::types::resource::ResourceKind;

/// Database connection trait that can create transactions
pub trait Connection<'a, T>
where
    T: Transaction + 'a,
{
    /// Creates a new transaction from the connection
    fn transaction(&'a mut self) -> Result<T>;
}

/// Database transaction trait that defines all database operations
pub trait Transaction {
    // Resource operations
    /// Creates a new resource record
    fn create_resource(&self, resource: ResourceRecord) -> Result<ResourceRecord>;
    /// Retrieves a resource by id
    fn get_resource(&self, id: u64) -> Result<Option<ResourceRecord>>;
    /// Lists all resources
    fn list_resources(&self) -> Result<Vec<ResourceRecord>>;
    /// Lists ids of the direct children of a container
    fn list_child_ids(&self, parent: u64) -> Result<Vec<u64>>;
    /// Moves a resource to another container (or to the top level)
    fn update_resource_parent(&self, id: u64, parent: Option<u64>) -> Result<()>;
    /// Updates a resource's public/private visibility
    fn update_resource_visibility(&self, id: u64, public: bool) -> Result<()>;
    /// Deletes a resource; its access status row goes with it
    fn delete_resource(&self, id: u64) -> Result<()>;
    /// Counts all resources
    fn count_resources(&self) -> Result<usize>;

    // Access status operations
    /// Inserts or replaces the status row of a resource
    fn upsert_status(&self, status: StatusRecord) -> Result<()>;
    /// Retrieves the status row of a resource
    fn get_status(&self, resource: u64) -> Result<Option<StatusRecord>>;
    /// Lists status rows, paged by rowid for batch processing
    fn list_statuses(&self, limit: usize, offset: usize) -> Result<Vec<StatusRecord>>;
    /// Deletes the status row of a resource
    fn delete_status(&self, resource: u64) -> Result<()>;
    /// Counts status rows
    fn count_statuses(&self) -> Result<usize>;
    /// Inserts a status row for every resource lacking one, deriving the
    /// level from visibility; returns the number of rows created
    fn backfill_statuses(
        &self,
        public_level: AccessLevel,
        private_level: AccessLevel,
    ) -> Result<usize>;
    /// Writes `status` onto every direct child of `parent` within `scope`
    fn cascade_children(
        &self,
        parent: u64,
        status: &StatusRecord,
        scope: &WriteScope,
    ) -> Result<usize>;
    /// Writes `status` onto every grandchild of `root` within `scope`
    fn cascade_grandchildren(
        &self,
        root: u64,
        status: &StatusRecord,
        scope: &WriteScope,
    ) -> Result<usize>;
    /// Applies the embargo-ended policies to every status row matching the
    /// temporal pattern; returns the number of rows changed
    fn sweep_statuses(
        &self,
        pattern: SweepPattern,
        level_policy: LevelPolicy,
        date_policy: DatePolicy,
        now: u64,
    ) -> Result<usize>;

    // Grant operations
    /// Creates a new grant with its resource links
    fn create_grant(&self, grant: GrantRecord) -> Result<GrantRecord>;
    /// Retrieves a grant by id, resource links included
    fn get_grant(&self, id: u64) -> Result<Option<GrantRecord>>;
    /// Lists grants based on query
    fn list_grants(&self, query: Query) -> Result<Vec<GrantRecord>>;
    /// Rewrites a grant's fields and resource links
    fn update_grant(&self, grant: &GrantRecord) -> Result<()>;
    /// Updates a grant's status, recomputing `enabled`
    fn update_grant_status(&self, id: u64, status: GrantStatus) -> Result<()>;
    /// Deletes a grant and its resource links
    fn delete_grant(&self, id: u64) -> Result<()>;
    /// Checks if an opaque token is already taken by any grant
    fn is_token_exists(&self, token: &str) -> Result<bool>;
    /// Finds enabled grants matching the identity over a resource id set;
    /// with `recursive_only`, only grants flagged recursive are returned
    fn find_enabled_grants(
        &self,
        ident: &GrantIdent,
        resources: &[u64],
        recursive_only: bool,
    ) -> Result<Vec<GrantRecord>>;

    // Property mirror operations
    /// Deletes every value of the designated fields
    fn delete_properties(&self, fields: &[String]) -> Result<usize>;
    /// Inserts property rows, replacing on conflict
    fn insert_properties(&self, props: &[PropertyRecord]) -> Result<usize>;
    /// Lists values of the designated fields
    fn list_properties(&self, fields: &[String]) -> Result<Vec<PropertyRecord>>;

    /// Commits the transaction
    fn commit(self) -> Result<()>;
    /// Rolls back the transaction
    fn rollback(self) -> Result<()>;
}

/// Record structure for a resource in the container hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    /// Unique resource id
    pub id: u64,
    /// Hierarchy tier
    pub kind: ResourceKind,
    /// Containing resource, if any
    pub parent: Option<u64>,
    /// Public/private visibility
    pub public: bool,
    /// Owner's name
    pub owner: String,
    /// Creation timestamp
    pub create_time: u64,
    /// Last update timestamp
    pub update_time: u64,
}

/// Record structure for one row of the access index
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRecord {
    /// The resource this row belongs to
    pub resource: u64,
    /// Access level
    pub level: AccessLevel,
    /// Embargo window start, inclusive
    pub embargo_start: Option<u64>,
    /// Embargo window end, exclusive
    pub embargo_end: Option<u64>,
    /// Last update timestamp
    pub update_time: u64,
}

/// Record structure for an individual access grant
#[derive(Debug, Clone, PartialEq)]
pub struct GrantRecord {
    /// Unique grant id
    pub id: u64,
    /// Requester's user name, if identified by account
    pub user: Option<String>,
    /// Requester's e-mail, if identified by address
    pub email: Option<String>,
    /// Opaque token, if identified by token
    pub token: Option<String>,
    /// Lifecycle state
    pub status: GrantStatus,
    /// Derived from status, never set independently
    pub enabled: bool,
    /// Whether the grant extends to descendants of its resources
    pub recursive: bool,
    /// Resources the grant applies to
    pub resources: Vec<u64>,
    /// Validity window start, inclusive
    pub start_time: Option<u64>,
    /// Validity window end, exclusive
    pub end_time: Option<u64>,
    /// Creation timestamp
    pub create_time: u64,
    /// Last update timestamp
    pub update_time: u64,
}

impl GrantRecord {
    /// Whether the validity window contains `now`. Boundary rule matches the
    /// embargo evaluator: start is inclusive, end is exclusive.
    pub fn in_window(&self, now: u64) -> bool {
        if let Some(start) = self.start_time {
            if now < start {
                return false;
            }
        }
        if let Some(end) = self.end_time {
            if now >= end {
                return false;
            }
        }
        true
    }
}

/// Record structure for one property-mirror value
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRecord {
    /// The resource the value belongs to
    pub resource: u64,
    /// Designated field name
    pub field: String,
    /// Literal value
    pub value: String,
}

/// Identity facets used to look up grants. At least one facet must be set
/// for a lookup to match anything.
#[derive(Debug, Clone, Default)]
pub struct GrantIdent {
    pub user: Option<String>,
    pub email: Option<String>,
    pub token: Option<String>,
}

impl GrantIdent {
    pub fn is_empty(&self) -> bool {
        self.user.is_none() && self.email.is_none() && self.token.is_none()
    }
}

/// Which descendants a principal may write during a cascade. The same
/// predicate backs the single-resource and the bulk code paths.
#[derive(Debug, Clone)]
pub enum WriteScope {
    /// Blanket rights: every descendant
    All,
    /// Ordinary principal: only public resources and resources they own
    OwnedOrPublic(String),
}

impl WriteScope {
    /// SQL condition over the resource table aliased as `alias`, plus its
    /// bound parameters.
    pub fn sql_condition(&self, alias: &str) -> (String, Vec<Value>) {
        match self {
            WriteScope::All => (format!("{alias}.id = {alias}.id"), vec![]),
            WriteScope::OwnedOrPublic(owner) => (
                format!("({alias}.owner = ? OR {alias}.public = 1)"),
                vec![Value::Text(owner.clone())],
            ),
        }
    }

    /// The same predicate evaluated against a single record.
    pub fn allows(&self, resource: &ResourceRecord) -> bool {
        match self {
            WriteScope::All => true,
            WriteScope::OwnedOrPublic(owner) => resource.public || &resource.owner == owner,
        }
    }
}

/// Temporal patterns the embargo sweep acts on. Rows with both bounds set
/// and `now` still inside the window are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepPattern {
    /// Only a start bound, and it has been reached
    StartOnly,
    /// Only an end bound, and it has passed
    EndOnly,
    /// Both bounds, and the window is over
    BothPastEnd,
}

impl SweepPattern {
    pub const ALL: [SweepPattern; 3] = [
        SweepPattern::StartOnly,
        SweepPattern::EndOnly,
        SweepPattern::BothPastEnd,
    ];
}

/// What happens to the level of a swept row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelPolicy {
    /// Force the level to free
    Free,
    /// Step the level down one rank
    Under,
    /// Leave the level alone
    Keep,
}

/// What happens to the embargo dates of a swept row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePolicy {
    /// Null both embargo fields
    Clear,
    /// Leave them in place
    Keep,
}

/// Main database structure supporting multiple backend implementations
pub struct Database {
    ctx: Mutex<DatabaseContext>,
}

/// Enum representing different supported database connections
pub enum UnionConnection {
    /// SQLite database connection
    Sqlite(Sqlite),
}

enum UnionTransaction<'a> {
    Sqlite(SqliteTransaction<'a>),
}

struct DatabaseContext {
    conn: RefCell<UnionConnection>,
}

impl Database {
    /// Creates a new database instance
    pub fn new(conn: UnionConnection) -> Self {
        Self {
            ctx: Mutex::new(DatabaseContext {
                conn: RefCell::new(conn),
            }),
        }
    }

    #[cfg(test)]
    pub fn new_test() -> Self {
        let sqlite = Sqlite::memory().expect("open in-memory sqlite");
        Self::new(UnionConnection::Sqlite(sqlite))
    }

    /// Executes a function within a transaction context.
    ///
    /// - If the function `f` succeeds, the transaction will be committed
    /// - If the function `f` fails (returns an error), the transaction will
    ///   be rolled back
    /// - If the transaction operations (commit/rollback) fail, the error
    ///   will be returned
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn Transaction) -> Result<T>,
    {
        let ctx = match self.ctx.lock() {
            Ok(ctx) => ctx,
            Err(e) => bail!("failed to lock database: {e:#}"),
        };
        let mut conn = ctx.conn.borrow_mut();
        let tx = conn.transaction()?;

        let result = f(&tx);

        if result.is_ok() {
            tx.commit()
        } else {
            tx.rollback()
        }?;

        result
    }
}

impl<'a> Connection<'a, UnionTransaction<'a>> for UnionConnection {
    fn transaction(&'a mut self) -> Result<UnionTransaction<'a>> {
        match self {
            UnionConnection::Sqlite(sqlite) => sqlite.transaction().map(UnionTransaction::Sqlite),
        }
    }
}

impl Transaction for UnionTransaction<'_> {
    fn create_resource(&self, resource: ResourceRecord) -> Result<ResourceRecord> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_resource(resource),
        }
    }

    fn get_resource(&self, id: u64) -> Result<Option<ResourceRecord>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_resource(id),
        }
    }

    fn list_resources(&self) -> Result<Vec<ResourceRecord>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_resources(),
        }
    }

    fn list_child_ids(&self, parent: u64) -> Result<Vec<u64>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_child_ids(parent),
        }
    }

    fn update_resource_parent(&self, id: u64, parent: Option<u64>) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.update_resource_parent(id, parent),
        }
    }

    fn update_resource_visibility(&self, id: u64, public: bool) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.update_resource_visibility(id, public),
        }
    }

    fn delete_resource(&self, id: u64) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_resource(id),
        }
    }

    fn count_resources(&self) -> Result<usize> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.count_resources(),
        }
    }

    fn upsert_status(&self, status: StatusRecord) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.upsert_status(status),
        }
    }

    fn get_status(&self, resource: u64) -> Result<Option<StatusRecord>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_status(resource),
        }
    }

    fn list_statuses(&self, limit: usize, offset: usize) -> Result<Vec<StatusRecord>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_statuses(limit, offset),
        }
    }

    fn delete_status(&self, resource: u64) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_status(resource),
        }
    }

    fn count_statuses(&self) -> Result<usize> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.count_statuses(),
        }
    }

    fn backfill_statuses(
        &self,
        public_level: AccessLevel,
        private_level: AccessLevel,
    ) -> Result<usize> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.backfill_statuses(public_level, private_level),
        }
    }

    fn cascade_children(
        &self,
        parent: u64,
        status: &StatusRecord,
        scope: &WriteScope,
    ) -> Result<usize> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.cascade_children(parent, status, scope),
        }
    }

    fn cascade_grandchildren(
        &self,
        root: u64,
        status: &StatusRecord,
        scope: &WriteScope,
    ) -> Result<usize> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.cascade_grandchildren(root, status, scope),
        }
    }

    fn sweep_statuses(
        &self,
        pattern: SweepPattern,
        level_policy: LevelPolicy,
        date_policy: DatePolicy,
        now: u64,
    ) -> Result<usize> {
        match self {
            UnionTransaction::Sqlite(tx) => {
                tx.sweep_statuses(pattern, level_policy, date_policy, now)
            }
        }
    }

    fn create_grant(&self, grant: GrantRecord) -> Result<GrantRecord> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_grant(grant),
        }
    }

    fn get_grant(&self, id: u64) -> Result<Option<GrantRecord>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_grant(id),
        }
    }

    fn list_grants(&self, query: Query) -> Result<Vec<GrantRecord>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_grants(query),
        }
    }

    fn update_grant(&self, grant: &GrantRecord) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.update_grant(grant),
        }
    }

    fn update_grant_status(&self, id: u64, status: GrantStatus) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.update_grant_status(id, status),
        }
    }

    fn delete_grant(&self, id: u64) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_grant(id),
        }
    }

    fn is_token_exists(&self, token: &str) -> Result<bool> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.is_token_exists(token),
        }
    }

    fn find_enabled_grants(
        &self,
        ident: &GrantIdent,
        resources: &[u64],
        recursive_only: bool,
    ) -> Result<Vec<GrantRecord>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.find_enabled_grants(ident, resources, recursive_only),
        }
    }

    fn delete_properties(&self, fields: &[String]) -> Result<usize> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_properties(fields),
        }
    }

    fn insert_properties(&self, props: &[PropertyRecord]) -> Result<usize> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.insert_properties(props),
        }
    }

    fn list_properties(&self, fields: &[String]) -> Result<Vec<PropertyRecord>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_properties(fields),
        }
    }

    fn commit(self) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.commit(),
        }
    }

    fn rollback(self) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.rollback(),
        }
    }
}
