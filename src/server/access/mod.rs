mod email;
mod external;
mod grant;
mod ip;
mod user;

pub mod config;
pub mod embargo;
pub mod engine;
pub mod factory;

use std::collections::HashMap;
use std::net::IpAddr;

use anyhow::Result;

use crate::server::authn::Principal;
use crate::server::db::{ResourceRecord, Transaction};
use crate::types::request::AccessCredential;
use crate::types::resource::ResourceKind;

use email::EmailMode;
use external::ExternalMode;
use grant::GrantMode;
use ip::IpMode;
use user::SessionMode;

/// One credential-checking strategy of the decision engine. A mode either
/// grants access or defers; it never denies on its own.
pub trait AccessMode {
    fn check(
        &self,
        tx: &dyn Transaction,
        check: &AccessCheck,
        cache: &mut AncestorCache,
    ) -> Result<ModeResponse>;
}

/// Possible responses from a mode check.
#[derive(Debug, Copy, Clone)]
pub enum ModeResponse {
    /// The credential grants access
    Allow,
    /// Defers decision to the next mode in the chain
    Continue,
}

/// One content request to decide, carrying everything the checkers may need.
pub struct AccessCheck<'a> {
    /// The resource whose restricted content is requested
    pub resource: u64,
    pub principal: &'a Principal,
    /// Parsed `access` query parameter, if any
    pub credential: Option<AccessCredential>,
    /// Resolved client address, if any
    pub client_ip: Option<IpAddr>,
    pub now: u64,
}

pub enum UnionMode {
    Ip(IpMode),
    Session(SessionMode),
    External(ExternalMode),
    Email(EmailMode),
    Grant(GrantMode),
}

impl UnionMode {
    pub fn name(&self) -> &'static str {
        match self {
            UnionMode::Ip(_) => "ip",
            UnionMode::Session(_) => "session",
            UnionMode::External(_) => "external",
            UnionMode::Email(_) => "email",
            UnionMode::Grant(_) => "grant",
        }
    }
}

impl AccessMode for UnionMode {
    fn check(
        &self,
        tx: &dyn Transaction,
        check: &AccessCheck,
        cache: &mut AncestorCache,
    ) -> Result<ModeResponse> {
        match self {
            UnionMode::Ip(mode) => mode.check(tx, check, cache),
            UnionMode::Session(mode) => mode.check(tx, check, cache),
            UnionMode::External(mode) => mode.check(tx, check, cache),
            UnionMode::Email(mode) => mode.check(tx, check, cache),
            UnionMode::Grant(mode) => mode.check(tx, check, cache),
        }
    }
}

/// Container-membership lookups memoized for one request. Created per
/// request and passed into the engine, so the engine stays reentrant.
pub struct AncestorCache {
    records: HashMap<u64, Option<ResourceRecord>>,
    ancestors: HashMap<u64, Vec<u64>>,
}

impl AncestorCache {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            ancestors: HashMap::new(),
        }
    }

    /// Point read of a resource record, memoized.
    pub fn resource(
        &mut self,
        tx: &dyn Transaction,
        id: u64,
    ) -> Result<Option<ResourceRecord>> {
        if let Some(record) = self.records.get(&id) {
            return Ok(record.clone());
        }
        let record = tx.get_resource(id)?;
        self.records.insert(id, record.clone());
        Ok(record)
    }

    /// Ancestor ids of `id`, nearest first.
    pub fn ancestors(&mut self, tx: &dyn Transaction, id: u64) -> Result<Vec<u64>> {
        if let Some(list) = self.ancestors.get(&id) {
            return Ok(list.clone());
        }

        let mut list = vec![];
        let mut current = id;
        loop {
            let parent = match self.resource(tx, current)? {
                Some(record) => record.parent,
                None => None,
            };
            match parent {
                // Guard against parent cycles in corrupted data
                Some(parent) if !list.contains(&parent) && parent != id => {
                    list.push(parent);
                    current = parent;
                }
                _ => break,
            }
        }

        self.ancestors.insert(id, list.clone());
        Ok(list)
    }

    /// The collection the resource belongs to: the resource itself when it
    /// is a collection, otherwise the nearest collection ancestor.
    pub fn collection_of(&mut self, tx: &dyn Transaction, id: u64) -> Result<Option<u64>> {
        let chain = self.ancestors(tx, id)?;
        for candidate in std::iter::once(id).chain(chain) {
            if let Some(record) = self.resource(tx, candidate)? {
                if record.kind == ResourceKind::Collection {
                    return Ok(Some(candidate));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use crate::server::db::Database;
    use crate::server::db::ResourceRecord;

    use super::*;

    fn mock_resource(kind: ResourceKind, parent: Option<u64>) -> ResourceRecord {
        ResourceRecord {
            id: 0,
            kind,
            parent,
            public: true,
            owner: "Alice".to_string(),
            create_time: 0,
            update_time: 0,
        }
    }

    #[test]
    fn test_ancestor_cache() {
        let db = Database::new_test();
        let (collection, item, part) = db
            .with_transaction(|tx| {
                let collection =
                    tx.create_resource(mock_resource(ResourceKind::Collection, None))?;
                let item =
                    tx.create_resource(mock_resource(ResourceKind::Item, Some(collection.id)))?;
                let part = tx.create_resource(mock_resource(ResourceKind::Part, Some(item.id)))?;
                Ok((collection, item, part))
            })
            .unwrap();

        db.with_transaction(|tx| {
            let mut cache = AncestorCache::new();

            assert_eq!(cache.ancestors(tx, part.id)?, vec![item.id, collection.id]);
            assert_eq!(cache.ancestors(tx, item.id)?, vec![collection.id]);
            assert!(cache.ancestors(tx, collection.id)?.is_empty());
            assert!(cache.ancestors(tx, 9999)?.is_empty());

            assert_eq!(cache.collection_of(tx, part.id)?, Some(collection.id));
            assert_eq!(cache.collection_of(tx, collection.id)?, Some(collection.id));
            assert_eq!(cache.collection_of(tx, 9999)?, None);

            // Second lookup is served from the cache
            assert_eq!(cache.ancestors(tx, part.id)?, vec![item.id, collection.id]);

            Ok(())
        })
        .unwrap();
    }
}
