use std::sync::Arc;

use anyhow::{bail, Result};
use log::{info, warn};

use crate::server::db::{Database, WriteScope};
use crate::types::resource::ResourceKind;

use super::config::PropagateConfig;
use super::property::PropertySync;

/// What one propagation run should do. The periodic loop backfills and
/// refreshes the property mirror; on-demand invocations pick freely.
#[derive(Debug, Clone, Default)]
pub struct PropagateArgs {
    pub backfill: bool,
    pub sync: Option<SyncDirection>,
    pub cascade: Vec<u64>,
}

impl PropagateArgs {
    /// The work of one periodic tick.
    pub fn periodic(mirror_enabled: bool) -> Self {
        Self {
            backfill: true,
            sync: if mirror_enabled {
                Some(SyncDirection::IndexToProperty)
            } else {
                None
            },
            cascade: vec![],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    IndexToProperty,
    PropertyToIndex,
}

impl SyncDirection {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "index-to-property" => Ok(SyncDirection::IndexToProperty),
            "property-to-index" => Ok(SyncDirection::PropertyToIndex),
            _ => bail!("unknown sync direction '{s}', expected index-to-property or property-to-index"),
        }
    }
}

/// The status propagation job: backfills missing index rows from
/// visibility, keeps the property mirror consistent, and cascades a
/// container's status down the hierarchy. Idempotent; every bulk statement
/// runs in its own transaction, so an interrupted run can simply be
/// re-invoked.
pub struct PropagateJob {
    db: Arc<Database>,
    cfg: PropagateConfig,
    sync: PropertySync,
}

impl PropagateJob {
    pub fn new(db: Arc<Database>, cfg: PropagateConfig) -> Self {
        let sync = PropertySync::new(cfg.property.clone());
        Self { db, cfg, sync }
    }

    pub fn interval_secs(&self) -> u64 {
        self.cfg.interval_secs
    }

    pub fn mirror_enabled(&self) -> bool {
        self.sync.is_enabled()
    }

    pub fn property_sync(&self) -> &PropertySync {
        &self.sync
    }

    /// One full run. A broken level mapping aborts before the first
    /// statement; per-resource anomalies during the cascade are logged and
    /// skipped.
    pub fn run(&self, args: &PropagateArgs, scope: &WriteScope) -> Result<()> {
        if self.sync.is_enabled() {
            self.sync.validate()?;
        }

        if args.backfill {
            self.run_backfill()?;
        }

        if let Some(direction) = args.sync {
            self.run_sync(direction)?;
        }

        for id in args.cascade.iter() {
            self.run_cascade(*id, scope)?;
        }

        Ok(())
    }

    pub fn run_backfill(&self) -> Result<usize> {
        let created = self.db.with_transaction(|tx| {
            tx.backfill_statuses(self.cfg.public_level, self.cfg.private_level)
        })?;
        info!("Backfill created {created} status rows from visibility");
        Ok(created)
    }

    pub fn run_sync(&self, direction: SyncDirection) -> Result<()> {
        if !self.sync.is_enabled() {
            warn!("Property mirror is disabled, skipping sync");
            return Ok(());
        }
        match direction {
            SyncDirection::IndexToProperty => {
                self.sync.index_to_property(&self.db, self.cfg.batch_size)
            }
            SyncDirection::PropertyToIndex => {
                self.sync.property_to_index(&self.db, self.cfg.batch_size)
            }
        }
    }

    /// Cascades a container's status to its descendants: one bulk statement
    /// per tier, each carrying the caller's write-scope predicate. Unknown
    /// ids, non-containers, and containers without a status row are logged
    /// and skipped so batch invocations can continue with remaining work.
    pub fn run_cascade(&self, id: u64, scope: &WriteScope) -> Result<usize> {
        let (resource, status) = self
            .db
            .with_transaction(|tx| Ok((tx.get_resource(id)?, tx.get_status(id)?)))?;

        let resource = match resource {
            Some(resource) => resource,
            None => {
                warn!("Cascade skipped: resource {id} does not exist");
                return Ok(0);
            }
        };
        if !resource.kind.is_container() {
            warn!(
                "Cascade skipped: resource {id} is a {}, not a container",
                resource.kind.as_str()
            );
            return Ok(0);
        }
        let status = match status {
            Some(status) => status,
            None => {
                warn!("Cascade skipped: resource {id} has no status row");
                return Ok(0);
            }
        };

        let mut total = self
            .db
            .with_transaction(|tx| tx.cascade_children(id, &status, scope))?;
        if resource.kind == ResourceKind::Collection {
            total += self
                .db
                .with_transaction(|tx| tx.cascade_grandchildren(id, &status, scope))?;
        }

        info!(
            "Cascade from {} {id} updated {total} descendants",
            resource.kind.as_str()
        );
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::CommonConfig;
    use crate::server::db::{ResourceRecord, StatusRecord};
    use crate::types::level::AccessLevel;

    use super::*;

    fn mock_resource(kind: ResourceKind, parent: Option<u64>, public: bool) -> ResourceRecord {
        ResourceRecord {
            id: 0,
            kind,
            parent,
            public,
            owner: "Alice".to_string(),
            create_time: 0,
            update_time: 0,
        }
    }

    fn job(db: Arc<Database>) -> PropagateJob {
        PropagateJob::new(db, PropagateConfig::default())
    }

    fn snapshot(db: &Database) -> Vec<StatusRecord> {
        db.with_transaction(|tx| tx.list_statuses(10_000, 0)).unwrap()
    }

    #[test]
    fn test_idempotence() {
        let db = Arc::new(Database::new_test());
        let collection = db
            .with_transaction(|tx| {
                let collection =
                    tx.create_resource(mock_resource(ResourceKind::Collection, None, true))?;
                let item = tx.create_resource(mock_resource(
                    ResourceKind::Item,
                    Some(collection.id),
                    false,
                ))?;
                tx.create_resource(mock_resource(ResourceKind::Part, Some(item.id), true))?;
                tx.upsert_status(StatusRecord {
                    resource: collection.id,
                    level: AccessLevel::Protected,
                    embargo_start: None,
                    embargo_end: Some(500),
                    update_time: 0,
                })?;
                Ok(collection)
            })
            .unwrap();

        let job = job(db.clone());
        let args = PropagateArgs {
            backfill: true,
            sync: None,
            cascade: vec![collection.id],
        };

        job.run(&args, &WriteScope::All).unwrap();
        let first = snapshot(&db);

        // Everything got a row, and the subtree carries the source status
        assert_eq!(first.len(), 3);
        for status in first.iter() {
            assert_eq!(status.level, AccessLevel::Protected);
            assert_eq!(status.embargo_end, Some(500));
        }

        // A second run with no intervening changes converges to the same
        // store state
        job.run(&args, &WriteScope::All).unwrap();
        let second = snapshot(&db);
        assert_eq!(
            first
                .iter()
                .map(|s| (s.resource, s.level, s.embargo_start, s.embargo_end))
                .collect::<Vec<_>>(),
            second
                .iter()
                .map(|s| (s.resource, s.level, s.embargo_start, s.embargo_end))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_backfill_levels_follow_visibility() {
        let db = Arc::new(Database::new_test());
        let (public, private) = db
            .with_transaction(|tx| {
                let public = tx.create_resource(mock_resource(ResourceKind::Item, None, true))?;
                let private = tx.create_resource(mock_resource(ResourceKind::Item, None, false))?;
                Ok((public, private))
            })
            .unwrap();

        let mut cfg = PropagateConfig::default();
        cfg.private_level = AccessLevel::Forbidden;
        let job = PropagateJob::new(db.clone(), cfg);
        job.run_backfill().unwrap();

        db.with_transaction(|tx| {
            assert_eq!(tx.get_status(public.id)?.unwrap().level, AccessLevel::Free);
            assert_eq!(
                tx.get_status(private.id)?.unwrap().level,
                AccessLevel::Forbidden
            );
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_cascade_skips_anomalies() {
        let db = Arc::new(Database::new_test());
        let part = db
            .with_transaction(|tx| {
                tx.create_resource(mock_resource(ResourceKind::Part, None, true))
            })
            .unwrap();

        let job = job(db.clone());

        // Unknown resource id
        assert_eq!(job.run_cascade(99999, &WriteScope::All).unwrap(), 0);
        // Not a container
        assert_eq!(job.run_cascade(part.id, &WriteScope::All).unwrap(), 0);

        // A container without a status row
        let item = db
            .with_transaction(|tx| {
                tx.create_resource(mock_resource(ResourceKind::Item, None, true))
            })
            .unwrap();
        assert_eq!(job.run_cascade(item.id, &WriteScope::All).unwrap(), 0);
    }

    #[test]
    fn test_broken_mapping_aborts_run() {
        let db = Arc::new(Database::new_test());
        db.with_transaction(|tx| {
            tx.create_resource(mock_resource(ResourceKind::Item, None, true))
        })
        .unwrap();

        let mut cfg = PropagateConfig::default();
        cfg.property.enable = true;
        cfg.property.levels.remove("forbidden");
        let job = PropagateJob::new(db.clone(), cfg);

        let args = PropagateArgs {
            backfill: true,
            sync: Some(SyncDirection::IndexToProperty),
            cascade: vec![],
        };
        assert!(job.run(&args, &WriteScope::All).is_err());

        // Aborted before any statement: no backfill happened
        db.with_transaction(|tx| {
            assert_eq!(tx.count_statuses()?, 0);
            Ok(())
        })
        .unwrap();
    }
}
