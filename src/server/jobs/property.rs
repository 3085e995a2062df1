use std::collections::{BTreeMap, HashMap};

use anyhow::{bail, Context, Result};
use log::{info, warn};

use crate::server::db::{Database, PropertyRecord, StatusRecord};
use crate::time::{format_time, parse_time};
use crate::types::level::{AccessLevel, LEVEL_ORDER};

use super::config::PropertyConfig;

/// Validated level <-> property-value mapping. Built from configuration and
/// refused outright when it does not cover exactly the four levels with
/// distinct values.
pub struct LevelMapping {
    to_value: HashMap<AccessLevel, String>,
    to_level: HashMap<String, AccessLevel>,
}

impl LevelMapping {
    pub fn build(cfg: &PropertyConfig) -> Result<Self> {
        if cfg.levels.len() != LEVEL_ORDER.len() {
            bail!(
                "property level mapping must cover exactly {} levels, found {}",
                LEVEL_ORDER.len(),
                cfg.levels.len()
            );
        }

        let mut to_value = HashMap::new();
        let mut to_level = HashMap::new();
        for (key, value) in cfg.levels.iter() {
            let level = AccessLevel::parse(key).context("property level mapping")?;
            if to_level.insert(value.clone(), level).is_some() {
                bail!("duplicate property value '{value}' in level mapping");
            }
            to_value.insert(level, value.clone());
        }

        Ok(Self { to_value, to_level })
    }

    pub fn value(&self, level: AccessLevel) -> &str {
        // Covers all four levels by construction
        &self.to_value[&level]
    }

    pub fn level(&self, value: &str) -> Option<AccessLevel> {
        self.to_level.get(value).copied()
    }
}

/// Bidirectional synchronization between the access index and the three
/// designated descriptive fields.
pub struct PropertySync {
    cfg: PropertyConfig,
}

impl PropertySync {
    pub fn new(cfg: PropertyConfig) -> Self {
        Self { cfg }
    }

    pub fn is_enabled(&self) -> bool {
        self.cfg.enable
    }

    /// Checks the level mapping without touching any data.
    pub fn validate(&self) -> Result<()> {
        LevelMapping::build(&self.cfg).map(|_| ())
    }

    pub fn fields(&self) -> Vec<String> {
        vec![
            self.cfg.level_field.clone(),
            self.cfg.start_field.clone(),
            self.cfg.end_field.clone(),
        ]
    }

    /// Regenerates the designated fields from the index: stale values are
    /// deleted first, then every status row is rendered in batches.
    pub fn index_to_property(&self, db: &Database, batch_size: usize) -> Result<()> {
        let mapping = LevelMapping::build(&self.cfg)?;

        let deleted = db.with_transaction(|tx| tx.delete_properties(&self.fields()))?;
        info!("Property sync deleted {deleted} stale values");

        let mut offset = 0;
        let mut written = 0;
        loop {
            let statuses = db.with_transaction(|tx| tx.list_statuses(batch_size, offset))?;
            if statuses.is_empty() {
                break;
            }
            offset += statuses.len();

            let mut props = Vec::with_capacity(statuses.len() * 3);
            for status in statuses.iter() {
                props.push(PropertyRecord {
                    resource: status.resource,
                    field: self.cfg.level_field.clone(),
                    value: mapping.value(status.level).to_string(),
                });
                if let Some(start) = status.embargo_start {
                    props.push(PropertyRecord {
                        resource: status.resource,
                        field: self.cfg.start_field.clone(),
                        value: format_time(start),
                    });
                }
                if let Some(end) = status.embargo_end {
                    props.push(PropertyRecord {
                        resource: status.resource,
                        field: self.cfg.end_field.clone(),
                        value: format_time(end),
                    });
                }
            }
            written += db.with_transaction(|tx| tx.insert_properties(&props))?;
        }

        info!("Property sync wrote {written} values from {offset} status rows");
        Ok(())
    }

    /// Parses the designated fields back into index rows. A value carrying
    /// an unknown level skips its row; a malformed date skips that date.
    /// Both are logged, neither stops the run.
    pub fn property_to_index(&self, db: &Database, batch_size: usize) -> Result<()> {
        let mapping = LevelMapping::build(&self.cfg)?;

        let props = db.with_transaction(|tx| tx.list_properties(&self.fields()))?;

        let mut by_resource: BTreeMap<u64, RawStatus> = BTreeMap::new();
        for prop in props {
            let entry = by_resource.entry(prop.resource).or_default();
            if prop.field == self.cfg.level_field {
                entry.level = Some(prop.value);
            } else if prop.field == self.cfg.start_field {
                entry.start = Some(prop.value);
            } else if prop.field == self.cfg.end_field {
                entry.end = Some(prop.value);
            }
        }

        let mut statuses = Vec::with_capacity(by_resource.len());
        for (resource, raw) in by_resource {
            let level = match raw.level {
                Some(value) => match mapping.level(&value) {
                    Some(level) => level,
                    None => {
                        warn!("Unknown access level value '{value}' for resource {resource}, skipping");
                        continue;
                    }
                },
                None => {
                    warn!("Resource {resource} has embargo fields but no level field, skipping");
                    continue;
                }
            };

            statuses.push(StatusRecord {
                resource,
                level,
                embargo_start: parse_date_field(resource, "start", raw.start),
                embargo_end: parse_date_field(resource, "end", raw.end),
                update_time: 0,
            });
        }

        let total = statuses.len();
        for chunk in statuses.chunks(batch_size) {
            db.with_transaction(|tx| {
                for status in chunk {
                    tx.upsert_status(status.clone())?;
                }
                Ok(())
            })?;
        }

        info!("Property sync restored {total} status rows from descriptive fields");
        Ok(())
    }
}

#[derive(Default)]
struct RawStatus {
    level: Option<String>,
    start: Option<String>,
    end: Option<String>,
}

fn parse_date_field(resource: u64, name: &str, value: Option<String>) -> Option<u64> {
    let value = value?;
    match parse_time(&value) {
        Ok(time) => Some(time),
        Err(err) => {
            warn!("Invalid embargo {name} '{value}' for resource {resource}, skipping: {err:#}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::server::db::{ResourceRecord, Transaction};
    use crate::types::resource::ResourceKind;

    use super::*;

    fn mock_db_with_resources(count: u64) -> (Arc<Database>, Vec<u64>) {
        let db = Arc::new(Database::new_test());
        let ids = db
            .with_transaction(|tx| {
                let mut ids = vec![];
                for _ in 0..count {
                    let resource = tx.create_resource(ResourceRecord {
                        id: 0,
                        kind: ResourceKind::Part,
                        parent: None,
                        public: true,
                        owner: "Alice".to_string(),
                        create_time: 0,
                        update_time: 0,
                    })?;
                    ids.push(resource.id);
                }
                Ok(ids)
            })
            .unwrap();
        (db, ids)
    }

    fn enabled_config() -> PropertyConfig {
        let mut cfg = PropertyConfig::default();
        cfg.enable = true;
        cfg
    }

    #[test]
    fn test_mapping_validation() {
        let cfg = PropertyConfig::default();
        assert!(LevelMapping::build(&cfg).is_ok());

        // Missing level
        let mut cfg = PropertyConfig::default();
        cfg.levels.remove("protected");
        assert!(LevelMapping::build(&cfg).is_err());

        // Extra key
        let mut cfg = PropertyConfig::default();
        cfg.levels.insert("open".to_string(), "open".to_string());
        assert!(LevelMapping::build(&cfg).is_err());

        // Duplicate value
        let mut cfg = PropertyConfig::default();
        cfg.levels.insert("free".to_string(), "reserved".to_string());
        assert!(LevelMapping::build(&cfg).is_err());

        // Custom but complete mapping
        let mut cfg = PropertyConfig::default();
        cfg.levels = vec![
            ("free", "open"),
            ("reserved", "campus"),
            ("protected", "restricted"),
            ("forbidden", "closed"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let mapping = LevelMapping::build(&cfg).unwrap();
        assert_eq!(mapping.value(AccessLevel::Reserved), "campus");
        assert_eq!(mapping.level("closed"), Some(AccessLevel::Forbidden));
        assert_eq!(mapping.level("free"), None);
    }

    #[test]
    fn test_round_trip() {
        let (db, ids) = mock_db_with_resources(4);
        let sync = PropertySync::new(enabled_config());

        let date_only = parse_time("2024-03-01").unwrap();
        let with_time = parse_time("2024-03-01 15:30:00").unwrap();

        db.with_transaction(|tx| {
            tx.upsert_status(StatusRecord {
                resource: ids[0],
                level: AccessLevel::Free,
                embargo_start: Some(date_only),
                embargo_end: None,
                update_time: 0,
            })?;
            tx.upsert_status(StatusRecord {
                resource: ids[1],
                level: AccessLevel::Reserved,
                embargo_start: None,
                embargo_end: Some(with_time),
                update_time: 0,
            })?;
            tx.upsert_status(StatusRecord {
                resource: ids[2],
                level: AccessLevel::Protected,
                embargo_start: Some(date_only),
                embargo_end: Some(with_time),
                update_time: 0,
            })?;
            tx.upsert_status(StatusRecord {
                resource: ids[3],
                level: AccessLevel::Forbidden,
                embargo_start: None,
                embargo_end: None,
                update_time: 0,
            })
        })
        .unwrap();

        sync.index_to_property(&db, 2).unwrap();
        let first = db
            .with_transaction(|tx| tx.list_properties(&sync.fields()))
            .unwrap();

        // The emitted values keep the entered forms
        assert!(first
            .iter()
            .any(|p| p.resource == ids[0] && p.value == "2024-03-01"));
        assert!(first
            .iter()
            .any(|p| p.resource == ids[1] && p.value == "2024-03-01 15:30:00"));

        // Parse back, regenerate, compare bit-for-bit
        sync.property_to_index(&db, 2).unwrap();
        sync.index_to_property(&db, 2).unwrap();
        let second = db
            .with_transaction(|tx| tx.list_properties(&sync.fields()))
            .unwrap();
        assert_eq!(first, second);

        // The index itself also survived the round trip
        db.with_transaction(|tx| {
            let ret = tx.get_status(ids[2])?.unwrap();
            assert_eq!(ret.level, AccessLevel::Protected);
            assert_eq!(ret.embargo_start, Some(date_only));
            assert_eq!(ret.embargo_end, Some(with_time));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_property_to_index_skips_bad_rows() {
        let (db, ids) = mock_db_with_resources(3);
        let sync = PropertySync::new(enabled_config());

        db.with_transaction(|tx| {
            let props = vec![
                // Valid row
                PropertyRecord {
                    resource: ids[0],
                    field: "access:level".to_string(),
                    value: "reserved".to_string(),
                },
                // Unknown level value: row skipped entirely
                PropertyRecord {
                    resource: ids[1],
                    field: "access:level".to_string(),
                    value: "nonsense".to_string(),
                },
                // Malformed date: only the date is dropped
                PropertyRecord {
                    resource: ids[2],
                    field: "access:level".to_string(),
                    value: "protected".to_string(),
                },
                PropertyRecord {
                    resource: ids[2],
                    field: "access:embargoStart".to_string(),
                    value: "soonish".to_string(),
                },
            ];
            tx.insert_properties(&props)?;
            Ok(())
        })
        .unwrap();

        sync.property_to_index(&db, 100).unwrap();

        db.with_transaction(|tx| {
            let ret = tx.get_status(ids[0])?.unwrap();
            assert_eq!(ret.level, AccessLevel::Reserved);

            assert!(tx.get_status(ids[1])?.is_none());

            let ret = tx.get_status(ids[2])?.unwrap();
            assert_eq!(ret.level, AccessLevel::Protected);
            assert_eq!(ret.embargo_start, None);

            Ok(())
        })
        .unwrap();
    }
}
