use std::sync::Arc;

use anyhow::Result;
use log::{debug, info};

use crate::server::db::{Database, SweepPattern};

use super::config::{PropertyConfig, SweepConfig};
use super::property::PropertySync;

/// The embargo sweep job: applies the configured end-of-embargo policies to
/// every status row whose embargo window has elapsed, then refreshes the
/// property mirror when one is active.
pub struct SweepJob {
    db: Arc<Database>,
    cfg: SweepConfig,
    sync: PropertySync,
    batch_size: usize,
}

impl SweepJob {
    pub fn new(
        db: Arc<Database>,
        cfg: SweepConfig,
        property: PropertyConfig,
        batch_size: usize,
    ) -> Self {
        let sync = PropertySync::new(property);
        Self {
            db,
            cfg,
            sync,
            batch_size,
        }
    }

    pub fn interval_secs(&self) -> u64 {
        self.cfg.interval_secs
    }

    /// One sweep pass at `now`. One bulk statement per temporal pattern,
    /// each in its own transaction.
    pub fn run(&self, now: u64) -> Result<()> {
        if self.sync.is_enabled() {
            self.sync.validate()?;
        }

        let mut total = 0;
        for pattern in SweepPattern::ALL {
            let count = self.db.with_transaction(|tx| {
                tx.sweep_statuses(pattern, self.cfg.level_policy, self.cfg.date_policy, now)
            })?;
            debug!("Sweep pattern {pattern:?} updated {count} status rows");
            total += count;
        }

        info!("Embargo sweep updated {total} status rows");

        if total > 0 && self.sync.is_enabled() {
            self.sync.index_to_property(&self.db, self.batch_size)?;
        }

        Ok(())
    }
}
