use std::sync::Arc;

use anyhow::Result;
use log::warn;

use crate::server::db::Database;

use super::config::JobsConfig;
use super::propagate::PropagateJob;
use super::sweep::SweepJob;

pub struct JobsFactory;

impl JobsFactory {
    pub fn new() -> Self {
        Self
    }

    /// Builds the jobs for the periodic loops. A disabled job is simply not
    /// built; on-demand invocations construct their own instance.
    pub fn build_periodic_jobs(
        &self,
        cfg: &JobsConfig,
        db: Arc<Database>,
    ) -> Result<(Option<Arc<PropagateJob>>, Option<Arc<SweepJob>>)> {
        let propagate = if cfg.propagate.enable {
            Some(Arc::new(PropagateJob::new(
                db.clone(),
                cfg.propagate.clone(),
            )))
        } else {
            warn!("Periodic propagation is disabled");
            None
        };

        let sweep = if cfg.sweep.enable {
            Some(Arc::new(SweepJob::new(
                db,
                cfg.sweep.clone(),
                cfg.propagate.property.clone(),
                cfg.propagate.batch_size,
            )))
        } else {
            warn!("Periodic embargo sweep is disabled");
            None
        };

        Ok((propagate, sweep))
    }
}
