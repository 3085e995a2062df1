mod property;
mod propagate;
mod sweep;

pub mod config;
pub mod factory;

pub use propagate::{PropagateArgs, PropagateJob, SyncDirection};
pub use sweep::SweepJob;

use std::sync::Arc;
use std::time::Duration;

use log::{error, info};

pub use crate::server::db::WriteScope;

use crate::time::current_timestamp;

/// Spawns the periodic job loops. One job instance runs at a time per loop;
/// a failed run is logged and retried at the next tick. The jobs are
/// idempotent, so a run interrupted by shutdown is simply redone.
pub fn start_jobs(propagate: Option<Arc<PropagateJob>>, sweep: Option<Arc<SweepJob>>) {
    if let Some(job) = propagate {
        tokio::spawn(async move {
            let interval = job.interval_secs();
            info!("Propagation loop starting, interval: {interval}s");
            let mut tk = tokio::time::interval(Duration::from_secs(interval));
            loop {
                let _ = tk.tick().await;
                let args = PropagateArgs::periodic(job.mirror_enabled());
                if let Err(err) = job.run(&args, &WriteScope::All) {
                    error!("Propagation job failed: {err:#}");
                }
            }
        });
    }

    if let Some(job) = sweep {
        tokio::spawn(async move {
            let interval = job.interval_secs();
            info!("Embargo sweep loop starting, interval: {interval}s");
            let mut tk = tokio::time::interval(Duration::from_secs(interval));
            loop {
                let _ = tk.tick().await;
                if let Err(err) = job.run(current_timestamp()) {
                    error!("Embargo sweep job failed: {err:#}");
                }
            }
        });
    }
}
