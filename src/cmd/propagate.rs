use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::config::{CommonConfig, PathSet};
use crate::logs;
use crate::server::config::ServerConfig;
use crate::server::factory::ServerFactory;
use crate::server::jobs::{self, SyncDirection, WriteScope};

/// Run the status propagation job once
#[derive(Args)]
pub struct PropagateArgs {
    /// The config directory path
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// The data directory path
    #[clap(long)]
    pub data: Option<PathBuf>,

    /// The log level
    #[clap(short, long, default_value = "info")]
    pub level: String,

    /// Insert missing status rows, deriving the level from visibility
    #[clap(long)]
    pub backfill: bool,

    /// Synchronize the property mirror: index-to-property or
    /// property-to-index
    #[clap(long)]
    pub sync: Option<String>,

    /// Cascade these containers' statuses to their descendants
    #[clap(long)]
    pub cascade: Vec<u64>,
}

impl PropagateArgs {
    pub async fn run(&self) -> Result<()> {
        logs::init(&self.level)?;

        let ps = PathSet::new(self.config.clone(), self.data.clone())?;
        let cfg: ServerConfig = ps.load_config("server", ServerConfig::default)?;

        let factory = ServerFactory::new(cfg)?;
        let job = factory.build_propagate_job();

        let args = if !self.backfill && self.sync.is_none() && self.cascade.is_empty() {
            jobs::PropagateArgs::periodic(job.mirror_enabled())
        } else {
            let sync = match self.sync.as_deref() {
                Some(value) => Some(SyncDirection::parse(value)?),
                None => None,
            };
            jobs::PropagateArgs {
                backfill: self.backfill,
                sync,
                cascade: self.cascade.clone(),
            }
        };

        job.run(&args, &WriteScope::All)
    }
}
