use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::config::{CommonConfig, PathSet};
use crate::logs;
use crate::server::config::ServerConfig;
use crate::server::factory::ServerFactory;
use crate::time::current_timestamp;

/// Run the embargo sweep job once
#[derive(Args)]
pub struct SweepArgs {
    /// The config directory path
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// The data directory path
    #[clap(long)]
    pub data: Option<PathBuf>,

    /// The log level
    #[clap(short, long, default_value = "info")]
    pub level: String,
}

impl SweepArgs {
    pub async fn run(&self) -> Result<()> {
        logs::init(&self.level)?;

        let ps = PathSet::new(self.config.clone(), self.data.clone())?;
        let cfg: ServerConfig = ps.load_config("server", ServerConfig::default)?;

        let factory = ServerFactory::new(cfg)?;
        let job = factory.build_sweep_job();
        job.run(current_timestamp())
    }
}
