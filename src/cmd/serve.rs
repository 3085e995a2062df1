use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::config::{CommonConfig, PathSet};
use crate::logs;
use crate::server::config::ServerConfig;
use crate::server::factory::ServerFactory;
use crate::server::jobs;

/// Start the agate server
#[derive(Args)]
pub struct ServeArgs {
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

impl ServeArgs {
    pub async fn run(&self) -> Result<()> {
        logs::init(&self.level)?;

        let ps = PathSet::new(self.config.clone(), self.data.clone())?;
        let cfg: ServerConfig = ps.load_config("server", ServerConfig::default)?;

        let factory = ServerFactory::new(cfg)?;

        let (propagate, sweep) = factory.build_periodic_jobs()?;
        jobs::start_jobs(propagate, sweep);

        let server = factory.build_server()?;
        server.run().await
    }
}
