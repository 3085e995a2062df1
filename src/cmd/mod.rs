use anyhow::Result;
use clap::{Parser, Subcommand};

mod propagate;
mod serve;
mod sweep;

#[derive(Parser)]
#[command(author, version, about)]
pub struct App {
    #[command(subcommand)]
    pub commands: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    Serve(serve::ServeArgs),
    Propagate(propagate::PropagateArgs),
    Sweep(sweep::SweepArgs),
}

impl App {
    pub async fn run(&self) -> Result<()> {
        match &self.commands {
            Commands::Serve(args) => args.run().await,
            Commands::Propagate(args) => args.run().await,
            Commands::Sweep(args) => args.run().await,
        }
    }
}
