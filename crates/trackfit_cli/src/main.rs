mod cli;
mod commands;
mod errors;
mod form;
mod sink;

use app::{AppBuilder, Application};
use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use tracing::level_filters::LevelFilter;

use crate::cli::{Cli, Cmd};
use crate::commands::Environment;

pub struct TrackFit;

impl Application for TrackFit {
    const APP_ID: &'static str = "trackfit";
}

#[tokio::main]
pub async fn main() -> Result<()> {
    errors::init()?;
    let args = Cli::parse();

    let mut builder = AppBuilder::<TrackFit>::new(env!("CARGO_PKG_VERSION"));
    if let Some(dir) = &args.data_dir {
        builder = builder.with_base_path(dir);
    }
    if args.verbose {
        builder = builder.with_level(LevelFilter::DEBUG);
    }
    // The interactive form owns the terminal; log to file only.
    if matches!(args.cmd, Cmd::Form) {
        builder = builder.without_console();
    }
    let context = builder
        .build()
        .map_err(|err| eyre!("initialization failed: {err}"))?;
    tracing::info!(version = context.version(), app = context.app_id(), "starting");

    let env = Environment::open(context.path_context().clone())?;
    commands::run(args.cmd, &env).await
}
