//! flowhands - browser automation core for Flow video generation.
//!
//! Main entry point for the flowhands CLI and command server.

mod app;
mod cli;
mod commands;
mod server;

use clap::Parser;

use flowhands_config::ConfigLoader;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = ConfigLoader::load_or_default(&cli.config)?;

    server::init_tracing(&config.logging)?;

    match cli.command {
        None => server::run_server(config, None, None).await,
        Some(Commands::Serve { host, port }) => server::run_server(config, host, port).await,
        Some(Commands::Generate {
            settings,
            prompt,
            mode,
            new_project,
            frames,
            direct,
        }) => commands::generate(&config, settings, prompt, mode, new_project, frames, direct).await,
        Some(Commands::TestSettings {
            settings,
            prompt,
            new_project,
        }) => commands::test_settings(&config, settings, prompt, new_project).await,
        Some(Commands::CheckConfig) => commands::check_config(&cli.config, &config),
    }
}
