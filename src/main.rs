use clap::Parser;
use tplindex::Settings;
use tplindex::cli::commands::{self, init, list, render, watch};
use tplindex::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Init writes the file the other commands read, so only they load it.
    let load = || -> anyhow::Result<Settings> {
        let settings = commands::load_settings(&cli)?;
        tplindex::logging::init_with_config(&settings.logging);
        Ok(settings)
    };

    match &cli.command {
        Commands::Init { force } => init::run_init(&commands::config_path(&cli), *force),
        Commands::Config => init::run_config(&load()?),
        Commands::List => list::run_list(&load()?),
        Commands::Render { name, data } => render::run_render(&load()?, name, data.as_deref()),
        Commands::Watch => watch::run_watch(&load()?).await,
    }
}
