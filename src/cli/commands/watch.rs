//! Watch command: live reload until Ctrl-C.

use std::sync::Arc;

use crate::config::Settings;
use crate::engine::TemplateEngine;
use crate::reporter::TracingSink;

pub async fn run_watch(settings: &Settings) -> anyhow::Result<()> {
    let mut engine = TemplateEngine::new(settings, Arc::new(TracingSink))?;
    engine.start_live_reload()?;

    eprintln!(
        "Watching {} ({} templates). Press Ctrl-C to stop.",
        engine.root().display(),
        engine.index().len()
    );

    tokio::signal::ctrl_c().await?;
    eprintln!("Received shutdown signal");

    // Joining the reload thread blocks; keep it off the runtime workers.
    tokio::task::spawn_blocking(move || engine.shutdown()).await?;
    Ok(())
}
