//! Render command.

use anyhow::Context;

use crate::config::Settings;
use crate::engine::TemplateEngine;

use super::stderr_sink;

pub fn run_render(settings: &Settings, name: &str, data: Option<&str>) -> anyhow::Result<()> {
    let data: serde_json::Value = match data {
        Some(raw) => serde_json::from_str(raw).context("parsing --data as JSON")?,
        None => serde_json::Value::Null,
    };

    let engine = TemplateEngine::new(settings, stderr_sink())?;
    engine.render_to(name, &data, std::io::stdout().lock())?;
    Ok(())
}
