//! List command.

use crate::config::Settings;
use crate::engine::TemplateEngine;

use super::stderr_sink;

pub fn run_list(settings: &Settings) -> anyhow::Result<()> {
    let engine = TemplateEngine::new(settings, stderr_sink())?;
    let templates = engine.templates();

    let width = templates
        .iter()
        .map(|(name, _)| name.as_str().len())
        .max()
        .unwrap_or(0);

    for (name, path) in &templates {
        println!("{:<width$}  {}", name.as_str(), path.display());
    }
    eprintln!("{} templates under {}", templates.len(), engine.root().display());
    Ok(())
}
