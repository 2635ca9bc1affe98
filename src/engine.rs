//! Template engine: initial scan, render-time lookups, live-reload lifecycle.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Sender, bounded};

use crate::cache::{CompiledTemplate, TemplateCache};
use crate::config::Settings;
use crate::error::{EngineError, EngineResult};
use crate::index::TemplateIndex;
use crate::names::{Root, TemplateName};
use crate::reload::ReloadCoordinator;
use crate::reporter::{ErrorSink, TracingSink};
use crate::scanner::{ExtensionSet, PathScanner};
use crate::set::TemplateSet;
use crate::state::EngineState;
use crate::watcher::{TemplateWatcher, WatchError};

/// Running watcher + coordinator pair.
struct LiveReload {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

/// An index of compiled templates under one root.
///
/// Lookups and renders may run from any number of threads. With live
/// reload on, a background thread keeps the index in sync with the
/// filesystem until [`TemplateEngine::shutdown`] or drop.
pub struct TemplateEngine {
    state: Arc<EngineState>,
    globals: serde_json::Map<String, serde_json::Value>,
    /// Registered template functions; part of the global namespace.
    functions: BTreeSet<String>,
    /// Directories found by the initial scan, subscribed when live reload starts.
    scanned_dirs: Vec<PathBuf>,
    live: Option<LiveReload>,
}

impl TemplateEngine {
    /// Builder for an engine with custom filters and functions.
    pub fn builder(settings: &Settings) -> EngineBuilder<'_> {
        EngineBuilder::new(settings)
    }

    /// Scan the root and compile every template. No watching.
    ///
    /// Fails if the root is invalid or the scan fails. Individual compile
    /// failures are reported to `sink` and leave that template unindexed.
    pub fn new(settings: &Settings, sink: Arc<dyn ErrorSink>) -> EngineResult<Self> {
        Self::builder(settings).sink(sink).build()
    }

    fn from_parts(
        settings: &Settings,
        base: tera::Tera,
        functions: BTreeSet<String>,
        sink: Arc<dyn ErrorSink>,
    ) -> EngineResult<Self> {
        if let Some(name) = functions.iter().find(|name| settings.context.contains_key(*name)) {
            return Err(EngineError::DuplicateFunction { name: name.clone() });
        }

        let root = Root::new(&settings.root)?;
        let scanner = PathScanner::new(ExtensionSet::new(&settings.extensions));

        if scanner.extensions().is_empty() {
            tracing::warn!("[engine] no template extensions configured, nothing will be indexed");
        }

        let outcome = scanner.scan(root.path())?;
        let state = Arc::new(EngineState::with_base(
            root,
            scanner,
            settings.reload.clone(),
            base,
            sink,
        ));

        let loaded = state.load_all(&outcome.files);
        crate::log_event!(
            "engine",
            "loaded",
            "{loaded}/{} templates from {}",
            outcome.files.len(),
            state.root.path().display()
        );

        Ok(Self {
            state,
            globals: settings.context.clone(),
            functions,
            scanned_dirs: outcome.directories,
            live: None,
        })
    }

    /// [`TemplateEngine::new`], then start live reload if `settings.live_reload`.
    ///
    /// A watcher that cannot start is reported to `sink`; the engine keeps
    /// serving its scan results without live reload.
    pub fn open(settings: &Settings, sink: Arc<dyn ErrorSink>) -> EngineResult<Self> {
        Self::builder(settings).sink(sink).open()
    }

    /// [`TemplateEngine::open`] reporting to [`TracingSink`].
    pub fn with_settings(settings: &Settings) -> EngineResult<Self> {
        Self::builder(settings).open()
    }

    /// Start watching the root. No-op if already running.
    pub fn start_live_reload(&mut self) -> EngineResult<()> {
        if self.live.is_some() {
            return Ok(());
        }

        let (watcher, streams) = TemplateWatcher::start(
            self.state.root.path(),
            &self.scanned_dirs,
            &self.state.reload,
        )
        .map_err(EngineError::from_watch)?;

        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let handle = ReloadCoordinator::new(Arc::clone(&self.state))
            .with_watcher(watcher)
            .spawn(streams, shutdown_rx)
            .map_err(|e| {
                EngineError::WatchInit(WatchError::InitFailed {
                    reason: format!("cannot spawn reload thread: {e}"),
                })
            })?;

        self.live = Some(LiveReload {
            shutdown: shutdown_tx,
            handle,
        });
        crate::log_event!("engine", "live reload on", "{}", self.state.root.path().display());
        Ok(())
    }

    pub fn is_live_reloading(&self) -> bool {
        self.live.is_some()
    }

    /// Stop live reload and release watch handles. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(live) = self.live.take() {
            drop(live.shutdown);
            if live.handle.join().is_err() {
                tracing::error!("[engine] reload thread panicked");
            }
            crate::log_event!("engine", "live reload off");
        }
    }

    /// Path indexed under `name`.
    pub fn lookup(&self, name: &str) -> EngineResult<PathBuf> {
        self.state
            .index
            .lookup(name)
            .ok_or_else(|| EngineError::NotFound {
                name: name.to_string(),
            })
    }

    /// Compiled artifact for `path`.
    ///
    /// Served from the cache when present. On a miss the file is parsed
    /// for this call only, without touching the cache or the template set,
    /// so the reload coordinator stays the sole writer.
    pub fn compiled(&self, path: &Path) -> EngineResult<Arc<CompiledTemplate>> {
        if let Some(compiled) = self.state.cache.get(path) {
            return Ok(compiled);
        }
        Ok(self.state.cache.prepare(path)?)
    }

    /// Compiled artifact for `name`.
    pub fn template(&self, name: &str) -> EngineResult<Arc<CompiledTemplate>> {
        let path = self.lookup(name)?;
        self.compiled(&path)
    }

    /// Render `name` with the global context plus `data` (a JSON object).
    pub fn render(&self, name: &str, data: &serde_json::Value) -> EngineResult<String> {
        let path = self.lookup(name)?;
        let context = self.build_context(data)?;
        self.state
            .render_path(&path, &context)
            .map_err(|source| EngineError::Render {
                name: name.to_string(),
                source,
            })
    }

    /// Like [`TemplateEngine::render`], writing into `out`.
    pub fn render_to(
        &self,
        name: &str,
        data: &serde_json::Value,
        mut out: impl Write,
    ) -> EngineResult<()> {
        let rendered = self.render(name, data)?;
        out.write_all(rendered.as_bytes())?;
        Ok(())
    }

    /// Globals first, then render data. Render data may not shadow a
    /// global value or a registered function.
    fn build_context(&self, data: &serde_json::Value) -> EngineResult<tera::Context> {
        let empty = serde_json::Map::new();
        let data = match data {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => &empty,
            other => {
                return Err(EngineError::InvalidRenderData {
                    kind: json_kind(other),
                });
            }
        };

        let mut context = tera::Context::new();
        for (key, value) in &self.globals {
            context.insert(key.as_str(), value);
        }
        for (key, value) in data {
            if self.globals.contains_key(key) || self.functions.contains(key) {
                return Err(EngineError::DuplicateContextKey { key: key.clone() });
            }
            context.insert(key.as_str(), value);
        }
        Ok(context)
    }

    pub fn root(&self) -> &Path {
        self.state.root.path()
    }

    pub fn extensions(&self) -> &ExtensionSet {
        self.state.scanner.extensions()
    }

    pub fn index(&self) -> &TemplateIndex {
        &self.state.index
    }

    pub fn cache(&self) -> &TemplateCache {
        &self.state.cache
    }

    pub fn template_set(&self) -> &TemplateSet {
        &self.state.set
    }

    /// Sorted `(name, path)` snapshot.
    pub fn templates(&self) -> Vec<(TemplateName, PathBuf)> {
        self.state.index.entries()
    }
}

impl Drop for TemplateEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("state", &self.state)
            .field("live_reload", &self.is_live_reloading())
            .finish()
    }
}

/// Configures filters and functions before the initial scan.
///
/// ```no_run
/// use std::collections::HashMap;
/// use tplindex::{Settings, TemplateEngine};
///
/// let settings = Settings::for_root("templates");
/// let engine = TemplateEngine::builder(&settings)
///     .filter("shout", |v: &tera::Value, _: &HashMap<String, tera::Value>| {
///         Ok(tera::Value::String(v.as_str().unwrap_or_default().to_uppercase()))
///     })
///     .open()?;
/// # Ok::<(), tplindex::EngineError>(())
/// ```
pub struct EngineBuilder<'a> {
    settings: &'a Settings,
    sink: Arc<dyn ErrorSink>,
    base: tera::Tera,
    functions: BTreeSet<String>,
}

impl<'a> EngineBuilder<'a> {
    fn new(settings: &'a Settings) -> Self {
        Self {
            settings,
            sink: Arc::new(TracingSink),
            base: tera::Tera::default(),
            functions: BTreeSet::new(),
        }
    }

    /// Where non-fatal errors go. Defaults to [`TracingSink`].
    pub fn sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Register a filter, replacing a built-in or earlier one of the same name.
    pub fn filter<F: tera::Filter + 'static>(mut self, name: &str, filter: F) -> Self {
        self.base.register_filter(name, filter);
        self
    }

    /// Register a function. Its name joins the global namespace, so it may
    /// not collide with a `context` key.
    pub fn function<F: tera::Function + 'static>(mut self, name: &str, function: F) -> Self {
        self.base.register_function(name, function);
        self.functions.insert(name.to_string());
        self
    }

    /// Register a test, usable as `{% if x is name %}`.
    pub fn tester<T: tera::Test + 'static>(mut self, name: &str, tester: T) -> Self {
        self.base.register_tester(name, tester);
        self
    }

    /// Scan and compile, without live reload.
    pub fn build(self) -> EngineResult<TemplateEngine> {
        TemplateEngine::from_parts(self.settings, self.base, self.functions, self.sink)
    }

    /// [`EngineBuilder::build`], then live reload if `settings.live_reload`.
    ///
    /// A watcher that cannot start is reported to the sink; the engine keeps
    /// serving its scan results.
    pub fn open(self) -> EngineResult<TemplateEngine> {
        let live_reload = self.settings.live_reload;
        let mut engine = self.build()?;
        if live_reload {
            if let Err(e) = engine.start_live_reload() {
                engine.state.report(e);
            }
        }
        Ok(engine)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn quiet() -> Arc<dyn ErrorSink> {
        Arc::new(|_: &EngineError| {})
    }

    fn settings_for(dir: &Path) -> Settings {
        let mut settings = Settings::for_root(dir);
        settings.live_reload = false;
        settings
    }

    #[test]
    fn test_render_merges_globals_and_data() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("greet.html"),
            "{{ site }}: hello {{ user }}",
        )
        .unwrap();

        let mut settings = settings_for(temp_dir.path());
        settings.context.insert("site".to_string(), json!("Docs"));
        let engine = TemplateEngine::new(&settings, quiet()).unwrap();

        let out = engine.render("greet", &json!({ "user": "ada" })).unwrap();
        assert_eq!(out, "Docs: hello ada");
    }

    #[test]
    fn test_render_rejects_data_shadowing_globals() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.html"), "{{ site }}").unwrap();

        let mut settings = settings_for(temp_dir.path());
        settings.context.insert("site".to_string(), json!("Docs"));
        let engine = TemplateEngine::new(&settings, quiet()).unwrap();

        let err = engine.render("a", &json!({ "site": "Other" })).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateContextKey { key } if key == "site"));
    }

    #[test]
    fn test_render_rejects_non_object_data() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.html"), "static").unwrap();
        let engine = TemplateEngine::new(&settings_for(temp_dir.path()), quiet()).unwrap();

        let err = engine.render("a", &json!([1, 2])).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRenderData { kind: "array" }));
        assert_eq!(engine.render("a", &json!(null)).unwrap(), "static");
    }

    #[test]
    fn test_execution_error_is_render_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.html"), "{{ missing_var }}").unwrap();
        let engine = TemplateEngine::new(&settings_for(temp_dir.path()), quiet()).unwrap();

        let err = engine.render("a", &json!({})).unwrap_err();
        assert!(matches!(err, EngineError::Render { .. }));
    }

    #[test]
    fn test_render_to_writer() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.html"), "n={{ n }}").unwrap();
        let engine = TemplateEngine::new(&settings_for(temp_dir.path()), quiet()).unwrap();

        let mut out = Vec::new();
        engine.render_to("a", &json!({ "n": 3 }), &mut out).unwrap();
        assert_eq!(out, b"n=3");
    }

    #[test]
    fn test_compiled_on_cache_miss_does_not_store() {
        let temp_dir = TempDir::new().unwrap();
        let engine = TemplateEngine::new(&settings_for(temp_dir.path()), quiet()).unwrap();

        let late = engine.root().join("late.html");
        fs::write(&late, "late").unwrap();
        let compiled = engine.compiled(&late).unwrap();
        assert_eq!(compiled.source(), "late");
        assert_eq!(compiled.key(), "late.html");
        assert!(engine.cache().get(&late).is_none());
        assert!(!engine.template_set().contains("late.html"));

        fs::write(&late, "{% for %}").unwrap();
        assert!(matches!(
            engine.compiled(&late),
            Err(EngineError::Compile(_))
        ));
    }

    #[test]
    fn test_templates_extend_and_include_each_other() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("base.html"), "<body>{% block body %}{% endblock %}</body>").unwrap();
        fs::write(root.join("header.html"), "header").unwrap();
        fs::write(
            root.join("page.html"),
            r#"{% extends "base.html" %}{% block body %}{{ title }}{% endblock %}"#,
        )
        .unwrap();
        fs::write(root.join("index2.html"), r#"{% include "header.html" %} | index2"#).unwrap();

        let engine = TemplateEngine::new(&settings_for(root), quiet()).unwrap();

        assert_eq!(
            engine.render("page", &json!({ "title": "Hi" })).unwrap(),
            "<body>Hi</body>"
        );
        let index2 = engine.render("index2", &json!({})).unwrap();
        assert!(index2.contains("header"));
    }

    #[test]
    fn test_custom_filter_and_function() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("a.txt"),
            "{{ name | shout }} {{ year() }}",
        )
        .unwrap();
        let mut settings = settings_for(temp_dir.path());
        settings.extensions = vec![".txt".to_string()];

        let engine = TemplateEngine::builder(&settings)
            .sink(quiet())
            .filter(
                "shout",
                |value: &tera::Value, _: &HashMap<String, tera::Value>| {
                    Ok(json!(value.as_str().unwrap_or_default().to_uppercase()))
                },
            )
            .function("year", |_: &HashMap<String, tera::Value>| Ok(json!(2024)))
            .build()
            .unwrap();

        assert_eq!(engine.render("a", &json!({ "name": "ada" })).unwrap(), "ADA 2024");
    }

    #[test]
    fn test_filter_replaces_builtin() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.html"), "{{ 'x' | upper }}").unwrap();

        let engine = TemplateEngine::builder(&settings_for(temp_dir.path()))
            .sink(quiet())
            .filter("upper", |_: &tera::Value, _: &HashMap<String, tera::Value>| {
                Ok(json!("replaced"))
            })
            .build()
            .unwrap();

        assert_eq!(engine.render("a", &json!({})).unwrap(), "replaced");
    }

    #[test]
    fn test_function_colliding_with_global_fails_construction() {
        let temp_dir = TempDir::new().unwrap();
        let mut settings = settings_for(temp_dir.path());
        settings.context.insert("now".to_string(), json!("static"));

        let err = TemplateEngine::builder(&settings)
            .sink(quiet())
            .function("now", |_: &HashMap<String, tera::Value>| Ok(json!(0)))
            .build()
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateFunction { name } if name == "now"));
    }

    #[test]
    fn test_render_data_may_not_shadow_function() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.html"), "x").unwrap();

        let engine = TemplateEngine::builder(&settings_for(temp_dir.path()))
            .sink(quiet())
            .function("now", |_: &HashMap<String, tera::Value>| Ok(json!(0)))
            .build()
            .unwrap();

        let err = engine.render("a", &json!({ "now": 1 })).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateContextKey { key } if key == "now"));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let mut settings = settings_for(temp_dir.path());
        settings.live_reload = true;

        let mut engine = TemplateEngine::open(&settings, quiet()).unwrap();
        assert!(engine.is_live_reloading());
        engine.shutdown();
        assert!(!engine.is_live_reloading());
        engine.shutdown();
    }
}
