//! Reload behavior driven through the coordinator with synthetic events.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use tplindex::{
    EngineError, EngineState, ErrorSink, ExtensionSet, PathScanner, ReloadConfig,
    ReloadCoordinator, Root, WatchEvent,
};

struct Harness {
    _temp_dir: TempDir,
    state: Arc<EngineState>,
    coordinator: ReloadCoordinator,
    reports: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    fn new(extensions: &[&str]) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink_reports = Arc::clone(&reports);
        let sink: Arc<dyn ErrorSink> = Arc::new(move |err: &EngineError| {
            sink_reports.lock().unwrap().push(err.to_string());
        });

        let root = Root::new(temp_dir.path()).unwrap();
        let scanner = PathScanner::new(ExtensionSet::new(extensions));
        let state = Arc::new(EngineState::new(
            root,
            scanner,
            ReloadConfig::default(),
            sink,
        ));
        let coordinator = ReloadCoordinator::new(Arc::clone(&state));

        Self {
            _temp_dir: temp_dir,
            state,
            coordinator,
            reports,
        }
    }

    fn root(&self) -> &Path {
        self.state.root.path()
    }

    fn scan(&self) {
        let outcome = self.state.scanner.scan(self.root()).unwrap();
        self.state.load_all(&outcome.files);
    }

    fn render(&self, name: &str) -> Option<String> {
        let path = self.state.index.lookup(name)?;
        self.state.render_path(&path, &tera::Context::new()).ok()
    }
}

#[test]
fn test_edit_then_create_then_lookup_missing() {
    let mut h = Harness::new(&[".html"]);
    let a = h.root().join("a.html");
    fs::write(&a, "X").unwrap();
    h.scan();
    assert_eq!(h.render("a").as_deref(), Some("X"));

    fs::write(&a, "Y").unwrap();
    h.coordinator.process(&WatchEvent::modified(&a));
    assert_eq!(h.render("a").as_deref(), Some("Y"));

    let b = h.root().join("b.html");
    fs::write(&b, "Z").unwrap();
    h.coordinator.process(&WatchEvent::created(&b));
    assert_eq!(h.render("b").as_deref(), Some("Z"));

    assert!(h.state.index.lookup("missing").is_none());
    assert!(h.reports.lock().unwrap().is_empty());
}

#[test]
fn test_scan_indexes_only_allowed_extensions() {
    let h = Harness::new(&[".html", "tmpl"]);
    fs::create_dir_all(h.root().join("layouts/partials")).unwrap();
    fs::write(h.root().join("index.html"), "i").unwrap();
    fs::write(h.root().join("layouts/base.tmpl"), "b").unwrap();
    fs::write(h.root().join("layouts/partials/nav.html"), "n").unwrap();
    fs::write(h.root().join("layouts/readme.md"), "r").unwrap();
    fs::write(h.root().join("style.css"), "c").unwrap();
    h.scan();

    let names: Vec<String> = h
        .state
        .index
        .entries()
        .into_iter()
        .map(|(name, _)| name.to_string())
        .collect();
    assert_eq!(names, vec!["index", "layouts/base", "layouts/partials/nav"]);

    for (name, path) in h.state.index.entries() {
        assert_eq!(tplindex::template_name(h.root(), &path), name);
        assert!(h.state.cache.get(&path).is_some());
    }
}

#[test]
fn test_broken_edit_keeps_last_good_version() {
    let mut h = Harness::new(&[".html"]);
    let page = h.root().join("page.html");
    fs::write(&page, "good").unwrap();
    h.scan();

    fs::write(&page, "{% if %}").unwrap();
    h.coordinator.process(&WatchEvent::modified(&page));

    assert_eq!(h.render("page").as_deref(), Some("good"));
    let reports = h.reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].contains("page.html"));
}

#[test]
fn test_disallowed_extension_events_change_nothing() {
    let mut h = Harness::new(&[".html"]);
    let notes = h.root().join("notes.txt");
    fs::write(&notes, "{{ broken").unwrap();
    h.coordinator.process(&WatchEvent::created(&notes));

    assert!(h.state.index.is_empty());
    assert!(h.state.cache.is_empty());
    assert!(h.reports.lock().unwrap().is_empty());
}

#[test]
fn test_layout_and_partial_edits_reach_children() {
    let mut h = Harness::new(&[".html"]);
    fs::create_dir(h.root().join("layouts")).unwrap();
    let base = h.root().join("layouts/base.html");
    fs::write(&base, "<main>{% block body %}{% endblock %}</main>").unwrap();
    fs::write(h.root().join("nav.html"), "nav").unwrap();
    fs::write(
        h.root().join("page.html"),
        r#"{% extends "layouts/base.html" %}{% block body %}{% include "nav.html" %}{% endblock %}"#,
    )
    .unwrap();
    h.scan();
    assert_eq!(h.render("page").as_deref(), Some("<main>nav</main>"));

    // Editing only the layout re-renders the child with it
    fs::write(&base, "<section>{% block body %}{% endblock %}</section>").unwrap();
    h.coordinator.process(&WatchEvent::modified(&base));
    assert_eq!(h.render("page").as_deref(), Some("<section>nav</section>"));

    // An include picks up the edited partial as well
    let nav = h.root().join("nav.html");
    fs::write(&nav, "menu").unwrap();
    h.coordinator.process(&WatchEvent::modified(&nav));
    assert_eq!(h.render("page").as_deref(), Some("<section>menu</section>"));
    assert!(h.reports.lock().unwrap().is_empty());
}

#[test]
fn test_child_created_before_its_layout() {
    let mut h = Harness::new(&[".html"]);
    let page = h.root().join("page.html");
    fs::write(&page, r#"{% extends "base.html" %}{% block b %}p{% endblock %}"#).unwrap();
    h.coordinator.process(&WatchEvent::created(&page));
    assert!(h.state.index.lookup("page").is_none());
    assert_eq!(h.reports.lock().unwrap().len(), 1);

    let base = h.root().join("base.html");
    fs::write(&base, "[{% block b %}{% endblock %}]").unwrap();
    h.coordinator.process(&WatchEvent::created(&base));
    h.coordinator.process(&WatchEvent::modified(&page));
    assert_eq!(h.render("page").as_deref(), Some("[p]"));
}
