//! State shared between the engine (readers) and the reload coordinator (writer).
//!
//! Invariant: every cached artifact is in the template set, and every
//! indexed path is cached. Writes go set first, then cache, then index.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::{CompileError, CompiledTemplate, TemplateCache};
use crate::config::ReloadConfig;
use crate::error::EngineError;
use crate::index::TemplateIndex;
use crate::names::{Root, TemplateName, template_key, template_name};
use crate::reporter::ErrorSink;
use crate::scanner::PathScanner;
use crate::set::{Admission, TemplateSet};

pub struct EngineState {
    pub root: Root,
    pub scanner: PathScanner,
    pub index: TemplateIndex,
    pub cache: TemplateCache,
    pub set: TemplateSet,
    pub reload: ReloadConfig,
    pub sink: Arc<dyn ErrorSink>,
}

impl EngineState {
    pub fn new(
        root: Root,
        scanner: PathScanner,
        reload: ReloadConfig,
        sink: Arc<dyn ErrorSink>,
    ) -> Self {
        Self::with_base(root, scanner, reload, tera::Tera::default(), sink)
    }

    /// Like [`EngineState::new`], with filters and functions already
    /// registered on `base`.
    pub fn with_base(
        root: Root,
        scanner: PathScanner,
        reload: ReloadConfig,
        base: tera::Tera,
        sink: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            cache: TemplateCache::new(root.path()),
            root,
            scanner,
            index: TemplateIndex::new(),
            set: TemplateSet::new(base),
            reload,
            sink,
        }
    }

    pub fn name_for(&self, path: &Path) -> TemplateName {
        template_name(self.root.path(), path)
    }

    /// Compile `path` into the set and point its name at it.
    ///
    /// Nothing changes unless the template parses and resolves.
    pub fn load(&self, path: &Path) -> Result<TemplateName, CompileError> {
        let compiled = self.cache.prepare(path)?;
        let mut admission = self.admit(vec![compiled]);
        match admission.rejected.pop() {
            Some((template, source)) => Err(CompileError::Resolve {
                path: template.path().to_path_buf(),
                source,
            }),
            None => Ok(self.name_for(path)),
        }
    }

    /// Load every file as one batch, reporting failures to the sink.
    ///
    /// Returns how many loaded successfully.
    pub fn load_all(&self, files: &[PathBuf]) -> usize {
        let mut ready = Vec::with_capacity(files.len());
        for path in files {
            match self.cache.prepare(path) {
                Ok(compiled) => ready.push(compiled),
                Err(e) => self.report(EngineError::Compile(e)),
            }
        }

        let admission = self.admit(ready);
        let loaded = admission.accepted.len();
        for (template, source) in admission.rejected {
            self.report(EngineError::Compile(CompileError::Resolve {
                path: template.path().to_path_buf(),
                source,
            }));
        }
        loaded
    }

    fn admit(&self, templates: Vec<Arc<CompiledTemplate>>) -> Admission {
        // Same content, already live under its own name: skip the rebuild.
        let (unchanged, changed): (Vec<_>, Vec<_>) =
            templates.into_iter().partition(|t| self.is_live(t));

        let mut admission = self.set.extend(changed);
        for template in &admission.accepted {
            self.cache.insert(Arc::clone(template));
            self.index
                .put(self.name_for(template.path()), template.path().to_path_buf());
        }
        admission.accepted.extend(unchanged);
        admission
    }

    fn is_live(&self, template: &Arc<CompiledTemplate>) -> bool {
        self.cache.is_current(template)
            && self
                .index
                .lookup(self.name_for(template.path()).as_str())
                .is_some_and(|indexed| indexed == template.path())
    }

    /// Drop every name and artifact at or below `path`, then rebuild the set.
    ///
    /// Templates left without a parent layout are dropped too and reported.
    pub fn evict(&self, path: &Path) -> Vec<TemplateName> {
        let mut names = self.index.remove_path(path);
        if self.cache.invalidate_under(path) == 0 {
            return names;
        }

        let admission = self.set.rebuild(self.cache.templates());
        for (template, source) in admission.rejected {
            self.cache.invalidate(template.path());
            names.extend(self.index.remove_path(template.path()));
            self.report(EngineError::Compile(CompileError::Resolve {
                path: template.path().to_path_buf(),
                source,
            }));
        }
        names.sort();
        names
    }

    /// Render the template compiled from `path` against the live set.
    pub fn render_path(&self, path: &Path, context: &tera::Context) -> tera::Result<String> {
        self.set.render(&template_key(self.root.path(), path), context)
    }

    pub fn report(&self, error: EngineError) {
        self.sink.report(&error);
    }
}

impl std::fmt::Debug for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineState")
            .field("root", &self.root)
            .field("templates", &self.index.len())
            .field("cached", &self.cache.len())
            .field("set", &self.set)
            .field("reload", &self.reload)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::ExtensionSet;
    use parking_lot::Mutex;
    use std::fs;
    use tempfile::TempDir;

    fn state_with_reports(temp_dir: &TempDir) -> (EngineState, Arc<Mutex<Vec<String>>>) {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink_reports = Arc::clone(&reports);
        let state = EngineState::new(
            Root::new(temp_dir.path()).unwrap(),
            PathScanner::new(ExtensionSet::new([".html"])),
            ReloadConfig::default(),
            Arc::new(move |err: &EngineError| sink_reports.lock().push(err.to_string())),
        );
        (state, reports)
    }

    fn render(state: &EngineState, name: &str) -> String {
        let path = state.index.lookup(name).unwrap();
        state.render_path(&path, &tera::Context::new()).unwrap()
    }

    #[test]
    fn test_load_all_resolves_layouts_in_any_order() {
        let temp_dir = TempDir::new().unwrap();
        let (state, reports) = state_with_reports(&temp_dir);
        let root = state.root.path().to_path_buf();
        fs::create_dir(root.join("layouts")).unwrap();
        fs::write(
            root.join("a_page.html"),
            r#"{% extends "layouts/base.html" %}{% block body %}A{% endblock %}"#,
        )
        .unwrap();
        fs::write(root.join("layouts/base.html"), "<{% block body %}{% endblock %}>").unwrap();

        let files = state.scanner.scan(&root).unwrap().files;
        assert_eq!(state.load_all(&files), 2);
        assert!(reports.lock().is_empty());
        assert_eq!(render(&state, "a_page"), "<A>");
    }

    #[test]
    fn test_unresolved_template_is_reported_and_not_indexed() {
        let temp_dir = TempDir::new().unwrap();
        let (state, reports) = state_with_reports(&temp_dir);
        let page = state.root.path().join("page.html");
        fs::write(&page, r#"{% extends "nope.html" %}"#).unwrap();

        let err = state.load(&page).unwrap_err();
        assert!(matches!(err, CompileError::Resolve { .. }));
        assert!(state.index.is_empty());
        assert!(state.cache.is_empty());

        assert_eq!(state.load_all(&[page]), 0);
        assert!(reports.lock()[0].contains("does not resolve"));
    }

    #[test]
    fn test_evicting_layout_drops_its_children() {
        let temp_dir = TempDir::new().unwrap();
        let (state, reports) = state_with_reports(&temp_dir);
        let root = state.root.path().to_path_buf();
        fs::write(root.join("base.html"), "{% block b %}{% endblock %}").unwrap();
        fs::write(root.join("child.html"), r#"{% extends "base.html" %}"#).unwrap();
        fs::write(root.join("solo.html"), "solo").unwrap();
        let files = state.scanner.scan(&root).unwrap().files;
        state.load_all(&files);

        let names = state.evict(&root.join("base.html"));
        let names: Vec<&str> = names.iter().map(TemplateName::as_str).collect();
        assert_eq!(names, vec!["base", "child"]);
        assert_eq!(state.index.len(), 1);
        assert_eq!(state.cache.len(), 1);
        assert_eq!(state.set.len(), 1);
        assert_eq!(reports.lock().len(), 1);
        assert_eq!(render(&state, "solo"), "solo");
    }
}
