//! The shared template set every render runs against.
//!
//! All templates live in one `tera::Tera`, so `{% extends %}`,
//! `{% include %}` and `{% import %}` resolve across files. The set is an
//! immutable snapshot behind an `ArcSwap`: the writer builds a new `Tera`
//! next to the live one and swaps it in, readers never wait.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tera::Tera;

use crate::cache::CompiledTemplate;

/// Which templates made it into the set.
#[derive(Debug, Default)]
pub struct Admission {
    pub accepted: Vec<Arc<CompiledTemplate>>,
    /// Templates that parse but do not resolve, with the reason.
    pub rejected: Vec<(Arc<CompiledTemplate>, tera::Error)>,
}

impl Admission {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

pub struct TemplateSet {
    /// Filters and functions, no templates. Every rebuild starts from it.
    base: Tera,
    current: ArcSwap<Tera>,
}

impl TemplateSet {
    pub fn new(base: Tera) -> Self {
        Self {
            current: ArcSwap::from_pointee(base.clone()),
            base,
        }
    }

    /// The live set. Holding it keeps that version alive for the caller.
    pub fn snapshot(&self) -> Arc<Tera> {
        self.current.load_full()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.current.load().get_template_names().any(|name| name == key)
    }

    pub fn len(&self) -> usize {
        self.current.load().get_template_names().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn render(&self, key: &str, context: &tera::Context) -> tera::Result<String> {
        self.current.load().render(key, context)
    }

    /// Add or replace `templates` on top of the live set.
    ///
    /// A rejected template leaves its previous version, if any, in place.
    /// Inheritance chains are rebuilt over the whole set, so children pick
    /// up a changed layout.
    pub fn extend(&self, templates: Vec<Arc<CompiledTemplate>>) -> Admission {
        if templates.is_empty() {
            return Admission::default();
        }
        let live = Tera::clone(&self.current.load());
        let (next, admission) = admit(live, templates);
        self.current.store(Arc::new(next));
        admission
    }

    /// Replace the live set with exactly `templates`.
    pub fn rebuild(&self, templates: Vec<Arc<CompiledTemplate>>) -> Admission {
        let (next, admission) = admit(self.base.clone(), templates);
        self.current.store(Arc::new(next));
        admission
    }
}

impl std::fmt::Debug for TemplateSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateSet")
            .field("templates", &self.len())
            .finish_non_exhaustive()
    }
}

fn admit(tera: Tera, templates: Vec<Arc<CompiledTemplate>>) -> (Tera, Admission) {
    let mut batch = tera.clone();
    if batch
        .add_raw_templates(templates.iter().map(|t| (t.key(), t.source())))
        .is_ok()
    {
        return (
            batch,
            Admission {
                accepted: templates,
                rejected: Vec::new(),
            },
        );
    }

    // Something does not resolve. Admit one at a time and repeat while a
    // pass makes progress, so parents get in before their children.
    let mut tera = tera;
    let mut accepted = Vec::new();
    let mut pending = templates;
    loop {
        let before = accepted.len();
        let mut rejected = Vec::new();

        for template in pending {
            let mut trial = tera.clone();
            match trial.add_raw_template(template.key(), template.source()) {
                Ok(()) => {
                    tera = trial;
                    accepted.push(template);
                }
                Err(e) => rejected.push((template, e)),
            }
        }

        if accepted.len() == before || rejected.is_empty() {
            crate::debug_event!(
                "set",
                "admitted",
                "{} accepted, {} rejected",
                accepted.len(),
                rejected.len()
            );
            return (tera, Admission { accepted, rejected });
        }
        pending = rejected.into_iter().map(|(template, _)| template).collect();
    }
}
