//! Tera rendering engine for event titles and descriptions.
//!
//! | Family    | Title template          |
//! |-----------|-------------------------|
//! | status    | `status/title.tera`     |
//! | amount    | `amount/title.tera`     |
//! | ownership | `ownership/title.tera`  |
//! | created   | `created/title.tera`    |
//! | deleted   | `deleted/title.tera`    |
//! | generic   | `generic/title.tera`    |
//!
//! Every family shares `_description.tera`. A file at the same relative path
//! in an override directory replaces the embedded one; other files there are
//! not loaded.

use std::borrow::Cow;
use std::path::Path;

use tera::{Context, Tera};

use crate::context::{ChangeText, TemplateContext};
use crate::error::RenderError;

// ---------------------------------------------------------------------------
// Embedded templates, baked in at compile time via include_str!
// ---------------------------------------------------------------------------

const DESCRIPTION: &str = "_description.tera";

const TPLS: &[(&str, &str)] = &[
    (DESCRIPTION, include_str!("templates/_description.tera")),
    ("status/title.tera", include_str!("templates/status/title.tera")),
    ("amount/title.tera", include_str!("templates/amount/title.tera")),
    (
        "ownership/title.tera",
        include_str!("templates/ownership/title.tera"),
    ),
    ("created/title.tera", include_str!("templates/created/title.tera")),
    ("deleted/title.tera", include_str!("templates/deleted/title.tera")),
    ("generic/title.tera", include_str!("templates/generic/title.tera")),
];

// ---------------------------------------------------------------------------
// Template sources
// ---------------------------------------------------------------------------

/// Override text for `name` under `dir`, if the file exists.
fn read_override(dir: &Path, name: &str) -> Result<Option<String>, RenderError> {
    let path = dir.join(name);
    match std::fs::read_to_string(&path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(RenderError::Io { path, source }),
    }
}

/// One source per known template: the override when present, else the
/// embedded text.
fn template_sources(
    override_dir: Option<&Path>,
) -> Result<Vec<(&'static str, Cow<'static, str>)>, RenderError> {
    let mut sources = Vec::with_capacity(TPLS.len());
    for &(name, embedded) in TPLS {
        let text = match override_dir {
            Some(dir) => read_override(dir, name)?.map_or(Cow::Borrowed(embedded), Cow::Owned),
            None => Cow::Borrowed(embedded),
        };
        sources.push((name, text));
    }
    Ok(sources)
}

fn build_tera(override_dir: Option<&Path>) -> Result<Tera, RenderError> {
    let mut tera = Tera::default();
    tera.add_raw_templates(template_sources(override_dir)?)?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Rendered, trimmed event text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedText {
    pub title: String,
    pub description: String,
}

/// Abstraction over template engines so ingestion can be tested without tera.
pub trait TemplateEngine: Send + Sync {
    fn render_change(&self, change: &ChangeText<'_>) -> Result<RenderedText, RenderError>;
}

/// Tera-backed renderer with the embedded template set.
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Renderer with the embedded templates only.
    pub fn new() -> Result<Self, RenderError> {
        Ok(Self {
            tera: build_tera(None)?,
        })
    }

    /// Renderer whose templates can be overridden from `dir`.
    pub fn with_overrides(dir: &Path) -> Result<Self, RenderError> {
        Ok(Self {
            tera: build_tera(Some(dir))?,
        })
    }

    pub fn render(&self, ctx: &TemplateContext) -> Result<RenderedText, RenderError> {
        let context = Context::from_serialize(ctx)?;
        let title = self.tera.render(&ctx.family.title_template(), &context)?;
        let description = self.tera.render(DESCRIPTION, &context)?;
        Ok(RenderedText {
            title: title.trim().to_string(),
            description: description.trim().to_string(),
        })
    }
}

impl TemplateEngine for Renderer {
    fn render_change(&self, change: &ChangeText<'_>) -> Result<RenderedText, RenderError> {
        self.render(&TemplateContext::build(change))
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer").finish_non_exhaustive()
    }
}
