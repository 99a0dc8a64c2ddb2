//! # tidemark-render
//!
//! Tera-based rendering of default titles and descriptions for change events
//! that arrive without human-written text.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tidemark_core::types::SourceKind;
//! use tidemark_render::{ChangeText, Renderer, TemplateEngine};
//!
//! fn headline() {
//!     if let Ok(renderer) = Renderer::new() {
//!         let change = ChangeText {
//!             rule: "record_created",
//!             change_type: "member_created",
//!             entity_type: "member",
//!             entity_id: "m-1",
//!             entity_title: None,
//!             source: SourceKind::User,
//!             source_name: None,
//!             actor: None,
//!             diff: None,
//!         };
//!         if let Ok(text) = renderer.render_change(&change) {
//!             println!("{}", text.title);
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::{ChangeText, FieldCtx, TemplateContext, TemplateFamily};
pub use engine::{RenderedText, Renderer, TemplateEngine};
pub use error::RenderError;
