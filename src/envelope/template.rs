//! The template rendering collaborator.

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors reported by a [`TemplateRenderer`].
#[derive(Debug, Error)]
pub enum RenderError {
    /// No renderer is configured for this server.
    #[error("template rendering is not configured (template {0})")]
    Unavailable(String),

    /// The named template does not exist.
    #[error("template not found: {0}")]
    NotFound(String),

    /// The renderer failed while producing output.
    #[error("render template error: {0}")]
    Failed(String),
}

/// Produces HTML for render envelopes and `tpl` requests.
///
/// The engine itself lives outside this crate; the server only needs a name,
/// the variables, and a string back.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template_name: &str, fields: &Map<String, Value>) -> Result<String, RenderError>;
}

/// The renderer used when none is configured. Every render fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTemplates;

impl TemplateRenderer for NoTemplates {
    fn render(&self, template_name: &str, _fields: &Map<String, Value>) -> Result<String, RenderError> {
        Err(RenderError::Unavailable(template_name.to_string()))
    }
}
