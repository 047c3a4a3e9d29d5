//! ReportRenderer trait definition.

use std::borrow::Borrow;
use std::fmt;
use std::io::Write;

use super::error::RenderError;
use crate::evaluation::ReportData;
use crate::schema::ReportSchema;

/// Stable identity a renderer is registered under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RendererId(String);

impl RendererId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RendererId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for RendererId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RendererId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RendererId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One way a renderer can present a report.
///
/// Lower `sort_weight` is preferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderingMode {
    pub renderer: RendererId,
    pub label: String,
    /// Passed back to the renderer's `render` call.
    pub argument: Option<String>,
    pub sort_weight: i32,
}

impl RenderingMode {
    pub fn new(
        renderer: impl Into<RendererId>,
        label: impl Into<String>,
        argument: Option<&str>,
        sort_weight: i32,
    ) -> Self {
        Self {
            renderer: renderer.into(),
            label: label.into(),
            argument: argument.map(str::to_string),
            sort_weight,
        }
    }

    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }
}

impl fmt::Display for RenderingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.argument {
            Some(argument) => write!(f, "{}:{}", self.renderer, argument),
            None => write!(f, "{}", self.renderer),
        }
    }
}

/// Turns evaluated report data into a concrete output format.
///
/// # Thread Safety
///
/// Renderers are shared through the registry and must be `Send + Sync`.
pub trait ReportRenderer: Send + Sync {
    /// Default registration identity.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn label(&self) -> &str;

    /// Whether this renderer can present `schema` at all.
    ///
    /// Default: `true`
    fn can_render(&self, _schema: &ReportSchema) -> bool {
        true
    }

    /// Modes offered for `schema`, in this renderer's own preferred order.
    fn rendering_modes(&self, schema: &ReportSchema) -> Vec<RenderingMode>;

    /// MIME type of the output for the given mode argument.
    fn content_type(&self, argument: Option<&str>) -> String;

    /// Suggested file name for `schema` rendered with `argument`.
    fn filename(&self, schema: &ReportSchema, argument: Option<&str>) -> String;

    fn render(
        &self,
        data: &ReportData,
        argument: Option<&str>,
        out: &mut dyn Write,
    ) -> Result<(), RenderError>;
}

impl fmt::Debug for dyn ReportRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportRenderer")
            .field("id", &self.id())
            .field("label", &self.label())
            .finish()
    }
}
