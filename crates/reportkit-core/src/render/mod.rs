//! Report renderers and the registry that holds them.

mod delimited;
mod error;
mod registry;
mod text;
mod traits;

pub use delimited::DelimitedRenderer;
pub use error::RenderError;
pub use registry::{RendererFactories, RendererFactory, RendererRegistry};
pub use text::TextTableRenderer;
pub use traits::{RendererId, RenderingMode, ReportRenderer};

/// File-name stem for a report title: lowercase ASCII words joined by `-`.
pub fn file_stem(title: &str) -> String {
    let mut stem = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            stem.push(c.to_ascii_lowercase());
        } else if !stem.is_empty() && !stem.ends_with('-') {
            stem.push('-');
        }
    }
    while stem.ends_with('-') {
        stem.pop();
    }
    if stem.is_empty() {
        stem.push_str("report");
    }
    stem
}
