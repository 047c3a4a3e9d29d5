//! `reportkit modes`

use std::path::Path;

use anyhow::Result;

use super::{Settings, load_schema};

pub fn execute(settings: &Settings, path: &Path) -> Result<()> {
    let service = settings.service()?;
    let schema = load_schema(&service, path)?;
    let modes = service.rendering_modes(&schema);
    if modes.is_empty() {
        tracing::warn!(schema = %schema.name, "No renderer can render this schema");
    }
    for mode in modes {
        println!("{}\t{}", mode, mode.label);
    }
    Ok(())
}
