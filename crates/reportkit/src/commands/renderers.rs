//! `reportkit renderers`

use anyhow::Result;

use super::Settings;

pub fn execute(settings: &Settings) -> Result<()> {
    let service = settings.service()?;
    for (id, renderer) in service.renderers() {
        println!("{}\t{}", id, renderer.label());
    }
    Ok(())
}
