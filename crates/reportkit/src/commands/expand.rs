//! `reportkit expand`

use std::path::Path;

use anyhow::Result;

use super::{Settings, read_schema_text};

pub fn execute(settings: &Settings, schema: &Path) -> Result<()> {
    let service = settings.service()?;
    let text = read_schema_text(schema)?;
    let expanded = service.apply_report_xml_macros(&text)?;
    print!("{}", expanded);
    if !expanded.ends_with('\n') {
        println!();
    }
    Ok(())
}
