//! `reportkit macros`
//!
//! Edits only make sense against a file, so `set` and `unset` refuse to run
//! without one.

use anyhow::{Result, bail};
use reportkit_core::{MacroTable, ReportService};

use super::Settings;

pub fn list(settings: &Settings) -> Result<()> {
    let table = settings.service()?.report_xml_macros()?;
    for (name, value) in table.iter() {
        println!("{} = {}", name, value);
    }
    Ok(())
}

pub fn set(settings: &Settings, name: &str, value: &str) -> Result<()> {
    if !MacroTable::is_valid_name(name) {
        bail!("Invalid macro name '{}'", name);
    }
    let service = editable_service(settings)?;
    let mut table = service.report_xml_macros()?;
    table.insert(name, value);
    service.save_report_xml_macros(&table)?;
    Ok(())
}

pub fn unset(settings: &Settings, name: &str) -> Result<()> {
    let service = editable_service(settings)?;
    let mut table = service.report_xml_macros()?;
    if table.remove(name).is_none() {
        bail!("No macro named '{}'", name);
    }
    service.save_report_xml_macros(&table)?;
    Ok(())
}

fn editable_service(settings: &Settings) -> Result<ReportService> {
    if settings.load_config()?.macros_file.is_none() {
        bail!("No macro file configured; pass --macros FILE or set macros-file in the config");
    }
    settings.service()
}
