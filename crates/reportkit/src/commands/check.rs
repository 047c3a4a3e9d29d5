//! `reportkit check`

use std::path::Path;

use anyhow::Result;
use reportkit_core::{Parameter, ReportSchema};

use super::{Settings, load_schema};

pub fn execute(settings: &Settings, path: &Path) -> Result<()> {
    let service = settings.service()?;
    let schema = load_schema(&service, path)?;
    tracing::debug!(path = %path.display(), schema = %schema.name, "Schema is valid");
    print!("{}", summary(&schema));
    Ok(())
}

fn summary(schema: &ReportSchema) -> String {
    let mut out = format!("Schema: {}\n", schema.name);
    if let Some(description) = &schema.description {
        out.push_str(&format!("Description: {}\n", description));
    }
    if !schema.parameters.is_empty() {
        out.push_str("Parameters:\n");
        for parameter in &schema.parameters {
            out.push_str(&format!("  {}\n", describe_parameter(parameter)));
        }
    }
    if let Some(filter) = &schema.filter {
        out.push_str(&format!("Filter: {} subjects\n", filter.len()));
    }
    out.push_str("Data sets:\n");
    for data_set in &schema.data_sets {
        out.push_str(&format!("  {} ({})\n", data_set.name, data_set.kind));
    }
    out
}

fn describe_parameter(parameter: &Parameter) -> String {
    let mut text = format!(
        "{} ({}, {})",
        parameter.name,
        parameter.kind,
        if parameter.is_required() { "required" } else { "optional" }
    );
    if let Some(default) = &parameter.default_value {
        text.push_str(&format!(" default={}", default));
    }
    text
}
