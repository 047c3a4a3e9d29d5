//! Command implementations for the reportkit CLI
//!
//! Each command module handles the CLI interface and delegates to
//! reportkit-core for the actual work.

pub mod check;
pub mod expand;
pub mod macros;
pub mod modes;
pub mod renderers;
pub mod run;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use reportkit_core::{
    EvaluatorRegistry, InMemoryPopulation, ReportSchema, ReportSchemaXml, ReportService,
    ReportkitConfig, builtin_evaluators,
};

/// Options shared by every command.
#[derive(Debug, Default)]
pub struct Settings {
    pub config: Option<PathBuf>,
    pub macros: Option<PathBuf>,
}

impl Settings {
    /// The configuration named on the command line, or the defaults.
    pub fn load_config(&self) -> Result<ReportkitConfig> {
        let mut config = match &self.config {
            Some(path) => ReportkitConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ReportkitConfig::default(),
        };
        if let Some(macros) = &self.macros {
            config.macros_file = Some(macros.clone());
        }
        Ok(config)
    }

    /// A service over an empty population, for commands that never evaluate.
    pub fn service(&self) -> Result<ReportService> {
        self.service_with(builtin_evaluators(Arc::new(InMemoryPopulation::new())))
    }

    pub fn service_with(&self, evaluators: EvaluatorRegistry) -> Result<ReportService> {
        let config = self.load_config()?;
        ReportService::from_config(&config, Arc::new(evaluators))
            .context("Failed to set up report service")
    }
}

pub fn read_schema_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file {}", path.display()))
}

/// Read, expand and materialize the schema at `path`.
pub fn load_schema(service: &ReportService, path: &Path) -> Result<ReportSchema> {
    let xml = ReportSchemaXml::new(read_schema_text(path)?);
    service
        .report_schema_from_xml(&xml)
        .with_context(|| format!("Invalid report schema {}", path.display()))
}
