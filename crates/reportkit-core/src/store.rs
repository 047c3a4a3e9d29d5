//! Persistence boundaries: report schemas, their serialized form, and the
//! macro table.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Deserialize;
use tempfile::NamedTempFile;

use crate::error::{ReportError, Result};
use crate::macros::{MacroSyntax, MacroTable};
use crate::schema::{ReportSchema, ReportSchemaXml, SchemaId, SchemaXmlId};

/// Storage for schemas and their serialized form.
///
/// Identities are assigned on first save and never change afterwards.
pub trait ReportStore: Send + Sync {
    /// Insert or update; returns the schema with its identity set.
    fn save_schema(&self, schema: ReportSchema) -> Result<ReportSchema>;

    fn schema(&self, id: SchemaId) -> Result<Option<ReportSchema>>;

    /// Returns whether anything was removed.
    fn delete_schema(&self, id: SchemaId) -> Result<bool>;

    fn schemas(&self) -> Result<Vec<ReportSchema>>;

    /// Insert or update; returns the record with its identity set.
    fn save_schema_xml(&self, xml: ReportSchemaXml) -> Result<ReportSchemaXml>;

    fn schema_xml(&self, id: SchemaXmlId) -> Result<Option<ReportSchemaXml>>;

    fn delete_schema_xml(&self, id: SchemaXmlId) -> Result<bool>;

    fn schema_xmls(&self) -> Result<Vec<ReportSchemaXml>>;
}

#[derive(Debug, Default)]
struct StoreState {
    next_schema_id: u64,
    next_xml_id: u64,
    schemas: BTreeMap<SchemaId, ReportSchema>,
    xmls: BTreeMap<SchemaXmlId, ReportSchemaXml>,
}

/// A [`ReportStore`] that lives as long as the process.
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    state: Mutex<StoreState>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ReportStore for InMemoryReportStore {
    fn save_schema(&self, mut schema: ReportSchema) -> Result<ReportSchema> {
        let mut state = self.state();
        let id = match schema.id {
            Some(id) => id,
            None => {
                state.next_schema_id += 1;
                SchemaId(state.next_schema_id)
            }
        };
        // Keep generated ids ahead of explicitly chosen ones.
        state.next_schema_id = state.next_schema_id.max(id.0);
        schema.id = Some(id);
        state.schemas.insert(id, schema.clone());
        Ok(schema)
    }

    fn schema(&self, id: SchemaId) -> Result<Option<ReportSchema>> {
        Ok(self.state().schemas.get(&id).cloned())
    }

    fn delete_schema(&self, id: SchemaId) -> Result<bool> {
        Ok(self.state().schemas.remove(&id).is_some())
    }

    fn schemas(&self) -> Result<Vec<ReportSchema>> {
        Ok(self.state().schemas.values().cloned().collect())
    }

    fn save_schema_xml(&self, mut xml: ReportSchemaXml) -> Result<ReportSchemaXml> {
        let mut state = self.state();
        let id = match xml.id {
            Some(id) => id,
            None => {
                state.next_xml_id += 1;
                SchemaXmlId(state.next_xml_id)
            }
        };
        state.next_xml_id = state.next_xml_id.max(id.0);
        xml.id = Some(id);
        state.xmls.insert(id, xml.clone());
        Ok(xml)
    }

    fn schema_xml(&self, id: SchemaXmlId) -> Result<Option<ReportSchemaXml>> {
        Ok(self.state().xmls.get(&id).cloned())
    }

    fn delete_schema_xml(&self, id: SchemaXmlId) -> Result<bool> {
        Ok(self.state().xmls.remove(&id).is_some())
    }

    fn schema_xmls(&self) -> Result<Vec<ReportSchemaXml>> {
        Ok(self.state().xmls.values().cloned().collect())
    }
}

/// Storage for the process-wide macro table.
pub trait MacroStore: Send + Sync {
    fn load(&self) -> Result<MacroTable>;

    fn save(&self, table: &MacroTable) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryMacroStore {
    table: Mutex<MacroTable>,
}

impl InMemoryMacroStore {
    pub fn new(table: MacroTable) -> Self {
        Self {
            table: Mutex::new(table),
        }
    }
}

impl MacroStore for InMemoryMacroStore {
    fn load(&self) -> Result<MacroTable> {
        Ok(self.table.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, table: &MacroTable) -> Result<()> {
        *self.table.lock().unwrap_or_else(PoisonError::into_inner) = table.clone();
        Ok(())
    }
}

/// A macro table kept in a TOML file.
///
/// ```toml
/// [syntax]
/// prefix = "$"
/// suffix = ""
///
/// [macros]
/// site = "north"
/// ```
///
/// A missing file loads as an empty table. A file without a `[syntax]`
/// section uses the store's default syntax.
#[derive(Debug, Clone)]
pub struct FileMacroStore {
    path: PathBuf,
    default_syntax: MacroSyntax,
}

#[derive(Debug, Deserialize)]
struct MacroFile {
    syntax: Option<MacroSyntax>,
    #[serde(default)]
    macros: BTreeMap<String, String>,
}

impl FileMacroStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            default_syntax: MacroSyntax::default(),
        }
    }

    pub fn with_default_syntax(mut self, syntax: MacroSyntax) -> Self {
        self.default_syntax = syntax;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MacroStore for FileMacroStore {
    fn load(&self) -> Result<MacroTable> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "Macro file not found, using empty table");
            return Ok(MacroTable::with_syntax(self.default_syntax.clone()));
        }
        let text = std::fs::read_to_string(&self.path)?;
        let file: MacroFile = toml::from_str(&text).map_err(|err| {
            ReportError::store(format!("Invalid macro file {}: {}", self.path.display(), err))
        })?;
        Ok(MacroTable {
            syntax: file.syntax.unwrap_or_else(|| self.default_syntax.clone()),
            macros: file.macros,
        })
    }

    fn save(&self, table: &MacroTable) -> Result<()> {
        let text = toml::to_string_pretty(table).map_err(|err| {
            ReportError::store(format!("Cannot serialize macro table: {}", err))
        })?;
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };
        // The previous table stays in place until the new one is complete.
        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(text.as_bytes())?;
        staged.as_file().sync_all()?;
        staged.persist(&self.path).map_err(|err| err.error)?;
        tracing::info!(path = %self.path.display(), macros = table.len(), "Saved macro table");
        Ok(())
    }
}
