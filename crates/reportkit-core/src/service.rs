//! The report service facade.
//!
//! [`ReportService`] composes the materializer, evaluation engine and
//! renderer registry, delegating persistence to a [`ReportStore`], the macro
//! table to a [`MacroStore`], and privilege checks to an
//! [`AuthorizationGate`].

use std::io::Write;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::auth::{AllowAll, AuthorizationGate, GrantedPrivileges, PRIV_RUN_REPORTS, require};
use crate::cohort::Cohort;
use crate::config::ReportkitConfig;
use crate::error::{ReportError, Result};
use crate::evaluation::{EvaluationContext, EvaluationEngine, EvaluatorRegistry, ReportData};
use crate::macros::{MacroTable, expand};
use crate::materialize::{SchemaMaterializer, serialize};
use crate::render::{RendererId, RendererRegistry, RenderingMode, ReportRenderer};
use crate::schema::{ReportSchema, ReportSchemaXml, SchemaId, SchemaXmlId};
use crate::store::{
    FileMacroStore, InMemoryMacroStore, InMemoryReportStore, MacroStore, ReportStore,
};

pub struct ReportService {
    store: Arc<dyn ReportStore>,
    macros: Arc<dyn MacroStore>,
    authorization: Arc<dyn AuthorizationGate>,
    renderers: Arc<RendererRegistry>,
    engine: EvaluationEngine,
    materializer: SchemaMaterializer,
}

impl std::fmt::Debug for ReportService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportService")
            .field("renderers", &self.renderers)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ReportService`]. Unset collaborators default to in-memory
/// stores, the built-in renderers, and a gate that allows everything.
pub struct ReportServiceBuilder {
    evaluators: Arc<EvaluatorRegistry>,
    store: Option<Arc<dyn ReportStore>>,
    macros: Option<Arc<dyn MacroStore>>,
    authorization: Option<Arc<dyn AuthorizationGate>>,
    renderers: Option<Arc<RendererRegistry>>,
}

impl ReportServiceBuilder {
    pub fn store(mut self, store: Arc<dyn ReportStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn macro_store(mut self, macros: Arc<dyn MacroStore>) -> Self {
        self.macros = Some(macros);
        self
    }

    pub fn authorization(mut self, authorization: Arc<dyn AuthorizationGate>) -> Self {
        self.authorization = Some(authorization);
        self
    }

    pub fn renderers(mut self, renderers: Arc<RendererRegistry>) -> Self {
        self.renderers = Some(renderers);
        self
    }

    pub fn build(self) -> ReportService {
        let materializer = SchemaMaterializer::new(self.evaluators.kinds());
        ReportService {
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryReportStore::new())),
            macros: self
                .macros
                .unwrap_or_else(|| Arc::new(InMemoryMacroStore::default())),
            authorization: self.authorization.unwrap_or_else(|| Arc::new(AllowAll)),
            renderers: self
                .renderers
                .unwrap_or_else(|| Arc::new(RendererRegistry::builtin())),
            engine: EvaluationEngine::new(self.evaluators),
            materializer,
        }
    }
}

impl ReportService {
    pub fn builder(evaluators: Arc<EvaluatorRegistry>) -> ReportServiceBuilder {
        ReportServiceBuilder {
            evaluators,
            store: None,
            macros: None,
            authorization: None,
            renderers: None,
        }
    }

    /// Build a service from configuration: the configured renderers, a
    /// file-backed macro table when a file is named, and the configured
    /// privileges.
    pub fn from_config(config: &ReportkitConfig, evaluators: Arc<EvaluatorRegistry>) -> Result<Self> {
        let renderers = RendererRegistry::from_names(&config.renderers)?;
        let macros: Arc<dyn MacroStore> = match &config.macros_file {
            Some(path) => Arc::new(
                FileMacroStore::new(path).with_default_syntax(config.macro_syntax.clone()),
            ),
            None => Arc::new(InMemoryMacroStore::new(MacroTable::with_syntax(
                config.macro_syntax.clone(),
            ))),
        };
        Ok(Self::builder(evaluators)
            .renderers(Arc::new(renderers))
            .macro_store(macros)
            .authorization(Arc::new(GrantedPrivileges::new(config.privileges.iter().cloned())))
            .build())
    }

    /// Evaluate `schema` for the population in `filter` (or everyone).
    ///
    /// Requires the `Run Reports` privilege.
    pub fn evaluate(
        &self,
        schema: &ReportSchema,
        filter: Option<&Cohort>,
        context: &mut EvaluationContext,
    ) -> Result<ReportData> {
        require(self.authorization.as_ref(), PRIV_RUN_REPORTS)?;
        self.engine.evaluate(schema, filter, context)
    }

    pub fn report_schemas(&self) -> Result<Vec<ReportSchema>> {
        self.store.schemas()
    }

    pub fn report_schema(&self, id: SchemaId) -> Result<ReportSchema> {
        self.store
            .schema(id)?
            .ok_or_else(|| ReportError::not_found("Report schema", id))
    }

    /// Materialize `xml` with the macro table as currently stored.
    pub fn report_schema_from_xml(&self, xml: &ReportSchemaXml) -> Result<ReportSchema> {
        let macros = self.macros.load()?;
        Ok(self.materializer.materialize(xml, &macros)?)
    }

    pub fn save_report_schema(&self, schema: ReportSchema) -> Result<ReportSchema> {
        let saved = self.store.save_schema(schema)?;
        tracing::info!(schema = %saved.name, id = ?saved.id, "Saved report schema");
        Ok(saved)
    }

    /// Delete the schema together with the serialized form paired with it.
    pub fn delete_report_schema(&self, id: SchemaId) -> Result<()> {
        if !self.store.delete_schema(id)? {
            return Err(ReportError::not_found("Report schema", id));
        }
        if let Some(xml_id) = self.paired_xml(id)?.and_then(|xml| xml.id) {
            self.store.delete_schema_xml(xml_id)?;
            tracing::debug!(schema = %id, xml = %xml_id, "Deleted paired schema XML");
        }
        Ok(())
    }

    /// Serialized form of `schema`, pointing back at it.
    pub fn report_schema_to_xml(&self, schema: &ReportSchema) -> ReportSchemaXml {
        ReportSchemaXml {
            id: None,
            schema_id: schema.id,
            xml: serialize(schema),
        }
    }

    pub fn report_renderers(&self) -> Vec<Arc<dyn ReportRenderer>> {
        self.renderers.all()
    }

    /// Modes for `schema`, most preferred first.
    pub fn rendering_modes(&self, schema: &ReportSchema) -> Vec<RenderingMode> {
        self.renderers.rendering_modes_for(schema)
    }

    pub fn report_renderer(&self, id: &str) -> Option<Arc<dyn ReportRenderer>> {
        self.renderers.get(id)
    }

    pub fn report_renderer_by_name(&self, name: &str) -> Option<Arc<dyn ReportRenderer>> {
        self.renderers.get_by_name(name)
    }

    pub fn renderers(&self) -> IndexMap<RendererId, Arc<dyn ReportRenderer>> {
        self.renderers.renderers()
    }

    pub fn set_renderers<I>(&self, renderers: I)
    where
        I: IntoIterator<Item = (RendererId, Arc<dyn ReportRenderer>)>,
    {
        self.renderers.set_renderers(renderers);
    }

    pub fn register_renderer(&self, id: RendererId, renderer: Arc<dyn ReportRenderer>) {
        self.renderers.register_as(id, renderer);
    }

    pub fn register_renderer_by_name(&self, name: &str) -> Result<()> {
        self.renderers.register_by_name(name).map(|_| ())
    }

    pub fn remove_renderer(&self, id: &str) {
        self.renderers.remove(id);
    }

    /// Render `data` with the renderer and argument named by `mode`.
    pub fn render(&self, data: &ReportData, mode: &RenderingMode, out: &mut dyn Write) -> Result<()> {
        let renderer = self
            .renderers
            .get(mode.renderer.as_str())
            .ok_or_else(|| ReportError::UnknownRenderer(mode.renderer.to_string()))?;
        renderer.render(data, mode.argument(), out)?;
        Ok(())
    }

    pub fn report_schema_xml(&self, id: SchemaXmlId) -> Result<ReportSchemaXml> {
        self.store
            .schema_xml(id)?
            .ok_or_else(|| ReportError::not_found("Report schema XML", id))
    }

    /// Insert or update `xml`. Text that does not materialize is rejected
    /// before anything is stored.
    ///
    /// A record paired with a schema (through `schema_id` or an `id`
    /// attribute in the text) must name a stored schema, and each schema has
    /// at most one record. Saving a new record for a schema that already has
    /// one replaces the old record under its id.
    pub fn save_report_schema_xml(&self, mut xml: ReportSchemaXml) -> Result<ReportSchemaXml> {
        let schema = self.report_schema_from_xml(&xml)?;
        let Some(owner) = schema.id else {
            return self.store.save_schema_xml(xml);
        };
        if self.store.schema(owner)?.is_none() {
            return Err(ReportError::not_found("Report schema", owner));
        }
        xml.schema_id = Some(owner);

        if let Some(existing) = self.paired_xml(owner)?.and_then(|paired| paired.id) {
            match xml.id {
                None => xml.id = Some(existing),
                Some(id) if id != existing => {
                    return Err(ReportError::DuplicateSchemaXml {
                        schema: owner,
                        existing,
                    });
                }
                Some(_) => {}
            }
        }
        let saved = self.store.save_schema_xml(xml)?;
        tracing::debug!(schema = %owner, xml = ?saved.id, "Saved schema XML");
        Ok(saved)
    }

    fn paired_xml(&self, schema: SchemaId) -> Result<Option<ReportSchemaXml>> {
        Ok(self
            .store
            .schema_xmls()?
            .into_iter()
            .find(|xml| xml.schema_id == Some(schema)))
    }

    pub fn delete_report_schema_xml(&self, id: SchemaXmlId) -> Result<()> {
        if self.store.delete_schema_xml(id)? {
            Ok(())
        } else {
            Err(ReportError::not_found("Report schema XML", id))
        }
    }

    pub fn report_schema_xmls(&self) -> Result<Vec<ReportSchemaXml>> {
        self.store.schema_xmls()
    }

    pub fn report_xml_macros(&self) -> Result<MacroTable> {
        self.macros.load()
    }

    pub fn save_report_xml_macros(&self, macros: &MacroTable) -> Result<()> {
        self.macros.save(macros)
    }

    /// Expand `input` with the macro table as currently stored.
    pub fn apply_report_xml_macros(&self, input: &str) -> Result<String> {
        Ok(expand(input, &self.macros.load()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::{InMemoryPopulation, builtin_evaluators};
    use serde_json::json;

    fn service() -> ReportService {
        let population = InMemoryPopulation::new()
            .with_subject(1, json!({"site": "north"}))
            .with_subject(2, json!({"site": "south"}));
        ReportService::builder(Arc::new(builtin_evaluators(Arc::new(population)))).build()
    }

    const XML: &str = r#"<reportSchema name="$title">
  <dataSets>
    <dataSet name="all" type="cohort-count"/>
  </dataSets>
</reportSchema>"#;

    #[test]
    fn test_macros_read_fresh_on_every_expansion() {
        let service = service();
        let xml = ReportSchemaXml::new(XML);
        assert_eq!(service.report_schema_from_xml(&xml).unwrap().name, "$title");

        service
            .save_report_xml_macros(&MacroTable::new().with("title", "Census"))
            .unwrap();
        assert_eq!(service.report_schema_from_xml(&xml).unwrap().name, "Census");
        assert_eq!(service.apply_report_xml_macros("$title!").unwrap(), "Census!");
    }

    #[test]
    fn test_evaluate_requires_privilege() {
        let population = Arc::new(InMemoryPopulation::new());
        let service = ReportService::builder(Arc::new(builtin_evaluators(population)))
            .authorization(Arc::new(GrantedPrivileges::none()))
            .build();
        let err = service
            .evaluate(&ReportSchema::new("r"), None, &mut EvaluationContext::new())
            .unwrap_err();
        assert!(matches!(err, ReportError::Authorization { .. }));
    }

    #[test]
    fn test_invalid_xml_is_not_saved() {
        let service = service();
        let err = service
            .save_report_schema_xml(ReportSchemaXml::new("<reportSchema/>"))
            .unwrap_err();
        assert!(matches!(err, ReportError::Materialization(_)));
        assert!(service.report_schema_xmls().unwrap().is_empty());
    }

    fn saved_schema(service: &ReportService) -> SchemaId {
        let schema = service
            .report_schema_from_xml(&ReportSchemaXml::new(XML))
            .unwrap();
        service.save_report_schema(schema).unwrap().id.unwrap()
    }

    #[test]
    fn test_unpaired_xml_is_saved_as_is() {
        let service = service();
        let saved = service
            .save_report_schema_xml(ReportSchemaXml::new(XML))
            .unwrap();
        assert!(saved.id.is_some());
        assert_eq!(saved.schema_id, None);
    }

    #[test]
    fn test_xml_for_missing_schema_is_rejected() {
        let service = service();
        let err = service
            .save_report_schema_xml(ReportSchemaXml::for_schema(SchemaId(40), XML))
            .unwrap_err();
        assert!(matches!(err, ReportError::NotFound { entity: "Report schema", .. }));

        let err = service
            .save_report_schema_xml(ReportSchemaXml::new(
                r#"<reportSchema id="41" name="r"><dataSets/></reportSchema>"#,
            ))
            .unwrap_err();
        assert!(matches!(err, ReportError::NotFound { .. }));
        assert!(service.report_schema_xmls().unwrap().is_empty());
    }

    #[test]
    fn test_id_attribute_pairs_the_record() {
        let service = service();
        let id = saved_schema(&service);
        let saved = service
            .save_report_schema_xml(ReportSchemaXml::new(format!(
                r#"<reportSchema id="{}" name="r"><dataSets/></reportSchema>"#,
                id
            )))
            .unwrap();
        assert_eq!(saved.schema_id, Some(id));
    }

    #[test]
    fn test_mismatched_id_attribute_is_rejected() {
        let service = service();
        let id = saved_schema(&service);
        let err = service
            .save_report_schema_xml(ReportSchemaXml::for_schema(
                id,
                r#"<reportSchema id="99" name="r"><dataSets/></reportSchema>"#,
            ))
            .unwrap_err();
        assert!(matches!(err, ReportError::Materialization(_)));
        assert!(service.report_schema_xmls().unwrap().is_empty());
    }

    #[test]
    fn test_second_xml_for_schema_replaces_first() {
        let service = service();
        let id = saved_schema(&service);
        let first = service
            .save_report_schema_xml(ReportSchemaXml::for_schema(id, XML))
            .unwrap();
        let second = service
            .save_report_schema_xml(ReportSchemaXml::for_schema(
                id,
                r#"<reportSchema name="Renamed"><dataSets/></reportSchema>"#,
            ))
            .unwrap();
        assert_eq!(second.id, first.id);

        let stored = service.report_schema_xmls().unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].xml.contains("Renamed"));
    }

    #[test]
    fn test_other_record_cannot_claim_paired_schema() {
        let service = service();
        let id = saved_schema(&service);
        let first = service
            .save_report_schema_xml(ReportSchemaXml::for_schema(id, XML))
            .unwrap();
        let loose = service
            .save_report_schema_xml(ReportSchemaXml::new(XML))
            .unwrap();

        let err = service
            .save_report_schema_xml(ReportSchemaXml {
                schema_id: Some(id),
                ..loose
            })
            .unwrap_err();
        match err {
            ReportError::DuplicateSchemaXml { schema, existing } => {
                assert_eq!(schema, id);
                assert_eq!(Some(existing), first.id);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_delete_schema_removes_paired_xml() {
        let service = service();
        let id = saved_schema(&service);
        let loose = service
            .save_report_schema_xml(ReportSchemaXml::new(XML))
            .unwrap();
        service
            .save_report_schema_xml(ReportSchemaXml::for_schema(id, XML))
            .unwrap();

        service.delete_report_schema(id).unwrap();
        let remaining: Vec<_> = service
            .report_schema_xmls()
            .unwrap()
            .into_iter()
            .map(|xml| xml.id)
            .collect();
        assert_eq!(remaining, vec![loose.id]);
    }

    #[test]
    fn test_schema_not_found() {
        let service = service();
        assert!(matches!(
            service.report_schema(SchemaId(5)),
            Err(ReportError::NotFound { .. })
        ));
        assert!(service.delete_report_schema(SchemaId(5)).is_err());
    }

    #[test]
    fn test_render_unknown_renderer() {
        let service = service();
        let schema = service
            .report_schema_from_xml(&ReportSchemaXml::new(XML))
            .unwrap();
        let data = service
            .evaluate(&schema, None, &mut EvaluationContext::new())
            .unwrap();
        let mode = RenderingMode::new("missing", "Missing", None, 0);
        let mut out = Vec::new();
        let err = service.render(&data, &mode, &mut out).unwrap_err();
        assert!(matches!(err, ReportError::UnknownRenderer(_)));
    }

    #[test]
    fn test_from_config_uses_configured_renderers() {
        let config = ReportkitConfig {
            renderers: vec!["delimited".to_string()],
            ..ReportkitConfig::default()
        };
        let evaluators = Arc::new(builtin_evaluators(Arc::new(InMemoryPopulation::new())));
        let service = ReportService::from_config(&config, evaluators).unwrap();
        let ids: Vec<_> = service.renderers().keys().map(|id| id.to_string()).collect();
        assert_eq!(ids, vec!["delimited"]);
    }

    #[test]
    fn test_from_config_unknown_renderer() {
        let config = ReportkitConfig {
            renderers: vec!["pdf".to_string()],
            ..ReportkitConfig::default()
        };
        let evaluators = Arc::new(builtin_evaluators(Arc::new(InMemoryPopulation::new())));
        assert!(matches!(
            ReportService::from_config(&config, evaluators),
            Err(ReportError::UnknownRenderer(_))
        ));
    }
}
