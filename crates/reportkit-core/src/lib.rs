//! Report schemas, evaluation and rendering.
//!
//! The flow through this crate:
//!
//! 1. Serialized report definitions ([`ReportSchemaXml`]) are macro-expanded
//!    ([`expand`]) and materialized into a [`ReportSchema`]
//!    ([`SchemaMaterializer`]).
//! 2. The [`EvaluationEngine`] evaluates a schema for a population
//!    ([`Cohort`]) and an [`EvaluationContext`], producing [`ReportData`].
//! 3. A [`ReportRenderer`] from the [`RendererRegistry`] writes the data in a
//!    concrete format, chosen through [`RenderingMode`]s.
//!
//! [`ReportService`] ties these together behind storage and authorization
//! traits.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use reportkit_core::{
//!     EvaluationContext, InMemoryPopulation, ReportSchemaXml, ReportService,
//!     builtin_evaluators,
//! };
//! use serde_json::json;
//!
//! let population = InMemoryPopulation::new()
//!     .with_subject(1, json!({"site": "north"}))
//!     .with_subject(2, json!({"site": "south"}));
//! let service =
//!     ReportService::builder(Arc::new(builtin_evaluators(Arc::new(population)))).build();
//!
//! let schema = service
//!     .report_schema_from_xml(&ReportSchemaXml::new(
//!         r#"<reportSchema name="Census">
//!              <dataSets><dataSet name="all" type="cohort-count"/></dataSets>
//!            </reportSchema>"#,
//!     ))
//!     .unwrap();
//! let data = service
//!     .evaluate(&schema, None, &mut EvaluationContext::new())
//!     .unwrap();
//! assert_eq!(data.data_set("all").unwrap().rows[0][0], json!(2));
//! ```

pub mod auth;
pub mod cohort;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod macros;
pub mod materialize;
pub mod render;
pub mod schema;
pub mod service;
pub mod store;

pub use auth::{AllowAll, AuthorizationGate, GrantedPrivileges, PRIV_RUN_REPORTS};
pub use cohort::{Cohort, SubjectId};
pub use config::{ConfigError, ReportkitConfig};
pub use error::{ReportError, Result};
pub use evaluation::{
    CacheKey, DataSetError, DataSetEvaluator, DataSetRequest, DataSetResult, EvaluationContext,
    EvaluationEngine, EvaluatorRegistry, InMemoryPopulation, Population, ReportData,
    builtin_evaluators,
};
pub use macros::{MacroSyntax, MacroTable, expand};
pub use materialize::{
    MaterializationError, MaterializationErrorKind, SchemaMaterializer, serialize,
};
pub use render::{
    DelimitedRenderer, RenderError, RendererFactories, RendererId, RendererRegistry,
    RenderingMode, ReportRenderer, TextTableRenderer,
};
pub use schema::{
    DataSetDefinition, Parameter, ParameterType, ReportSchema, ReportSchemaXml, SchemaId,
    SchemaXmlId,
};
pub use service::{ReportService, ReportServiceBuilder};
pub use store::{
    FileMacroStore, InMemoryMacroStore, InMemoryReportStore, MacroStore, ReportStore,
};
