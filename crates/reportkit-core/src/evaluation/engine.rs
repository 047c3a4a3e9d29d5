//! Schema evaluation.

use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;

use super::context::{CacheKey, EvaluationContext, ReportData};
use super::evaluator::{DataSetError, DataSetRequest, EvaluatorRegistry};
use crate::cohort::{Cohort, intersect_all};
use crate::error::{ReportError, Result};
use crate::schema::ReportSchema;

/// Evaluates report schemas by delegating each data set to the evaluator
/// registered for its type.
#[derive(Debug, Clone)]
pub struct EvaluationEngine {
    evaluators: Arc<EvaluatorRegistry>,
}

impl EvaluationEngine {
    pub fn new(evaluators: Arc<EvaluatorRegistry>) -> Self {
        Self { evaluators }
    }

    pub fn evaluators(&self) -> &EvaluatorRegistry {
        &self.evaluators
    }

    /// Evaluate every data set of `schema` over the effective population.
    ///
    /// The effective population is the intersection of the schema filter,
    /// `filter`, and the context's base cohort, counting only those present.
    /// Parameters are checked before any data set runs. Results are looked
    /// up in and stored into the context's cache, keyed by definition,
    /// effective population and resolved bindings.
    pub fn evaluate(
        &self,
        schema: &ReportSchema,
        filter: Option<&Cohort>,
        context: &mut EvaluationContext,
    ) -> Result<ReportData> {
        check_data_set_names(schema)?;
        let parameters = bind_parameters(schema, context)?;
        let effective = intersect_all([schema.filter.as_ref(), filter, context.base_cohort()]);

        tracing::debug!(
            schema = %schema.name,
            data_sets = schema.data_sets.len(),
            subjects = effective.as_ref().map(Cohort::len),
            "Evaluating report schema"
        );

        let mut data_sets = IndexMap::with_capacity(schema.data_sets.len());
        for definition in &schema.data_sets {
            let key = CacheKey::new(definition, effective.as_ref(), &parameters);
            if let Some(cached) = context.cache().get(&key) {
                tracing::debug!(data_set = %definition.name, "Data set cache hit");
                data_sets.insert(definition.name.clone(), cached);
                continue;
            }

            let evaluator = self.evaluators.get(&definition.kind).ok_or_else(|| {
                ReportError::evaluation(
                    &definition.name,
                    DataSetError::unsupported_kind(&definition.kind),
                )
            })?;
            let request = DataSetRequest {
                definition,
                filter: effective.as_ref(),
                parameters: &parameters,
            };
            let result = evaluator
                .evaluate(&request)
                .map_err(|source| ReportError::evaluation(&definition.name, source))?;
            tracing::debug!(
                data_set = %definition.name,
                kind = %definition.kind,
                rows = result.len(),
                "Data set evaluated"
            );

            let result = Arc::new(result);
            context.cache_mut().insert(key, result.clone());
            data_sets.insert(definition.name.clone(), result);
        }

        Ok(ReportData {
            schema: Arc::new(schema.clone()),
            parameters,
            filter: filter.cloned(),
            data_sets,
        })
    }
}

fn check_data_set_names(schema: &ReportSchema) -> Result<()> {
    let mut seen = BTreeSet::new();
    for definition in &schema.data_sets {
        if !seen.insert(definition.name.as_str()) {
            return Err(ReportError::invalid_schema(format!(
                "data set '{}' is declared more than once",
                definition.name
            )));
        }
    }
    Ok(())
}

/// Resolve the bindings evaluation runs with: context values, then defaults.
///
/// Extra bindings the schema does not declare are passed along untouched.
fn bind_parameters(
    schema: &ReportSchema,
    context: &EvaluationContext,
) -> Result<IndexMap<String, String>> {
    let missing: Vec<String> = schema
        .required_parameters()
        .filter(|p| context.parameter(&p.name).is_none())
        .map(|p| p.name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(ReportError::MissingParameter { names: missing });
    }

    let mut bound = IndexMap::new();
    for parameter in &schema.parameters {
        let value = context
            .parameter(&parameter.name)
            .or(parameter.default_value.as_deref());
        if let Some(value) = value {
            parameter
                .kind
                .validate(value)
                .map_err(|reason| ReportError::invalid_parameter(&parameter.name, reason))?;
            bound.insert(parameter.name.clone(), value.to_string());
        }
    }

    for (name, value) in context.parameters() {
        if schema.parameter(name).is_none() {
            tracing::debug!(parameter = %name, "Ignoring binding not declared by the schema");
            bound.insert(name.clone(), value.clone());
        }
    }

    Ok(bound)
}
