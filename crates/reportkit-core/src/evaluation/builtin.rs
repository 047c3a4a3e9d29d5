//! Data-set evaluators backed by a [`Population`].

use std::sync::Arc;

use serde_json::{Value, json};

use super::context::{DataSetResult, cell_text};
use super::evaluator::{DataSetError, DataSetEvaluator, DataSetRequest, EvaluatorRegistry};
use super::population::Population;

pub const COHORT_COUNT: &str = "cohort-count";
pub const SUBJECT_ATTRIBUTES: &str = "subject-attributes";

/// Counts subjects in the effective population.
///
/// Properties:
/// - `attribute`: only count subjects that have this attribute
/// - `equals`: with `attribute`, only count subjects whose value matches
/// - `label`: column name (default `count`)
///
/// `attribute` and `equals` may reference parameters as `{{name}}`.
pub struct CohortCountEvaluator {
    population: Arc<dyn Population>,
}

impl CohortCountEvaluator {
    pub fn new(population: Arc<dyn Population>) -> Self {
        Self { population }
    }
}

impl DataSetEvaluator for CohortCountEvaluator {
    fn kind(&self) -> &str {
        COHORT_COUNT
    }

    fn evaluate(&self, request: &DataSetRequest<'_>) -> Result<DataSetResult, DataSetError> {
        let attribute = request.resolved_property("attribute")?;
        let equals = request.resolved_property("equals")?;
        if equals.is_some() && attribute.is_none() {
            return Err(DataSetError::missing_property("attribute"));
        }
        let label = request.property("label").unwrap_or("count");

        let count = self
            .population
            .members(request.filter)
            .into_iter()
            .filter(|&subject| match &attribute {
                None => true,
                Some(attribute) => match (self.population.attribute(subject, attribute), &equals)
                {
                    (None, _) => false,
                    (Some(_), None) => true,
                    (Some(value), Some(expected)) => cell_text(&value) == *expected,
                },
            })
            .count();

        Ok(DataSetResult::new([label]).with_row(vec![json!(count)]))
    }
}

/// One row per subject, ascending by id, with the attributes listed in the
/// comma-separated `columns` property. The first column is always `subject`.
pub struct SubjectAttributesEvaluator {
    population: Arc<dyn Population>,
}

impl SubjectAttributesEvaluator {
    pub fn new(population: Arc<dyn Population>) -> Self {
        Self { population }
    }
}

impl DataSetEvaluator for SubjectAttributesEvaluator {
    fn kind(&self) -> &str {
        SUBJECT_ATTRIBUTES
    }

    fn evaluate(&self, request: &DataSetRequest<'_>) -> Result<DataSetResult, DataSetError> {
        let columns_text = request.require_property("columns")?;
        let columns: Vec<&str> = columns_text
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();
        if columns.is_empty() {
            return Err(DataSetError::invalid_property(
                "columns",
                "must list at least one attribute",
            ));
        }

        let mut result =
            DataSetResult::new(std::iter::once("subject").chain(columns.iter().copied()));
        for subject in self.population.members(request.filter) {
            let mut row = Vec::with_capacity(columns.len() + 1);
            row.push(json!(subject));
            for column in &columns {
                row.push(self.population.attribute(subject, column).unwrap_or(Value::Null));
            }
            result.push_row(row);
        }
        Ok(result)
    }
}

/// A registry holding both built-in evaluators over `population`.
pub fn builtin_evaluators(population: Arc<dyn Population>) -> EvaluatorRegistry {
    EvaluatorRegistry::empty()
        .with(Arc::new(CohortCountEvaluator::new(population.clone())))
        .with(Arc::new(SubjectAttributesEvaluator::new(population)))
}
