//! Per-request evaluation state and the values evaluation produces.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::cohort::{Cohort, SubjectId};
use crate::schema::{DataSetDefinition, ReportSchema};

/// Parameter bindings, an optional base population, and a result cache.
///
/// Created by the caller for one request. The engine reads the bindings and
/// fills the cache; it never keeps the context after `evaluate` returns.
/// The same context may be passed to several `evaluate` calls, for several
/// schemas, and entries are reused only where the resolved bindings match.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    parameters: IndexMap<String, String>,
    base_cohort: Option<Cohort>,
    cache: EvaluationCache,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_parameter(name, value);
        self
    }

    pub fn with_base_cohort(mut self, cohort: Cohort) -> Self {
        self.base_cohort = Some(cohort);
        self
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parameters.insert(name.into(), value.into());
    }

    pub fn remove_parameter(&mut self, name: &str) -> Option<String> {
        self.parameters.shift_remove(name)
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    pub fn parameters(&self) -> &IndexMap<String, String> {
        &self.parameters
    }

    pub fn base_cohort(&self) -> Option<&Cohort> {
        self.base_cohort.as_ref()
    }

    /// Replace the base population. Cached results stay valid because the
    /// effective population is part of every cache key.
    pub fn set_base_cohort(&mut self, cohort: Option<Cohort>) {
        self.base_cohort = cohort;
    }

    pub fn cache(&self) -> &EvaluationCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut EvaluationCache {
        &mut self.cache
    }
}

/// Identity of one cached data-set evaluation.
///
/// Two evaluations share a key exactly when they evaluate the same data-set
/// definition over the same effective subject set with the same resolved
/// bindings (schema defaults included).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    data_set: DataSetDefinition,
    subjects: Option<BTreeSet<SubjectId>>,
    parameters: BTreeMap<String, String>,
}

impl CacheKey {
    pub fn new(
        data_set: &DataSetDefinition,
        effective_filter: Option<&Cohort>,
        parameters: &IndexMap<String, String>,
    ) -> Self {
        Self {
            data_set: data_set.clone(),
            subjects: effective_filter.map(|cohort| cohort.members().clone()),
            parameters: parameters
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }
}

/// Data-set results keyed by [`CacheKey`].
#[derive(Debug, Clone, Default)]
pub struct EvaluationCache {
    entries: HashMap<CacheKey, Arc<DataSetResult>>,
}

impl EvaluationCache {
    pub fn get(&self, key: &CacheKey) -> Option<Arc<DataSetResult>> {
        self.entries.get(key).cloned()
    }

    pub fn insert(&mut self, key: CacheKey, result: Arc<DataSetResult>) {
        self.entries.insert(key, result);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// A named-column table produced by one data set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataSetResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl DataSetResult {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row. Short rows are padded with nulls, long rows truncated.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn with_row(mut self, row: Vec<Value>) -> Self {
        self.push_row(row);
        self
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Text shown for a cell: strings unquoted, null as empty.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The outcome of evaluating a schema. Immutable once built.
#[derive(Debug, Clone)]
pub struct ReportData {
    pub schema: Arc<ReportSchema>,
    /// Bindings in effect, defaults included.
    pub parameters: IndexMap<String, String>,
    /// Filter the caller supplied, if any.
    pub filter: Option<Cohort>,
    /// One entry per data set, in declared order.
    pub data_sets: IndexMap<String, Arc<DataSetResult>>,
}

impl ReportData {
    pub fn data_set(&self, name: &str) -> Option<&DataSetResult> {
        self.data_sets.get(name).map(Arc::as_ref)
    }

    pub fn data_set_names(&self) -> impl Iterator<Item = &str> {
        self.data_sets.keys().map(String::as_str)
    }
}
