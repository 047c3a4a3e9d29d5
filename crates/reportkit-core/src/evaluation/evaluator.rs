//! Data-set evaluators and their registry.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;
use regex::{Captures, Regex};
use thiserror::Error;

use super::context::DataSetResult;
use crate::cohort::Cohort;
use crate::schema::DataSetDefinition;

static PARAMETER_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("Invalid parameter reference pattern")
});

/// Errors raised while evaluating one data set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataSetError {
    #[error("No evaluator registered for data set type '{0}'")]
    UnsupportedKind(String),

    #[error("Missing required property '{0}'")]
    MissingProperty(String),

    #[error("Invalid property '{name}': {reason}")]
    InvalidProperty { name: String, reason: String },

    #[error("{0}")]
    Failed(String),
}

impl DataSetError {
    pub fn unsupported_kind(kind: impl Into<String>) -> Self {
        Self::UnsupportedKind(kind.into())
    }

    pub fn missing_property(name: impl Into<String>) -> Self {
        Self::MissingProperty(name.into())
    }

    pub fn invalid_property(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidProperty {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Everything an evaluator may read for one data set.
#[derive(Debug, Clone, Copy)]
pub struct DataSetRequest<'a> {
    pub definition: &'a DataSetDefinition,
    /// Effective population. `None` means every subject.
    pub filter: Option<&'a Cohort>,
    /// Bindings with defaults applied.
    pub parameters: &'a IndexMap<String, String>,
}

impl<'a> DataSetRequest<'a> {
    pub fn property(&self, name: &str) -> Option<&'a str> {
        self.definition.property(name)
    }

    /// A property with `{{name}}` parameter references substituted.
    ///
    /// A reference to an unbound parameter is an error.
    pub fn resolved_property(&self, name: &str) -> Result<Option<String>, DataSetError> {
        let Some(raw) = self.property(name) else {
            return Ok(None);
        };
        let mut unbound = None;
        let resolved = PARAMETER_REFERENCE.replace_all(raw, |caps: &Captures<'_>| {
            match self.parameters.get(&caps[1]) {
                Some(value) => value.clone(),
                None => {
                    unbound.get_or_insert_with(|| caps[1].to_string());
                    String::new()
                }
            }
        });
        match unbound {
            Some(parameter) => Err(DataSetError::invalid_property(
                name,
                format!("references unbound parameter '{}'", parameter),
            )),
            None => Ok(Some(resolved.into_owned())),
        }
    }

    pub fn require_property(&self, name: &str) -> Result<String, DataSetError> {
        self.resolved_property(name)?
            .ok_or_else(|| DataSetError::missing_property(name))
    }
}

/// Produces the result table for one data-set type.
///
/// Evaluators are shared across threads and must not keep per-request state.
pub trait DataSetEvaluator: Send + Sync {
    /// The data-set type this evaluator handles, as written in schemas.
    fn kind(&self) -> &str;

    fn evaluate(&self, request: &DataSetRequest<'_>) -> Result<DataSetResult, DataSetError>;
}

impl std::fmt::Debug for dyn DataSetEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSetEvaluator")
            .field("kind", &self.kind())
            .finish()
    }
}

/// Evaluators keyed by data-set type.
///
/// The registered types are the data-set types a schema may declare.
#[derive(Debug, Default)]
pub struct EvaluatorRegistry {
    evaluators: HashMap<String, Arc<dyn DataSetEvaluator>>,
}

impl EvaluatorRegistry {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Register an evaluator, replacing any with the same type.
    pub fn register(&mut self, evaluator: Arc<dyn DataSetEvaluator>) {
        self.evaluators.insert(evaluator.kind().to_string(), evaluator);
    }

    pub fn with(mut self, evaluator: Arc<dyn DataSetEvaluator>) -> Self {
        self.register(evaluator);
        self
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn DataSetEvaluator>> {
        self.evaluators.get(kind).cloned()
    }

    pub fn has_kind(&self, kind: &str) -> bool {
        self.evaluators.contains_key(kind)
    }

    /// Registered type names, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.evaluators.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    impl DataSetEvaluator for Fixed {
        fn kind(&self) -> &str {
            self.0
        }

        fn evaluate(&self, _request: &DataSetRequest<'_>) -> Result<DataSetResult, DataSetError> {
            Ok(DataSetResult::new(["value"]))
        }
    }

    fn request<'a>(
        definition: &'a DataSetDefinition,
        parameters: &'a IndexMap<String, String>,
    ) -> DataSetRequest<'a> {
        DataSetRequest {
            definition,
            filter: None,
            parameters,
        }
    }

    #[test]
    fn test_registry_empty() {
        let registry = EvaluatorRegistry::empty();
        assert!(registry.is_empty());
        assert!(registry.get("anything").is_none());
    }

    #[test]
    fn test_registry_register_replaces() {
        let mut registry = EvaluatorRegistry::empty();
        registry.register(Arc::new(Fixed("a")));
        registry.register(Arc::new(Fixed("a")));
        registry.register(Arc::new(Fixed("b")));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.kinds(), vec!["a", "b"]);
        assert!(registry.has_kind("b"));
    }

    #[test]
    fn test_resolved_property_substitutes_parameters() {
        let definition = DataSetDefinition::new("d", "x").with_property("equals", "{{ site }}-{{n}}");
        let mut parameters = IndexMap::new();
        parameters.insert("site".to_string(), "north".to_string());
        parameters.insert("n".to_string(), "2".to_string());

        let resolved = request(&definition, &parameters).resolved_property("equals");
        assert_eq!(resolved, Ok(Some("north-2".to_string())));
    }

    #[test]
    fn test_resolved_property_unbound_reference() {
        let definition = DataSetDefinition::new("d", "x").with_property("equals", "{{site}}");
        let parameters = IndexMap::new();
        let err = request(&definition, &parameters)
            .resolved_property("equals")
            .unwrap_err();
        assert!(matches!(err, DataSetError::InvalidProperty { .. }));
        assert!(err.to_string().contains("site"));
    }

    #[test]
    fn test_require_property_missing() {
        let definition = DataSetDefinition::new("d", "x");
        let parameters = IndexMap::new();
        assert_eq!(
            request(&definition, &parameters).require_property("columns"),
            Err(DataSetError::missing_property("columns"))
        );
    }
}
