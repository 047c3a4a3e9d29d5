//! Report evaluation.
//!
//! The [`EvaluationEngine`] walks a schema's data sets in declared order,
//! hands each to the [`DataSetEvaluator`] registered for its type, and
//! collects the results into [`ReportData`]. Results are cached in the
//! caller's [`EvaluationContext`], keyed by data-set identity and effective
//! population.

mod builtin;
mod context;
mod engine;
mod evaluator;
mod population;

pub use builtin::{
    COHORT_COUNT, CohortCountEvaluator, SUBJECT_ATTRIBUTES, SubjectAttributesEvaluator,
    builtin_evaluators,
};
pub use context::{
    CacheKey, DataSetResult, EvaluationCache, EvaluationContext, ReportData, cell_text,
};
pub use engine::EvaluationEngine;
pub use evaluator::{DataSetError, DataSetEvaluator, DataSetRequest, EvaluatorRegistry};
pub use population::{InMemoryPopulation, Population};
