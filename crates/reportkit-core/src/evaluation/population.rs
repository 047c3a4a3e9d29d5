//! The subject population the built-in evaluators read from.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::cohort::{Cohort, SubjectId};

/// Read access to subjects and their attributes.
pub trait Population: Send + Sync {
    fn subject_ids(&self) -> BTreeSet<SubjectId>;

    fn attribute(&self, subject: SubjectId, name: &str) -> Option<Value>;

    /// Subjects inside `filter`, or every subject when there is none.
    fn members(&self, filter: Option<&Cohort>) -> BTreeSet<SubjectId> {
        let all = self.subject_ids();
        match filter {
            Some(cohort) => all.intersection(cohort.members()).copied().collect(),
            None => all,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PopulationFile {
    subjects: Vec<SubjectRecord>,
}

#[derive(Debug, Deserialize)]
struct SubjectRecord {
    id: SubjectId,
    #[serde(default)]
    attributes: Map<String, Value>,
}

/// A population held in memory.
///
/// The JSON form is `{"subjects": [{"id": 1, "attributes": {...}}]}`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPopulation {
    subjects: BTreeMap<SubjectId, Map<String, Value>>,
}

impl InMemoryPopulation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a subject.
    pub fn insert(&mut self, subject: SubjectId, attributes: Map<String, Value>) {
        self.subjects.insert(subject, attributes);
    }

    pub fn with_subject(mut self, subject: SubjectId, attributes: Value) -> Self {
        let attributes = match attributes {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.insert(subject, attributes);
        self
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let file: PopulationFile = serde_json::from_str(text)?;
        let mut population = Self::new();
        for record in file.subjects {
            population.insert(record.id, record.attributes);
        }
        Ok(population)
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

impl Population for InMemoryPopulation {
    fn subject_ids(&self) -> BTreeSet<SubjectId> {
        self.subjects.keys().copied().collect()
    }

    fn attribute(&self, subject: SubjectId, name: &str) -> Option<Value> {
        self.subjects.get(&subject)?.get(name).cloned()
    }
}
