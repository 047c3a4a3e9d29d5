//! Report definitions.
//!
//! A [`ReportSchema`] is the live report definition: declared parameters, an
//! optional population filter, and an ordered list of data-set definitions.
//! Its serialized form is a [`ReportSchemaXml`], which becomes a schema again
//! through [`crate::SchemaMaterializer`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cohort::Cohort;

/// Persistent identity of a [`ReportSchema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaId(pub u64);

/// Persistent identity of a [`ReportSchemaXml`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaXmlId(pub u64);

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SchemaXmlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Value type of a report parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParameterType {
    #[default]
    String,
    Integer,
    Decimal,
    Boolean,
    /// Calendar date written `YYYY-MM-DD`.
    Date,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Integer => "integer",
            ParameterType::Decimal => "decimal",
            ParameterType::Boolean => "boolean",
            ParameterType::Date => "date",
        }
    }

    /// Check that `value` is a valid textual value of this type.
    pub fn validate(&self, value: &str) -> Result<(), String> {
        let ok = match self {
            ParameterType::String => true,
            ParameterType::Integer => value.trim().parse::<i64>().is_ok(),
            ParameterType::Decimal => value.trim().parse::<f64>().is_ok_and(f64::is_finite),
            ParameterType::Boolean => matches!(value.trim(), "true" | "false"),
            ParameterType::Date => is_iso_date(value.trim()),
        };
        if ok {
            Ok(())
        } else {
            Err(format!("'{}' is not a valid {}", value, self.as_str()))
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for ParameterType {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "string" => Ok(ParameterType::String),
            "integer" => Ok(ParameterType::Integer),
            "decimal" => Ok(ParameterType::Decimal),
            "boolean" => Ok(ParameterType::Boolean),
            "date" => Ok(ParameterType::Date),
            _ => Err(format!("Unknown parameter type: {}", s)),
        }
    }
}

fn is_iso_date(value: &str) -> bool {
    let mut parts = value.splitn(3, '-');
    let (Some(y), Some(m), Some(d)) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if y.len() != 4 || m.len() != 2 || d.len() != 2 {
        return false;
    }
    let (Ok(year), Ok(month), Ok(day)) = (y.parse::<u32>(), m.parse::<u32>(), d.parse::<u32>())
    else {
        return false;
    };
    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    let days = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if leap => 29,
        2 => 28,
        _ => return false,
    };
    (1..=days).contains(&day)
}

/// A parameter declared by a schema and bound by the evaluation context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub label: Option<String>,
    pub kind: ParameterType,
    pub required: bool,
    pub default_value: Option<String>,
}

impl Parameter {
    /// A required parameter with no default.
    pub fn new(name: impl Into<String>, kind: ParameterType) -> Self {
        Self {
            name: name.into(),
            label: None,
            kind,
            required: true,
            default_value: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Whether evaluation must fail when the context leaves this unbound.
    ///
    /// A declared default satisfies the parameter.
    pub fn is_required(&self) -> bool {
        self.required && self.default_value.is_none()
    }
}

/// One evaluable unit of a report.
///
/// The content of `properties` is owned by the evaluator registered for
/// `kind`; the core only carries it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataSetDefinition {
    pub name: String,
    pub kind: String,
    pub properties: BTreeMap<String, String>,
}

impl DataSetDefinition {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

/// The live report definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSchema {
    /// Assigned by the store on first save.
    pub id: Option<SchemaId>,
    pub name: String,
    pub description: Option<String>,
    pub parameters: Vec<Parameter>,
    /// Schema-declared population filter, intersected with any caller filter.
    pub filter: Option<Cohort>,
    pub data_sets: Vec<DataSetDefinition>,
}

impl ReportSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            parameters: Vec::new(),
            filter: None,
            data_sets: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_filter(mut self, filter: Cohort) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_data_set(mut self, data_set: DataSetDefinition) -> Self {
        self.data_sets.push(data_set);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn data_set(&self, name: &str) -> Option<&DataSetDefinition> {
        self.data_sets.iter().find(|d| d.name == name)
    }

    pub fn required_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| p.is_required())
    }
}

/// Serialized form of a [`ReportSchema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSchemaXml {
    /// Assigned by the store on first save.
    pub id: Option<SchemaXmlId>,
    /// The schema this text belongs to, once persisted.
    pub schema_id: Option<SchemaId>,
    /// Raw text, before macro expansion.
    pub xml: String,
}

impl ReportSchemaXml {
    pub fn new(xml: impl Into<String>) -> Self {
        Self {
            id: None,
            schema_id: None,
            xml: xml.into(),
        }
    }

    pub fn for_schema(schema_id: SchemaId, xml: impl Into<String>) -> Self {
        Self {
            id: None,
            schema_id: Some(schema_id),
            xml: xml.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_type_round_trip() {
        for kind in [
            ParameterType::String,
            ParameterType::Integer,
            ParameterType::Decimal,
            ParameterType::Boolean,
            ParameterType::Date,
        ] {
            assert_eq!(ParameterType::try_from(kind.as_str()), Ok(kind));
        }
        assert!(ParameterType::try_from("datetime").is_err());
    }

    #[test]
    fn test_validate_values() {
        assert!(ParameterType::Integer.validate("42").is_ok());
        assert!(ParameterType::Integer.validate("4.2").is_err());
        assert!(ParameterType::Decimal.validate("4.2").is_ok());
        assert!(ParameterType::Decimal.validate("NaN").is_err());
        assert!(ParameterType::Boolean.validate("true").is_ok());
        assert!(ParameterType::Boolean.validate("yes").is_err());
        assert!(ParameterType::String.validate("").is_ok());
    }

    #[test]
    fn test_validate_dates() {
        assert!(ParameterType::Date.validate("2024-02-29").is_ok());
        assert!(ParameterType::Date.validate("2023-02-29").is_err());
        assert!(ParameterType::Date.validate("1900-02-29").is_err());
        assert!(ParameterType::Date.validate("2000-02-29").is_ok());
        assert!(ParameterType::Date.validate("2024-13-01").is_err());
        assert!(ParameterType::Date.validate("2024-1-01").is_err());
        assert!(ParameterType::Date.validate("yesterday").is_err());
    }

    #[test]
    fn test_default_satisfies_requirement() {
        let plain = Parameter::new("site", ParameterType::String);
        assert!(plain.is_required());
        assert!(!plain.clone().optional().is_required());
        assert!(!plain.with_default("north").is_required());
    }

    #[test]
    fn test_schema_lookups() {
        let schema = ReportSchema::new("Monthly")
            .with_parameter(Parameter::new("site", ParameterType::String))
            .with_parameter(Parameter::new("limit", ParameterType::Integer).with_default("10"))
            .with_data_set(DataSetDefinition::new("enrolled", "cohort-count"));

        assert!(schema.parameter("site").is_some());
        assert!(schema.data_set("enrolled").is_some());
        let required: Vec<_> = schema.required_parameters().map(|p| p.name.as_str()).collect();
        assert_eq!(required, vec!["site"]);
    }
}
