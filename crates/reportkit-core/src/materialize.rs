//! Conversion between serialized report definitions and live schemas.
//!
//! [`SchemaMaterializer::materialize`] expands macros and then validates the
//! resulting XML tree element by element. Every failure carries the line and
//! column of the construct that caused it, computed against the expanded
//! text. [`serialize`] is the inverse used for persistence.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use quick_xml::escape::escape;
use reportkit_xml::{LineColumn, Span, XmlChild, XmlChildren, XmlElement};
use thiserror::Error;

use crate::cohort::Cohort;
use crate::macros::{MacroTable, expand};
use crate::schema::{
    DataSetDefinition, Parameter, ParameterType, ReportSchema, ReportSchemaXml, SchemaId,
};

/// What kind of problem a [`MaterializationError`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializationErrorKind {
    MalformedXml,
    MissingElement,
    MissingAttribute,
    InvalidAttribute,
    UnknownDataSetType,
    DuplicateName,
    UnexpectedElement,
}

/// A serialized definition could not be turned into a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}{}", .problem, format_location(.location))]
pub struct MaterializationError {
    pub kind: MaterializationErrorKind,
    pub problem: String,
    pub location: Option<LineColumn>,
}

fn format_location(location: &Option<LineColumn>) -> String {
    match location {
        Some(location) => format!(" (at {})", location),
        None => String::new(),
    }
}

impl MaterializationError {
    pub fn new(kind: MaterializationErrorKind, problem: impl Into<String>) -> Self {
        Self {
            kind,
            problem: problem.into(),
            location: None,
        }
    }

    pub fn at(mut self, location: LineColumn) -> Self {
        self.location = Some(location);
        self
    }
}

type Result<T> = std::result::Result<T, MaterializationError>;

/// Turns serialized report definitions into [`ReportSchema`] values.
#[derive(Debug, Clone, Default)]
pub struct SchemaMaterializer {
    known_kinds: BTreeSet<String>,
}

impl SchemaMaterializer {
    /// A materializer that accepts the given data-set types.
    pub fn new<I, S>(known_kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known_kinds: known_kinds.into_iter().map(Into::into).collect(),
        }
    }

    pub fn known_kinds(&self) -> impl Iterator<Item = &str> {
        self.known_kinds.iter().map(String::as_str)
    }

    /// Expand macros in `xml` and build the schema it describes.
    ///
    /// The schema takes the identity the serialized form points back to. An
    /// `id` attribute in the text must name that same schema.
    pub fn materialize(&self, xml: &ReportSchemaXml, macros: &MacroTable) -> Result<ReportSchema> {
        let expanded = expand(&xml.xml, macros);
        let schema = self.read(&expanded, xml.schema_id)?;
        tracing::debug!(
            schema = %schema.name,
            data_sets = schema.data_sets.len(),
            parameters = schema.parameters.len(),
            "Materialized report schema"
        );
        Ok(schema)
    }

    /// Build a schema from already-expanded text.
    pub fn parse(&self, source: &str) -> Result<ReportSchema> {
        self.read(source, None)
    }

    fn read(&self, source: &str, owner: Option<SchemaId>) -> Result<ReportSchema> {
        let document = reportkit_xml::parse(source).map_err(|err| {
            let error =
                MaterializationError::new(MaterializationErrorKind::MalformedXml, err.to_string());
            match err.offset() {
                Some(offset) => error.at(Span::new(offset, offset).line_column(source)),
                None => error,
            }
        })?;
        SchemaReader {
            source,
            known_kinds: &self.known_kinds,
            owner,
        }
        .read(&document.root)
    }
}

struct SchemaReader<'a> {
    source: &'a str,
    known_kinds: &'a BTreeSet<String>,
    /// Schema the serialized form belongs to, if it is paired with one.
    owner: Option<SchemaId>,
}

impl SchemaReader<'_> {
    fn read(&self, root: &XmlElement) -> Result<ReportSchema> {
        if root.name != "reportSchema" {
            return Err(self.error(
                MaterializationErrorKind::UnexpectedElement,
                format!("Expected <reportSchema> as the root element, found <{}>", root.name),
                root.span,
            ));
        }
        self.reject_text(root)?;

        let name = self.required_attribute(root, "name")?;
        let id = match root.get_attribute_full("id") {
            Some(attr) => {
                let id = SchemaId(attr.value.trim().parse::<u64>().map_err(|_| {
                    self.error(
                        MaterializationErrorKind::InvalidAttribute,
                        format!("Schema id '{}' is not a non-negative integer", attr.value),
                        attr.value_span,
                    )
                })?);
                match self.owner {
                    Some(owner) if owner != id => {
                        return Err(self.error(
                            MaterializationErrorKind::InvalidAttribute,
                            format!("Schema id {} does not match owning schema {}", id, owner),
                            attr.value_span,
                        ));
                    }
                    _ => Some(id),
                }
            }
            None => self.owner,
        };

        let mut schema = ReportSchema::new(name);
        schema.id = id;

        let mut seen = BTreeSet::new();
        let mut saw_data_sets = false;
        for child in root.all_children() {
            if !seen.insert(child.name.as_str()) {
                return Err(self.error(
                    MaterializationErrorKind::UnexpectedElement,
                    format!("<{}> may appear only once", child.name),
                    child.span,
                ));
            }
            match child.name.as_str() {
                "description" => {
                    let text = child.text_content();
                    let text = text.trim();
                    if !text.is_empty() {
                        schema.description = Some(text.to_string());
                    }
                }
                "parameters" => schema.parameters = self.read_parameters(child)?,
                "filter" => schema.filter = Some(self.read_filter(child)?),
                "dataSets" => {
                    schema.data_sets = self.read_data_sets(child)?;
                    saw_data_sets = true;
                }
                other => {
                    return Err(self.error(
                        MaterializationErrorKind::UnexpectedElement,
                        format!("Unexpected element <{}> in <reportSchema>", other),
                        child.span,
                    ));
                }
            }
        }

        if !saw_data_sets {
            return Err(self.error(
                MaterializationErrorKind::MissingElement,
                "<reportSchema> must contain a <dataSets> element",
                root.span,
            ));
        }

        Ok(schema)
    }

    fn read_parameters(&self, element: &XmlElement) -> Result<Vec<Parameter>> {
        self.reject_text(element)?;
        let mut parameters: Vec<Parameter> = Vec::new();
        for child in element.all_children() {
            self.expect_name(child, "parameter", "parameters")?;
            let name = self.required_attribute(child, "name")?;
            if parameters.iter().any(|p| p.name == name) {
                return Err(self.error(
                    MaterializationErrorKind::DuplicateName,
                    format!("Parameter '{}' is declared more than once", name),
                    child.span,
                ));
            }

            let kind = match child.get_attribute_full("type") {
                Some(attr) => ParameterType::try_from(attr.value.trim()).map_err(|reason| {
                    self.error(MaterializationErrorKind::InvalidAttribute, reason, attr.value_span)
                })?,
                None => ParameterType::String,
            };

            let mut parameter = Parameter::new(name, kind);
            if let Some(label) = child.get_attribute("label") {
                parameter = parameter.with_label(label);
            }
            if let Some(attr) = child.get_attribute_full("required") {
                match attr.value.trim() {
                    "true" => {}
                    "false" => parameter = parameter.optional(),
                    other => {
                        return Err(self.error(
                            MaterializationErrorKind::InvalidAttribute,
                            format!("required must be 'true' or 'false', found '{}'", other),
                            attr.value_span,
                        ));
                    }
                }
            }
            if let Some(attr) = child.get_attribute_full("default") {
                kind.validate(&attr.value).map_err(|reason| {
                    self.error(
                        MaterializationErrorKind::InvalidAttribute,
                        format!("Default for parameter '{}': {}", parameter.name, reason),
                        attr.value_span,
                    )
                })?;
                parameter = parameter.with_default(attr.value.clone());
            }
            parameters.push(parameter);
        }
        Ok(parameters)
    }

    fn read_filter(&self, element: &XmlElement) -> Result<Cohort> {
        self.reject_children(element)?;
        let attr = element.get_attribute_full("subjects").ok_or_else(|| {
            self.error(
                MaterializationErrorKind::MissingAttribute,
                "<filter> requires a 'subjects' attribute",
                element.span,
            )
        })?;
        let cohort = Cohort::parse(&attr.value).map_err(|reason| {
            self.error(MaterializationErrorKind::InvalidAttribute, reason, attr.value_span)
        })?;
        Ok(match element.get_attribute("name") {
            Some(name) => Cohort::named(name, cohort.members().iter().copied()),
            None => cohort,
        })
    }

    fn read_data_sets(&self, element: &XmlElement) -> Result<Vec<DataSetDefinition>> {
        self.reject_text(element)?;
        let mut data_sets: Vec<DataSetDefinition> = Vec::new();
        for child in element.all_children() {
            self.expect_name(child, "dataSet", "dataSets")?;
            let name = self.required_attribute(child, "name")?;
            if data_sets.iter().any(|d| d.name == name) {
                return Err(self.error(
                    MaterializationErrorKind::DuplicateName,
                    format!("Data set '{}' is declared more than once", name),
                    child.span,
                ));
            }

            let kind = self.required_attribute(child, "type")?;
            if !self.known_kinds.contains(&kind) {
                let span = child
                    .get_attribute_full("type")
                    .map_or(child.span, |attr| attr.value_span);
                return Err(self.error(
                    MaterializationErrorKind::UnknownDataSetType,
                    format!("Unknown data set type '{}' for data set '{}'", kind, name),
                    span,
                ));
            }

            let mut definition = DataSetDefinition::new(name, kind);
            definition.properties = self.read_properties(child)?;
            data_sets.push(definition);
        }
        Ok(data_sets)
    }

    fn read_properties(&self, element: &XmlElement) -> Result<BTreeMap<String, String>> {
        self.reject_text(element)?;
        let mut properties = BTreeMap::new();
        for child in element.all_children() {
            self.expect_name(child, "property", "dataSet")?;
            let name = self.required_attribute(child, "name")?;
            let value = match child.get_attribute("value") {
                Some(value) => value.to_string(),
                None => child.text_content(),
            };
            if properties.insert(name.clone(), value).is_some() {
                return Err(self.error(
                    MaterializationErrorKind::DuplicateName,
                    format!("Property '{}' is set more than once", name),
                    child.span,
                ));
            }
        }
        Ok(properties)
    }

    fn expect_name(&self, element: &XmlElement, expected: &str, parent: &str) -> Result<()> {
        if element.name == expected {
            Ok(())
        } else {
            Err(self.error(
                MaterializationErrorKind::UnexpectedElement,
                format!("Unexpected element <{}> in <{}>", element.name, parent),
                element.span,
            ))
        }
    }

    fn required_attribute(&self, element: &XmlElement, name: &str) -> Result<String> {
        match element.get_attribute_full(name) {
            Some(attr) if !attr.value.trim().is_empty() => Ok(attr.value.clone()),
            Some(attr) => Err(self.error(
                MaterializationErrorKind::InvalidAttribute,
                format!("<{}> attribute '{}' must not be empty", element.name, name),
                attr.value_span,
            )),
            None => Err(self.error(
                MaterializationErrorKind::MissingAttribute,
                format!("<{}> requires a '{}' attribute", element.name, name),
                element.span,
            )),
        }
    }

    fn reject_text(&self, element: &XmlElement) -> Result<()> {
        let stray = match &element.children {
            XmlChildren::Text { content, span } => Some((content.as_str(), *span)),
            XmlChildren::Mixed(children) => children.iter().find_map(|child| match child {
                XmlChild::Text { content, span } if !content.trim().is_empty() => {
                    Some((content.as_str(), *span))
                }
                _ => None,
            }),
            XmlChildren::Elements(_) | XmlChildren::Empty => None,
        };
        match stray {
            Some((content, span)) if !content.trim().is_empty() => Err(self.error(
                MaterializationErrorKind::UnexpectedElement,
                format!("Unexpected text in <{}>", element.name),
                span,
            )),
            _ => Ok(()),
        }
    }

    fn reject_children(&self, element: &XmlElement) -> Result<()> {
        self.reject_text(element)?;
        match element.all_children().first() {
            Some(child) => Err(self.error(
                MaterializationErrorKind::UnexpectedElement,
                format!("Unexpected element <{}> in <{}>", child.name, element.name),
                child.span,
            )),
            None => Ok(()),
        }
    }

    fn error(
        &self,
        kind: MaterializationErrorKind,
        problem: impl Into<String>,
        span: Span,
    ) -> MaterializationError {
        MaterializationError::new(kind, problem).at(span.line_column(self.source))
    }
}

/// Write `schema` in the form [`SchemaMaterializer::parse`] reads.
pub fn serialize(schema: &ReportSchema) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = write_schema(&mut out, schema);
    out
}

fn write_schema(out: &mut String, schema: &ReportSchema) -> std::fmt::Result {
    out.push_str("<reportSchema");
    if let Some(id) = schema.id {
        write!(out, " id=\"{}\"", id)?;
    }
    writeln!(out, " name=\"{}\">", escape(schema.name.as_str()))?;

    if let Some(description) = &schema.description {
        writeln!(out, "  <description>{}</description>", escape(description.as_str()))?;
    }

    if !schema.parameters.is_empty() {
        out.push_str("  <parameters>\n");
        for parameter in &schema.parameters {
            write!(out, "    <parameter name=\"{}\"", escape(parameter.name.as_str()))?;
            if let Some(label) = &parameter.label {
                write!(out, " label=\"{}\"", escape(label.as_str()))?;
            }
            write!(out, " type=\"{}\"", parameter.kind)?;
            if !parameter.required {
                out.push_str(" required=\"false\"");
            }
            if let Some(default) = &parameter.default_value {
                write!(out, " default=\"{}\"", escape(default.as_str()))?;
            }
            out.push_str("/>\n");
        }
        out.push_str("  </parameters>\n");
    }

    if let Some(filter) = &schema.filter {
        out.push_str("  <filter");
        if let Some(name) = filter.name() {
            write!(out, " name=\"{}\"", escape(name))?;
        }
        writeln!(out, " subjects=\"{}\"/>", filter.members_text())?;
    }

    if schema.data_sets.is_empty() {
        out.push_str("  <dataSets/>\n");
    } else {
        out.push_str("  <dataSets>\n");
        for data_set in &schema.data_sets {
            write!(
                out,
                "    <dataSet name=\"{}\" type=\"{}\"",
                escape(data_set.name.as_str()),
                escape(data_set.kind.as_str())
            )?;
            if data_set.properties.is_empty() {
                out.push_str("/>\n");
                continue;
            }
            out.push_str(">\n");
            for (name, value) in &data_set.properties {
                writeln!(
                    out,
                    "      <property name=\"{}\" value=\"{}\"/>",
                    escape(name.as_str()),
                    escape(value.as_str())
                )?;
            }
            out.push_str("    </dataSet>\n");
        }
        out.push_str("  </dataSets>\n");
    }

    out.push_str("</reportSchema>\n");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn materializer() -> SchemaMaterializer {
        SchemaMaterializer::new(["cohort-count", "subject-attributes"])
    }

    const MONTHLY: &str = r#"<reportSchema id="7" name="Monthly summary">
  <description>Enrolment by site</description>
  <parameters>
    <parameter name="site" label="Site" type="string" required="true"/>
    <parameter name="minAge" type="integer" default="18"/>
    <parameter name="note" required="false"/>
  </parameters>
  <filter name="pilot" subjects="1 2 3"/>
  <dataSets>
    <dataSet name="enrolled" type="cohort-count">
      <property name="attribute" value="site"/>
      <property name="equals" value="{{site}}"/>
    </dataSet>
    <dataSet name="roster" type="subject-attributes">
      <property name="columns">site, age</property>
    </dataSet>
  </dataSets>
</reportSchema>"#;

    #[test]
    fn test_parse_full_schema() {
        let schema = materializer().parse(MONTHLY).unwrap();
        assert_eq!(schema.id, Some(SchemaId(7)));
        assert_eq!(schema.name, "Monthly summary");
        assert_eq!(schema.description.as_deref(), Some("Enrolment by site"));

        assert_eq!(schema.parameters.len(), 3);
        assert_eq!(schema.parameters[0].label.as_deref(), Some("Site"));
        assert!(schema.parameters[0].is_required());
        assert_eq!(schema.parameters[1].kind, ParameterType::Integer);
        assert!(!schema.parameters[1].is_required());
        assert_eq!(schema.parameters[2].kind, ParameterType::String);
        assert!(!schema.parameters[2].is_required());

        let filter = schema.filter.as_ref().unwrap();
        assert_eq!(filter.name(), Some("pilot"));
        assert_eq!(filter.len(), 3);

        let names: Vec<_> = schema.data_sets.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["enrolled", "roster"]);
        assert_eq!(schema.data_sets[0].property("equals"), Some("{{site}}"));
        assert_eq!(schema.data_sets[1].property("columns"), Some("site, age"));
    }

    #[test]
    fn test_materialize_expands_macros_first() {
        let xml = ReportSchemaXml::new(
            r#"<reportSchema name="$title"><dataSets><dataSet name="n" type="$kind"/></dataSets></reportSchema>"#,
        );
        let macros = MacroTable::new()
            .with("title", "Expanded")
            .with("kind", "cohort-count");
        let schema = materializer().materialize(&xml, &macros).unwrap();
        assert_eq!(schema.name, "Expanded");
        assert_eq!(schema.data_sets[0].kind, "cohort-count");
    }

    #[test]
    fn test_materialize_takes_id_from_back_reference() {
        let xml = ReportSchemaXml::for_schema(
            SchemaId(12),
            r#"<reportSchema name="r"><dataSets/></reportSchema>"#,
        );
        let schema = materializer().materialize(&xml, &MacroTable::new()).unwrap();
        assert_eq!(schema.id, Some(SchemaId(12)));
    }

    #[test]
    fn test_materialize_accepts_matching_id() {
        let xml = ReportSchemaXml::for_schema(
            SchemaId(12),
            r#"<reportSchema id="12" name="r"><dataSets/></reportSchema>"#,
        );
        let schema = materializer().materialize(&xml, &MacroTable::new()).unwrap();
        assert_eq!(schema.id, Some(SchemaId(12)));
    }

    #[test]
    fn test_materialize_rejects_id_of_another_schema() {
        let xml = ReportSchemaXml::for_schema(
            SchemaId(12),
            "<reportSchema name=\"r\"\n  id=\"7\"><dataSets/></reportSchema>",
        );
        let err = materializer()
            .materialize(&xml, &MacroTable::new())
            .unwrap_err();
        assert_eq!(err.kind, MaterializationErrorKind::InvalidAttribute);
        assert_eq!(err.problem, "Schema id 7 does not match owning schema 12");
        assert_eq!(err.location.map(|l| l.line), Some(2));
    }

    #[test]
    fn test_malformed_xml_has_location() {
        let err = materializer()
            .parse("<reportSchema name=\"x\">\n  <dataSets>\n</reportSchema>")
            .unwrap_err();
        assert_eq!(err.kind, MaterializationErrorKind::MalformedXml);
        assert!(err.location.is_some());
    }

    #[test]
    fn test_wrong_root() {
        let err = materializer().parse("<report name=\"x\"/>").unwrap_err();
        assert_eq!(err.kind, MaterializationErrorKind::UnexpectedElement);
        assert_eq!(err.location, Some(LineColumn { line: 1, column: 1 }));
    }

    #[test]
    fn test_missing_data_sets() {
        let err = materializer()
            .parse("<reportSchema name=\"x\"><description>d</description></reportSchema>")
            .unwrap_err();
        assert_eq!(err.kind, MaterializationErrorKind::MissingElement);
    }

    #[test]
    fn test_missing_name() {
        let err = materializer().parse("<reportSchema><dataSets/></reportSchema>").unwrap_err();
        assert_eq!(err.kind, MaterializationErrorKind::MissingAttribute);
        assert!(err.to_string().contains("'name'"));
    }

    #[test]
    fn test_unknown_data_set_type_points_at_value() {
        let source = "<reportSchema name=\"x\">\n  <dataSets>\n    <dataSet name=\"a\" type=\"sql\"/>\n  </dataSets>\n</reportSchema>";
        let err = materializer().parse(source).unwrap_err();
        assert_eq!(err.kind, MaterializationErrorKind::UnknownDataSetType);
        let location = err.location.unwrap();
        assert_eq!(location.line, 3);
        assert_eq!(location.column, 28);
        assert!(err.to_string().ends_with("(at 3:28)"));
    }

    #[test]
    fn test_duplicate_data_set_names() {
        let source = r#"<reportSchema name="x"><dataSets>
            <dataSet name="a" type="cohort-count"/>
            <dataSet name="a" type="cohort-count"/>
        </dataSets></reportSchema>"#;
        let err = materializer().parse(source).unwrap_err();
        assert_eq!(err.kind, MaterializationErrorKind::DuplicateName);
        assert_eq!(err.location.map(|l| l.line), Some(3));
    }

    #[test]
    fn test_duplicate_parameter_names() {
        let source = r#"<reportSchema name="x"><parameters>
            <parameter name="p"/><parameter name="p"/>
        </parameters><dataSets/></reportSchema>"#;
        let err = materializer().parse(source).unwrap_err();
        assert_eq!(err.kind, MaterializationErrorKind::DuplicateName);
    }

    #[test]
    fn test_malformed_parameter_declarations() {
        for parameter in [
            r#"<parameter name="p" type="timestamp"/>"#,
            r#"<parameter name="p" required="maybe"/>"#,
            r#"<parameter name="p" type="integer" default="ten"/>"#,
            r#"<parameter name=""/>"#,
        ] {
            let source = format!(
                "<reportSchema name=\"x\"><parameters>{}</parameters><dataSets/></reportSchema>",
                parameter
            );
            let err = materializer().parse(&source).unwrap_err();
            assert_eq!(err.kind, MaterializationErrorKind::InvalidAttribute, "{}", parameter);
        }
    }

    #[test]
    fn test_malformed_subject_ids() {
        let err = materializer()
            .parse(r#"<reportSchema name="x"><filter subjects="1 b 3"/><dataSets/></reportSchema>"#)
            .unwrap_err();
        assert_eq!(err.kind, MaterializationErrorKind::InvalidAttribute);
    }

    #[test]
    fn test_unexpected_elements_and_text() {
        let err = materializer()
            .parse(r#"<reportSchema name="x"><extra/><dataSets/></reportSchema>"#)
            .unwrap_err();
        assert_eq!(err.kind, MaterializationErrorKind::UnexpectedElement);

        let err = materializer()
            .parse(r#"<reportSchema name="x"><dataSets>stray</dataSets></reportSchema>"#)
            .unwrap_err();
        assert_eq!(err.kind, MaterializationErrorKind::UnexpectedElement);

        let err = materializer()
            .parse(r#"<reportSchema name="x"><dataSets/><dataSets/></reportSchema>"#)
            .unwrap_err();
        assert_eq!(err.kind, MaterializationErrorKind::UnexpectedElement);
    }

    #[test]
    fn test_round_trip() {
        let original = materializer().parse(MONTHLY).unwrap();
        let text = serialize(&original);
        let again = materializer().parse(&text).unwrap();
        assert_eq!(again, original);
    }

    #[test]
    fn test_round_trip_escapes_markup() {
        let schema = ReportSchema::new("A < B & \"C\"")
            .with_description("x > y")
            .with_data_set(
                DataSetDefinition::new("d", "cohort-count").with_property("equals", "<'&'>"),
            );
        let again = materializer().parse(&serialize(&schema)).unwrap();
        assert_eq!(again, schema);
    }

    #[test]
    fn test_serialize_layout() {
        let schema = ReportSchema::new("Small")
            .with_filter(Cohort::new([2, 1]))
            .with_data_set(DataSetDefinition::new("all", "cohort-count"));
        assert_eq!(
            serialize(&schema),
            "<reportSchema name=\"Small\">\n  <filter subjects=\"1 2\"/>\n  <dataSets>\n    <dataSet name=\"all\" type=\"cohort-count\"/>\n  </dataSets>\n</reportSchema>\n"
        );
    }
}
