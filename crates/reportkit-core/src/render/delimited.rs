//! Spreadsheet-compatible delimited text.

use std::io::Write;

use super::error::RenderError;
use super::file_stem;
use super::traits::{RenderingMode, ReportRenderer};
use crate::evaluation::{ReportData, cell_text};
use crate::schema::ReportSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Comma,
    Tab,
}

impl Delimiter {
    fn from_argument(argument: Option<&str>) -> Option<Self> {
        match argument {
            None | Some("csv") => Some(Delimiter::Comma),
            Some("tsv") => Some(Delimiter::Tab),
            Some(_) => None,
        }
    }

    fn as_byte(self) -> u8 {
        match self {
            Delimiter::Comma => b',',
            Delimiter::Tab => b'\t',
        }
    }
}

/// Writes a single data set as CSV or TSV.
///
/// Only schemas with exactly one data set can be rendered this way. The
/// mode argument picks the delimiter (`csv` or `tsv`); quoting follows the
/// `csv` crate's defaults, so only fields that need it are quoted.
#[derive(Debug, Clone, Default)]
pub struct DelimitedRenderer;

impl DelimitedRenderer {
    pub const ID: &'static str = "delimited";

    pub fn new() -> Self {
        Self
    }
}

impl ReportRenderer for DelimitedRenderer {
    fn id(&self) -> &str {
        Self::ID
    }

    fn label(&self) -> &str {
        "Delimited text"
    }

    fn can_render(&self, schema: &ReportSchema) -> bool {
        schema.data_sets.len() == 1
    }

    fn rendering_modes(&self, _schema: &ReportSchema) -> Vec<RenderingMode> {
        vec![
            RenderingMode::new(Self::ID, "CSV", Some("csv"), 20),
            RenderingMode::new(Self::ID, "TSV", Some("tsv"), 30),
        ]
    }

    fn content_type(&self, argument: Option<&str>) -> String {
        match Delimiter::from_argument(argument) {
            Some(Delimiter::Tab) => "text/tab-separated-values",
            _ => "text/csv",
        }
        .to_string()
    }

    fn filename(&self, schema: &ReportSchema, argument: Option<&str>) -> String {
        let extension = match Delimiter::from_argument(argument) {
            Some(Delimiter::Tab) => "tsv",
            _ => "csv",
        };
        format!("{}.{}", file_stem(&schema.name), extension)
    }

    fn render(
        &self,
        data: &ReportData,
        argument: Option<&str>,
        out: &mut dyn Write,
    ) -> Result<(), RenderError> {
        let delimiter = Delimiter::from_argument(argument).ok_or_else(|| {
            RenderError::unsupported_argument(Self::ID, argument.unwrap_or_default())
        })?;
        let mut results = data.data_sets.values();
        let (Some(result), None) = (results.next(), results.next()) else {
            return Err(RenderError::other(format!(
                "Delimited output needs exactly one data set, report has {}",
                data.data_sets.len()
            )));
        };

        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter.as_byte())
            .from_writer(out);
        writer.write_record(&result.columns)?;
        for row in &result.rows {
            writer.write_record(row.iter().map(cell_text))?;
        }
        writer.flush()?;
        Ok(())
    }
}
