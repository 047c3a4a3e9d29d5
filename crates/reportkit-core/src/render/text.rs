//! Plain-text table renderer.

use std::io::Write;

use super::error::RenderError;
use super::file_stem;
use super::traits::{RenderingMode, ReportRenderer};
use crate::evaluation::{DataSetResult, ReportData, cell_text};
use crate::schema::ReportSchema;

/// Renders every data set as an aligned plain-text table.
#[derive(Debug, Clone, Default)]
pub struct TextTableRenderer;

impl TextTableRenderer {
    pub const ID: &'static str = "text-table";
    pub const SORT_WEIGHT: i32 = 10;

    pub fn new() -> Self {
        Self
    }
}

impl ReportRenderer for TextTableRenderer {
    fn id(&self) -> &str {
        Self::ID
    }

    fn label(&self) -> &str {
        "Text table"
    }

    fn rendering_modes(&self, _schema: &ReportSchema) -> Vec<RenderingMode> {
        vec![RenderingMode::new(Self::ID, self.label(), None, Self::SORT_WEIGHT)]
    }

    fn content_type(&self, _argument: Option<&str>) -> String {
        "text/plain".to_string()
    }

    fn filename(&self, schema: &ReportSchema, _argument: Option<&str>) -> String {
        format!("{}.txt", file_stem(&schema.name))
    }

    fn render(
        &self,
        data: &ReportData,
        argument: Option<&str>,
        out: &mut dyn Write,
    ) -> Result<(), RenderError> {
        if let Some(argument) = argument {
            return Err(RenderError::unsupported_argument(Self::ID, argument));
        }

        writeln!(out, "{}", data.schema.name)?;
        writeln!(out, "{}", underline(&data.schema.name, '='))?;
        for (name, result) in &data.data_sets {
            writeln!(out)?;
            writeln!(out, "{}", name)?;
            writeln!(out, "{}", underline(name, '-'))?;
            write_table(out, result)?;
        }
        Ok(())
    }
}

fn underline(text: &str, c: char) -> String {
    std::iter::repeat_n(c, text.chars().count().max(1)).collect()
}

fn write_table(out: &mut dyn Write, result: &DataSetResult) -> std::io::Result<()> {
    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    write_line(out, result.columns.iter().map(String::as_str), &widths)?;
    let rules: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    write_line(out, rules.iter().map(String::as_str), &widths)?;

    if cells.is_empty() {
        writeln!(out, "(no rows)")?;
    }
    for row in &cells {
        write_line(out, row.iter().map(String::as_str), &widths)?;
    }
    Ok(())
}

fn write_line<'a>(
    out: &mut dyn Write,
    cells: impl Iterator<Item = &'a str>,
    widths: &[usize],
) -> std::io::Result<()> {
    let line = cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = width))
        .collect::<Vec<_>>()
        .join("  ");
    writeln!(out, "{}", line.trim_end())
}
