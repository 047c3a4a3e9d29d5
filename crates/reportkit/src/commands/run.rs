//! `reportkit run`: evaluate a schema against a population file and render
//! the result.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use tracing::info;

use reportkit_core::{
    Cohort, EvaluationContext, InMemoryPopulation, RenderingMode, ReportSchema, ReportService,
    builtin_evaluators,
};

use super::{Settings, load_schema};

/// Arguments for the run command
#[derive(Debug)]
pub struct RunArgs {
    pub schema: PathBuf,
    pub population: PathBuf,
    /// `NAME=VALUE` pairs
    pub params: Vec<String>,
    pub cohort: Option<String>,
    /// `RENDERER[:ARGUMENT]`
    pub mode: Option<String>,
    pub output: Option<PathBuf>,
}

pub fn execute(settings: &Settings, args: RunArgs) -> Result<()> {
    let population_text = std::fs::read_to_string(&args.population).with_context(|| {
        format!("Failed to read population file {}", args.population.display())
    })?;
    let population = InMemoryPopulation::from_json(&population_text)
        .with_context(|| format!("Invalid population file {}", args.population.display()))?;
    info!(subjects = population.len(), "Loaded population");

    let service = settings.service_with(builtin_evaluators(Arc::new(population)))?;
    let schema = load_schema(&service, &args.schema)?;

    let mut context = EvaluationContext::new();
    for param in &args.params {
        let (name, value) = parse_param(param)?;
        context.set_parameter(name, value);
    }
    let cohort = args
        .cohort
        .as_deref()
        .map(Cohort::parse)
        .transpose()
        .map_err(|err| anyhow!("Invalid --cohort: {}", err))?;

    let mode = select_mode(&service, &schema, args.mode.as_deref())?;
    let data = service.evaluate(&schema, cohort.as_ref(), &mut context)?;

    match &args.output {
        Some(path) => {
            let target = if path.is_dir() {
                let renderer = service
                    .report_renderer(mode.renderer.as_str())
                    .ok_or_else(|| anyhow!("Unknown renderer: {}", mode.renderer))?;
                path.join(renderer.filename(&schema, mode.argument()))
            } else {
                path.clone()
            };
            let file = File::create(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
            let mut out = BufWriter::new(file);
            service.render(&data, &mode, &mut out)?;
            out.flush()?;
            info!(output = %target.display(), mode = %mode, "Wrote report");
        }
        None => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            service.render(&data, &mode, &mut out)?;
            out.flush()?;
        }
    }
    Ok(())
}

fn parse_param(param: &str) -> Result<(&str, &str)> {
    match param.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value)),
        _ => bail!("Invalid parameter '{}', expected NAME=VALUE", param),
    }
}

/// Pick the mode named by `requested`, or the preferred one.
fn select_mode(
    service: &ReportService,
    schema: &ReportSchema,
    requested: Option<&str>,
) -> Result<RenderingMode> {
    let modes = service.rendering_modes(schema);
    let Some(requested) = requested else {
        return modes
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No renderer can render schema '{}'", schema.name));
    };

    let (renderer, argument) = match requested.split_once(':') {
        Some((renderer, argument)) => (renderer, Some(argument)),
        None => (requested, None),
    };
    // A bare renderer id selects that renderer's preferred mode.
    modes
        .iter()
        .find(|mode| {
            mode.renderer.as_str() == renderer && (argument.is_none() || mode.argument() == argument)
        })
        .cloned()
        .ok_or_else(|| {
            let available: Vec<String> = modes.iter().map(ToString::to_string).collect();
            anyhow!(
                "No rendering mode '{}' for schema '{}' (available: {})",
                requested,
                schema.name,
                available.join(", ")
            )
        })
}
