//! reportkit CLI - Main entry point

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "reportkit")]
#[command(version)]
#[command(about = "Expand, check, evaluate and render report schemas", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Macro table file, overriding the configured one
    #[arg(long, global = true)]
    macros: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a schema file with macros expanded
    Expand {
        /// Schema XML file
        schema: PathBuf,
    },

    /// Materialize a schema file and print a summary
    Check {
        /// Schema XML file
        schema: PathBuf,
    },

    /// List the rendering modes available for a schema, preferred first
    Modes {
        /// Schema XML file
        schema: PathBuf,
    },

    /// List registered renderers
    Renderers,

    /// Evaluate a schema and render the result
    Run {
        /// Schema XML file
        schema: PathBuf,

        /// Population file (JSON)
        #[arg(long)]
        population: PathBuf,

        /// Parameter value (NAME=VALUE)
        #[arg(short = 'P', long = "param")]
        params: Vec<String>,

        /// Restrict evaluation to these subject ids
        #[arg(long)]
        cohort: Option<String>,

        /// Rendering mode (RENDERER[:ARGUMENT]); defaults to the preferred mode
        #[arg(short, long)]
        mode: Option<String>,

        /// Write output to FILE, or into DIR using the renderer's file name
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Inspect or edit the macro table
    Macros {
        #[command(subcommand)]
        action: MacrosAction,
    },
}

#[derive(Subcommand)]
enum MacrosAction {
    /// Print every macro
    List,

    /// Define or replace a macro
    Set { name: String, value: String },

    /// Remove a macro
    Unset { name: String },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reportkit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = commands::Settings {
        config: cli.config,
        macros: cli.macros,
    };

    match cli.command {
        Commands::Expand { schema } => commands::expand::execute(&settings, &schema),
        Commands::Check { schema } => commands::check::execute(&settings, &schema),
        Commands::Modes { schema } => commands::modes::execute(&settings, &schema),
        Commands::Renderers => commands::renderers::execute(&settings),
        Commands::Run {
            schema,
            population,
            params,
            cohort,
            mode,
            output,
        } => commands::run::execute(
            &settings,
            commands::run::RunArgs {
                schema,
                population,
                params,
                cohort,
                mode,
                output,
            },
        ),
        Commands::Macros { action } => match action {
            MacrosAction::List => commands::macros::list(&settings),
            MacrosAction::Set { name, value } => commands::macros::set(&settings, &name, &value),
            MacrosAction::Unset { name } => commands::macros::unset(&settings, &name),
        },
    }
}
