use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colabfit::Table;

#[derive(Parser)]
#[command(
    name = "colabfit",
    about = "Build datasets of interatomic-potential training data",
    version,
    author,
    before_help = crate::display::banner_for_help(),
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Ingest extended-XYZ files into dataset tables (JSON Lines)
    #[command(visible_alias = "i")]
    Ingest(IngestArgs),

    /// Print the schema of a table
    Schema(SchemaArgs),

    /// Summarize the structures in an extended-XYZ file
    Inspect(InspectArgs),
}

#[derive(Args)]
pub struct IngestArgs {
    /// Extended-XYZ files or glob patterns
    #[arg(value_name = "INPUT", required = true)]
    pub inputs: Vec<String>,

    /// Ingest manifest (TOML)
    #[arg(short, long, value_name = "FILE")]
    pub manifest: PathBuf,

    /// Directory receiving one JSON Lines file per table
    #[arg(short, long, value_name = "DIR", default_value = "colabfit-out")]
    pub output_dir: PathBuf,

    #[command(flatten)]
    pub behavior: IngestOptions,

    /// Suppress progress output (for scripting)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Switches that override the manifest's `[ingest]` table.
#[derive(Args)]
#[command(next_help_heading = "Ingest Behavior")]
pub struct IngestOptions {
    /// Fail when a configuration lacks a mapped property field
    #[arg(long)]
    pub strict: bool,

    /// Convert energies, forces and stresses to eV and Å
    #[arg(long)]
    pub standardize: bool,

    /// Write array columns as JSON text
    #[arg(long)]
    pub stringify: bool,
}

#[derive(Args)]
pub struct SchemaArgs {
    /// Table to describe
    #[arg(value_name = "TABLE")]
    pub table: TableArg,

    /// Show the stringified variant (array columns as text)
    #[arg(long)]
    pub stringified: bool,

    /// Append the metadata column
    #[arg(long)]
    pub metadata: bool,
}

#[derive(Args)]
pub struct InspectArgs {
    /// Extended-XYZ file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Suppress the banner
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum TableArg {
    #[value(alias = "co")]
    Configurations,
    #[value(alias = "po")]
    PropertyObjects,
    #[value(alias = "cs")]
    ConfigurationSets,
    #[value(alias = "ds")]
    Datasets,
    #[value(alias = "mapping")]
    CoCsMapping,
}

impl From<TableArg> for Table {
    fn from(arg: TableArg) -> Self {
        match arg {
            TableArg::Configurations => Table::Configurations,
            TableArg::PropertyObjects => Table::PropertyObjects,
            TableArg::ConfigurationSets => Table::ConfigurationSets,
            TableArg::Datasets => Table::Datasets,
            TableArg::CoCsMapping => Table::CoCsMapping,
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}
