use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colabfit::{DatasetInfo, PropertyMap};
use regex::Regex;
use serde::Deserialize;

use crate::cli::IngestOptions;

/// Ingest manifest, read from TOML.
#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub dataset: DatasetInfo,
    #[serde(default)]
    pub ingest: IngestSection,
    #[serde(default)]
    pub property_map: PropertyMap,
    #[serde(default)]
    pub configuration_sets: Vec<ConfigurationSetRule>,
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IngestSection {
    pub definitions: Vec<PathBuf>,
    pub name_field: Option<String>,
    pub label_field: Option<String>,
    pub strict: bool,
    pub standardize_energy: bool,
    pub stringify: bool,
}

/// A configuration set whose members are selected by matching `name_pattern`
/// against configuration names.
#[derive(Debug, Deserialize)]
pub struct ConfigurationSetRule {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "match_all")]
    pub name_pattern: String,
    #[serde(default)]
    pub ordered: bool,
}

fn match_all() -> String {
    ".*".to_string()
}

impl ConfigurationSetRule {
    pub fn pattern(&self) -> Result<Regex> {
        Regex::new(&self.name_pattern).with_context(|| {
            format!(
                "Invalid name_pattern for configuration set '{}'",
                self.name
            )
        })
    }
}

impl Manifest {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let mut manifest = Self::from_toml(&text)
            .with_context(|| format!("Invalid manifest: {}", path.display()))?;
        manifest.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(manifest)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(text)?;
        anyhow::ensure!(
            !manifest.dataset.name.trim().is_empty(),
            "[dataset] name must not be empty"
        );
        Ok(manifest)
    }

    /// Definition files, resolved against the manifest's directory.
    pub fn definition_paths(&self) -> Vec<PathBuf> {
        self.ingest
            .definitions
            .iter()
            .map(|p| {
                if p.is_absolute() {
                    p.clone()
                } else {
                    self.base_dir.join(p)
                }
            })
            .collect()
    }

    /// Command-line switches only ever turn behavior on.
    pub fn apply_overrides(&mut self, opts: &IngestOptions) {
        self.ingest.strict |= opts.strict;
        self.ingest.standardize_energy |= opts.standardize;
        self.ingest.stringify |= opts.stringify;
    }
}
