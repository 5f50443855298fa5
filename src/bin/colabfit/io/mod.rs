mod infer;

pub use infer::input as infer_input_format;

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, IsTerminal};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use colabfit::AtomicConfiguration;
use colabfit::io::{Format, extxyz};
use tracing::{debug, warn};

/// Returns `true` if stderr is a terminal (interactive).
pub fn stderr_is_tty() -> bool {
    io::stderr().is_terminal()
}

/// Expands each argument as a glob pattern, keeping literal paths as given.
///
/// Results are sorted and deduplicated so ingestion order does not depend on
/// the order the filesystem returns entries in.
pub fn expand_inputs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for pattern in patterns {
        if Path::new(pattern).exists() {
            paths.push(PathBuf::from(pattern));
            continue;
        }

        let matches = glob::glob(pattern)
            .with_context(|| format!("Invalid input pattern: {pattern}"))?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to expand input pattern: {pattern}"))?;

        if matches.is_empty() {
            bail!("Input not found: no file matches '{pattern}'");
        }
        debug!(pattern = %pattern, matches = matches.len(), "expanded input pattern");
        paths.extend(matches);
    }

    paths.sort();
    paths.dedup();
    Ok(paths)
}

/// Reads every frame of an extended-XYZ file.
pub fn read_configurations(path: &Path) -> Result<Vec<AtomicConfiguration>> {
    if infer_input_format(path) != Some(Format::ExtXyz) {
        warn!(path = %path.display(), "unrecognized extension; reading as extended XYZ");
    }

    let file = File::open(path)
        .with_context(|| format!("Failed to open input file: {}", path.display()))?;
    extxyz::read(BufReader::new(file))
        .with_context(|| format!("Failed to read structures from {}", path.display()))
}

pub fn create_output(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    Ok(BufWriter::new(file))
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))
}
