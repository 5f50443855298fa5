use std::io::{self, Write};

use anyhow::Error;

use crate::util::text::wrap;

#[rustfmt::skip]
pub fn print_error(err: &Error) {
    let mut stderr = io::stderr().lock();

    let _ = writeln!(stderr);
    let _ = writeln!(stderr, "   ╔══════════════════════════════════════════════════════════════╗");
    let _ = writeln!(stderr, "   ║  ✗ Error                                                     ║");
    let _ = writeln!(stderr, "   ╟──────────────────────────────────────────────────────────────╢");

    for line in wrap(&err.to_string(), 59) {
        let _ = writeln!(stderr, "   ║  {:<59} ║", line);
    }

    let mut source = err.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "   ╟──────────────────────────────────────────────────────────────╢");
        let _ = writeln!(stderr, "   ║  Caused by:                                                  ║");
        for line in wrap(&cause.to_string(), 59) {
            let _ = writeln!(stderr, "   ║    {:<57} ║", line);
        }
        source = cause.source();
    }

    let hints = HintCollector::collect(err);
    if !hints.is_empty() {
        let _ = writeln!(stderr, "   ╟──────────────────────────────────────────────────────────────╢");
        let _ = writeln!(stderr, "   ║  Hints:                                                      ║");
        for hint in hints {
            let wrapped = wrap(&hint, 55);
            if let Some((first, rest)) = wrapped.split_first() {
                let _ = writeln!(stderr, "   ║    • {:<55} ║", first);
                for line in rest {
                    let _ = writeln!(stderr, "   ║      {:<55} ║", line);
                }
            }
        }
    }

    let _ = writeln!(stderr, "   ╚══════════════════════════════════════════════════════════════╝");
    let _ = writeln!(stderr);
}

#[derive(Default)]
struct HintCollector {
    hints: Vec<String>,
    has_typed_hints: bool,
}

impl HintCollector {
    fn collect(err: &Error) -> Vec<String> {
        let mut collector = Self::default();

        for cause in err.chain() {
            collector.collect_io_hints(cause);
            collector.collect_property_hints(cause);
            collector.collect_aggregate_hints(cause);
            collector.collect_configuration_hints(cause);
            collector.collect_schema_hints(cause);
            if collector.has_typed_hints {
                break;
            }
        }

        if !collector.has_typed_hints {
            collector.collect_fallback_hints(err);
        }

        collector.hints
    }

    fn add(&mut self, hint: impl Into<String>) {
        self.hints.push(hint.into());
    }

    fn mark_typed(&mut self) {
        self.has_typed_hints = true;
    }

    fn collect_io_hints(&mut self, cause: &(dyn std::error::Error + 'static)) {
        use colabfit::io::Error as IoError;

        if let Some(source) = cause.downcast_ref::<std::io::Error>() {
            self.mark_typed();
            self.collect_std_io_hints(source);
            return;
        }

        let Some(io_err) = cause.downcast_ref::<IoError>() else {
            return;
        };

        self.mark_typed();

        match io_err {
            IoError::Io { source } => self.collect_std_io_hints(source),

            IoError::Parse { format, line, .. } => {
                self.add(format!(
                    "Parser encountered an issue near line {} in {} data",
                    line, format
                ));
                self.add("Each frame starts with an atom count, then a comment line");
                self.add("Comment lines hold key=value pairs; quote values with spaces");
                self.add("Properties must declare species:S:1 and pos:R:3 columns");
            }

            IoError::Serialize(_) => {
                self.add("A row value could not be written as JSON");
                self.add("Non-finite numbers (NaN, inf) cannot be represented in JSON");
            }
        }
    }

    fn collect_std_io_hints(&mut self, source: &std::io::Error) {
        use std::io::ErrorKind;

        match source.kind() {
            ErrorKind::NotFound => {
                self.add("File or directory not found");
                self.add("Check the path spelling and ensure the file exists");
            }

            ErrorKind::PermissionDenied => {
                self.add("Permission denied accessing the file");
                self.add("Check file permissions with `ls -la`");
            }

            ErrorKind::InvalidData => {
                self.add("File contains invalid or non-UTF-8 data");
                self.add("Verify the file is not truncated or corrupted");
            }

            ErrorKind::WriteZero | ErrorKind::StorageFull => {
                self.add("Failed to write data (disk full?)");
                self.add("Check available disk space");
            }

            _ => {
                self.add("I/O operation failed");
                self.add("Check file path, permissions, and disk space");
            }
        }
    }

    fn collect_property_hints(&mut self, cause: &(dyn std::error::Error + 'static)) {
        use colabfit::PropertyError;

        let Some(prop_err) = cause.downcast_ref::<PropertyError>() else {
            return;
        };

        self.mark_typed();

        match prop_err {
            PropertyError::Io(_) => {
                self.add("A property definition file could not be read");
                self.add("Paths in [ingest] definitions are relative to the manifest");
            }

            PropertyError::Json(_) => {
                self.add("Property definitions must be valid JSON documents");
            }

            PropertyError::InvalidDefinition(_) => {
                self.add("Each definition needs a property-id and typed keys");
                self.add("Keys declare type, has-unit, extent and required");
            }

            PropertyError::InvalidMap { entry, .. } => {
                self.add(format!(
                    "Check [property_map.{}] in the manifest",
                    entry
                ));
                self.add("Every key needs either a field or a value");
            }

            PropertyError::UnknownProperty(name) => {
                self.add(format!("No loaded definition is named '{}'", name));
                self.add("Add its JSON file to [ingest] definitions");
            }

            PropertyError::MissingField { key, .. } => {
                self.add(format!("No configuration field supplies '{}'", key));
                self.add("Drop --strict to skip configurations without the field");
            }

            PropertyError::InvalidInstance { .. } => {
                self.add("A mapped value does not match its definition key type");
                self.add("Keys with has-unit = true need units in the property map");
            }

            PropertyError::UnknownUnit(_) | PropertyError::MalformedUnit(_) => {
                self.add("Units are products and quotients of known names, e.g. kcal/mol");
                self.add("Known names include eV, meV, Hartree, kcal, kJ, mol, Ang, Bohr, GPa");
            }

            PropertyError::ReferenceUnitMismatch { .. } => {
                self.add("Give reference-energy the same units as energy");
            }

            PropertyError::MissingNsites(_) => {
                self.add("Per-atom energies need the configuration's site count");
            }

            PropertyError::NonNumeric { .. } => {
                self.add("Only numeric values (or arrays of numbers) can be converted");
                self.add("Disable --standardize or fix the source field");
            }
        }
    }

    fn collect_aggregate_hints(&mut self, cause: &(dyn std::error::Error + 'static)) {
        use colabfit::AggregateError;

        let Some(agg_err) = cause.downcast_ref::<AggregateError>() else {
            return;
        };

        self.mark_typed();

        match agg_err {
            AggregateError::Empty(_) => {
                self.add("No configurations were read from the inputs");
                self.add("Check the input paths and glob patterns");
            }

            AggregateError::MissingColumn { .. }
            | AggregateError::InvalidColumn { .. }
            | AggregateError::UnknownAtomicNumber(_)
            | AggregateError::SiteCountMismatch { .. } => {
                self.add("Configuration rows are inconsistent");
                self.add("This may indicate a bug; please report if reproducible");
            }
        }
    }

    fn collect_configuration_hints(&mut self, cause: &(dyn std::error::Error + 'static)) {
        use colabfit::ConfigurationError;

        let Some(cfg_err) = cause.downcast_ref::<ConfigurationError>() else {
            return;
        };

        self.mark_typed();

        match cfg_err {
            ConfigurationError::Empty => {
                self.add("A frame declares zero atoms");
            }

            ConfigurationError::LengthMismatch { .. } => {
                self.add("Atom count line disagrees with the number of atom lines");
            }

            ConfigurationError::UnknownAtomicNumber(_) => {
                self.add("Species must be element symbols from H to Og");
            }

            ConfigurationError::ArrayLength { key, .. } => {
                self.add(format!(
                    "Per-atom column '{}' must have one row per atom",
                    key
                ));
            }
        }
    }

    fn collect_schema_hints(&mut self, cause: &(dyn std::error::Error + 'static)) {
        use colabfit::SchemaError;

        let Some(schema_err) = cause.downcast_ref::<SchemaError>() else {
            return;
        };

        self.mark_typed();

        match schema_err {
            SchemaError::UnknownTable(_) => {
                self.add("Tables: configurations, property_objects, configuration_sets, datasets, co_cs_mapping");
            }

            SchemaError::TypeMismatch { column, .. } => {
                self.add(format!("Column '{}' does not match the table schema", column));
            }
        }
    }

    fn collect_fallback_hints(&mut self, err: &Error) {
        let msg = error_chain_text(err);

        if msg.contains("manifest") || msg.contains("toml") {
            self.add("Check the manifest TOML syntax and its [dataset] table");
            return;
        }

        if msg.contains("pattern") || msg.contains("glob") {
            self.add("Quote glob patterns so the shell does not expand them");
            return;
        }

        if msg.contains("no such file") || msg.contains("not found") {
            self.add("Check that the file path is correct");
            self.add("Verify the file exists and is readable");
        }
    }
}

fn error_chain_text(err: &Error) -> String {
    err.chain()
        .map(|cause| cause.to_string())
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase()
}
