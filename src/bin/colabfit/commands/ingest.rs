use std::path::Path;

use anyhow::{Context, Result, bail};
use colabfit::io::rows::RowWriter;
use colabfit::{
    AtomicConfiguration, ConfigurationSet, Dataset, Property, PropertyDefinition, Row, Schema,
    Table,
};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::cli::IngestArgs;
use crate::config::{IngestSection, Manifest};
use crate::display::{
    Context as DisplayContext, Progress, print_element_distribution, print_ingest_summary,
    print_structure_info,
};
use crate::io::{create_output, ensure_dir, expand_inputs, read_configurations};

const TOTAL_STEPS: u8 = 5;

pub fn run_ingest(args: IngestArgs, ctx: DisplayContext) -> Result<()> {
    let mut progress = Progress::new(ctx.interactive, "Ingest", TOTAL_STEPS);

    progress.step("Loading manifest");
    let mut manifest = Manifest::from_path(&args.manifest)?;
    manifest.apply_overrides(&args.behavior);
    let definitions = load_definitions(&manifest)?;
    progress.complete_step(
        "Loading manifest",
        &[
            format!("Dataset '{}'", manifest.dataset.name),
            format!("{} property definition(s)", definitions.len()),
            format!("{} configuration set(s)", manifest.configuration_sets.len()),
        ],
    );

    progress.step("Reading structures");
    let inputs = expand_inputs(&args.inputs)?;
    let mut configurations = Vec::new();
    for path in &inputs {
        let frames = read_configurations(path)?;
        configurations.extend(label_frames(frames, path, &manifest.ingest));
    }
    if configurations.is_empty() {
        bail!("No structures found in {} input file(s)", inputs.len());
    }
    progress.complete_step(
        "Reading structures",
        &[
            format!("Parse {} extended-XYZ file(s)", inputs.len()),
            format!("{} configuration(s)", configurations.len()),
        ],
    );

    if ctx.interactive {
        print_structure_info(&configurations);
        print_element_distribution(&configurations);
    }

    progress.step("Building property objects");
    let properties = build_properties(&configurations, &definitions, &manifest)?;
    progress.complete_step(
        "Building property objects",
        &[
            format!("{} property object(s)", properties.len()),
            format!(
                "Units {}",
                if manifest.ingest.standardize_energy {
                    "standardized to eV and Å"
                } else {
                    "kept as given"
                }
            ),
        ],
    );

    progress.step("Aggregating dataset");
    let tables = assemble(&manifest, configurations, &properties)?;
    progress.complete_step(
        "Aggregating dataset",
        &[
            format!("Dataset {}", tables.dataset_id),
            format!(
                "{} configuration set(s)",
                tables.configuration_sets.len()
            ),
        ],
    );

    progress.step("Writing tables");
    let written = write_tables(&tables, &args.output_dir, manifest.ingest.stringify)?;
    progress.complete_step(
        "Writing tables",
        &[format!(
            "{} schemas into {}",
            if manifest.ingest.stringify {
                "Stringified"
            } else {
                "Array"
            },
            args.output_dir.display()
        )],
    );

    progress.finish();

    if ctx.interactive {
        print_ingest_summary(&written);
    }

    Ok(())
}

/// Rows of every output table, tied to one dataset.
#[derive(Debug)]
struct Tables {
    dataset_id: String,
    configurations: Vec<Row>,
    property_objects: Vec<Row>,
    configuration_sets: Vec<Row>,
    co_cs_mapping: Vec<Row>,
    datasets: Vec<Row>,
}

impl Tables {
    fn rows(&self, table: Table) -> &[Row] {
        match table {
            Table::Configurations => &self.configurations,
            Table::PropertyObjects => &self.property_objects,
            Table::ConfigurationSets => &self.configuration_sets,
            Table::Datasets => &self.datasets,
            Table::CoCsMapping => &self.co_cs_mapping,
        }
    }
}

fn load_definitions(manifest: &Manifest) -> Result<Vec<PropertyDefinition>> {
    manifest
        .definition_paths()
        .iter()
        .map(|path| {
            PropertyDefinition::from_path(path)
                .with_context(|| format!("Failed to load definition: {}", path.display()))
        })
        .collect()
}

/// Sets names and labels from the configured `info` fields. Frames without a
/// name field are named after their file and position.
fn label_frames(
    frames: Vec<AtomicConfiguration>,
    path: &Path,
    ingest: &IngestSection,
) -> Vec<AtomicConfiguration> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    frames
        .into_iter()
        .enumerate()
        .map(|(index, config)| {
            let names = ingest
                .name_field
                .as_deref()
                .and_then(|field| strings_of(config.field(field)))
                .unwrap_or_else(|| vec![format!("{stem}_{index}")]);
            let labels = ingest
                .label_field
                .as_deref()
                .and_then(|field| strings_of(config.field(field)))
                .unwrap_or_default();
            config.with_names(names).with_labels(labels)
        })
        .collect()
}

fn strings_of(value: Option<&Value>) -> Option<Vec<String>> {
    let text = |v: &Value| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match value? {
        Value::Null => None,
        Value::Array(items) => Some(items.iter().map(text).collect()),
        other => Some(vec![text(other)]),
    }
}

fn build_properties(
    configurations: &[AtomicConfiguration],
    definitions: &[PropertyDefinition],
    manifest: &Manifest,
) -> Result<Vec<Property>> {
    let map = &manifest.property_map;
    if map.properties.is_empty() {
        warn!("property map is empty; no property objects will be built");
        return Ok(Vec::new());
    }

    let mut properties = Vec::with_capacity(configurations.len());
    for config in configurations {
        let property = Property::from_definition(
            definitions,
            config,
            map,
            manifest.ingest.standardize_energy,
            manifest.ingest.strict,
        )
        .with_context(|| {
            format!(
                "Failed to build property object for configuration {}",
                config.id()
            )
        })?;

        if property.is_empty() {
            warn!(
                configuration = config.id(),
                "no mapped property found; skipping property object"
            );
            continue;
        }
        properties.push(property);
    }
    Ok(properties)
}

/// Aggregates the dataset and its configuration sets, then links every row
/// to the dataset.
///
/// The dataset id hashes the configuration and property-object ids, so those
/// are computed first. The `dataset_id` columns are filled in afterwards and
/// do not feed back into the property-object hashes.
fn assemble(
    manifest: &Manifest,
    mut configurations: Vec<AtomicConfiguration>,
    properties: &[Property],
) -> Result<Tables> {
    let co_rows: Vec<Row> = configurations
        .iter()
        .map(AtomicConfiguration::to_row)
        .collect();
    let po_rows: Vec<Row> = properties.iter().map(Property::to_row).collect();

    let dataset = Dataset::new(manifest.dataset.clone(), &co_rows, &po_rows)
        .context("Failed to aggregate dataset")?;
    let dataset_id = dataset.id().to_string();
    info!(%dataset, id = %dataset_id, "aggregated dataset");

    let mut sets = Vec::new();
    for rule in &manifest.configuration_sets {
        let pattern = rule.pattern()?;
        let members: Vec<usize> = configurations
            .iter()
            .enumerate()
            .filter(|(_, c)| c.names.iter().any(|n| pattern.is_match(n)))
            .map(|(i, _)| i)
            .collect();

        if members.is_empty() {
            warn!(set = %rule.name, pattern = %rule.name_pattern, "no configuration names match; skipping set");
            continue;
        }

        let rows: Vec<Row> = members.iter().map(|&i| co_rows[i].clone()).collect();
        let set = ConfigurationSet::new(
            &rows,
            &rule.name,
            &rule.description,
            &dataset_id,
            rule.ordered,
        )
        .with_context(|| format!("Failed to aggregate configuration set '{}'", rule.name))?;

        for &i in &members {
            configurations[i]
                .configuration_set_ids
                .push(set.id().to_string());
        }
        info!(set = %set, "aggregated configuration set");
        sets.push(set);
    }

    let configurations = configurations
        .into_iter()
        .map(|c| c.with_dataset_id(&dataset_id).to_row())
        .collect();
    let property_objects = po_rows
        .into_iter()
        .map(|mut row| {
            row.insert("dataset_id".into(), json!(dataset_id));
            row
        })
        .collect();

    Ok(Tables {
        configurations,
        property_objects,
        configuration_sets: sets.iter().map(ConfigurationSet::to_row).collect(),
        co_cs_mapping: sets.iter().flat_map(ConfigurationSet::mapping_rows).collect(),
        datasets: vec![dataset.to_row()],
        dataset_id,
    })
}

/// Schema a table is written with. Property objects also keep the unit,
/// reference and per-property columns their rows carry beyond the fixed
/// columns.
fn output_schema(table: Table, rows: &[Row], stringify: bool) -> Schema {
    let mut schema = table.df_schema();
    if table.has_metadata() {
        schema = schema.with_metadata();
    }
    if table == Table::PropertyObjects {
        schema = schema.extend_with(rows);
    }
    if stringify { schema.stringified() } else { schema }
}

fn write_tables(
    tables: &Tables,
    dir: &Path,
    stringify: bool,
) -> Result<Vec<(Table, usize, String)>> {
    ensure_dir(dir)?;

    Table::ALL
        .iter()
        .map(|&table| -> Result<(Table, usize, String)> {
            let path = dir.join(format!("{}.jsonl", table.name()));
            let rows = tables.rows(table);
            let schema = output_schema(table, rows, stringify);
            let mut writer = RowWriter::new(create_output(&path)?, schema);
            writer
                .write_all(rows)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            let count = writer.written();
            writer
                .finish()
                .with_context(|| format!("Failed to flush {}", path.display()))?;
            info!(%table, rows = count, path = %path.display(), "wrote table");

            let file = path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok((table, count, file))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    const FRAMES: &str = "\
3
config_name=dimer_0 E=-10.0 tag=water
O 0.0 0.0 0.0
H 0.96 0.0 0.0
H -0.24 0.93 0.0
2
config_name=mono_1 E=-5.0 Lattice=\"5 0 0 0 5 0 0 0 5\"
H 0.0 0.0 0.0
H 0.0 0.0 0.74
2
config_name=mono_2
H 0.0 0.0 0.0
H 0.0 0.0 0.75
";

    const ENERGY: &str = r#"{
        "property-id": "tag:staff@noreply.colabfit.org,2022-11-30:property/energy",
        "property-name": "energy",
        "energy": {"type": "float", "has-unit": true, "extent": [], "required": true},
        "per-atom": {"type": "bool", "has-unit": false, "extent": [], "required": true}
    }"#;

    fn manifest_text(strict: bool) -> String {
        format!(
            r#"
[dataset]
name = "toy"
authors = ["A. Author"]
description = "Toy molecules"

[ingest]
definitions = ["energy.json"]
name_field = "config_name"
label_field = "tag"
strict = {strict}

[property_map.energy]
energy = {{ field = "E", units = "eV" }}
per-atom = {{ value = false }}

[[configuration_sets]]
name = "dimers"
description = "Water"
name_pattern = "^dimer_"

[[configuration_sets]]
name = "nothing"
name_pattern = "^zzz"
"#
        )
    }

    struct Fixture {
        dir: tempfile::TempDir,
        manifest: Manifest,
        xyz: PathBuf,
    }

    fn fixture(strict: bool) -> Fixture {
        fixture_with(&manifest_text(strict), &[("energy.json", ENERGY)], FRAMES)
    }

    fn fixture_with(manifest: &str, definitions: &[(&str, &str)], frames: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        for (file, text) in definitions {
            fs::write(dir.path().join(file), text).unwrap();
        }
        let manifest_path = dir.path().join("manifest.toml");
        fs::write(&manifest_path, manifest).unwrap();
        let xyz = dir.path().join("frames.xyz");
        fs::write(&xyz, frames).unwrap();
        Fixture {
            manifest: Manifest::from_path(&manifest_path).unwrap(),
            dir,
            xyz,
        }
    }

    fn read_frames(f: &Fixture) -> Vec<AtomicConfiguration> {
        let frames = read_configurations(&f.xyz).unwrap();
        label_frames(frames, &f.xyz, &f.manifest.ingest)
    }

    #[test]
    fn labels_come_from_info_fields() {
        let f = fixture(false);
        let configs = read_frames(&f);
        assert_eq!(configs[0].names, vec!["dimer_0"]);
        assert_eq!(configs[0].labels, vec!["water"]);
        assert!(configs[1].labels.is_empty());
    }

    #[test]
    fn unnamed_frames_use_file_stem_and_index() {
        let f = fixture(false);
        let frames = read_configurations(&f.xyz).unwrap();
        let configs = label_frames(frames, &f.xyz, &IngestSection::default());
        assert_eq!(configs[2].names, vec!["frames_2"]);
    }

    #[test]
    fn strings_of_handles_scalars_and_lists() {
        assert_eq!(strings_of(Some(&json!("a"))), Some(vec!["a".to_string()]));
        assert_eq!(
            strings_of(Some(&json!(["a", 3]))),
            Some(vec!["a".to_string(), "3".to_string()])
        );
        assert_eq!(strings_of(Some(&Value::Null)), None);
        assert_eq!(strings_of(None), None);
    }

    #[test]
    fn lenient_ingest_skips_frames_without_energy() {
        let f = fixture(false);
        let configs = read_frames(&f);
        let defs = load_definitions(&f.manifest).unwrap();
        let properties = build_properties(&configs, &defs, &f.manifest).unwrap();
        assert_eq!(properties.len(), 2);
    }

    #[test]
    fn strict_ingest_fails_on_missing_field() {
        let f = fixture(true);
        let configs = read_frames(&f);
        let defs = load_definitions(&f.manifest).unwrap();
        let err = build_properties(&configs, &defs, &f.manifest).unwrap_err();
        let chain = format!("{err:#}");
        assert!(chain.contains("strict"), "{chain}");
    }

    #[test]
    fn assembled_rows_link_to_dataset_and_sets() {
        let f = fixture(false);
        let configs = read_frames(&f);
        let defs = load_definitions(&f.manifest).unwrap();
        let properties = build_properties(&configs, &defs, &f.manifest).unwrap();
        let tables = assemble(&f.manifest, configs, &properties).unwrap();

        assert!(tables.dataset_id.starts_with("DS_"));
        assert_eq!(tables.configurations.len(), 3);
        assert_eq!(tables.property_objects.len(), 2);
        assert_eq!(tables.configuration_sets.len(), 1);
        assert_eq!(tables.co_cs_mapping.len(), 1);
        assert_eq!(tables.datasets.len(), 1);

        let ds = &tables.datasets[0];
        assert_eq!(ds["id"], json!(tables.dataset_id));
        assert_eq!(ds["nconfigurations"], json!(3));
        assert_eq!(ds["nproperty_objects"], json!(2));

        let set_id = tables.configuration_sets[0]["id"].as_str().unwrap();
        assert_eq!(set_id, format!("CS_dimers_{}", tables.dataset_id));

        let dimer = &tables.configurations[0];
        assert_eq!(dimer["configuration_set_ids"], json!([set_id]));
        assert_eq!(dimer["dataset_ids"], json!([tables.dataset_id]));
        assert_eq!(tables.configurations[1]["configuration_set_ids"], json!([]));

        for row in &tables.property_objects {
            assert_eq!(row["dataset_id"], json!(tables.dataset_id));
        }
    }

    #[test]
    fn writes_one_file_per_table() {
        let f = fixture(false);
        let configs = read_frames(&f);
        let defs = load_definitions(&f.manifest).unwrap();
        let properties = build_properties(&configs, &defs, &f.manifest).unwrap();
        let tables = assemble(&f.manifest, configs, &properties).unwrap();

        let out = f.dir.path().join("out");
        let written = write_tables(&tables, &out, true).unwrap();
        assert_eq!(written.len(), Table::ALL.len());

        for (table, count, file) in &written {
            let text = fs::read_to_string(out.join(file)).unwrap();
            assert_eq!(text.lines().count(), *count, "{table}");
        }

        let text = fs::read_to_string(out.join("configurations.jsonl")).unwrap();
        let first: Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert!(first["elements"].is_string());
        assert!(first.get("metadata").is_some());
    }

    #[test]
    fn dataset_schema_has_no_metadata_column() {
        assert!(output_schema(Table::Datasets, &[], false).column("metadata").is_none());
        assert!(output_schema(Table::PropertyObjects, &[], false).column("metadata").is_some());
    }

    const DIPOLE: &str = r#"{
        "property-id": "tag:staff@noreply.colabfit.org,2024-04-30:property/dipole-moment",
        "property-name": "dipole-moment",
        "dipole": {"type": "float", "has-unit": true, "extent": [3], "required": true}
    }"#;

    const UNCONVERTED_MANIFEST: &str = r#"
[dataset]
name = "h2_units"
authors = ["A. Author"]
description = "Hydrogen in source units"

[ingest]
definitions = ["energy.json", "dipole.json"]
name_field = "config_name"

[property_map.energy]
energy = { field = "E", units = "kcal/mol" }
per-atom = { value = false }

[property_map.dipole-moment]
dipole = { field = "D", units = "Debye" }
"#;

    const H2_FRAMES: &str = "\
2
config_name=h2_0 E=-23.5 D=\"0.5 0.1 0.2\"
H 0.0 0.0 0.0
H 0.0 0.0 0.74
";

    fn written_property_objects(f: &Fixture, stringify: bool) -> Vec<Value> {
        let configs = read_frames(f);
        let defs = load_definitions(&f.manifest).unwrap();
        let properties = build_properties(&configs, &defs, &f.manifest).unwrap();
        let tables = assemble(&f.manifest, configs, &properties).unwrap();
        let out = f.dir.path().join("out");
        write_tables(&tables, &out, stringify).unwrap();
        fs::read_to_string(out.join("property_objects.jsonl"))
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn property_objects_keep_unit_and_generic_columns() {
        let f = fixture_with(
            UNCONVERTED_MANIFEST,
            &[("energy.json", ENERGY), ("dipole.json", DIPOLE)],
            H2_FRAMES,
        );
        let rows = written_property_objects(&f, false);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];

        assert_eq!(row["energy"], json!(-23.5));
        assert_eq!(row["energy_unit"], json!("kcal/mol"));
        assert_eq!(row["energy_per_atom"], json!(false));
        assert_eq!(row["dipole_moment_dipole"], json!([0.5, 0.1, 0.2]));
        assert!(row.get("metadata").is_some());

        let stringified = written_property_objects(&f, true);
        assert_eq!(stringified[0]["dipole_moment_dipole"], json!("[0.5,0.1,0.2]"));
        assert_eq!(stringified[0]["energy_unit"], json!("kcal/mol"));
    }

    #[test]
    fn written_property_hash_recomputes_from_row() {
        let f = fixture_with(
            UNCONVERTED_MANIFEST,
            &[("energy.json", ENERGY), ("dipole.json", DIPOLE)],
            H2_FRAMES,
        );
        let rows = written_property_objects(&f, false);
        let Value::Object(row) = &rows[0] else {
            panic!("expected a JSON object");
        };

        assert!(row["dataset_id"].as_str().unwrap().starts_with("DS_"));
        let keys: Vec<&String> = row
            .keys()
            .filter(|k| !["last_modified", "hash", "id", "dataset_id"].contains(&k.as_str()))
            .collect();
        let hash = colabfit::row_hash(row, &keys);
        assert_eq!(row["hash"], json!(hash));
        assert_eq!(row["id"], json!(colabfit::prefixed_id("PO_", &hash)));
    }
}
