//! Property definitions, property maps and property objects.
//!
//! A [`PropertyDefinition`] declares the keys of a kind of computed result
//! (energy, forces, stress). A [`PropertyMap`] says which configuration field
//! fills each key. [`Property::from_definition`] combines the two with one
//! configuration into a property object whose row matches
//! [`property_object_df_schema`](crate::schema::property_object_df_schema).

mod definition;
mod error;
mod map;
pub mod units;

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

pub use definition::{KeyDefinition, KeyType, PropertyDefinition, SPOOF_PREFIX, is_valid_property_id};
pub use error::Error;
pub use map::{KeyMap, KeySource, METADATA_ENTRY, PropertyMap};

use crate::model::configuration::AtomicConfiguration;
use crate::model::row::{Row, prefixed_id, row_hash, timestamp_now};
use units::{conversion_factor, offset, scale};

/// Alternative names accepted by [`Property::get`] and friends.
const KEY_ALIASES: [(&str, &str); 4] = [
    ("energy", "unrelaxed-potential-energy"),
    ("forces", "unrelaxed-potential-forces"),
    ("stress", "unrelaxed-cauchy-stress"),
    ("virial", "unrelaxed-cauchy-stress"),
];

/// Main key and standard unit of the properties that get unit-standardized.
const MAIN_KEYS: [(&str, &str, &str); 6] = [
    ("energy", "energy", "eV"),
    ("atomic-forces", "forces", "eV/angstrom"),
    ("cauchy-stress", "stress", "eV/angstrom^3"),
    ("atomization-energy", "energy", "eV"),
    ("formation-energy", "energy", "eV"),
    ("band-gap", "energy", "eV"),
];

/// Row columns left out of the property-object hash. The dataset link is
/// written after the dataset id is known, so it cannot feed the hash.
pub const UNHASHED_COLUMNS: [&str; 2] = ["last_modified", "dataset_id"];

fn alias(name: &str) -> Option<&'static str> {
    KEY_ALIASES
        .iter()
        .find(|(from, _)| *from == name)
        .map(|(_, to)| *to)
}

fn main_key(property: &str) -> Option<(&'static str, &'static str)> {
    MAIN_KEYS
        .iter()
        .find(|(name, _, _)| *name == property)
        .map(|(_, key, unit)| (*key, *unit))
}

/// Per-configuration facts carried into the property row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertyContext {
    pub configuration_id: String,
    pub dataset_id: Option<String>,
    pub chemical_formula_hill: String,
    pub nsites: Option<usize>,
}

impl PropertyContext {
    pub fn of(config: &AtomicConfiguration) -> Self {
        Self {
            configuration_id: config.id().to_string(),
            dataset_id: config.dataset_id.clone(),
            chemical_formula_hill: config.get_chemical_formula(),
            nsites: Some(config.nsites()),
        }
    }
}

/// The computed properties attached to one configuration.
#[derive(Debug, Clone)]
pub struct Property {
    instances: BTreeMap<String, Map<String, Value>>,
    context: PropertyContext,
    metadata: Option<String>,
    row: Row,
    id: String,
    hash: String,
}

impl Property {
    /// Builds the instances, optionally standardizes units and hashes the row.
    pub fn from_instances(
        instances: BTreeMap<String, Map<String, Value>>,
        context: PropertyContext,
        metadata: Option<String>,
        standardize_energy: bool,
    ) -> Result<Self, Error> {
        let mut property = Self {
            instances,
            context,
            metadata,
            row: Row::new(),
            id: String::new(),
            hash: String::new(),
        };
        if standardize_energy {
            property.standardize_energy()?;
        }
        property.refresh();
        Ok(property)
    }

    /// Fills every property named in `property_map` from `configuration`.
    ///
    /// In strict mode a missing field is an error. Otherwise the affected
    /// property is dropped.
    pub fn from_definition(
        definitions: &[PropertyDefinition],
        configuration: &AtomicConfiguration,
        property_map: &PropertyMap,
        standardize_energy: bool,
        strict: bool,
    ) -> Result<Self, Error> {
        let mut instances = BTreeMap::new();

        for (name, key_maps) in &property_map.properties {
            let definition = definitions
                .iter()
                .find(|d| &d.property_name == name)
                .ok_or_else(|| Error::UnknownProperty(name.clone()))?;

            let mut instance = definition.instance_template();
            let mut missing = None;
            for key_map in key_maps {
                for (key, source) in key_map {
                    let Some(data) = source.resolve(configuration) else {
                        missing = Some(key.clone());
                        continue;
                    };
                    let mut entry = Map::new();
                    entry.insert("source-value".into(), data.clone());
                    if let Some(unit) = source.unit() {
                        entry.insert("source-unit".into(), json!(unit));
                    }
                    instance.insert(key.clone(), Value::Object(entry));
                }
            }

            if let Some(key) = missing {
                if strict {
                    return Err(Error::MissingField {
                        configuration: configuration.id().to_string(),
                        property: name.clone(),
                        key,
                    });
                }
                debug!(
                    configuration = configuration.id(),
                    property = %name,
                    key = %key,
                    "field missing; dropping property"
                );
                continue;
            }

            definition.check_instance(&instance)?;
            instances.insert(name.clone(), instance);
        }

        Self::from_instances(
            instances,
            PropertyContext::of(configuration),
            property_map.metadata_from(configuration),
            standardize_energy,
        )
    }

    /// Converts main keys of the known properties to eV-based units, after
    /// adding any reference energy and scaling per-atom values by `nsites`.
    pub fn standardize_energy(&mut self) -> Result<(), Error> {
        let nsites = self.context.nsites;

        for (name, instance) in self.instances.iter_mut() {
            let Some((key, target)) = main_key(name) else {
                continue;
            };
            let Some(entry) = instance.get(key) else {
                warn!(property = %name, key, "main key not found; skipping standardization");
                continue;
            };
            let Some(unit) = entry.get("source-unit").and_then(Value::as_str) else {
                warn!(property = %name, key, "main key has no unit; skipping standardization");
                continue;
            };
            let unit = unit.to_string();
            let mut value = entry.get("source-value").cloned().unwrap_or(Value::Null);

            if let Some(reference) = instance.get("reference-energy") {
                let ref_unit = reference.get("source-unit").and_then(Value::as_str);
                if ref_unit != Some(unit.as_str()) {
                    return Err(Error::ReferenceUnitMismatch {
                        energy: unit,
                        reference: ref_unit.unwrap_or("").to_string(),
                    });
                }
                let shift = reference
                    .get("source-value")
                    .and_then(Value::as_f64)
                    .ok_or_else(|| Error::non_numeric(name, "reference-energy"))?;
                offset(&mut value, shift).ok_or_else(|| Error::non_numeric(name, key))?;
            }

            let per_atom = instance
                .get("per-atom")
                .and_then(|p| p.get("source-value"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if per_atom {
                let n = nsites.ok_or_else(|| Error::MissingNsites(name.clone()))?;
                scale(&mut value, n as f64).ok_or_else(|| Error::non_numeric(name, key))?;
                instance.insert("per-atom".into(), json!({"source-value": false}));
            }

            if unit != target {
                let factor = conversion_factor(&unit)? / conversion_factor(target)?;
                scale(&mut value, factor).ok_or_else(|| Error::non_numeric(name, key))?;
            }

            instance.insert(
                key.to_string(),
                json!({"source-value": value, "source-unit": target}),
            );
        }
        Ok(())
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn configuration_id(&self) -> &str {
        &self.context.configuration_id
    }

    pub fn dataset_id(&self) -> Option<&str> {
        self.context.dataset_id.as_deref()
    }

    pub fn metadata(&self) -> Option<&str> {
        self.metadata.as_deref()
    }

    /// Property names in this object.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.instances.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn instances(&self) -> &BTreeMap<String, Map<String, Value>> {
        &self.instances
    }

    /// The property-object row, including `id` and `hash`.
    pub fn to_row(&self) -> Row {
        self.row.clone()
    }

    /// Instance stored under `name` or its alias.
    pub fn get(&self, name: &str) -> Option<&Map<String, Value>> {
        self.resolve(name).and_then(|n| self.instances.get(n))
    }

    /// `source-value` of `key` in property `name`, wrapped in an array when
    /// it is a scalar.
    pub fn get_data(&self, name: &str, key: &str) -> Option<Value> {
        let value = self.get(name)?.get(key)?.get("source-value")?;
        Some(match value {
            Value::Array(_) => value.clone(),
            other => Value::Array(vec![other.clone()]),
        })
    }

    /// Replaces an existing instance. Returns false when neither `name` nor
    /// its alias is present.
    pub fn set(&mut self, name: &str, instance: Map<String, Value>) -> bool {
        let Some(key) = self.resolve(name).map(str::to_string) else {
            debug!(property = name, "no such property; nothing set");
            return false;
        };
        self.instances.insert(key, instance);
        self.refresh();
        true
    }

    pub fn remove(&mut self, name: &str) -> Option<Map<String, Value>> {
        let key = self.resolve(name)?.to_string();
        let removed = self.instances.remove(&key);
        self.refresh();
        removed
    }

    fn resolve<'a>(&self, name: &'a str) -> Option<&'a str> {
        if self.instances.contains_key(name) {
            return Some(name);
        }
        alias(name).filter(|a| self.instances.contains_key(*a))
    }

    fn refresh(&mut self) {
        let mut row = self.build_row();
        let keys: Vec<String> = row
            .keys()
            .filter(|k| !UNHASHED_COLUMNS.contains(&k.as_str()))
            .cloned()
            .collect();
        self.hash = row_hash(&row, &keys);
        self.id = prefixed_id("PO_", &self.hash);
        row.insert("hash".into(), json!(self.hash));
        row.insert("id".into(), json!(self.id));
        self.row = row;
    }

    fn build_row(&self) -> Row {
        let mut row = Row::new();
        for (name, instance) in &self.instances {
            match name.as_str() {
                "atomic-forces" => atomic_forces_columns(instance, &mut row),
                "cauchy-stress" => cauchy_stress_columns(instance, &mut row),
                "band-gap" => band_gap_columns(instance, &mut row),
                n if n == "energy" || n.ends_with("-energy") => {
                    energy_columns(n, instance, &mut row)
                }
                _ => generic_columns(name, instance, &mut row),
            }
        }

        row.insert(
            "configuration_id".into(),
            json!(self.context.configuration_id),
        );
        row.insert("dataset_id".into(), json!(self.context.dataset_id));
        row.insert(
            "chemical_formula_hill".into(),
            json!(self.context.chemical_formula_hill),
        );
        row.insert("multiplicity".into(), json!(1));
        row.insert("metadata".into(), json!(self.metadata));

        if let Some(Value::Object(md)) = self
            .metadata
            .as_deref()
            .and_then(|text| serde_json::from_str::<Value>(text).ok())
        {
            for column in ["method", "software"] {
                if let Some(value) = md.get(column).map(plain_value) {
                    row.insert(column.into(), value);
                }
            }
        }

        row.insert("last_modified".into(), json!(timestamp_now()));
        row
    }
}

impl PartialEq for Property {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.names().map(|n| format!("'{n}'")).collect();
        write!(f, "Property(properties=[{}])", names.join(", "))
    }
}

fn source(instance: &Map<String, Value>, key: &str) -> Option<Value> {
    instance.get(key)?.get("source-value").cloned()
}

fn unit_of(instance: &Map<String, Value>, key: &str) -> Value {
    instance
        .get(key)
        .and_then(|e| e.get("source-unit"))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Unwraps `{source-value, ...}` metadata entries to the bare value.
fn plain_value(value: &Value) -> Value {
    value
        .get("source-value")
        .cloned()
        .unwrap_or_else(|| value.clone())
}

fn energy_columns(name: &str, instance: &Map<String, Value>, row: &mut Row) {
    let Some(energy) = source(instance, "energy") else {
        return;
    };
    let column = name.replace('-', "_");
    row.insert(column.clone(), energy);
    row.insert(format!("{column}_unit"), unit_of(instance, "energy"));
    row.insert(
        format!("{column}_per_atom"),
        source(instance, "per-atom").unwrap_or(Value::Null),
    );
    if let Some(reference) = source(instance, "reference-energy") {
        row.insert(format!("{column}_reference"), reference);
        row.insert(
            format!("{column}_reference_unit"),
            unit_of(instance, "reference-energy"),
        );
    }
}

fn atomic_forces_columns(instance: &Map<String, Value>, row: &mut Row) {
    let Some(forces) = source(instance, "forces") else {
        return;
    };
    row.insert("atomic_forces_00".into(), forces);
    row.insert("atomic_forces_unit".into(), unit_of(instance, "forces"));
}

fn cauchy_stress_columns(instance: &Map<String, Value>, row: &mut Row) {
    let Some(stress) = source(instance, "stress") else {
        return;
    };
    row.insert("cauchy_stress".into(), stress);
    row.insert("cauchy_stress_unit".into(), unit_of(instance, "stress"));
    row.insert(
        "cauchy_stress_volume_normalized".into(),
        source(instance, "volume-normalized").unwrap_or(Value::Null),
    );
}

fn band_gap_columns(instance: &Map<String, Value>, row: &mut Row) {
    let Some(gap) = source(instance, "energy") else {
        return;
    };
    row.insert("electronic_band_gap".into(), gap);
    row.insert("electronic_band_gap_unit".into(), unit_of(instance, "energy"));
    row.insert(
        "electronic_band_gap_type".into(),
        source(instance, "type").unwrap_or_else(|| json!("direct")),
    );
}

fn generic_columns(name: &str, instance: &Map<String, Value>, row: &mut Row) {
    for (key, entry) in instance {
        if key == "property-id" || key == "instance-id" {
            continue;
        }
        if let Some(value) = entry.get("source-value") {
            row.insert(format!("{name}_{key}").replace('-', "_"), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::definition::fixtures;
    use super::*;
    use crate::schema::property_object_df_schema;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() <= eps
    }

    fn definitions() -> Vec<PropertyDefinition> {
        [fixtures::energy(), fixtures::atomic_forces(), fixtures::cauchy_stress()]
            .into_iter()
            .map(|v| PropertyDefinition::from_value(v).unwrap())
            .collect()
    }

    fn config(info: Value) -> AtomicConfiguration {
        let Value::Object(info) = info else {
            panic!("info must be an object");
        };
        let mut arrays = Map::new();
        arrays.insert("F".into(), json!([[0.1, 0.0, 0.0], [-0.1, 0.0, 0.0]]));
        AtomicConfiguration::new(
            vec![1, 1],
            vec![[0.0; 3], [0.74, 0.0, 0.0]],
            [[10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0]],
            [false; 3],
        )
        .unwrap()
        .with_info(info)
        .with_arrays(arrays)
        .unwrap()
        .with_dataset_id("DS_h2")
    }

    fn energy_map(units: &str) -> PropertyMap {
        PropertyMap::from_value(json!({
            "energy": [{
                "energy": {"field": "E", "units": units},
                "per-atom": {"value": false, "units": null}
            }]
        }))
        .unwrap()
    }

    #[test]
    fn builds_energy_property() {
        let defs = definitions();
        let cfg = config(json!({"E": -31.5}));
        let prop = Property::from_definition(&defs, &cfg, &energy_map("eV"), false, false).unwrap();

        let row = prop.to_row();
        assert_eq!(row["energy"], json!(-31.5));
        assert_eq!(row["energy_unit"], json!("eV"));
        assert_eq!(row["energy_per_atom"], json!(false));
        assert_eq!(row["configuration_id"], json!(cfg.id()));
        assert_eq!(row["dataset_id"], json!("DS_h2"));
        assert_eq!(row["chemical_formula_hill"], json!("H2"));
        assert_eq!(row["multiplicity"], json!(1));
        assert_eq!(row["metadata"], Value::Null);
        assert!(prop.id().starts_with("PO_"));
        assert_eq!(prop.id().len(), 28);
        assert_eq!(row["id"], json!(prop.id()));
        assert_eq!(prop.to_string(), "Property(properties=['energy'])");
    }

    #[test]
    fn row_fits_property_object_schema() {
        let defs = definitions();
        let cfg = config(json!({"E": -31.5, "S": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]}));
        let map = PropertyMap::from_value(json!({
            "energy": {"energy": {"field": "E", "units": "eV"}, "per-atom": {"value": false}},
            "atomic-forces": {"forces": {"field": "F", "units": "eV/angstrom"}},
            "cauchy-stress": {"stress": {"field": "S", "units": "GPa"},
                              "volume-normalized": {"value": true}}
        }))
        .unwrap();
        let prop = Property::from_definition(&defs, &cfg, &map, true, true).unwrap();
        let row = prop.to_row();

        let schema = property_object_df_schema();
        assert!(schema.validate(&row).is_ok());
        assert_eq!(row["atomic_forces_00"], json!([[0.1, 0.0, 0.0], [-0.1, 0.0, 0.0]]));
        assert_eq!(row["cauchy_stress_unit"], json!("eV/angstrom^3"));
        assert_eq!(row["cauchy_stress_volume_normalized"], json!(true));
        let sxx = row["cauchy_stress"][0][0].as_f64().unwrap();
        assert!(approx_eq(sxx, 1.0 / 160.217_662_08, 1e-9));
    }

    #[test]
    fn unknown_property_is_an_error() {
        let defs = definitions();
        let cfg = config(json!({"E": -1.0}));
        let map = PropertyMap::from_value(json!({"dipole": {"dipole": {"field": "E"}}})).unwrap();
        let err = Property::from_definition(&defs, &cfg, &map, false, false).unwrap_err();
        assert!(matches!(err, Error::UnknownProperty(name) if name == "dipole"));
    }

    #[test]
    fn missing_field_strict_and_lenient() {
        let defs = definitions();
        let cfg = config(json!({}));
        let map = energy_map("eV");

        let err = Property::from_definition(&defs, &cfg, &map, false, true).unwrap_err();
        assert!(matches!(err, Error::MissingField { ref key, .. } if key == "energy"));

        let prop = Property::from_definition(&defs, &cfg, &map, false, false).unwrap();
        assert!(prop.is_empty());
    }

    #[test]
    fn standardizes_units_reference_and_per_atom() {
        let defs = definitions();
        let cfg = config(json!({"E": -0.5, "R": -0.25}));
        let map = PropertyMap::from_value(json!({
            "energy": {
                "energy": {"field": "E", "units": "Hartree"},
                "reference-energy": {"field": "R", "units": "Hartree"},
                "per-atom": {"value": true}
            }
        }))
        .unwrap();
        let prop = Property::from_definition(&defs, &cfg, &map, true, false).unwrap();
        let row = prop.to_row();

        let hartree = units::unit_factor("Hartree").unwrap();
        let expected = (-0.5 + -0.25) * 2.0 * hartree;
        assert!(approx_eq(row["energy"].as_f64().unwrap(), expected, 1e-9));
        assert_eq!(row["energy_unit"], json!("eV"));
        assert_eq!(row["energy_per_atom"], json!(false));
    }

    #[test]
    fn reference_unit_must_match() {
        let defs = definitions();
        let cfg = config(json!({"E": -0.5, "R": -0.25}));
        let map = PropertyMap::from_value(json!({
            "energy": {
                "energy": {"field": "E", "units": "Hartree"},
                "reference-energy": {"field": "R", "units": "eV"},
                "per-atom": {"value": false}
            }
        }))
        .unwrap();
        let err = Property::from_definition(&defs, &cfg, &map, true, false).unwrap_err();
        assert!(matches!(err, Error::ReferenceUnitMismatch { .. }));
    }

    #[test]
    fn per_atom_needs_nsites() {
        let mut instances = BTreeMap::new();
        let Value::Object(instance) = json!({
            "property-id": "tag:@,0000-00-00:property/energy",
            "instance-id": 1,
            "energy": {"source-value": -1.0, "source-unit": "eV"},
            "per-atom": {"source-value": true}
        }) else {
            unreachable!()
        };
        instances.insert("energy".to_string(), instance);
        let err = Property::from_instances(instances, PropertyContext::default(), None, true)
            .unwrap_err();
        assert!(matches!(err, Error::MissingNsites(name) if name == "energy"));
    }

    #[test]
    fn hash_ignores_timestamp_and_tracks_values() {
        let defs = definitions();
        let cfg = config(json!({"E": -31.5}));
        let a = Property::from_definition(&defs, &cfg, &energy_map("eV"), false, false).unwrap();
        let b = Property::from_definition(&defs, &cfg, &energy_map("eV"), false, false).unwrap();
        assert_eq!(a, b);

        let other = config(json!({"E": -31.6}));
        let c = Property::from_definition(&defs, &other, &energy_map("eV"), false, false).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn metadata_lifts_method_and_software() {
        let defs = definitions();
        let cfg = config(json!({"E": -31.5, "code": "VASP"}));
        let mut map = energy_map("eV");
        map.metadata.insert("software".into(), KeySource::field("code"));
        map.metadata.insert("method".into(), KeySource::value(json!("DFT-PBE")));
        let prop = Property::from_definition(&defs, &cfg, &map, false, false).unwrap();
        let row = prop.to_row();
        assert_eq!(row["software"], json!("VASP"));
        assert_eq!(row["method"], json!("DFT-PBE"));
        assert!(prop.metadata().unwrap().contains("DFT-PBE"));
    }

    #[test]
    fn aliases_and_mutation() {
        let mut instances = BTreeMap::new();
        let Value::Object(instance) = json!({
            "energy": {"source-value": -2.0, "source-unit": "eV"}
        }) else {
            unreachable!()
        };
        instances.insert("unrelaxed-potential-energy".to_string(), instance);
        let mut prop = Property::from_instances(
            instances,
            PropertyContext {
                configuration_id: "CO_1".into(),
                ..PropertyContext::default()
            },
            None,
            false,
        )
        .unwrap();

        assert!(prop.get("energy").is_some());
        assert_eq!(
            prop.get_data("energy", "energy"),
            Some(json!([-2.0]))
        );
        assert!(prop.get("forces").is_none());

        let before = prop.hash().to_string();
        let Value::Object(replacement) = json!({
            "energy": {"source-value": -3.0, "source-unit": "eV"}
        }) else {
            unreachable!()
        };
        assert!(prop.set("energy", replacement));
        assert_ne!(prop.hash(), before);
        assert_eq!(prop.to_row()["unrelaxed_potential_energy"], json!(-3.0));
        assert!(!prop.set("stress", Map::new()));

        assert!(prop.remove("energy").is_some());
        assert!(prop.is_empty());
        assert!(prop.to_row().get("unrelaxed_potential_energy").is_none());
    }

    #[test]
    fn generic_properties_use_prefixed_columns() {
        let defs = vec![
            PropertyDefinition::from_value(json!({
                "property-id": "dipole-moment",
                "dipole": {"type": "float", "has-unit": true, "extent": [3], "required": true}
            }))
            .unwrap(),
        ];
        let cfg = config(json!({"D": [0.0, 0.1, 0.2]}));
        let map = PropertyMap::from_value(json!({
            "dipole-moment": {"dipole": {"field": "D", "units": "Debye"}}
        }))
        .unwrap();
        let prop = Property::from_definition(&defs, &cfg, &map, true, false).unwrap();
        assert_eq!(prop.to_row()["dipole_moment_dipole"], json!([0.0, 0.1, 0.2]));
    }

    #[test]
    fn display_quotes_each_name() {
        let mut instances = BTreeMap::new();
        for name in ["atomic-forces", "energy"] {
            let Value::Object(instance) = json!({
                "value": {"source-value": 1.0}
            }) else {
                unreachable!()
            };
            instances.insert(name.to_string(), instance);
        }
        let prop =
            Property::from_instances(instances, PropertyContext::default(), None, false).unwrap();
        assert_eq!(
            prop.to_string(),
            "Property(properties=['atomic-forces', 'energy'])"
        );
    }

    #[test]
    fn hash_does_not_depend_on_dataset_link() {
        let defs = definitions();
        let a = Property::from_definition(
            &defs,
            &config(json!({"E": -31.5})),
            &energy_map("eV"),
            false,
            false,
        )
        .unwrap();
        let b = Property::from_definition(
            &defs,
            &config(json!({"E": -31.5})).with_dataset_id("DS_other"),
            &energy_map("eV"),
            false,
            false,
        )
        .unwrap();
        assert_eq!(a.dataset_id(), Some("DS_h2"));
        assert_eq!(b.dataset_id(), Some("DS_other"));
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn stored_hash_recomputes_from_row() {
        let defs = definitions();
        let cfg = config(json!({"E": -31.5}));
        let prop = Property::from_definition(&defs, &cfg, &energy_map("eV"), false, false).unwrap();
        let row = prop.to_row();
        let keys: Vec<&String> = row
            .keys()
            .filter(|k| !["last_modified", "dataset_id", "hash", "id"].contains(&k.as_str()))
            .collect();
        assert_eq!(row_hash(&row, &keys), prop.hash());
        assert_eq!(row["hash"], json!(prop.hash()));
    }

    fn band_gap_definition() -> PropertyDefinition {
        PropertyDefinition::from_value(json!({
            "property-id": "tag:staff@noreply.colabfit.org,2024-04-30:property/band-gap",
            "property-name": "band-gap",
            "energy": {"type": "float", "has-unit": true, "extent": [], "required": true},
            "type": {"type": "string", "has-unit": false, "extent": [], "required": false}
        }))
        .unwrap()
    }

    #[test]
    fn band_gap_converts_hartree_and_defaults_to_direct() {
        let defs = vec![band_gap_definition()];
        let cfg = config(json!({"gap": 0.1}));
        let map = PropertyMap::from_value(json!({
            "band-gap": {"energy": {"field": "gap", "units": "Hartree"}}
        }))
        .unwrap();
        let prop = Property::from_definition(&defs, &cfg, &map, true, false).unwrap();
        let row = prop.to_row();

        let hartree = units::unit_factor("Hartree").unwrap();
        let gap = row["electronic_band_gap"].as_f64().unwrap();
        assert!(approx_eq(gap, 0.1 * hartree, 1e-9));
        assert!(approx_eq(gap, 2.721_138_6, 1e-6));
        assert_eq!(row["electronic_band_gap_unit"], json!("eV"));
        assert_eq!(row["electronic_band_gap_type"], json!("direct"));
        assert!(property_object_df_schema().validate(&row).is_ok());
    }

    #[test]
    fn band_gap_keeps_explicit_type() {
        let defs = vec![band_gap_definition()];
        let cfg = config(json!({"gap": 1.2}));
        let map = PropertyMap::from_value(json!({
            "band-gap": {
                "energy": {"field": "gap", "units": "eV"},
                "type": {"value": "indirect"}
            }
        }))
        .unwrap();
        let prop = Property::from_definition(&defs, &cfg, &map, true, false).unwrap();
        let row = prop.to_row();
        assert_eq!(row["electronic_band_gap"], json!(1.2));
        assert_eq!(row["electronic_band_gap_type"], json!("indirect"));
    }

    #[test]
    fn formation_energy_maps_to_its_column() {
        let defs = vec![
            PropertyDefinition::from_value(json!({
                "property-id": "tag:staff@noreply.colabfit.org,2024-04-30:property/formation-energy",
                "property-name": "formation-energy",
                "energy": {"type": "float", "has-unit": true, "extent": [], "required": true},
                "per-atom": {"type": "bool", "has-unit": false, "extent": [], "required": true}
            }))
            .unwrap(),
        ];
        let cfg = config(json!({"Ef": -0.5}));
        let map = PropertyMap::from_value(json!({
            "formation-energy": {
                "energy": {"field": "Ef", "units": "eV"},
                "per-atom": {"value": true}
            }
        }))
        .unwrap();
        let prop = Property::from_definition(&defs, &cfg, &map, true, false).unwrap();
        let row = prop.to_row();
        assert_eq!(row["formation_energy"], json!(-1.0));
        assert_eq!(row["formation_energy_unit"], json!("eV"));
        assert_eq!(row["formation_energy_per_atom"], json!(false));
        assert!(row.get("energy").is_none());
        assert!(property_object_df_schema().validate(&row).is_ok());
    }
}
