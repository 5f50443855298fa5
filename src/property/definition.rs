use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::warn;

use super::error::Error;

/// Prefix that turns a bare property name into a syntactically valid id.
pub const SPOOF_PREFIX: &str = "tag:@,0000-00-00:property/";

static PROPERTY_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^tag:[^,\s]*,\d{4}-\d{2}-\d{2}:property/[-a-z0-9]+$")
        .expect("property id pattern is valid")
});

const RESERVED_KEYS: [&str; 4] = [
    "property-id",
    "property-name",
    "property-title",
    "property-description",
];

/// Whether `id` is a well-formed `tag:` property identifier.
pub fn is_valid_property_id(id: &str) -> bool {
    PROPERTY_ID.is_match(id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Float,
    Int,
    Bool,
    String,
    File,
}

impl KeyType {
    fn accepts(&self, value: &Value) -> bool {
        match value {
            Value::Array(items) => items.iter().all(|v| self.accepts(v)),
            Value::Number(n) => match self {
                KeyType::Float => true,
                KeyType::Int => n.is_i64() || n.is_u64(),
                _ => false,
            },
            Value::Bool(_) => *self == KeyType::Bool,
            Value::String(_) => matches!(self, KeyType::String | KeyType::File),
            _ => false,
        }
    }
}

/// Declaration of one key of a property definition.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KeyDefinition {
    #[serde(rename = "type")]
    pub kind: KeyType,
    #[serde(rename = "has-unit", default)]
    pub has_unit: bool,
    #[serde(default)]
    pub extent: Vec<Value>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

/// An OpenKIM-style property definition.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDefinition {
    pub property_id: String,
    pub property_name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub keys: BTreeMap<String, KeyDefinition>,
    spoofed: bool,
}

impl PropertyDefinition {
    pub fn from_value(value: Value) -> Result<Self, Error> {
        let Value::Object(mut obj) = value else {
            return Err(Error::InvalidDefinition(
                "property definition must be a JSON object".into(),
            ));
        };

        let raw_id = match obj.remove("property-id") {
            Some(Value::String(id)) => id,
            _ => {
                return Err(Error::InvalidDefinition(
                    "missing string field 'property-id'".into(),
                ));
            }
        };

        let (property_id, spoofed) = if is_valid_property_id(&raw_id) {
            (raw_id, false)
        } else {
            let spoofed_id = format!("{SPOOF_PREFIX}{raw_id}");
            warn!(
                original = %raw_id,
                renamed = %spoofed_id,
                "invalid property-id; temporarily renaming"
            );
            (spoofed_id, true)
        };

        let property_name = match obj.remove("property-name") {
            Some(Value::String(name)) => name,
            Some(_) => {
                return Err(Error::InvalidDefinition(
                    "'property-name' must be a string".into(),
                ));
            }
            None => property_id
                .rsplit_once("property/")
                .map(|(_, name)| name.to_string())
                .unwrap_or_else(|| property_id.clone()),
        };

        let title = take_string(&mut obj, "property-title");
        let description = take_string(&mut obj, "property-description");

        let mut keys = BTreeMap::new();
        for (key, decl) in obj {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            if !decl.is_object() {
                return Err(Error::InvalidDefinition(format!(
                    "key '{key}' must be declared with an object"
                )));
            }
            let parsed: KeyDefinition = serde_json::from_value(decl).map_err(|e| {
                Error::InvalidDefinition(format!("key '{key}' is malformed: {e}"))
            })?;
            keys.insert(key, parsed);
        }

        Ok(Self {
            property_id,
            property_name,
            title,
            description,
            keys,
            spoofed,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, Error> {
        Self::from_value(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// True when the stored id had [`SPOOF_PREFIX`] prepended on load.
    pub fn is_spoofed(&self) -> bool {
        self.spoofed
    }

    /// An empty instance carrying only the identifying fields.
    pub fn instance_template(&self) -> Map<String, Value> {
        let mut instance = Map::new();
        instance.insert("property-id".into(), json!(self.property_id));
        instance.insert("instance-id".into(), json!(1));
        instance
    }

    /// Checks a filled instance: required keys present, declared keys only,
    /// units on unit-bearing keys, and value types matching declarations.
    pub fn check_instance(&self, instance: &Map<String, Value>) -> Result<(), Error> {
        let name = self.property_name.as_str();

        for (key, decl) in &self.keys {
            match instance.get(key) {
                None if decl.required => {
                    return Err(Error::invalid_instance(
                        name,
                        format!("required key '{key}' is missing"),
                    ));
                }
                None => {}
                Some(entry) => {
                    let Some(source) = entry.get("source-value") else {
                        return Err(Error::invalid_instance(
                            name,
                            format!("key '{key}' has no source-value"),
                        ));
                    };
                    if decl.has_unit && entry.get("source-unit").is_none() {
                        return Err(Error::invalid_instance(
                            name,
                            format!("key '{key}' requires a source-unit"),
                        ));
                    }
                    if !decl.kind.accepts(source) {
                        return Err(Error::invalid_instance(
                            name,
                            format!("key '{key}' does not hold {:?} values", decl.kind),
                        ));
                    }
                }
            }
        }

        for key in instance.keys() {
            if key == "property-id" || key == "instance-id" {
                continue;
            }
            if !self.keys.contains_key(key) {
                return Err(Error::invalid_instance(
                    name,
                    format!("key '{key}' is not part of the definition"),
                ));
            }
        }

        Ok(())
    }
}

fn take_string(obj: &mut Map<String, Value>, key: &str) -> Option<String> {
    match obj.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{Value, json};

    pub fn energy() -> Value {
        json!({
            "property-id": "tag:staff@noreply.colabfit.org,2022-11-30:property/energy",
            "property-name": "energy",
            "property-title": "Energy",
            "property-description": "Potential energy of a configuration",
            "energy": {"type": "float", "has-unit": true, "extent": [], "required": true,
                       "description": "Potential energy"},
            "per-atom": {"type": "bool", "has-unit": false, "extent": [], "required": true,
                         "description": "Whether the energy is per atom"},
            "reference-energy": {"type": "float", "has-unit": true, "extent": [], "required": false,
                                 "description": "Reference energy"}
        })
    }

    pub fn atomic_forces() -> Value {
        json!({
            "property-id": "tag:staff@noreply.colabfit.org,2022-11-30:property/atomic-forces",
            "property-name": "atomic-forces",
            "forces": {"type": "float", "has-unit": true, "extent": [":", 3], "required": true,
                       "description": "Per-atom forces"}
        })
    }

    pub fn cauchy_stress() -> Value {
        json!({
            "property-id": "tag:staff@noreply.colabfit.org,2022-11-30:property/cauchy-stress",
            "property-name": "cauchy-stress",
            "stress": {"type": "float", "has-unit": true, "extent": [3, 3], "required": true,
                       "description": "Cauchy stress tensor"},
            "volume-normalized": {"type": "bool", "has-unit": false, "extent": [], "required": true,
                                  "description": "Whether the stress is volume normalized"}
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_energy_definition() {
        let def = PropertyDefinition::from_value(fixtures::energy()).unwrap();
        assert_eq!(def.property_name, "energy");
        assert_eq!(def.title.as_deref(), Some("Energy"));
        assert!(!def.is_spoofed());
        assert_eq!(def.keys.len(), 3);
        let energy = &def.keys["energy"];
        assert_eq!(energy.kind, KeyType::Float);
        assert!(energy.has_unit);
        assert!(energy.required);
        assert!(!def.keys["reference-energy"].required);
    }

    #[test]
    fn spoofs_invalid_ids() {
        let def = PropertyDefinition::from_value(json!({
            "property-id": "my-property",
            "value": {"type": "float", "has-unit": false, "extent": [], "required": true}
        }))
        .unwrap();
        assert!(def.is_spoofed());
        assert_eq!(def.property_id, "tag:@,0000-00-00:property/my-property");
        assert_eq!(def.property_name, "my-property");
        assert!(is_valid_property_id(&def.property_id));
    }

    #[test]
    fn id_validation() {
        assert!(is_valid_property_id(
            "tag:staff@noreply.openkim.org,2014-04-15:property/cohesive-energy"
        ));
        assert!(!is_valid_property_id("tag:staff,2014-04-15:property/Energy"));
        assert!(!is_valid_property_id("energy"));
    }

    #[test]
    fn rejects_malformed_definitions() {
        assert!(matches!(
            PropertyDefinition::from_value(json!([])),
            Err(Error::InvalidDefinition(_))
        ));
        assert!(matches!(
            PropertyDefinition::from_value(json!({"property-name": "x"})),
            Err(Error::InvalidDefinition(_))
        ));
        assert!(matches!(
            PropertyDefinition::from_value(json!({"property-id": "x", "energy": 3})),
            Err(Error::InvalidDefinition(_))
        ));
        assert!(matches!(
            PropertyDefinition::from_value(json!({"property-id": "x", "energy": {"type": "complex"}})),
            Err(Error::InvalidDefinition(_))
        ));
    }

    #[test]
    fn check_instance_rules() {
        let def = PropertyDefinition::from_value(fixtures::energy()).unwrap();

        let mut inst = def.instance_template();
        inst.insert("energy".into(), json!({"source-value": -3.2, "source-unit": "eV"}));
        inst.insert("per-atom".into(), json!({"source-value": false}));
        assert!(def.check_instance(&inst).is_ok());

        let mut missing = def.instance_template();
        missing.insert("energy".into(), json!({"source-value": -3.2, "source-unit": "eV"}));
        let err = def.check_instance(&missing).unwrap_err();
        assert!(err.to_string().contains("required key 'per-atom' is missing"));

        let mut no_unit = inst.clone();
        no_unit.insert("energy".into(), json!({"source-value": -3.2}));
        assert!(def.check_instance(&no_unit).is_err());

        let mut wrong_type = inst.clone();
        wrong_type.insert("per-atom".into(), json!({"source-value": "no"}));
        assert!(def.check_instance(&wrong_type).is_err());

        let mut extra = inst.clone();
        extra.insert("charge".into(), json!({"source-value": 1.0}));
        assert!(def.check_instance(&extra).is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forces.json");
        fs::write(&path, fixtures::atomic_forces().to_string()).unwrap();
        let def = PropertyDefinition::from_path(&path).unwrap();
        assert_eq!(def.property_name, "atomic-forces");
        assert_eq!(def.keys["forces"].extent, vec![json!(":"), json!(3)]);
    }
}
