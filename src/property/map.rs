use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::error::Error;
use crate::model::configuration::AtomicConfiguration;

/// Name of the property map entry holding property-object metadata.
pub const METADATA_ENTRY: &str = "_metadata";

/// Where the value of one definition key comes from.
///
/// Exactly one of `field` (a name looked up in the configuration's `info`
/// then `arrays`) or `value` (a literal) is set.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct KeySource {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub units: Option<String>,
}

impl KeySource {
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            field: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn value(value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    /// The unit, treating the literal `"None"` as unitless.
    pub fn unit(&self) -> Option<&str> {
        self.units.as_deref().filter(|u| *u != "None")
    }

    /// Literal value first, then the configuration field.
    pub fn resolve<'a>(&'a self, config: &'a AtomicConfiguration) -> Option<&'a Value> {
        if let Some(value) = &self.value {
            return Some(value);
        }
        self.field.as_deref().and_then(|name| config.field(name))
    }
}

/// One mapping from definition keys to their sources.
pub type KeyMap = BTreeMap<String, KeySource>;

/// Maps property names to the configuration fields that fill them.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(try_from = "Value")]
pub struct PropertyMap {
    pub properties: BTreeMap<String, Vec<KeyMap>>,
    pub metadata: KeyMap,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key map under `property`.
    pub fn insert(&mut self, property: impl Into<String>, keys: KeyMap) {
        self.properties.entry(property.into()).or_default().push(keys);
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.metadata.is_empty()
    }

    /// Parses a map where each property holds a key map or a list of them.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        let Value::Object(entries) = value else {
            return Err(Error::invalid_map("<root>", "property map must be an object"));
        };

        let mut map = Self::new();
        for (name, entry) in entries {
            let key_maps = match entry {
                Value::Array(items) => items
                    .into_iter()
                    .map(|item| parse_key_map(&name, item))
                    .collect::<Result<Vec<_>, _>>()?,
                other => vec![parse_key_map(&name, other)?],
            };

            if name == METADATA_ENTRY {
                map.metadata = key_maps.into_iter().next().unwrap_or_default();
            } else {
                map.properties.insert(name, key_maps);
            }
        }
        Ok(map)
    }

    pub fn from_json(text: &str) -> Result<Self, Error> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Collects the `_metadata` entries for `config` as JSON text.
    ///
    /// Missing fields are skipped. A `metadata` or `_metadata` entry whose
    /// field holds an object contributes that object's members directly.
    /// Returns `None` when the map declares no metadata.
    pub fn metadata_from(&self, config: &AtomicConfiguration) -> Option<String> {
        if self.metadata.is_empty() {
            return None;
        }

        let mut gathered = Map::new();
        for (name, source) in &self.metadata {
            let Some(value) = source.resolve(config) else {
                debug!(entry = %name, "metadata field not present; skipping");
                continue;
            };

            if source.value.is_none()
                && (name == "metadata" || name == METADATA_ENTRY)
                && let Value::Object(members) = value
            {
                gathered.extend(members.iter().map(|(k, v)| (k.clone(), v.clone())));
                continue;
            }

            let entry = match source.unit() {
                Some(unit) => json!({"source-value": value, "source-unit": unit}),
                None => value.clone(),
            };
            gathered.insert(name.clone(), entry);
        }
        Some(Value::Object(gathered).to_string())
    }
}

impl TryFrom<Value> for PropertyMap {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

fn parse_key_map(entry: &str, value: Value) -> Result<KeyMap, Error> {
    let Value::Object(keys) = value else {
        return Err(Error::invalid_map(entry, "expected an object of key sources"));
    };

    let mut parsed = KeyMap::new();
    for (key, source) in keys {
        let source: KeySource = serde_json::from_value(source)
            .map_err(|e| Error::invalid_map(entry, format!("key '{key}': {e}")))?;
        if source.field.is_none() && source.value.is_none() {
            return Err(Error::invalid_map(
                entry,
                format!("key '{key}' needs either 'field' or 'value'"),
            ));
        }
        parsed.insert(key, source);
    }
    Ok(parsed)
}
