//! Error types for property definitions, maps and instances.

use thiserror::Error;

/// Errors raised while loading definitions or building property objects.
#[derive(Debug, Error)]
pub enum Error {
    /// A definition file could not be read.
    #[error("failed to read property definition: {0}")]
    Io(#[from] std::io::Error),

    /// A definition or property map is not valid JSON.
    #[error("failed to parse property JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The definition document is structurally wrong.
    #[error("invalid property definition: {0}")]
    InvalidDefinition(String),

    /// The property map is structurally wrong.
    #[error("invalid property map entry '{entry}': {detail}")]
    InvalidMap {
        /// Top-level property map entry.
        entry: String,
        /// Description of the problem.
        detail: String,
    },

    /// The property map names a property with no loaded definition.
    #[error("property '{0}' not found in definitions")]
    UnknownProperty(String),

    /// Strict ingestion found a configuration without a mapped field.
    #[error(
        "ingestion is strict, but configuration {configuration} is missing '{key}' for property '{property}'"
    )]
    MissingField {
        /// Configuration id.
        configuration: String,
        /// Property definition name.
        property: String,
        /// Definition key whose source field was absent.
        key: String,
    },

    /// A filled-in instance does not satisfy its definition.
    #[error("instance of property '{property}' is invalid: {detail}")]
    InvalidInstance {
        /// Property definition name.
        property: String,
        /// Description of the problem.
        detail: String,
    },

    /// A unit name is not in the unit table.
    #[error("unknown unit '{0}'")]
    UnknownUnit(String),

    /// A unit expression could not be tokenized.
    #[error("malformed unit expression '{0}'")]
    MalformedUnit(String),

    /// Reference energy and energy were given in different units.
    #[error(
        "units of the reference energy and energy must be the same ('{reference}' vs '{energy}')"
    )]
    ReferenceUnitMismatch {
        /// Unit of the main value.
        energy: String,
        /// Unit of the reference value.
        reference: String,
    },

    /// A per-atom value needs the site count to become a total.
    #[error("nsites must be provided to convert per-atom values of '{0}'")]
    MissingNsites(String),

    /// Unit conversion met a value that is not a number or array of numbers.
    #[error("value of '{property}.{key}' is not numeric")]
    NonNumeric {
        /// Property definition name.
        property: String,
        /// Definition key.
        key: String,
    },
}

impl Error {
    pub fn invalid_instance(property: &str, detail: impl Into<String>) -> Self {
        Self::InvalidInstance {
            property: property.to_string(),
            detail: detail.into(),
        }
    }

    pub fn invalid_map(entry: &str, detail: impl Into<String>) -> Self {
        Self::InvalidMap {
            entry: entry.to_string(),
            detail: detail.into(),
        }
    }

    pub fn non_numeric(property: &str, key: &str) -> Self {
        Self::NonNumeric {
            property: property.to_string(),
            key: key.to_string(),
        }
    }
}
