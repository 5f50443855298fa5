//! Tools for building datasets of interatomic-potential training data.
//!
//! Atomic structures are read from extended-XYZ files, attached to computed
//! properties through OpenKIM-style property definitions, grouped into
//! configuration sets and summarized as a dataset. Every object reduces to a
//! content-hashed row ready for a columnar store.
//!
//! # Features
//!
//! - **Content identity**: Configurations, property objects and datasets get
//!   ids derived from SHA-512 hashes of their identifying columns
//! - **Property mapping**: Property maps pull values from configuration
//!   fields into definition keys, with optional unit standardization to eV
//!   and Å
//! - **Aggregation**: Element ratios, periodicity and energy statistics over
//!   whole sets and datasets
//! - **Schemas**: Dataframe and stringified schemas for every table, and a
//!   JSON Lines writer that projects rows onto them
//!
//! # Quick Start
//!
//! ```
//! use colabfit::{AtomicConfiguration, Property, PropertyDefinition, PropertyMap};
//! use serde_json::json;
//!
//! let info = json!({"E": -14.2}).as_object().cloned().unwrap();
//! let water = AtomicConfiguration::new(
//!     vec![8, 1, 1],
//!     vec![[0.0, 0.0, 0.0], [0.96, 0.0, 0.0], [-0.24, 0.93, 0.0]],
//!     [[0.0; 3]; 3],
//!     [false; 3],
//! )?
//! .with_info(info);
//!
//! let energy = PropertyDefinition::from_value(json!({
//!     "property-id": "tag:staff@noreply.colabfit.org,2022-11-30:property/energy",
//!     "property-name": "energy",
//!     "energy": {"type": "float", "has-unit": true, "extent": [], "required": true},
//!     "per-atom": {"type": "bool", "has-unit": false, "extent": [], "required": true}
//! }))?;
//!
//! let map = PropertyMap::from_value(json!({
//!     "energy": {"energy": {"field": "E", "units": "kcal/mol"}, "per-atom": {"value": false}}
//! }))?;
//!
//! let property = Property::from_definition(&[energy], &water, &map, true, true)?;
//! let row = property.to_row();
//!
//! assert_eq!(row["chemical_formula_hill"], json!("H2O"));
//! assert_eq!(row["energy_unit"], json!("eV"));
//! assert!(property.id().starts_with("PO_"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Module Organization
//!
//! - [`io`]: Extended-XYZ reading and JSON Lines row output
//! - [`property`]: Property definitions, property maps, units and property objects
//! - [`aggregate`]: Configuration sets and datasets
//! - [`schema`]: Table schemas
//!
//! # Data Types
//!
//! - [`AtomicConfiguration`]: Structure with free-form `info` and per-atom `arrays`
//! - [`Element`]: Chemical element (H through Og)
//! - [`Row`]: Column name to JSON value
//! - [`Property`]: Property instances bound to one configuration
//! - [`ConfigurationSet`]: Named group of configurations
//! - [`Dataset`]: Top-level aggregate with authorship and links

mod model;

pub mod aggregate;
pub mod io;
pub mod property;
pub mod schema;

pub use model::configuration::{AtomicConfiguration, ConfigurationError, IDENTIFYING_COLUMNS};
pub use model::formula;
pub use model::row::{MAX_ID_LEN, Row, prefixed_id, row_hash, string_hash, timestamp_now};
pub use model::types::{Element, ParseElementError};

pub use property::{
    KeyDefinition, KeyMap, KeySource, KeyType, Property, PropertyContext, PropertyDefinition,
    PropertyMap,
};

pub use aggregate::{ConfigurationSet, Dataset, DatasetInfo, Links, Summary};
pub use schema::{Schema, SchemaError, Table};

pub use aggregate::Error as AggregateError;
pub use property::Error as PropertyError;
