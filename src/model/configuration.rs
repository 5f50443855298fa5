use std::collections::BTreeMap;

use serde_json::{Map, Value, json};
use thiserror::Error;

use super::formula;
use super::row::{Row, prefixed_id, row_hash, timestamp_now};
use super::types::Element;

/// Columns that define the identity of a configuration.
pub const IDENTIFYING_COLUMNS: [&str; 4] = ["atomic_numbers", "cell", "pbc", "positions"];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("configuration contains no atoms")]
    Empty,

    #[error("configuration has {numbers} atomic numbers but {positions} positions")]
    LengthMismatch { numbers: usize, positions: usize },

    #[error("unknown atomic number {0}")]
    UnknownAtomicNumber(u8),

    #[error("per-atom array '{key}' has {len} entries for {nsites} sites")]
    ArrayLength { key: String, len: usize, nsites: usize },
}

/// One atomic structure together with the free-form data attached to it by
/// the source file.
///
/// `info` holds per-configuration values (energies, stresses, labels) and
/// `arrays` holds per-atom values (forces, charges). Property maps read from
/// both by field name. Geometry is fixed at construction so the id always
/// matches it.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicConfiguration {
    atomic_numbers: Vec<u8>,
    positions: Vec<[f64; 3]>,
    cell: [[f64; 3]; 3],
    pbc: [bool; 3],
    pub info: Map<String, Value>,
    pub arrays: Map<String, Value>,
    pub names: Vec<String>,
    pub labels: Vec<String>,
    pub dataset_id: Option<String>,
    pub configuration_set_ids: Vec<String>,
    pub metadata: Option<String>,
    elements: Vec<Element>,
    id: String,
    hash: String,
}

impl AtomicConfiguration {
    /// Validates the structure and computes its content hash and id.
    pub fn new(
        atomic_numbers: Vec<u8>,
        positions: Vec<[f64; 3]>,
        cell: [[f64; 3]; 3],
        pbc: [bool; 3],
    ) -> Result<Self, ConfigurationError> {
        if atomic_numbers.is_empty() {
            return Err(ConfigurationError::Empty);
        }
        if atomic_numbers.len() != positions.len() {
            return Err(ConfigurationError::LengthMismatch {
                numbers: atomic_numbers.len(),
                positions: positions.len(),
            });
        }
        let elements = atomic_numbers
            .iter()
            .map(|&z| Element::from_atomic_number(z).ok_or(ConfigurationError::UnknownAtomicNumber(z)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut config = Self {
            atomic_numbers,
            positions,
            cell,
            pbc,
            info: Map::new(),
            arrays: Map::new(),
            names: Vec::new(),
            labels: Vec::new(),
            dataset_id: None,
            configuration_set_ids: Vec::new(),
            metadata: None,
            elements,
            id: String::new(),
            hash: String::new(),
        };
        config.rehash();
        Ok(config)
    }

    /// Builds a configuration from element symbols instead of atomic numbers.
    pub fn from_elements(
        elements: &[Element],
        positions: Vec<[f64; 3]>,
        cell: [[f64; 3]; 3],
        pbc: [bool; 3],
    ) -> Result<Self, ConfigurationError> {
        let numbers = elements.iter().map(Element::atomic_number).collect();
        Self::new(numbers, positions, cell, pbc)
    }

    pub fn with_info(mut self, info: Map<String, Value>) -> Self {
        self.info = info;
        self
    }

    /// Attaches per-atom arrays. Each array must have one entry per site.
    pub fn with_arrays(mut self, arrays: Map<String, Value>) -> Result<Self, ConfigurationError> {
        let nsites = self.nsites();
        for (key, value) in &arrays {
            if let Value::Array(items) = value
                && items.len() != nsites
            {
                return Err(ConfigurationError::ArrayLength {
                    key: key.clone(),
                    len: items.len(),
                    nsites,
                });
            }
        }
        self.arrays = arrays;
        Ok(self)
    }

    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = names;
        self
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_dataset_id(mut self, dataset_id: impl Into<String>) -> Self {
        self.dataset_id = Some(dataset_id.into());
        self
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn atomic_numbers(&self) -> &[u8] {
        &self.atomic_numbers
    }

    pub fn positions(&self) -> &[[f64; 3]] {
        &self.positions
    }

    pub fn cell(&self) -> &[[f64; 3]; 3] {
        &self.cell
    }

    pub fn pbc(&self) -> [bool; 3] {
        self.pbc
    }

    #[inline]
    pub fn nsites(&self) -> usize {
        self.atomic_numbers.len()
    }

    #[inline]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn nperiodic_dimensions(&self) -> usize {
        self.pbc.iter().filter(|p| **p).count()
    }

    pub fn dimension_types(&self) -> [u8; 3] {
        self.pbc.map(u8::from)
    }

    pub fn element_counts(&self) -> BTreeMap<Element, usize> {
        formula::element_counts(self.elements.iter().copied())
    }

    /// Unique element symbols in alphabetical order.
    pub fn element_symbols(&self) -> Vec<&'static str> {
        let mut symbols: Vec<&str> = self.element_counts().keys().map(Element::symbol).collect();
        symbols.sort_unstable();
        symbols
    }

    /// Hill formula, the default notation for property rows.
    pub fn get_chemical_formula(&self) -> String {
        formula::hill(&self.element_counts())
    }

    /// Looks up a field by name, checking `info` before per-atom `arrays`.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.info.get(name).or_else(|| self.arrays.get(name))
    }

    /// Row matching `config_df_schema`, plus `metadata` when present.
    pub fn to_row(&self) -> Row {
        let counts = self.element_counts();
        let nsites = self.nsites() as f64;

        let mut by_symbol: Vec<(&str, usize)> =
            counts.iter().map(|(el, n)| (el.symbol(), *n)).collect();
        by_symbol.sort_by(|a, b| a.0.cmp(b.0));

        let elements: Vec<&str> = by_symbol.iter().map(|(s, _)| *s).collect();
        let ratios: Vec<f64> = by_symbol.iter().map(|(_, n)| *n as f64 / nsites).collect();

        let mut row = Row::new();
        row.insert("id".into(), json!(self.id));
        row.insert("hash".into(), json!(self.hash));
        row.insert("last_modified".into(), json!(timestamp_now()));
        row.insert(
            "dataset_ids".into(),
            json!(self.dataset_id.iter().collect::<Vec<_>>()),
        );
        row.insert(
            "configuration_set_ids".into(),
            json!(self.configuration_set_ids),
        );
        row.insert(
            "chemical_formula_hill".into(),
            json!(formula::hill(&counts)),
        );
        row.insert(
            "chemical_formula_reduced".into(),
            json!(formula::reduced(&counts)),
        );
        row.insert(
            "chemical_formula_anonymous".into(),
            json!(formula::anonymous(&counts)),
        );
        row.insert("elements".into(), json!(elements));
        row.insert("elements_ratios".into(), json!(ratios));
        row.extend(self.identity_columns());
        row.insert("nsites".into(), json!(self.nsites()));
        row.insert("nelements".into(), json!(counts.len()));
        row.insert(
            "nperiodic_dimensions".into(),
            json!(self.nperiodic_dimensions()),
        );
        row.insert("dimension_types".into(), json!(self.dimension_types()));
        row.insert("names".into(), json!(self.names));
        row.insert("labels".into(), json!(self.labels));
        if let Some(md) = &self.metadata {
            row.insert("metadata".into(), json!(md));
        }
        row
    }

    fn identity_columns(&self) -> Row {
        let mut row = Row::new();
        row.insert("atomic_numbers".into(), json!(self.atomic_numbers));
        row.insert("cell".into(), json!(self.cell));
        row.insert("pbc".into(), json!(self.pbc));
        row.insert("positions".into(), json!(self.positions));
        row
    }

    fn rehash(&mut self) {
        self.hash = row_hash(&self.identity_columns(), &IDENTIFYING_COLUMNS);
        self.id = prefixed_id("CO_", &self.hash);
    }
}
