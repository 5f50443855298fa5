//! Table schemas for the columnar store.
//!
//! Each table has a dataframe schema with native array columns. The store
//! itself keeps arrays as JSON text, so every schema has a
//! [`stringified`](Schema::stringified) twin with the same column names
//! where array columns become string columns.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

use crate::model::row::Row;

/// Number of columns the per-atom force arrays are split across.
pub const NSITES_COL_SPLITS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Integer,
    Long,
    Double,
    Boolean,
    Timestamp,
    Array(Box<ColumnType>),
}

impl ColumnType {
    fn array(inner: ColumnType) -> Self {
        ColumnType::Array(Box::new(inner))
    }

    /// Column type of a non-null value. Objects are stored as JSON text and
    /// arrays take the type of their first non-null element.
    fn infer(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(ColumnType::Boolean),
            Value::Number(n) if n.is_f64() => Some(ColumnType::Double),
            Value::Number(_) => Some(ColumnType::Long),
            Value::String(_) | Value::Object(_) => Some(ColumnType::String),
            Value::Array(items) => {
                let inner = items
                    .iter()
                    .find_map(ColumnType::infer)
                    .unwrap_or(ColumnType::String);
                Some(ColumnType::array(inner))
            }
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (ColumnType::String, Value::String(_)) => true,
            (ColumnType::Timestamp, Value::String(s)) => {
                chrono::DateTime::parse_from_rfc3339(s).is_ok()
            }
            (ColumnType::Integer, Value::Number(n)) => n
                .as_i64()
                .is_some_and(|v| i32::try_from(v).is_ok()),
            (ColumnType::Long, Value::Number(n)) => n.is_i64(),
            (ColumnType::Double, Value::Number(_)) => true,
            (ColumnType::Boolean, Value::Bool(_)) => true,
            (ColumnType::Array(inner), Value::Array(items)) => {
                items.iter().all(|item| inner.matches(item))
            }
            _ => false,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::String => write!(f, "string"),
            ColumnType::Integer => write!(f, "int"),
            ColumnType::Long => write!(f, "bigint"),
            ColumnType::Double => write!(f, "double"),
            ColumnType::Boolean => write!(f, "boolean"),
            ColumnType::Timestamp => write!(f, "timestamp"),
            ColumnType::Array(inner) => write!(f, "array<{inner}>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub dtype: ColumnType,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, dtype: ColumnType) -> Self {
        Self {
            name: name.into(),
            dtype,
            nullable: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("column '{column}' expects {expected} but holds {found}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },

    #[error("unknown table '{0}'")]
    UnknownTable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Same column names, array columns replaced by string columns.
    pub fn stringified(&self) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|c| match c.dtype {
                ColumnType::Array(_) => Column {
                    dtype: ColumnType::String,
                    ..c.clone()
                },
                _ => c.clone(),
            })
            .collect();
        Self { columns }
    }

    /// Appends a string `metadata` column.
    pub fn with_metadata(&self) -> Self {
        let mut columns = self.columns.clone();
        columns.push(Column::new("metadata", ColumnType::String));
        Self { columns }
    }

    /// Appends a column for every key of `rows` not already in the schema,
    /// in first-seen order. Each new column takes the type of its first
    /// non-null value, or string when every row holds null.
    pub fn extend_with<'a, I>(&self, rows: I) -> Self
    where
        I: IntoIterator<Item = &'a Row>,
    {
        let mut added: Vec<(String, Option<ColumnType>)> = Vec::new();
        for row in rows {
            for (name, value) in row {
                if self.column(name).is_some() {
                    continue;
                }
                match added.iter_mut().find(|(n, _)| n == name) {
                    Some((_, dtype @ None)) => *dtype = ColumnType::infer(value),
                    Some(_) => {}
                    None => added.push((name.clone(), ColumnType::infer(value))),
                }
            }
        }

        let mut columns = self.columns.clone();
        columns.extend(
            added
                .into_iter()
                .map(|(name, dtype)| Column::new(name, dtype.unwrap_or(ColumnType::String))),
        );
        Self { columns }
    }

    /// A row with every column set to null.
    pub fn empty_row(&self) -> Row {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), Value::Null))
            .collect()
    }

    /// Reshapes `row` to this schema: unknown columns are dropped, missing
    /// columns become null, and array or object values bound for string
    /// columns are rendered as JSON text.
    pub fn project(&self, row: &Row) -> Row {
        self.columns
            .iter()
            .map(|c| {
                let value = row.get(&c.name).cloned().unwrap_or(Value::Null);
                let value = match (&c.dtype, value) {
                    (ColumnType::String, v @ (Value::Array(_) | Value::Object(_))) => {
                        Value::String(v.to_string())
                    }
                    (_, v) => v,
                };
                (c.name.clone(), value)
            })
            .collect()
    }

    /// Checks every schema column present in `row` against its declared type.
    pub fn validate(&self, row: &Row) -> Result<(), SchemaError> {
        for column in &self.columns {
            let Some(value) = row.get(&column.name) else {
                continue;
            };
            if !column.dtype.matches(value) {
                return Err(SchemaError::TypeMismatch {
                    column: column.name.clone(),
                    expected: column.dtype.to_string(),
                    found: describe(value),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "root")?;
        for column in &self.columns {
            writeln!(
                f,
                " |-- {}: {} (nullable = {})",
                column.name, column.dtype, column.nullable
            )?;
        }
        Ok(())
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(_) => "boolean".into(),
        Value::Number(n) if n.is_f64() => "double".into(),
        Value::Number(_) => "integer".into(),
        Value::String(_) => "string".into(),
        Value::Array(_) => "array".into(),
        Value::Object(_) => "object".into(),
    }
}

/// The tables written by an ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Configurations,
    PropertyObjects,
    ConfigurationSets,
    Datasets,
    CoCsMapping,
}

impl Table {
    pub const ALL: [Table; 5] = [
        Table::Configurations,
        Table::PropertyObjects,
        Table::ConfigurationSets,
        Table::Datasets,
        Table::CoCsMapping,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Configurations => "configurations",
            Table::PropertyObjects => "property_objects",
            Table::ConfigurationSets => "configuration_sets",
            Table::Datasets => "datasets",
            Table::CoCsMapping => "co_cs_mapping",
        }
    }

    /// The dataframe (native array) schema.
    pub fn df_schema(&self) -> Schema {
        match self {
            Table::Configurations => config_df_schema(),
            Table::PropertyObjects => property_object_df_schema(),
            Table::ConfigurationSets => configuration_set_df_schema(),
            Table::Datasets => dataset_df_schema(),
            Table::CoCsMapping => co_cs_mapping_schema(),
        }
    }

    /// Whether rows of this table carry a `metadata` column.
    pub fn has_metadata(&self) -> bool {
        matches!(self, Table::Configurations | Table::PropertyObjects)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "configurations" | "configuration" | "co" => Ok(Table::Configurations),
            "property_objects" | "property_object" | "po" => Ok(Table::PropertyObjects),
            "configuration_sets" | "configuration_set" | "cs" => Ok(Table::ConfigurationSets),
            "datasets" | "dataset" | "ds" => Ok(Table::Datasets),
            "co_cs_mapping" | "mapping" => Ok(Table::CoCsMapping),
            _ => Err(SchemaError::UnknownTable(s.to_string())),
        }
    }
}

use ColumnType::{Boolean, Double, Integer, Long, String as Str, Timestamp};

fn col(name: &str, dtype: ColumnType) -> Column {
    Column::new(name, dtype)
}

fn arr(inner: ColumnType) -> ColumnType {
    ColumnType::array(inner)
}

fn matrix(inner: ColumnType) -> ColumnType {
    arr(arr(inner))
}

pub fn config_df_schema() -> Schema {
    Schema::new(vec![
        col("id", Str),
        col("hash", Str),
        col("last_modified", Timestamp),
        col("dataset_ids", arr(Str)),
        col("configuration_set_ids", arr(Str)),
        col("chemical_formula_hill", Str),
        col("chemical_formula_reduced", Str),
        col("chemical_formula_anonymous", Str),
        col("elements", arr(Str)),
        col("elements_ratios", arr(Double)),
        col("atomic_numbers", arr(Integer)),
        col("nsites", Integer),
        col("nelements", Integer),
        col("nperiodic_dimensions", Integer),
        col("cell", matrix(Double)),
        col("dimension_types", arr(Integer)),
        col("pbc", arr(Boolean)),
        col("names", arr(Str)),
        col("labels", arr(Str)),
        col("positions", matrix(Double)),
    ])
}

pub fn config_schema() -> Schema {
    config_df_schema().stringified()
}

pub fn config_md_schema() -> Schema {
    config_df_schema().with_metadata()
}

pub fn property_object_df_schema() -> Schema {
    let mut columns = vec![
        col("id", Str),
        col("hash", Str),
        col("last_modified", Timestamp),
        col("configuration_id", Str),
        col("dataset_id", Str),
        col("multiplicity", Integer),
        col("metadata_id", Str),
        col("metadata_path", Str),
        col("metadata_size", Integer),
        col("software", Str),
        col("method", Str),
        col("chemical_formula_hill", Str),
        col("energy", Double),
    ];
    columns.extend(
        (0..NSITES_COL_SPLITS).map(|i| col(&format!("atomic_forces_{i:02}"), matrix(Double))),
    );
    columns.extend([
        col("cauchy_stress", matrix(Double)),
        col("cauchy_stress_volume_normalized", Boolean),
        col("electronic_band_gap", Double),
        col("electronic_band_gap_type", Str),
        col("formation_energy", Double),
        col("adsorption_energy", Double),
        col("atomization_energy", Double),
    ]);
    Schema::new(columns)
}

pub fn property_object_schema() -> Schema {
    property_object_df_schema().stringified()
}

pub fn property_object_md_schema() -> Schema {
    property_object_df_schema().with_metadata()
}

pub fn dataset_df_schema() -> Schema {
    Schema::new(vec![
        col("id", Str),
        col("hash", Str),
        col("name", Str),
        col("last_modified", Timestamp),
        col("nconfigurations", Integer),
        col("nproperty_objects", Long),
        col("nsites", Long),
        col("nelements", Integer),
        col("elements", arr(Str)),
        col("total_elements_ratios", arr(Double)),
        col("nperiodic_dimensions", arr(Integer)),
        col("dimension_types", matrix(Integer)),
        col("energy_count", Long),
        col("energy_mean", Double),
        col("energy_variance", Double),
        col("atomization_energy_count", Long),
        col("adsorption_energy_count", Long),
        col("formation_energy_count", Long),
        col("atomic_forces_count", Long),
        col("electronic_band_gap_count", Long),
        col("cauchy_stress_count", Long),
        col("authors", arr(Str)),
        col("description", Str),
        col("extended_id", Str),
        col("license", Str),
        col("links", Str),
        col("publication_year", Str),
        col("doi", Str),
    ])
}

pub fn dataset_schema() -> Schema {
    dataset_df_schema().stringified()
}

pub fn configuration_set_df_schema() -> Schema {
    Schema::new(vec![
        col("id", Str),
        col("hash", Str),
        col("last_modified", Timestamp),
        col("nconfigurations", Integer),
        col("nperiodic_dimensions", arr(Integer)),
        col("dimension_types", matrix(Integer)),
        col("nsites", Long),
        col("nelements", Integer),
        col("elements", arr(Str)),
        col("total_elements_ratios", arr(Double)),
        col("description", Str),
        col("name", Str),
        col("dataset_id", Str),
        col("ordered", Boolean),
        col("extended_id", Str),
    ])
}

pub fn configuration_set_schema() -> Schema {
    configuration_set_df_schema().stringified()
}

pub fn co_cs_mapping_schema() -> Schema {
    Schema::new(vec![
        col("configuration_id", Str),
        col("configuration_set_id", Str),
    ])
}
