use std::fmt;

use serde_json::json;

use super::{Error, Summary};
use crate::model::row::{Row, string_hash, timestamp_now};

/// A named group of configurations within a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationSet {
    pub name: String,
    pub description: String,
    pub dataset_id: String,
    pub ordered: bool,
    summary: Summary,
    id: String,
    hash: String,
}

impl ConfigurationSet {
    /// Aggregates the given configuration rows into a set.
    pub fn new(
        configurations: &[Row],
        name: impl Into<String>,
        description: impl Into<String>,
        dataset_id: impl Into<String>,
        ordered: bool,
    ) -> Result<Self, Error> {
        let name = name.into();
        let dataset_id = dataset_id.into();
        let summary = Summary::from_rows(configurations)?;
        let id = format!("CS_{name}_{dataset_id}");
        let hash = string_hash(&id);
        Ok(Self {
            name,
            description: description.into(),
            dataset_id,
            ordered,
            summary,
            id,
            hash,
        })
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn extended_id(&self) -> String {
        format!("{}__{}", self.name, self.id)
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn nconfigurations(&self) -> usize {
        self.summary.nconfigurations()
    }

    /// Row matching `configuration_set_df_schema`.
    pub fn to_row(&self) -> Row {
        let s = &self.summary;
        let mut row = Row::new();
        row.insert("id".into(), json!(self.id));
        row.insert("hash".into(), json!(self.hash));
        row.insert("last_modified".into(), json!(timestamp_now()));
        row.insert("nconfigurations".into(), json!(s.nconfigurations()));
        row.insert("nperiodic_dimensions".into(), json!(s.nperiodic_dimensions));
        row.insert("dimension_types".into(), json!(s.dimension_types));
        row.insert("nsites".into(), json!(s.nsites));
        row.insert("nelements".into(), json!(s.nelements()));
        row.insert("elements".into(), json!(s.elements));
        row.insert(
            "total_elements_ratios".into(),
            json!(s.total_elements_ratios),
        );
        row.insert("description".into(), json!(self.description));
        row.insert("name".into(), json!(self.name));
        row.insert("dataset_id".into(), json!(self.dataset_id));
        row.insert("ordered".into(), json!(self.ordered));
        row.insert("extended_id".into(), json!(self.extended_id()));
        row
    }

    /// One `co_cs_mapping` row per member configuration.
    pub fn mapping_rows(&self) -> Vec<Row> {
        self.summary
            .configuration_ids
            .iter()
            .map(|co| {
                let mut row = Row::new();
                row.insert("configuration_id".into(), json!(co));
                row.insert("configuration_set_id".into(), json!(self.id));
                row
            })
            .collect()
    }
}

impl fmt::Display for ConfigurationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConfigurationSet(description='{}', nconfigurations={})",
            self.description,
            self.nconfigurations()
        )
    }
}
