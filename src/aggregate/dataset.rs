use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{Error, Summary};
use crate::model::row::{Row, prefixed_id, row_hash, timestamp_now};

/// Property-object columns counted per dataset, with their count column.
const COUNTED_COLUMNS: [(&str, &str); 6] = [
    ("atomization_energy", "atomization_energy_count"),
    ("adsorption_energy", "adsorption_energy_count"),
    ("formation_energy", "formation_energy_count"),
    ("atomic_forces_00", "atomic_forces_count"),
    ("electronic_band_gap", "electronic_band_gap_count"),
    ("cauchy_stress", "cauchy_stress_count"),
];

/// Reference links stored as JSON text in the `links` column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Links {
    #[serde(rename = "source-publication")]
    pub source_publication: Option<String>,
    #[serde(rename = "source-data")]
    pub source_data: Option<String>,
    pub other: Option<String>,
}

/// Descriptive fields of a dataset.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct DatasetInfo {
    pub name: String,
    pub authors: Vec<String>,
    pub description: String,
    pub license: Option<String>,
    pub links: Links,
    pub publication_year: Option<String>,
    pub doi: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct EnergyStats {
    count: u64,
    mean: Option<f64>,
    variance: Option<f64>,
}

impl EnergyStats {
    /// Mean and population variance of the non-null `energy` column.
    fn of(rows: &[&Row]) -> Self {
        let energies: Vec<f64> = rows
            .iter()
            .filter_map(|r| r.get("energy").and_then(Value::as_f64))
            .collect();
        if energies.is_empty() {
            return Self {
                count: 0,
                mean: None,
                variance: None,
            };
        }
        let n = energies.len() as f64;
        let mean = energies.iter().sum::<f64>() / n;
        let variance = energies.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / n;
        Self {
            count: energies.len() as u64,
            mean: Some(mean),
            variance: Some(variance),
        }
    }
}

/// A complete dataset: configurations, their property objects and the
/// descriptive information around them.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub info: DatasetInfo,
    summary: Summary,
    property_ids: Vec<String>,
    energy: EnergyStats,
    counts: Vec<(&'static str, u64)>,
    id: String,
    hash: String,
}

impl Dataset {
    /// Aggregates configuration rows and property-object rows.
    pub fn new(
        info: DatasetInfo,
        configurations: &[Row],
        property_objects: &[Row],
    ) -> Result<Self, Error> {
        if configurations.is_empty() {
            return Err(Error::Empty("dataset"));
        }
        let summary = Summary::from_rows(configurations)?;

        // Repeated property objects count once.
        let mut seen = BTreeSet::new();
        let mut unique = Vec::with_capacity(property_objects.len());
        for row in property_objects {
            let id = row
                .get("id")
                .and_then(Value::as_str)
                .ok_or(Error::MissingColumn { column: "id" })?;
            if seen.insert(id) {
                unique.push(row);
            }
        }
        let property_ids: Vec<String> = seen.into_iter().map(str::to_string).collect();

        let counts = COUNTED_COLUMNS
            .iter()
            .map(|(column, count_column)| {
                let n = unique
                    .iter()
                    .filter(|r| r.get(*column).is_some_and(|v| !v.is_null()))
                    .count();
                (*count_column, n as u64)
            })
            .collect();

        let mut identity = Row::new();
        identity.insert("name".into(), json!(info.name));
        identity.insert(
            "configuration_ids".into(),
            json!(summary.configuration_ids),
        );
        identity.insert("property_object_ids".into(), json!(property_ids));
        let hash = row_hash(
            &identity,
            &["name", "configuration_ids", "property_object_ids"],
        );
        let id = prefixed_id("DS_", &hash);

        Ok(Self {
            energy: EnergyStats::of(&unique),
            info,
            summary,
            property_ids,
            counts,
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
        format!("{}__{}", self.info.name, self.id)
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn nproperty_objects(&self) -> usize {
        self.property_ids.len()
    }

    /// Row matching `dataset_df_schema`.
    pub fn to_row(&self) -> Row {
        let s = &self.summary;
        let mut row = Row::new();
        row.insert("id".into(), json!(self.id));
        row.insert("hash".into(), json!(self.hash));
        row.insert("name".into(), json!(self.info.name));
        row.insert("last_modified".into(), json!(timestamp_now()));
        row.insert("nconfigurations".into(), json!(s.nconfigurations()));
        row.insert("nproperty_objects".into(), json!(self.nproperty_objects()));
        row.insert("nsites".into(), json!(s.nsites));
        row.insert("nelements".into(), json!(s.nelements()));
        row.insert("elements".into(), json!(s.elements));
        row.insert(
            "total_elements_ratios".into(),
            json!(s.total_elements_ratios),
        );
        row.insert("nperiodic_dimensions".into(), json!(s.nperiodic_dimensions));
        row.insert("dimension_types".into(), json!(s.dimension_types));
        row.insert("energy_count".into(), json!(self.energy.count));
        row.insert("energy_mean".into(), json!(self.energy.mean));
        row.insert("energy_variance".into(), json!(self.energy.variance));
        for (column, n) in &self.counts {
            row.insert((*column).into(), json!(n));
        }
        row.insert("authors".into(), json!(self.info.authors));
        row.insert("description".into(), json!(self.info.description));
        row.insert("extended_id".into(), json!(self.extended_id()));
        row.insert("license".into(), json!(self.info.license));
        row.insert(
            "links".into(),
            json!(serde_json::to_string(&self.info.links).ok()),
        );
        row.insert(
            "publication_year".into(),
            json!(self.info.publication_year),
        );
        row.insert("doi".into(), json!(self.info.doi));
        row
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Dataset(name='{}', nconfigurations={}, nproperty_objects={})",
            self.info.name,
            self.summary.nconfigurations(),
            self.nproperty_objects()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;
    use crate::schema::dataset_df_schema;

    fn po(id: &str, energy: Option<f64>, forces: bool) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), json!(id));
        row.insert("energy".into(), json!(energy));
        if forces {
            row.insert("atomic_forces_00".into(), json!([[0.0, 0.0, 0.0]]));
        }
        row
    }

    fn info() -> DatasetInfo {
        DatasetInfo {
            name: "toy".into(),
            authors: vec!["A. Author".into(), "B. Author".into()],
            description: "Toy dataset".into(),
            license: Some("CC-BY-4.0".into()),
            links: Links {
                source_publication: Some("https://doi.org/10.0/x".into()),
                ..Links::default()
            },
            publication_year: Some("2024".into()),
            doi: None,
        }
    }

    #[test]
    fn aggregates_counts_and_energy_stats() {
        let configs = vec![fixtures::water().to_row(), fixtures::silicon().to_row()];
        let pos = vec![
            po("PO_1", Some(-1.0), true),
            po("PO_2", Some(-3.0), false),
            po("PO_3", None, true),
        ];
        let ds = Dataset::new(info(), &configs, &pos).unwrap();
        let row = ds.to_row();

        assert!(dataset_df_schema().validate(&row).is_ok());
        assert_eq!(row["nconfigurations"], json!(2));
        assert_eq!(row["nproperty_objects"], json!(3));
        assert_eq!(row["energy_count"], json!(2));
        assert_eq!(row["energy_mean"], json!(-2.0));
        assert_eq!(row["energy_variance"], json!(1.0));
        assert_eq!(row["atomic_forces_count"], json!(2));
        assert_eq!(row["cauchy_stress_count"], json!(0));
        assert_eq!(row["authors"], json!(["A. Author", "B. Author"]));

        let links: Value = serde_json::from_str(row["links"].as_str().unwrap()).unwrap();
        assert_eq!(links["source-publication"], json!("https://doi.org/10.0/x"));
        assert_eq!(links["source-data"], Value::Null);
    }

    #[test]
    fn energy_stats_are_null_without_energies() {
        let configs = vec![fixtures::water().to_row()];
        let ds = Dataset::new(info(), &configs, &[po("PO_1", None, true)]).unwrap();
        let row = ds.to_row();
        assert_eq!(row["energy_count"], json!(0));
        assert_eq!(row["energy_mean"], Value::Null);
        assert_eq!(row["energy_variance"], Value::Null);
    }

    #[test]
    fn id_is_order_independent() {
        let a = vec![fixtures::water().to_row(), fixtures::silicon().to_row()];
        let b = vec![fixtures::silicon().to_row(), fixtures::water().to_row()];
        let pos_a = vec![po("PO_1", None, false), po("PO_2", None, false)];
        let pos_b = vec![po("PO_2", None, false), po("PO_1", None, false)];
        let da = Dataset::new(info(), &a, &pos_a).unwrap();
        let db = Dataset::new(info(), &b, &pos_b).unwrap();
        assert_eq!(da.id(), db.id());
        assert!(da.id().starts_with("DS_"));
        assert_eq!(da.id().len(), 28);

        let renamed = DatasetInfo {
            name: "other".into(),
            ..info()
        };
        assert_ne!(Dataset::new(renamed, &a, &pos_a).unwrap().id(), da.id());
    }

    #[test]
    fn repeated_property_objects_count_once() {
        let configs = vec![fixtures::water().to_row()];
        let pos = vec![
            po("PO_1", Some(-1.0), true),
            po("PO_1", Some(-1.0), true),
            po("PO_2", Some(-3.0), false),
        ];
        let ds = Dataset::new(info(), &configs, &pos).unwrap();
        let row = ds.to_row();
        assert_eq!(ds.nproperty_objects(), 2);
        assert_eq!(row["energy_count"], json!(2));
        assert_eq!(row["energy_mean"], json!(-2.0));
        assert_eq!(row["energy_variance"], json!(1.0));
        assert_eq!(row["atomic_forces_count"], json!(1));

        let once = Dataset::new(info(), &configs, &pos[1..]).unwrap();
        assert_eq!(once.id(), ds.id());
    }

    #[test]
    fn counts_formation_and_band_gap_columns() {
        let configs = vec![fixtures::water().to_row()];
        let mut formation = po("PO_1", None, false);
        formation.insert("formation_energy".into(), json!(-1.0));
        let mut gap = po("PO_2", None, false);
        gap.insert("electronic_band_gap".into(), json!(2.7));
        gap.insert("formation_energy".into(), Value::Null);
        let ds = Dataset::new(info(), &configs, &[formation, gap]).unwrap();
        let row = ds.to_row();
        assert_eq!(row["formation_energy_count"], json!(1));
        assert_eq!(row["electronic_band_gap_count"], json!(1));
        assert_eq!(row["atomization_energy_count"], json!(0));
        assert_eq!(row["energy_count"], json!(0));
        assert!(dataset_df_schema().validate(&row).is_ok());
    }

    #[test]
    fn empty_dataset_is_an_error() {
        assert_eq!(
            Dataset::new(info(), &[], &[]).unwrap_err(),
            Error::Empty("dataset")
        );
    }
}
