//! Aggregation of configuration and property-object rows.
//!
//! Configuration sets and datasets are summaries over the rows produced by
//! [`AtomicConfiguration::to_row`](crate::AtomicConfiguration::to_row).
//! Working from rows keeps the two aggregates independent of how the rows
//! were produced.

mod configuration_set;
mod dataset;
mod error;

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::debug;

pub use configuration_set::ConfigurationSet;
pub use dataset::{Dataset, DatasetInfo, Links};
pub use error::Error;

use crate::model::row::Row;
use crate::model::types::Element;

/// Totals shared by configuration sets and datasets.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Summary {
    pub configuration_ids: BTreeSet<String>,
    pub nsites: u64,
    pub elements: Vec<String>,
    pub total_elements_ratios: Vec<f64>,
    pub nperiodic_dimensions: Vec<i64>,
    pub dimension_types: Vec<Vec<i64>>,
}

impl Summary {
    /// Aggregates configuration rows.
    ///
    /// Element ratios are computed from the exploded `atomic_numbers`, whose
    /// length must agree with the summed `nsites`.
    pub fn from_rows(rows: &[Row]) -> Result<Self, Error> {
        let mut summary = Self::default();
        let mut elements = BTreeSet::new();
        let mut periodic = BTreeSet::new();
        let mut dimension_types = BTreeSet::new();
        let mut counts: BTreeMap<&'static str, u64> = BTreeMap::new();
        let mut atoms = 0u64;

        for row in rows {
            summary
                .configuration_ids
                .insert(str_column(row, "id")?.to_string());
            summary.nsites += u64::try_from(int_column(row, "nsites")?)
                .map_err(|_| Error::InvalidColumn { column: "nsites" })?;

            for element in array_column(row, "elements")? {
                let symbol = element
                    .as_str()
                    .ok_or(Error::InvalidColumn { column: "elements" })?;
                elements.insert(symbol.to_string());
            }

            periodic.insert(int_column(row, "nperiodic_dimensions")?);

            let dims = array_column(row, "dimension_types")?
                .iter()
                .map(|v| v.as_i64().ok_or(Error::InvalidColumn { column: "dimension_types" }))
                .collect::<Result<Vec<_>, _>>()?;
            dimension_types.insert(dims);

            for number in array_column(row, "atomic_numbers")? {
                let z = number
                    .as_i64()
                    .ok_or(Error::InvalidColumn { column: "atomic_numbers" })?;
                let element = u8::try_from(z)
                    .ok()
                    .and_then(Element::from_atomic_number)
                    .ok_or(Error::UnknownAtomicNumber(z))?;
                *counts.entry(element.symbol()).or_default() += 1;
                atoms += 1;
            }
        }

        if atoms != summary.nsites {
            return Err(Error::SiteCountMismatch {
                atoms,
                nsites: summary.nsites,
            });
        }

        summary.elements = elements.into_iter().collect();
        summary.total_elements_ratios = counts
            .values()
            .map(|&n| n as f64 / atoms as f64)
            .collect();
        summary.nperiodic_dimensions = periodic.into_iter().collect();
        summary.dimension_types = dimension_types.into_iter().collect();
        debug!(
            nconfigurations = summary.nconfigurations(),
            nsites = summary.nsites,
            nelements = summary.nelements(),
            "aggregated configuration rows"
        );
        Ok(summary)
    }

    pub fn nconfigurations(&self) -> usize {
        self.configuration_ids.len()
    }

    pub fn nelements(&self) -> usize {
        self.elements.len()
    }
}

fn column<'a>(row: &'a Row, column: &'static str) -> Result<&'a Value, Error> {
    row.get(column).ok_or(Error::MissingColumn { column })
}

fn str_column<'a>(row: &'a Row, name: &'static str) -> Result<&'a str, Error> {
    column(row, name)?
        .as_str()
        .ok_or(Error::InvalidColumn { column: name })
}

fn int_column(row: &Row, name: &'static str) -> Result<i64, Error> {
    column(row, name)?
        .as_i64()
        .ok_or(Error::InvalidColumn { column: name })
}

fn array_column<'a>(row: &'a Row, name: &'static str) -> Result<&'a Vec<Value>, Error> {
    column(row, name)?
        .as_array()
        .ok_or(Error::InvalidColumn { column: name })
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() <= eps
    }

    #[test]
    fn summarizes_mixed_configurations() {
        let rows = vec![fixtures::water().to_row(), fixtures::silicon().to_row()];
        let summary = Summary::from_rows(&rows).unwrap();

        assert_eq!(summary.nconfigurations(), 2);
        assert_eq!(summary.nsites, 5);
        assert_eq!(summary.elements, vec!["H", "O", "Si"]);
        assert_eq!(summary.nelements(), 3);
        assert_eq!(summary.nperiodic_dimensions, vec![0, 3]);
        assert_eq!(summary.dimension_types, vec![vec![0, 0, 0], vec![1, 1, 1]]);

        let ratios = &summary.total_elements_ratios;
        assert_eq!(ratios.len(), 3);
        assert!(approx_eq(ratios[0], 0.4, 1e-12));
        assert!(approx_eq(ratios[1], 0.2, 1e-12));
        assert!(approx_eq(ratios[2], 0.4, 1e-12));
    }

    #[test]
    fn duplicate_rows_count_once_as_configurations() {
        let rows = vec![fixtures::water().to_row(), fixtures::water().to_row()];
        let summary = Summary::from_rows(&rows).unwrap();
        assert_eq!(summary.nconfigurations(), 1);
        assert_eq!(summary.nsites, 6);
    }

    #[test]
    fn negative_nsites_is_invalid() {
        let mut row = fixtures::water().to_row();
        row.insert("nsites".into(), json!(-3));
        assert_eq!(
            Summary::from_rows(&[row]).unwrap_err(),
            Error::InvalidColumn { column: "nsites" }
        );
    }

    #[test]
    fn detects_site_count_mismatch() {
        let mut row = fixtures::water().to_row();
        row.insert("nsites".into(), json!(4));
        assert_eq!(
            Summary::from_rows(&[row]).unwrap_err(),
            Error::SiteCountMismatch { atoms: 3, nsites: 4 }
        );
    }

    #[test]
    fn reports_missing_columns() {
        let mut row = fixtures::water().to_row();
        row.remove("atomic_numbers");
        assert_eq!(
            Summary::from_rows(&[row]).unwrap_err(),
            Error::MissingColumn {
                column: "atomic_numbers"
            }
        );
    }
}
