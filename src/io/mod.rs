//! Readers and writers for structure files and table rows.
//!
//! - [`extxyz`] – Extended-XYZ frames into [`AtomicConfiguration`](crate::AtomicConfiguration)s.
//! - [`rows`] – JSON Lines output projected through a table [`Schema`](crate::schema::Schema).

use std::fmt;

pub mod error;
pub mod extxyz;
pub mod rows;

pub use error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    ExtXyz,
    JsonLines,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::ExtXyz => write!(f, "extended XYZ"),
            Format::JsonLines => write!(f, "JSON Lines"),
        }
    }
}
