use thiserror::Error;

/// Errors raised while aggregating configurations and property objects.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("cannot aggregate an empty {0}")]
    Empty(&'static str),

    #[error("configuration row is missing column '{column}'")]
    MissingColumn { column: &'static str },

    #[error("configuration row column '{column}' holds an unexpected value")]
    InvalidColumn { column: &'static str },

    #[error("unknown atomic number {0} in configuration row")]
    UnknownAtomicNumber(i64),

    #[error("exploded atom count {atoms} does not match summed nsites {nsites}")]
    SiteCountMismatch { atoms: u64, nsites: u64 },
}
