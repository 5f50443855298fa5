mod manifest;

pub use manifest::{IngestSection, Manifest};
