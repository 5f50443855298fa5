//! Core data structures for atomic configurations and table rows.
//!
//! - [`types`] – Periodic table elements.
//! - [`formula`] – Hill, reduced and anonymous chemical formulae.
//! - [`configuration`] – Atomic structures with their free-form info and per-atom arrays.
//! - [`row`] – Row maps, SHA-512 identity hashing and timestamps.
//!
//! Every persisted object (configuration, property object, configuration set,
//! dataset) is reduced to a [`row::Row`] whose `hash` column is computed from a
//! fixed set of identifying columns, so identical content always yields the
//! same id.

pub mod configuration;
pub mod formula;
pub mod row;
pub mod types;
