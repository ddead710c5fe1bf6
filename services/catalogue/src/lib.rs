//! # Strata Catalogue
//!
//! Write path and consistency audit for the excavation catalogue.
//!
//! Cross-record rules are enforced twice: [`ConsistencyEngine`] checks them
//! before a write and reports a structured violation, and the database
//! triggers reject anything that slips past. [`CatalogueService`] maps both
//! to the same [`strata_utils::StrataError::Consistency`].

pub mod audit;
pub mod consistency;
pub mod service;
pub mod stratigraphy;

#[cfg(test)]
mod testing;

pub use audit::{AuditFinding, AuditReport, ConsistencyAuditor};
pub use consistency::ConsistencyEngine;
pub use service::CatalogueService;
pub use stratigraphy::StratigraphicGraph;
