//! Repository module for database CRUD operations
//!
//! Runtime SQL queries (unchecked) so no DATABASE_URL is needed at compile
//! time. Every write goes through the tables' triggers, so a repository error
//! may carry a consistency violation; see [`crate::errors::violation_in_chain`].

pub mod site;
pub mod stratigraphic_unit;
pub mod context;
pub mod sample;
pub mod pottery;
pub mod finds;
pub mod analysis;
pub mod media;
pub mod audit;

pub use site::SiteRepository;
pub use stratigraphic_unit::{RelationshipRepository, StratigraphicUnitRepository};
pub use context::ContextRepository;
pub use sample::SampleRepository;
pub use pottery::PotteryRepository;
pub use finds::{BotanyRepository, ZooRepository};
pub use analysis::AnalysisRepository;
pub use media::MediaRepository;
pub use audit::{
    AuditRepository, DuplicateInventoryRow, LinkMismatchRow, PrecedenceEdgeRow, SubjectLinkRow,
    UnadmittedSubjectRow,
};

use anyhow::Result;
use std::str::FromStr;
use strata_models::UnknownTerm;

/// Decodes a vocabulary column.
pub(crate) fn parse_term<T>(value: &str) -> Result<T>
where
    T: FromStr<Err = UnknownTerm>,
{
    Ok(value.parse::<T>()?)
}
