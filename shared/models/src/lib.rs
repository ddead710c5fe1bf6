//! # Strata Core Domain Models
//!
//! Domain models for the Strata excavation catalogue: sites, stratigraphic
//! units, contexts, samples, pottery, zoological and botanical finds,
//! analyses and media objects.
//!
//! ## Validation
//!
//! Single-record rules are declared on the models with the validator crate:
//! - Code formats (site codes, pottery inventories, content hashes)
//! - Range validation for years, numbers and counts
//! - Length validation for string fields
//! - Chronology bounds in order
//!
//! Rules spanning several records (shared site scope, blocked deletions,
//! acyclic stratigraphy) are reported as [`ConsistencyViolation`]s.

#[macro_use]
pub mod vocabulary;

pub mod subject;
pub mod site;
pub mod stratigraphy;
pub mod context;
pub mod pottery;
pub mod finds;
pub mod analysis;
pub mod media;
pub mod violation;

#[cfg(test)]
pub mod property_tests;

pub use vocabulary::{BoneSide, ContextType, SampleType, UnknownTerm};
pub use subject::{RecordKind, RecordRef, SubjectKind, SubjectRef};
pub use site::*;
pub use stratigraphy::*;
pub use context::*;
pub use pottery::*;
pub use finds::*;
pub use analysis::*;
pub use media::*;
pub use violation::*;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use validator::Validate;

    #[test]
    fn test_site_creation() {
        let site = Site::new("KHG", "Khor Ghanada");
        assert!(!site.id.is_nil());
        assert!(site.validate().is_ok());
    }

    #[test]
    fn test_subject_tables_are_distinct() {
        let mut tables: Vec<_> = SubjectKind::ALL.iter().map(|k| k.table_name()).collect();
        tables.sort_unstable();
        tables.dedup();
        assert_eq!(tables.len(), SubjectKind::ALL.len());
    }

    #[test]
    fn test_subject_to_record_kind() {
        for kind in SubjectKind::ALL {
            let record: RecordKind = (*kind).into();
            assert_eq!(record.as_str(), kind.as_str());
        }
    }

    #[test]
    fn test_finds_are_su_scoped() {
        assert!(SubjectKind::Pottery.is_su_scoped());
        assert!(SubjectKind::BotanySeed.is_su_scoped());
        assert!(!SubjectKind::Sample.is_su_scoped());
        assert!(!SubjectKind::Site.is_su_scoped());
    }

    #[test]
    fn test_analysis_subject_roundtrip() {
        let link = AnalysisSubject::new(
            Uuid::new_v4(),
            SubjectRef::new(SubjectKind::ZooBone, Uuid::new_v4()),
        );
        let json = serde_json::to_string(&link).unwrap();
        assert!(json.contains("\"zoo_bone\""));
        let back: AnalysisSubject = serde_json::from_str(&json).unwrap();
        assert_eq!(back, link);
    }
}
