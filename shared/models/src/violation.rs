//! Broken cross-record rules.
//!
//! The same type is produced by the in-process checks and decoded from the
//! `DETAIL` payload of errors raised by database triggers, so callers see one
//! vocabulary no matter which layer caught the problem.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::analysis::{AnalysisStatus, AnalysisType};
use crate::stratigraphy::StratigraphicRelation;
use crate::subject::{RecordKind, RecordRef, SubjectKind};

/// A relation still pointing at a record, with the number of rows when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependent {
    pub relation: String,
    pub count: Option<i64>,
}

impl Dependent {
    pub fn new(relation: impl Into<String>, count: i64) -> Self {
        Self {
            relation: relation.into(),
            count: Some(count),
        }
    }
}

impl std::fmt::Display for Dependent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.count {
            Some(count) => write!(f, "{} ({})", self.relation, count),
            None => f.write_str(&self.relation),
        }
    }
}

fn join_dependents(dependents: &[Dependent]) -> String {
    dependents
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ConsistencyViolation {
    #[error("{record} does not exist")]
    MissingReference { record: RecordRef },

    #[error("{left} belongs to site {left_site} but {right} belongs to site {right_site}")]
    SiteMismatch {
        left: RecordRef,
        left_site: Uuid,
        right: RecordRef,
        right_site: Uuid,
    },

    #[error("stratigraphic unit {su_id} can not be related to itself")]
    SelfRelationship { su_id: Uuid },

    #[error("stratigraphic units {lft_su_id} and {rgt_su_id} are already related")]
    DuplicateRelationship {
        lft_su_id: Uuid,
        rgt_su_id: Uuid,
        existing: Option<StratigraphicRelation>,
    },

    #[error("relating {lft_su_id} to {rgt_su_id} would make the stratigraphic sequence cyclic")]
    StratigraphicCycle {
        lft_su_id: Uuid,
        rgt_su_id: Uuid,
        path: Vec<Uuid>,
    },

    #[error("{left} is already linked to {right}")]
    DuplicateLink { left: RecordRef, right: RecordRef },

    #[error("{record} {identity} already exists")]
    DuplicateIdentity { record: RecordKind, identity: String },

    #[error("{analysis_type} analyses can not be performed on a {subject_kind}")]
    SubjectNotAdmitted {
        analysis_type: AnalysisType,
        subject_kind: SubjectKind,
    },

    #[error("{record} is still referenced by {}", join_dependents(.dependents))]
    DeletionBlocked {
        record: RecordRef,
        dependents: Vec<Dependent>,
    },

    #[error("{record} can not move to another site while linked to {}", join_dependents(.dependents))]
    SiteReassignment {
        record: RecordRef,
        dependents: Vec<Dependent>,
    },

    #[error("analysis status can not change from {from} to {to}")]
    IllegalStatusTransition {
        from: AnalysisStatus,
        to: AnalysisStatus,
    },
}

impl ConsistencyViolation {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingReference { .. } => "missing_reference",
            Self::SiteMismatch { .. } => "site_mismatch",
            Self::SelfRelationship { .. } => "self_relationship",
            Self::DuplicateRelationship { .. } => "duplicate_relationship",
            Self::StratigraphicCycle { .. } => "stratigraphic_cycle",
            Self::DuplicateLink { .. } => "duplicate_link",
            Self::DuplicateIdentity { .. } => "duplicate_identity",
            Self::SubjectNotAdmitted { .. } => "subject_not_admitted",
            Self::DeletionBlocked { .. } => "deletion_blocked",
            Self::SiteReassignment { .. } => "site_reassignment",
            Self::IllegalStatusTransition { .. } => "illegal_status_transition",
        }
    }

    pub fn missing(kind: RecordKind, id: Uuid) -> Self {
        Self::MissingReference {
            record: RecordRef::new(kind, id),
        }
    }

    /// Whether the write would have conflicted with existing data rather than
    /// pointing at something absent.
    pub fn is_conflict(&self) -> bool {
        !matches!(self, Self::MissingReference { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_matches_serde_tag() {
        let violation = ConsistencyViolation::SelfRelationship { su_id: Uuid::nil() };
        let value = serde_json::to_value(&violation).unwrap();
        assert_eq!(value["code"], violation.code());
    }

    #[test]
    fn test_decodes_trigger_payload() {
        let left = Uuid::new_v4();
        let right = Uuid::new_v4();
        let payload = serde_json::json!({
            "code": "site_mismatch",
            "left": { "kind": "context", "id": left },
            "left_site": Uuid::nil(),
            "right": { "kind": "stratigraphic_unit", "id": right },
            "right_site": Uuid::nil(),
        });

        let violation: ConsistencyViolation = serde_json::from_value(payload).unwrap();
        match violation {
            ConsistencyViolation::SiteMismatch { left: l, right: r, .. } => {
                assert_eq!(l, RecordRef::new(RecordKind::Context, left));
                assert_eq!(r.kind, RecordKind::StratigraphicUnit);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_deletion_blocked_message_lists_dependents() {
        let violation = ConsistencyViolation::DeletionBlocked {
            record: RecordRef::new(RecordKind::Site, Uuid::nil()),
            dependents: vec![
                Dependent::new("stratigraphic_units", 4),
                Dependent { relation: "samples".into(), count: None },
            ],
        };
        assert!(violation
            .to_string()
            .ends_with("is still referenced by stratigraphic_units (4), samples"));
    }
}
