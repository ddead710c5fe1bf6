//! Laboratory analyses and the records they were run on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::subject::{SubjectKind, SubjectRef};

vocabulary! {
    AnalysisType {
        Radiocarbon => "radiocarbon",
        AncientDna => "ancient_dna",
        StableIsotopes => "stable_isotopes",
        Petrography => "petrography",
        Residue => "residue",
        Anthracology => "anthracology",
        Carpology => "carpology",
        Zooarchaeology => "zooarchaeology",
        Micromorphology => "micromorphology",
    }
}

impl AnalysisType {
    /// Subject kinds this analysis can be performed on.
    pub fn admitted_subjects(&self) -> &'static [SubjectKind] {
        use SubjectKind::*;

        match self {
            Self::Radiocarbon => &[Sample, ZooBone, ZooTooth, BotanyCharcoal, BotanySeed],
            Self::AncientDna => &[ZooBone, ZooTooth],
            Self::StableIsotopes => &[ZooBone, ZooTooth, BotanySeed],
            Self::Petrography => &[Pottery, Sample],
            Self::Residue => &[Pottery],
            Self::Anthracology => &[BotanyCharcoal, Sample],
            Self::Carpology => &[BotanySeed, Sample],
            Self::Zooarchaeology => &[ZooBone, ZooTooth, StratigraphicUnit],
            Self::Micromorphology => &[Sample, StratigraphicUnit, Context],
        }
    }

    pub fn admits(&self, kind: SubjectKind) -> bool {
        self.admitted_subjects().contains(&kind)
    }
}

vocabulary! {
    AnalysisStatus {
        Planned => "planned",
        InProgress => "in_progress",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

impl AnalysisStatus {
    pub fn can_transition_to(&self, target: AnalysisStatus) -> bool {
        use AnalysisStatus::*;

        match (self, target) {
            (Planned, InProgress) | (Planned, Cancelled) => true,
            (InProgress, Completed) | (InProgress, Cancelled) => true,
            // Terminal states
            (Completed, _) | (Cancelled, _) => false,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// An analysis, identified by its type and laboratory identifier.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct Analysis {
    pub id: Uuid,
    pub analysis_type: AnalysisType,
    #[validate(length(min = 1, max = 64, message = "Identifier must be between 1 and 64 characters"))]
    pub identifier: String,
    #[validate(range(min = 1900, max = 2100))]
    pub year: i32,
    #[validate(length(max = 255))]
    pub laboratory: Option<String>,
    #[validate(length(max = 255))]
    pub responsible: Option<String>,
    pub status: AnalysisStatus,
    #[validate(length(max = 4000))]
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Analysis {
    pub fn new(analysis_type: AnalysisType, identifier: impl Into<String>, year: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            analysis_type,
            identifier: identifier.into(),
            year,
            laboratory: None,
            responsible: None,
            status: AnalysisStatus::Planned,
            summary: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Links an analysis to the record it was performed on.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct AnalysisSubject {
    pub id: Uuid,
    pub analysis_id: Uuid,
    pub subject: SubjectRef,
    #[validate(length(max = 4000))]
    pub summary: Option<String>,
}

impl AnalysisSubject {
    pub fn new(analysis_id: Uuid, subject: SubjectRef) -> Self {
        Self {
            id: Uuid::new_v4(),
            analysis_id,
            subject,
            summary: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_matrix() {
        assert!(AnalysisType::Radiocarbon.admits(SubjectKind::BotanyCharcoal));
        assert!(AnalysisType::Residue.admits(SubjectKind::Pottery));
        assert!(!AnalysisType::Residue.admits(SubjectKind::ZooBone));
        assert!(!AnalysisType::AncientDna.admits(SubjectKind::Site));
    }

    #[test]
    fn test_no_analysis_targets_a_whole_site() {
        for ty in AnalysisType::ALL {
            assert!(!ty.admits(SubjectKind::Site), "{} admits sites", ty);
        }
    }

    #[test]
    fn test_status_transitions() {
        assert!(AnalysisStatus::Planned.can_transition_to(AnalysisStatus::InProgress));
        assert!(AnalysisStatus::InProgress.can_transition_to(AnalysisStatus::Completed));
        assert!(!AnalysisStatus::Planned.can_transition_to(AnalysisStatus::Completed));
        assert!(!AnalysisStatus::Completed.can_transition_to(AnalysisStatus::InProgress));
        assert!(AnalysisStatus::Cancelled.is_terminal());
    }
}
