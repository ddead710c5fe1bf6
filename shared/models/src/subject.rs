//! References to catalogue records.
//!
//! Analyses and media objects attach to many kinds of records through a
//! single polymorphic link, identified by a [`SubjectRef`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

vocabulary! {
    /// Records an analysis or a media object can be attached to.
    SubjectKind {
        Site => "site",
        StratigraphicUnit => "stratigraphic_unit",
        Context => "context",
        Sample => "sample",
        Pottery => "pottery",
        ZooBone => "zoo_bone",
        ZooTooth => "zoo_tooth",
        BotanyCharcoal => "botany_charcoal",
        BotanySeed => "botany_seed",
    }
}

impl SubjectKind {
    /// Table holding rows of this kind.
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Site => "sites",
            Self::StratigraphicUnit => "stratigraphic_units",
            Self::Context => "contexts",
            Self::Sample => "samples",
            Self::Pottery => "potteries",
            Self::ZooBone => "zoo_bones",
            Self::ZooTooth => "zoo_teeth",
            Self::BotanyCharcoal => "botany_charcoals",
            Self::BotanySeed => "botany_seeds",
        }
    }

    /// Finds reach their site through the stratigraphic unit they were recovered from.
    pub fn is_su_scoped(&self) -> bool {
        matches!(
            self,
            Self::Pottery | Self::ZooBone | Self::ZooTooth | Self::BotanyCharcoal | Self::BotanySeed
        )
    }
}

vocabulary! {
    /// Every kind of record the consistency rules talk about.
    RecordKind {
        Site => "site",
        StratigraphicUnit => "stratigraphic_unit",
        Context => "context",
        Sample => "sample",
        Pottery => "pottery",
        ZooBone => "zoo_bone",
        ZooTooth => "zoo_tooth",
        BotanyCharcoal => "botany_charcoal",
        BotanySeed => "botany_seed",
        Analysis => "analysis",
        MediaObject => "media_object",
        StratigraphicRelationship => "stratigraphic_relationship",
    }
}

impl From<SubjectKind> for RecordKind {
    fn from(kind: SubjectKind) -> Self {
        match kind {
            SubjectKind::Site => Self::Site,
            SubjectKind::StratigraphicUnit => Self::StratigraphicUnit,
            SubjectKind::Context => Self::Context,
            SubjectKind::Sample => Self::Sample,
            SubjectKind::Pottery => Self::Pottery,
            SubjectKind::ZooBone => Self::ZooBone,
            SubjectKind::ZooTooth => Self::ZooTooth,
            SubjectKind::BotanyCharcoal => Self::BotanyCharcoal,
            SubjectKind::BotanySeed => Self::BotanySeed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectRef {
    pub kind: SubjectKind,
    pub id: Uuid,
}

impl SubjectRef {
    pub fn new(kind: SubjectKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    pub fn site(id: Uuid) -> Self {
        Self::new(SubjectKind::Site, id)
    }

    pub fn stratigraphic_unit(id: Uuid) -> Self {
        Self::new(SubjectKind::StratigraphicUnit, id)
    }

    pub fn record(&self) -> RecordRef {
        RecordRef::new(self.kind.into(), self.id)
    }
}

impl std::fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Any record, including those that can not be a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    pub kind: RecordKind,
    pub id: Uuid,
}

impl RecordRef {
    pub fn new(kind: RecordKind, id: Uuid) -> Self {
        Self { kind, id }
    }
}

impl From<SubjectRef> for RecordRef {
    fn from(subject: SubjectRef) -> Self {
        subject.record()
    }
}

impl std::fmt::Display for RecordRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}
