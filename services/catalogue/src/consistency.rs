//! Consistency Engine
//!
//! Cross-record checks run before every write. Each check passes or fails
//! with a [`ConsistencyViolation`]; lookup failures surface as database
//! errors. The same rules are installed as triggers, so a write racing past
//! a check is still rejected by the database with the same violation.

use strata_database::ScopeLookup;
use strata_models::{
    AnalysisStatus, AnalysisType, ConsistencyViolation, Precedence, RecordKind, RecordRef,
    SampleType, StratigraphicRelation, SubjectKind, SubjectRef,
};
use strata_utils::{StrataError, StrataResult};
use uuid::Uuid;

use crate::stratigraphy::StratigraphicGraph;

fn violated<T>(violation: ConsistencyViolation) -> StrataResult<T> {
    Err(StrataError::Consistency(violation))
}

pub struct ConsistencyEngine<L> {
    lookup: L,
}

impl<L: ScopeLookup> ConsistencyEngine<L> {
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Site of an existing subject.
    pub async fn require_site(&self, subject: SubjectRef) -> StrataResult<Uuid> {
        match self.lookup.site_of(subject).await? {
            Some(site_id) => Ok(site_id),
            None => violated(ConsistencyViolation::missing(subject.kind.into(), subject.id)),
        }
    }

    pub async fn check_site_identity(&self, code: &str, name: &str, exclude: Option<Uuid>) -> StrataResult<()> {
        if self.lookup.site_code_taken(code, exclude).await? {
            return violated(ConsistencyViolation::DuplicateIdentity {
                record: RecordKind::Site,
                identity: format!("code={}", code),
            });
        }
        if self.lookup.site_name_taken(name, exclude).await? {
            return violated(ConsistencyViolation::DuplicateIdentity {
                record: RecordKind::Site,
                identity: format!("name={}", name),
            });
        }
        Ok(())
    }

    pub async fn check_su_identity(
        &self,
        site_id: Uuid,
        year: i32,
        number: i32,
        exclude: Option<Uuid>,
    ) -> StrataResult<()> {
        self.require_site(SubjectRef::site(site_id)).await?;
        if self.lookup.su_identity_taken(site_id, year, number, exclude).await? {
            return violated(ConsistencyViolation::DuplicateIdentity {
                record: RecordKind::StratigraphicUnit,
                identity: format!("site_id={} year={} number={}", site_id, year, number),
            });
        }
        Ok(())
    }

    pub async fn check_context_identity(&self, site_id: Uuid, name: &str, exclude: Option<Uuid>) -> StrataResult<()> {
        self.require_site(SubjectRef::site(site_id)).await?;
        if self.lookup.context_name_taken(site_id, name, exclude).await? {
            return violated(ConsistencyViolation::DuplicateIdentity {
                record: RecordKind::Context,
                identity: format!("site_id={} name={}", site_id, name),
            });
        }
        Ok(())
    }

    pub async fn check_sample_identity(
        &self,
        site_id: Uuid,
        sample_type: SampleType,
        year: i32,
        number: i32,
        exclude: Option<Uuid>,
    ) -> StrataResult<()> {
        self.require_site(SubjectRef::site(site_id)).await?;
        if self
            .lookup
            .sample_identity_taken(site_id, sample_type, year, number, exclude)
            .await?
        {
            return violated(ConsistencyViolation::DuplicateIdentity {
                record: RecordKind::Sample,
                identity: format!(
                    "site_id={} sample_type={} year={} number={}",
                    site_id, sample_type, year, number
                ),
            });
        }
        Ok(())
    }

    pub async fn check_analysis_identity(
        &self,
        analysis_type: AnalysisType,
        identifier: &str,
        exclude: Option<Uuid>,
    ) -> StrataResult<()> {
        if self
            .lookup
            .analysis_identity_taken(analysis_type, identifier, exclude)
            .await?
        {
            return violated(ConsistencyViolation::DuplicateIdentity {
                record: RecordKind::Analysis,
                identity: format!("analysis_type={} identifier={}", analysis_type, identifier),
            });
        }
        Ok(())
    }

    pub async fn check_media_identity(&self, sha256: &str) -> StrataResult<()> {
        if self.lookup.media_hash_taken(sha256).await? {
            return violated(ConsistencyViolation::DuplicateIdentity {
                record: RecordKind::MediaObject,
                identity: format!("sha256={}", sha256),
            });
        }
        Ok(())
    }

    /// Both ends exist and share a site, returning that site.
    async fn require_same_site(&self, left: SubjectRef, right: SubjectRef) -> StrataResult<Uuid> {
        let left_site = self.require_site(left).await?;
        let right_site = self.require_site(right).await?;
        if left_site != right_site {
            return violated(ConsistencyViolation::SiteMismatch {
                left: left.record(),
                left_site,
                right: right.record(),
                right_site,
            });
        }
        Ok(left_site)
    }

    pub async fn check_context_su_link(&self, context_id: Uuid, su_id: Uuid) -> StrataResult<()> {
        let context = SubjectRef::new(SubjectKind::Context, context_id);
        let unit = SubjectRef::stratigraphic_unit(su_id);
        self.require_same_site(context, unit).await?;

        if self.lookup.context_su_linked(context_id, su_id).await? {
            return violated(ConsistencyViolation::DuplicateLink {
                left: context.record(),
                right: unit.record(),
            });
        }
        Ok(())
    }

    pub async fn check_sample_su_link(&self, sample_id: Uuid, su_id: Uuid) -> StrataResult<()> {
        let sample = SubjectRef::new(SubjectKind::Sample, sample_id);
        let unit = SubjectRef::stratigraphic_unit(su_id);
        self.require_same_site(sample, unit).await?;

        if self.lookup.sample_su_linked(sample_id, su_id).await? {
            return violated(ConsistencyViolation::DuplicateLink {
                left: sample.record(),
                right: unit.record(),
            });
        }
        Ok(())
    }

    /// A relationship joins two distinct units of one site, at most once per
    /// pair, and never makes the precedence graph cyclic.
    pub async fn check_su_relationship(
        &self,
        lft_su_id: Uuid,
        relation: StratigraphicRelation,
        rgt_su_id: Uuid,
    ) -> StrataResult<()> {
        if lft_su_id == rgt_su_id {
            return violated(ConsistencyViolation::SelfRelationship { su_id: lft_su_id });
        }

        let site_id = self
            .require_same_site(
                SubjectRef::stratigraphic_unit(lft_su_id),
                SubjectRef::stratigraphic_unit(rgt_su_id),
            )
            .await?;

        if let Some(existing) = self.lookup.relationship_between(lft_su_id, rgt_su_id).await? {
            return violated(ConsistencyViolation::DuplicateRelationship {
                lft_su_id,
                rgt_su_id,
                existing: existing.seen_from(lft_su_id).map(|view| view.relation),
            });
        }

        let (later, earlier) = match relation.precedence() {
            Some(Precedence::Later) => (lft_su_id, rgt_su_id),
            Some(Precedence::Earlier) => (rgt_su_id, lft_su_id),
            None => return Ok(()),
        };

        let graph = StratigraphicGraph::from_edges(self.lookup.precedence_edges(site_id).await?);
        if let Some(path) = graph.would_create_cycle(later, earlier) {
            return violated(ConsistencyViolation::StratigraphicCycle {
                lft_su_id,
                rgt_su_id,
                path,
            });
        }
        Ok(())
    }

    pub async fn check_pottery_inventory(&self, su_id: Uuid, inventory: &str, exclude: Option<Uuid>) -> StrataResult<()> {
        let site_id = self.require_site(SubjectRef::stratigraphic_unit(su_id)).await?;
        if self.lookup.inventory_taken(site_id, inventory, exclude).await? {
            return violated(ConsistencyViolation::DuplicateIdentity {
                record: RecordKind::Pottery,
                identity: format!("site_id={} inventory={}", site_id, inventory),
            });
        }
        Ok(())
    }

    /// Zoological and botanical finds only need their unit.
    pub async fn check_find(&self, su_id: Uuid) -> StrataResult<()> {
        self.require_site(SubjectRef::stratigraphic_unit(su_id)).await?;
        Ok(())
    }

    pub async fn check_analysis_subject(&self, analysis_id: Uuid, subject: SubjectRef) -> StrataResult<()> {
        let analysis_type = match self.lookup.analysis_type(analysis_id).await? {
            Some(analysis_type) => analysis_type,
            None => return violated(ConsistencyViolation::missing(RecordKind::Analysis, analysis_id)),
        };
        self.require_site(subject).await?;

        if !analysis_type.admits(subject.kind) {
            return violated(ConsistencyViolation::SubjectNotAdmitted {
                analysis_type,
                subject_kind: subject.kind,
            });
        }
        if self.lookup.analysis_subject_linked(analysis_id, subject).await? {
            return violated(ConsistencyViolation::DuplicateLink {
                left: RecordRef::new(RecordKind::Analysis, analysis_id),
                right: subject.record(),
            });
        }
        Ok(())
    }

    /// Changing the type of an analysis must keep its current subjects admitted.
    pub async fn check_analysis_type_change(&self, analysis_id: Uuid, analysis_type: AnalysisType) -> StrataResult<()> {
        let current = match self.lookup.analysis_type(analysis_id).await? {
            Some(current) => current,
            None => return violated(ConsistencyViolation::missing(RecordKind::Analysis, analysis_id)),
        };
        if current == analysis_type {
            return Ok(());
        }

        let kinds = self.lookup.analysis_subject_kinds(analysis_id).await?;
        if let Some(kind) = kinds.into_iter().find(|kind| !analysis_type.admits(*kind)) {
            return violated(ConsistencyViolation::SubjectNotAdmitted {
                analysis_type,
                subject_kind: kind,
            });
        }
        Ok(())
    }

    pub async fn check_media_subject(&self, media_id: Uuid, subject: SubjectRef) -> StrataResult<()> {
        if !self.lookup.media_exists(media_id).await? {
            return violated(ConsistencyViolation::missing(RecordKind::MediaObject, media_id));
        }
        self.require_site(subject).await?;

        if self.lookup.media_subject_linked(media_id, subject).await? {
            return violated(ConsistencyViolation::DuplicateLink {
                left: RecordRef::new(RecordKind::MediaObject, media_id),
                right: subject.record(),
            });
        }
        Ok(())
    }

    async fn check_site_change(&self, subject: SubjectRef, new_site_id: Uuid) -> StrataResult<()> {
        let current = self.require_site(subject).await?;
        if current == new_site_id {
            return Ok(());
        }
        self.require_site(SubjectRef::site(new_site_id)).await?;

        let dependents = self.lookup.site_dependents(subject.record()).await?;
        if !dependents.is_empty() {
            return violated(ConsistencyViolation::SiteReassignment {
                record: subject.record(),
                dependents,
            });
        }
        Ok(())
    }

    pub async fn check_su_site_change(&self, su_id: Uuid, new_site_id: Uuid) -> StrataResult<()> {
        self.check_site_change(SubjectRef::stratigraphic_unit(su_id), new_site_id)
            .await
    }

    pub async fn check_context_site_change(&self, context_id: Uuid, new_site_id: Uuid) -> StrataResult<()> {
        self.check_site_change(SubjectRef::new(SubjectKind::Context, context_id), new_site_id)
            .await
    }

    pub async fn check_sample_site_change(&self, sample_id: Uuid, new_site_id: Uuid) -> StrataResult<()> {
        self.check_site_change(SubjectRef::new(SubjectKind::Sample, sample_id), new_site_id)
            .await
    }

    async fn check_record_deletion(&self, record: RecordRef) -> StrataResult<()> {
        let dependents = self.lookup.deletion_dependents(record).await?;
        if !dependents.is_empty() {
            return violated(ConsistencyViolation::DeletionBlocked { record, dependents });
        }
        Ok(())
    }

    /// Deleting a subject is blocked while anything still refers to it.
    pub async fn check_deletion(&self, subject: SubjectRef) -> StrataResult<()> {
        self.require_site(subject).await?;
        self.check_record_deletion(subject.record()).await
    }

    pub async fn check_analysis_deletion(&self, analysis_id: Uuid) -> StrataResult<()> {
        if self.lookup.analysis_type(analysis_id).await?.is_none() {
            return violated(ConsistencyViolation::missing(RecordKind::Analysis, analysis_id));
        }
        self.check_record_deletion(RecordRef::new(RecordKind::Analysis, analysis_id))
            .await
    }

    pub async fn check_media_deletion(&self, media_id: Uuid) -> StrataResult<()> {
        if !self.lookup.media_exists(media_id).await? {
            return violated(ConsistencyViolation::missing(RecordKind::MediaObject, media_id));
        }
        self.check_record_deletion(RecordRef::new(RecordKind::MediaObject, media_id))
            .await
    }

    /// Keeping the current status is not a transition.
    pub fn check_analysis_status(&self, current: AnalysisStatus, next: AnalysisStatus) -> StrataResult<()> {
        if current == next || current.can_transition_to(next) {
            return Ok(());
        }
        violated(ConsistencyViolation::IllegalStatusTransition {
            from: current,
            to: next,
        })
    }
}
