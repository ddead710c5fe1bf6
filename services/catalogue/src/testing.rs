//! In-memory catalogue used by the engine tests.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use strata_database::ScopeLookup;
use strata_models::{
    AnalysisType, Dependent, RecordKind, RecordRef, SampleType, StratigraphicRelation,
    StratigraphicRelationship, SubjectKind, SubjectRef,
};
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryLookup {
    sites: HashMap<Uuid, (String, String)>,
    units: HashMap<Uuid, (Uuid, i32, i32)>,
    contexts: HashMap<Uuid, (Uuid, String)>,
    samples: HashMap<Uuid, (Uuid, SampleType, i32, i32)>,
    potteries: HashMap<Uuid, (Uuid, String)>,
    finds: HashMap<Uuid, (SubjectKind, Uuid)>,
    context_links: Vec<(Uuid, Uuid)>,
    sample_links: Vec<(Uuid, Uuid)>,
    relationships: Vec<StratigraphicRelationship>,
    analyses: HashMap<Uuid, (AnalysisType, String)>,
    analysis_subjects: Vec<(Uuid, SubjectRef)>,
    media: HashMap<Uuid, String>,
    media_subjects: Vec<(Uuid, SubjectRef)>,
}

impl MemoryLookup {
    pub fn add_site(&mut self, code: &str, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.sites.insert(id, (code.to_string(), name.to_string()));
        id
    }

    pub fn add_su(&mut self, site_id: Uuid, year: i32, number: i32) -> Uuid {
        let id = Uuid::new_v4();
        self.units.insert(id, (site_id, year, number));
        id
    }

    pub fn add_context(&mut self, site_id: Uuid, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.contexts.insert(id, (site_id, name.to_string()));
        id
    }

    pub fn add_sample(&mut self, site_id: Uuid, sample_type: SampleType, year: i32, number: i32) -> Uuid {
        let id = Uuid::new_v4();
        self.samples.insert(id, (site_id, sample_type, year, number));
        id
    }

    pub fn add_pottery(&mut self, su_id: Uuid, inventory: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.potteries.insert(id, (su_id, inventory.to_string()));
        id
    }

    /// Zoological or botanical find.
    pub fn add_find(&mut self, kind: SubjectKind, su_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.finds.insert(id, (kind, su_id));
        id
    }

    pub fn add_analysis(&mut self, analysis_type: AnalysisType) -> Uuid {
        let id = Uuid::new_v4();
        self.analyses.insert(id, (analysis_type, id.to_string()));
        id
    }

    pub fn add_media(&mut self, sha256: String) -> Uuid {
        let id = Uuid::new_v4();
        self.media.insert(id, sha256);
        id
    }

    pub fn link_context(&mut self, context_id: Uuid, su_id: Uuid) {
        self.context_links.push((context_id, su_id));
    }

    pub fn link_sample(&mut self, sample_id: Uuid, su_id: Uuid) {
        self.sample_links.push((sample_id, su_id));
    }

    pub fn relate(&mut self, lft_su_id: Uuid, relation: StratigraphicRelation, rgt_su_id: Uuid) {
        self.relationships
            .push(StratigraphicRelationship::new(lft_su_id, relation, rgt_su_id));
    }

    pub fn link_analysis(&mut self, analysis_id: Uuid, subject: SubjectRef) {
        self.analysis_subjects.push((analysis_id, subject));
    }

    fn unit_site(&self, su_id: Uuid) -> Option<Uuid> {
        self.units.get(&su_id).map(|(site_id, _, _)| *site_id)
    }

    fn counted(relation: &str, count: usize) -> Option<Dependent> {
        (count > 0).then(|| Dependent::new(relation, count as i64))
    }

    fn finds_of(&self, kind: SubjectKind, su_id: Uuid) -> usize {
        self.finds
            .values()
            .filter(|(find_kind, find_su)| *find_kind == kind && *find_su == su_id)
            .count()
    }

    fn unit_finds(&self, su_id: Uuid) -> Vec<Option<Dependent>> {
        vec![
            Self::counted(
                "potteries",
                self.potteries.values().filter(|(su, _)| *su == su_id).count(),
            ),
            Self::counted("zoo_bones", self.finds_of(SubjectKind::ZooBone, su_id)),
            Self::counted("zoo_teeth", self.finds_of(SubjectKind::ZooTooth, su_id)),
            Self::counted("botany_charcoals", self.finds_of(SubjectKind::BotanyCharcoal, su_id)),
            Self::counted("botany_seeds", self.finds_of(SubjectKind::BotanySeed, su_id)),
        ]
    }

    fn unit_links(&self, su_id: Uuid) -> Vec<Option<Dependent>> {
        vec![
            Self::counted(
                "context_stratigraphic_units",
                self.context_links.iter().filter(|(_, su)| *su == su_id).count(),
            ),
            Self::counted(
                "sample_stratigraphic_units",
                self.sample_links.iter().filter(|(_, su)| *su == su_id).count(),
            ),
        ]
    }
}

#[async_trait]
impl ScopeLookup for MemoryLookup {
    async fn site_of(&self, subject: SubjectRef) -> Result<Option<Uuid>> {
        let site = match subject.kind {
            SubjectKind::Site => self.sites.contains_key(&subject.id).then_some(subject.id),
            SubjectKind::StratigraphicUnit => self.unit_site(subject.id),
            SubjectKind::Context => self.contexts.get(&subject.id).map(|(site, _)| *site),
            SubjectKind::Sample => self.samples.get(&subject.id).map(|(site, ..)| *site),
            SubjectKind::Pottery => self
                .potteries
                .get(&subject.id)
                .and_then(|(su, _)| self.unit_site(*su)),
            kind => self
                .finds
                .get(&subject.id)
                .filter(|(find_kind, _)| *find_kind == kind)
                .and_then(|(_, su)| self.unit_site(*su)),
        };
        Ok(site)
    }

    async fn analysis_type(&self, analysis_id: Uuid) -> Result<Option<AnalysisType>> {
        Ok(self.analyses.get(&analysis_id).map(|(analysis_type, _)| *analysis_type))
    }

    async fn analysis_subject_kinds(&self, analysis_id: Uuid) -> Result<Vec<SubjectKind>> {
        let mut kinds: Vec<SubjectKind> = self
            .analysis_subjects
            .iter()
            .filter(|(analysis, _)| *analysis == analysis_id)
            .map(|(_, subject)| subject.kind)
            .collect();
        kinds.sort();
        kinds.dedup();
        Ok(kinds)
    }

    async fn media_exists(&self, media_id: Uuid) -> Result<bool> {
        Ok(self.media.contains_key(&media_id))
    }

    async fn site_code_taken(&self, code: &str, exclude: Option<Uuid>) -> Result<bool> {
        Ok(self
            .sites
            .iter()
            .any(|(id, (taken, _))| taken == code && Some(*id) != exclude))
    }

    async fn site_name_taken(&self, name: &str, exclude: Option<Uuid>) -> Result<bool> {
        Ok(self
            .sites
            .iter()
            .any(|(id, (_, taken))| taken == name && Some(*id) != exclude))
    }

    async fn su_identity_taken(
        &self,
        site_id: Uuid,
        year: i32,
        number: i32,
        exclude: Option<Uuid>,
    ) -> Result<bool> {
        Ok(self.units.iter().any(|(id, unit)| {
            *unit == (site_id, year, number) && Some(*id) != exclude
        }))
    }

    async fn context_name_taken(&self, site_id: Uuid, name: &str, exclude: Option<Uuid>) -> Result<bool> {
        Ok(self
            .contexts
            .iter()
            .any(|(id, (site, taken))| *site == site_id && taken == name && Some(*id) != exclude))
    }

    async fn sample_identity_taken(
        &self,
        site_id: Uuid,
        sample_type: SampleType,
        year: i32,
        number: i32,
        exclude: Option<Uuid>,
    ) -> Result<bool> {
        Ok(self.samples.iter().any(|(id, sample)| {
            *sample == (site_id, sample_type, year, number) && Some(*id) != exclude
        }))
    }

    async fn inventory_taken(&self, site_id: Uuid, inventory: &str, exclude: Option<Uuid>) -> Result<bool> {
        Ok(self.potteries.iter().any(|(id, (su, taken))| {
            taken == inventory && self.unit_site(*su) == Some(site_id) && Some(*id) != exclude
        }))
    }

    async fn analysis_identity_taken(
        &self,
        analysis_type: AnalysisType,
        identifier: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool> {
        Ok(self.analyses.iter().any(|(id, (taken_type, taken))| {
            *taken_type == analysis_type && taken == identifier && Some(*id) != exclude
        }))
    }

    async fn media_hash_taken(&self, sha256: &str) -> Result<bool> {
        Ok(self.media.values().any(|taken| taken == sha256))
    }

    async fn context_su_linked(&self, context_id: Uuid, su_id: Uuid) -> Result<bool> {
        Ok(self.context_links.contains(&(context_id, su_id)))
    }

    async fn sample_su_linked(&self, sample_id: Uuid, su_id: Uuid) -> Result<bool> {
        Ok(self.sample_links.contains(&(sample_id, su_id)))
    }

    async fn relationship_between(&self, a: Uuid, b: Uuid) -> Result<Option<StratigraphicRelationship>> {
        Ok(self
            .relationships
            .iter()
            .find(|relationship| relationship.involves(a) && relationship.involves(b))
            .cloned())
    }

    async fn precedence_edges(&self, site_id: Uuid) -> Result<Vec<(Uuid, Uuid)>> {
        Ok(self
            .relationships
            .iter()
            .filter_map(StratigraphicRelationship::precedence_edge)
            .filter(|(later, _)| self.unit_site(*later) == Some(site_id))
            .collect())
    }

    async fn analysis_subject_linked(&self, analysis_id: Uuid, subject: SubjectRef) -> Result<bool> {
        Ok(self.analysis_subjects.contains(&(analysis_id, subject)))
    }

    async fn media_subject_linked(&self, media_id: Uuid, subject: SubjectRef) -> Result<bool> {
        Ok(self.media_subjects.contains(&(media_id, subject)))
    }

    async fn deletion_dependents(&self, record: RecordRef) -> Result<Vec<Dependent>> {
        let mut dependents: Vec<Option<Dependent>> = match record.kind {
            RecordKind::Site => vec![
                Self::counted(
                    "stratigraphic_units",
                    self.units.values().filter(|(site, ..)| *site == record.id).count(),
                ),
                Self::counted(
                    "contexts",
                    self.contexts.values().filter(|(site, _)| *site == record.id).count(),
                ),
                Self::counted(
                    "samples",
                    self.samples.values().filter(|(site, ..)| *site == record.id).count(),
                ),
            ],
            RecordKind::StratigraphicUnit => {
                let mut owned = self.unit_links(record.id);
                owned.extend(self.unit_finds(record.id));
                owned
            }
            _ => Vec::new(),
        };

        let is_subject = SubjectKind::ALL
            .iter()
            .any(|kind| RecordKind::from(*kind) == record.kind);
        if is_subject {
            let refers = |subject: &SubjectRef| subject.record() == record;
            dependents.push(Self::counted(
                "analysis_subjects",
                self.analysis_subjects.iter().filter(|(_, s)| refers(s)).count(),
            ));
            dependents.push(Self::counted(
                "media_object_subjects",
                self.media_subjects.iter().filter(|(_, s)| refers(s)).count(),
            ));
        }

        Ok(dependents.into_iter().flatten().collect())
    }

    async fn site_dependents(&self, record: RecordRef) -> Result<Vec<Dependent>> {
        let dependents = match record.kind {
            RecordKind::StratigraphicUnit => {
                let mut bound = self.unit_links(record.id);
                bound.push(Self::counted(
                    "stratigraphic_relationships",
                    self.relationships.iter().filter(|r| r.involves(record.id)).count(),
                ));
                bound.extend(self.unit_finds(record.id));
                bound
            }
            RecordKind::Context => vec![Self::counted(
                "context_stratigraphic_units",
                self.context_links.iter().filter(|(context, _)| *context == record.id).count(),
            )],
            RecordKind::Sample => vec![Self::counted(
                "sample_stratigraphic_units",
                self.sample_links.iter().filter(|(sample, _)| *sample == record.id).count(),
            )],
            _ => Vec::new(),
        };
        Ok(dependents.into_iter().flatten().collect())
    }
}
