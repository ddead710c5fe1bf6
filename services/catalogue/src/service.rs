//! Catalogue Service
//!
//! Validated writes over the catalogue. Every write runs the declarative
//! model constraints, then the consistency checks, then the repository write.
//! Violations the database raises itself come back as the same
//! [`StrataError::Consistency`] the checks produce.

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use strata_database::{
    violation_in_chain, AnalysisRepository, BotanyRepository, ContextRepository, MediaRepository,
    PotteryRepository, RelationshipRepository, SampleRepository, ScopeLookup, ScopeRepository,
    SiteRepository, StratigraphicUnitRepository, ZooRepository,
};
use strata_models::{
    Analysis, AnalysisStatus, AnalysisSubject, BotanyCharcoal, BotanySeed, Context,
    ContextStratigraphicUnit, MediaObject, MediaObjectSubject, Pottery, RecordKind, RecordRef,
    RelationView, Sample, SampleStratigraphicUnit, Site, StratigraphicRelation,
    StratigraphicRelationship, StratigraphicUnit, SubjectKind, SubjectRef, ZooBone, ZooTooth,
};
use strata_utils::{validate_model, StrataError, StrataResult};

use crate::consistency::ConsistencyEngine;

/// Maps a repository failure, keeping database-raised violations structured.
fn stored<T>(result: anyhow::Result<T>, target: Option<RecordRef>) -> StrataResult<T> {
    result.map_err(|error| match violation_in_chain(&error, target) {
        Some(violation) => StrataError::Consistency(violation),
        None => StrataError::database(format!("{:#}", error)),
    })
}

fn found<T>(record: Option<T>, kind: RecordKind, id: Uuid) -> StrataResult<T> {
    record.ok_or_else(|| StrataError::not_found(format!("{} {}", kind, id)))
}

fn removed(deleted: bool, kind: RecordKind, id: Uuid) -> StrataResult<()> {
    if deleted {
        Ok(())
    } else {
        Err(StrataError::not_found(format!("{} {}", kind, id)))
    }
}

/// A join row is named by both of its ends.
fn unlinked(deleted: bool, left: RecordRef, right: RecordRef) -> StrataResult<()> {
    if deleted {
        Ok(())
    } else {
        Err(StrataError::not_found(format!("link between {} and {}", left, right)))
    }
}

#[derive(Clone)]
pub struct CatalogueService {
    sites: SiteRepository,
    units: StratigraphicUnitRepository,
    relationships: RelationshipRepository,
    contexts: ContextRepository,
    samples: SampleRepository,
    potteries: PotteryRepository,
    zoo: ZooRepository,
    botany: BotanyRepository,
    analyses: AnalysisRepository,
    media: MediaRepository,
    engine: std::sync::Arc<ConsistencyEngine<ScopeRepository>>,
}

impl CatalogueService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            sites: SiteRepository::new(pool.clone()),
            units: StratigraphicUnitRepository::new(pool.clone()),
            relationships: RelationshipRepository::new(pool.clone()),
            contexts: ContextRepository::new(pool.clone()),
            samples: SampleRepository::new(pool.clone()),
            potteries: PotteryRepository::new(pool.clone()),
            zoo: ZooRepository::new(pool.clone()),
            botany: BotanyRepository::new(pool.clone()),
            analyses: AnalysisRepository::new(pool.clone()),
            media: MediaRepository::new(pool.clone()),
            engine: std::sync::Arc::new(ConsistencyEngine::new(ScopeRepository::new(pool))),
        }
    }

    pub fn engine(&self) -> &ConsistencyEngine<ScopeRepository> {
        &self.engine
    }

    async fn delete_subject(&self, subject: SubjectRef) -> StrataResult<()> {
        if self.engine.lookup().site_of(subject).await?.is_none() {
            return removed(false, subject.kind.into(), subject.id);
        }
        self.engine.check_deletion(subject).await?;

        let target = Some(subject.record());
        let deleted = match subject.kind {
            SubjectKind::Site => stored(self.sites.delete(subject.id).await, target)?,
            SubjectKind::StratigraphicUnit => stored(self.units.delete(subject.id).await, target)?,
            SubjectKind::Context => stored(self.contexts.delete(subject.id).await, target)?,
            SubjectKind::Sample => stored(self.samples.delete(subject.id).await, target)?,
            SubjectKind::Pottery => stored(self.potteries.delete(subject.id).await, target)?,
            SubjectKind::ZooBone => stored(self.zoo.delete_bone(subject.id).await, target)?,
            SubjectKind::ZooTooth => stored(self.zoo.delete_tooth(subject.id).await, target)?,
            SubjectKind::BotanyCharcoal => stored(self.botany.delete_charcoal(subject.id).await, target)?,
            SubjectKind::BotanySeed => stored(self.botany.delete_seed(subject.id).await, target)?,
        };

        info!(subject = %subject, "Deleted catalogue record");
        removed(deleted, subject.kind.into(), subject.id)
    }

    // ===== Sites =====

    pub async fn get_site(&self, id: Uuid) -> StrataResult<Site> {
        found(stored(self.sites.find_by_id(id).await, None)?, RecordKind::Site, id)
    }

    pub async fn list_sites(&self) -> StrataResult<Vec<Site>> {
        stored(self.sites.find_all().await, None)
    }

    pub async fn create_site(&self, site: Site) -> StrataResult<Site> {
        validate_model(&site)?;
        self.engine.check_site_identity(&site.code, &site.name, None).await?;

        let site = stored(self.sites.create(&site).await, None)?;
        info!(site_id = %site.id, code = %site.code, "Created site");
        Ok(site)
    }

    pub async fn update_site(&self, site: Site) -> StrataResult<Site> {
        validate_model(&site)?;
        self.get_site(site.id).await?;
        self.engine
            .check_site_identity(&site.code, &site.name, Some(site.id))
            .await?;

        let target = Some(RecordRef::new(RecordKind::Site, site.id));
        found(stored(self.sites.update(&site).await, target)?, RecordKind::Site, site.id)
    }

    pub async fn delete_site(&self, id: Uuid) -> StrataResult<()> {
        self.delete_subject(SubjectRef::site(id)).await
    }

    // ===== Stratigraphic units =====

    pub async fn get_unit(&self, id: Uuid) -> StrataResult<StratigraphicUnit> {
        found(
            stored(self.units.find_by_id(id).await, None)?,
            RecordKind::StratigraphicUnit,
            id,
        )
    }

    pub async fn units_of_site(&self, site_id: Uuid) -> StrataResult<Vec<StratigraphicUnit>> {
        stored(self.units.find_by_site(site_id).await, None)
    }

    pub async fn create_unit(&self, unit: StratigraphicUnit) -> StrataResult<StratigraphicUnit> {
        validate_model(&unit)?;
        self.engine
            .check_su_identity(unit.site_id, unit.year, unit.number, None)
            .await?;

        let unit = stored(self.units.create(&unit).await, None)?;
        info!(su_id = %unit.id, site_id = %unit.site_id, year = unit.year, number = unit.number, "Created stratigraphic unit");
        Ok(unit)
    }

    pub async fn update_unit(&self, unit: StratigraphicUnit) -> StrataResult<StratigraphicUnit> {
        validate_model(&unit)?;
        let current = self.get_unit(unit.id).await?;
        if current.site_id != unit.site_id {
            self.engine.check_su_site_change(unit.id, unit.site_id).await?;
        }
        self.engine
            .check_su_identity(unit.site_id, unit.year, unit.number, Some(unit.id))
            .await?;

        let target = Some(RecordRef::new(RecordKind::StratigraphicUnit, unit.id));
        found(
            stored(self.units.update(&unit).await, target)?,
            RecordKind::StratigraphicUnit,
            unit.id,
        )
    }

    pub async fn delete_unit(&self, id: Uuid) -> StrataResult<()> {
        self.delete_subject(SubjectRef::stratigraphic_unit(id)).await
    }

    // ===== Stratigraphic relationships =====

    /// Stored in the direction given.
    pub async fn relate_units(
        &self,
        lft_su_id: Uuid,
        relation: StratigraphicRelation,
        rgt_su_id: Uuid,
    ) -> StrataResult<StratigraphicRelationship> {
        self.engine
            .check_su_relationship(lft_su_id, relation, rgt_su_id)
            .await?;

        let relationship = StratigraphicRelationship::new(lft_su_id, relation, rgt_su_id);
        let relationship = stored(self.relationships.create(&relationship).await, None)?;
        info!(
            relationship_id = %relationship.id,
            lft_su_id = %lft_su_id,
            relation = %relation,
            rgt_su_id = %rgt_su_id,
            "Related stratigraphic units"
        );
        Ok(relationship)
    }

    pub async fn unrelate_units(&self, relationship_id: Uuid) -> StrataResult<()> {
        let deleted = stored(self.relationships.delete(relationship_id).await, None)?;
        removed(deleted, RecordKind::StratigraphicRelationship, relationship_id)
    }

    /// Every relationship of a unit, read from that unit.
    pub async fn relationships_of(&self, su_id: Uuid) -> StrataResult<Vec<RelationView>> {
        self.get_unit(su_id).await?;
        let relationships = stored(self.relationships.find_by_unit(su_id).await, None)?;
        Ok(relationships
            .iter()
            .filter_map(|relationship| relationship.seen_from(su_id))
            .collect())
    }

    // ===== Contexts =====

    pub async fn get_context(&self, id: Uuid) -> StrataResult<Context> {
        found(stored(self.contexts.find_by_id(id).await, None)?, RecordKind::Context, id)
    }

    pub async fn contexts_of_site(&self, site_id: Uuid) -> StrataResult<Vec<Context>> {
        stored(self.contexts.find_by_site(site_id).await, None)
    }

    pub async fn create_context(&self, context: Context) -> StrataResult<Context> {
        validate_model(&context)?;
        self.engine
            .check_context_identity(context.site_id, &context.name, None)
            .await?;

        let context = stored(self.contexts.create(&context).await, None)?;
        info!(context_id = %context.id, site_id = %context.site_id, "Created context");
        Ok(context)
    }

    pub async fn update_context(&self, context: Context) -> StrataResult<Context> {
        validate_model(&context)?;
        let current = self.get_context(context.id).await?;
        if current.site_id != context.site_id {
            self.engine
                .check_context_site_change(context.id, context.site_id)
                .await?;
        }
        self.engine
            .check_context_identity(context.site_id, &context.name, Some(context.id))
            .await?;

        let target = Some(RecordRef::new(RecordKind::Context, context.id));
        found(
            stored(self.contexts.update(&context).await, target)?,
            RecordKind::Context,
            context.id,
        )
    }

    pub async fn delete_context(&self, id: Uuid) -> StrataResult<()> {
        self.delete_subject(SubjectRef::new(SubjectKind::Context, id)).await
    }

    pub async fn link_context_unit(&self, context_id: Uuid, su_id: Uuid) -> StrataResult<ContextStratigraphicUnit> {
        self.engine.check_context_su_link(context_id, su_id).await?;

        let link = ContextStratigraphicUnit::new(context_id, su_id);
        let link = stored(self.contexts.link_unit(&link).await, None)?;
        info!(context_id = %context_id, su_id = %su_id, "Linked stratigraphic unit to context");
        Ok(link)
    }

    pub async fn unlink_context_unit(&self, context_id: Uuid, su_id: Uuid) -> StrataResult<()> {
        let deleted = stored(self.contexts.unlink_unit(context_id, su_id).await, None)?;
        unlinked(
            deleted,
            RecordRef::new(RecordKind::Context, context_id),
            RecordRef::new(RecordKind::StratigraphicUnit, su_id),
        )
    }

    pub async fn units_of_context(&self, context_id: Uuid) -> StrataResult<Vec<ContextStratigraphicUnit>> {
        stored(self.contexts.units_of(context_id).await, None)
    }

    // ===== Samples =====

    pub async fn get_sample(&self, id: Uuid) -> StrataResult<Sample> {
        found(stored(self.samples.find_by_id(id).await, None)?, RecordKind::Sample, id)
    }

    pub async fn samples_of_site(&self, site_id: Uuid) -> StrataResult<Vec<Sample>> {
        stored(self.samples.find_by_site(site_id).await, None)
    }

    pub async fn create_sample(&self, sample: Sample) -> StrataResult<Sample> {
        validate_model(&sample)?;
        self.engine
            .check_sample_identity(sample.site_id, sample.sample_type, sample.year, sample.number, None)
            .await?;

        let sample = stored(self.samples.create(&sample).await, None)?;
        info!(sample_id = %sample.id, site_id = %sample.site_id, "Created sample");
        Ok(sample)
    }

    pub async fn update_sample(&self, sample: Sample) -> StrataResult<Sample> {
        validate_model(&sample)?;
        let current = self.get_sample(sample.id).await?;
        if current.site_id != sample.site_id {
            self.engine
                .check_sample_site_change(sample.id, sample.site_id)
                .await?;
        }
        self.engine
            .check_sample_identity(
                sample.site_id,
                sample.sample_type,
                sample.year,
                sample.number,
                Some(sample.id),
            )
            .await?;

        let target = Some(RecordRef::new(RecordKind::Sample, sample.id));
        found(
            stored(self.samples.update(&sample).await, target)?,
            RecordKind::Sample,
            sample.id,
        )
    }

    pub async fn delete_sample(&self, id: Uuid) -> StrataResult<()> {
        self.delete_subject(SubjectRef::new(SubjectKind::Sample, id)).await
    }

    pub async fn link_sample_unit(&self, sample_id: Uuid, su_id: Uuid) -> StrataResult<SampleStratigraphicUnit> {
        self.engine.check_sample_su_link(sample_id, su_id).await?;

        let link = SampleStratigraphicUnit::new(sample_id, su_id);
        let link = stored(self.samples.link_unit(&link).await, None)?;
        info!(sample_id = %sample_id, su_id = %su_id, "Linked stratigraphic unit to sample");
        Ok(link)
    }

    pub async fn unlink_sample_unit(&self, sample_id: Uuid, su_id: Uuid) -> StrataResult<()> {
        let deleted = stored(self.samples.unlink_unit(sample_id, su_id).await, None)?;
        unlinked(
            deleted,
            RecordRef::new(RecordKind::Sample, sample_id),
            RecordRef::new(RecordKind::StratigraphicUnit, su_id),
        )
    }

    // ===== Pottery =====

    pub async fn get_pottery(&self, id: Uuid) -> StrataResult<Pottery> {
        found(stored(self.potteries.find_by_id(id).await, None)?, RecordKind::Pottery, id)
    }

    pub async fn pottery_of_unit(&self, su_id: Uuid) -> StrataResult<Vec<Pottery>> {
        stored(self.potteries.find_by_unit(su_id).await, None)
    }

    pub async fn create_pottery(&self, pottery: Pottery) -> StrataResult<Pottery> {
        validate_model(&pottery)?;
        self.engine
            .check_pottery_inventory(pottery.su_id, &pottery.inventory, None)
            .await?;

        let pottery = stored(self.potteries.create(&pottery).await, None)?;
        info!(pottery_id = %pottery.id, inventory = %pottery.inventory, "Created pottery");
        Ok(pottery)
    }

    /// Moving a sherd to another unit re-checks its inventory in the new site.
    pub async fn update_pottery(&self, pottery: Pottery) -> StrataResult<Pottery> {
        validate_model(&pottery)?;
        self.get_pottery(pottery.id).await?;
        self.engine
            .check_pottery_inventory(pottery.su_id, &pottery.inventory, Some(pottery.id))
            .await?;

        let target = Some(RecordRef::new(RecordKind::Pottery, pottery.id));
        found(
            stored(self.potteries.update(&pottery).await, target)?,
            RecordKind::Pottery,
            pottery.id,
        )
    }

    pub async fn delete_pottery(&self, id: Uuid) -> StrataResult<()> {
        self.delete_subject(SubjectRef::new(SubjectKind::Pottery, id)).await
    }

    // ===== Zoological finds =====

    pub async fn get_zoo_bone(&self, id: Uuid) -> StrataResult<ZooBone> {
        found(stored(self.zoo.find_bone(id).await, None)?, RecordKind::ZooBone, id)
    }

    pub async fn create_zoo_bone(&self, bone: ZooBone) -> StrataResult<ZooBone> {
        validate_model(&bone)?;
        self.engine.check_find(bone.su_id).await?;
        let bone = stored(self.zoo.create_bone(&bone).await, None)?;
        info!(zoo_bone_id = %bone.id, su_id = %bone.su_id, "Created zoo bone");
        Ok(bone)
    }

    pub async fn update_zoo_bone(&self, bone: ZooBone) -> StrataResult<ZooBone> {
        validate_model(&bone)?;
        self.engine.check_find(bone.su_id).await?;
        let target = Some(RecordRef::new(RecordKind::ZooBone, bone.id));
        found(stored(self.zoo.update_bone(&bone).await, target)?, RecordKind::ZooBone, bone.id)
    }

    pub async fn delete_zoo_bone(&self, id: Uuid) -> StrataResult<()> {
        self.delete_subject(SubjectRef::new(SubjectKind::ZooBone, id)).await
    }

    pub async fn get_zoo_tooth(&self, id: Uuid) -> StrataResult<ZooTooth> {
        found(stored(self.zoo.find_tooth(id).await, None)?, RecordKind::ZooTooth, id)
    }

    pub async fn create_zoo_tooth(&self, tooth: ZooTooth) -> StrataResult<ZooTooth> {
        validate_model(&tooth)?;
        self.engine.check_find(tooth.su_id).await?;
        let tooth = stored(self.zoo.create_tooth(&tooth).await, None)?;
        info!(zoo_tooth_id = %tooth.id, su_id = %tooth.su_id, "Created zoo tooth");
        Ok(tooth)
    }

    pub async fn update_zoo_tooth(&self, tooth: ZooTooth) -> StrataResult<ZooTooth> {
        validate_model(&tooth)?;
        self.engine.check_find(tooth.su_id).await?;
        let target = Some(RecordRef::new(RecordKind::ZooTooth, tooth.id));
        found(stored(self.zoo.update_tooth(&tooth).await, target)?, RecordKind::ZooTooth, tooth.id)
    }

    pub async fn delete_zoo_tooth(&self, id: Uuid) -> StrataResult<()> {
        self.delete_subject(SubjectRef::new(SubjectKind::ZooTooth, id)).await
    }

    // ===== Botanical finds =====

    pub async fn get_botany_charcoal(&self, id: Uuid) -> StrataResult<BotanyCharcoal> {
        found(stored(self.botany.find_charcoal(id).await, None)?, RecordKind::BotanyCharcoal, id)
    }

    pub async fn create_botany_charcoal(&self, charcoal: BotanyCharcoal) -> StrataResult<BotanyCharcoal> {
        validate_model(&charcoal)?;
        self.engine.check_find(charcoal.su_id).await?;
        let charcoal = stored(self.botany.create_charcoal(&charcoal).await, None)?;
        info!(charcoal_id = %charcoal.id, su_id = %charcoal.su_id, "Created charcoal");
        Ok(charcoal)
    }

    pub async fn update_botany_charcoal(&self, charcoal: BotanyCharcoal) -> StrataResult<BotanyCharcoal> {
        validate_model(&charcoal)?;
        self.engine.check_find(charcoal.su_id).await?;
        let target = Some(RecordRef::new(RecordKind::BotanyCharcoal, charcoal.id));
        found(
            stored(self.botany.update_charcoal(&charcoal).await, target)?,
            RecordKind::BotanyCharcoal,
            charcoal.id,
        )
    }

    pub async fn delete_botany_charcoal(&self, id: Uuid) -> StrataResult<()> {
        self.delete_subject(SubjectRef::new(SubjectKind::BotanyCharcoal, id)).await
    }

    pub async fn get_botany_seed(&self, id: Uuid) -> StrataResult<BotanySeed> {
        found(stored(self.botany.find_seed(id).await, None)?, RecordKind::BotanySeed, id)
    }

    pub async fn create_botany_seed(&self, seed: BotanySeed) -> StrataResult<BotanySeed> {
        validate_model(&seed)?;
        self.engine.check_find(seed.su_id).await?;
        let seed = stored(self.botany.create_seed(&seed).await, None)?;
        info!(seed_id = %seed.id, su_id = %seed.su_id, "Created seed");
        Ok(seed)
    }

    pub async fn update_botany_seed(&self, seed: BotanySeed) -> StrataResult<BotanySeed> {
        validate_model(&seed)?;
        self.engine.check_find(seed.su_id).await?;
        let target = Some(RecordRef::new(RecordKind::BotanySeed, seed.id));
        found(
            stored(self.botany.update_seed(&seed).await, target)?,
            RecordKind::BotanySeed,
            seed.id,
        )
    }

    pub async fn delete_botany_seed(&self, id: Uuid) -> StrataResult<()> {
        self.delete_subject(SubjectRef::new(SubjectKind::BotanySeed, id)).await
    }

    // ===== Analyses =====

    pub async fn get_analysis(&self, id: Uuid) -> StrataResult<Analysis> {
        found(stored(self.analyses.find_by_id(id).await, None)?, RecordKind::Analysis, id)
    }

    pub async fn analyses_of(&self, subject: SubjectRef) -> StrataResult<Vec<Analysis>> {
        stored(self.analyses.find_by_subject(subject).await, None)
    }

    pub async fn create_analysis(&self, analysis: Analysis) -> StrataResult<Analysis> {
        validate_model(&analysis)?;
        self.engine
            .check_analysis_identity(analysis.analysis_type, &analysis.identifier, None)
            .await?;

        let analysis = stored(self.analyses.create(&analysis).await, None)?;
        info!(
            analysis_id = %analysis.id,
            analysis_type = %analysis.analysis_type,
            identifier = %analysis.identifier,
            "Created analysis"
        );
        Ok(analysis)
    }

    pub async fn update_analysis(&self, analysis: Analysis) -> StrataResult<Analysis> {
        validate_model(&analysis)?;
        let current = self.get_analysis(analysis.id).await?;
        self.engine
            .check_analysis_status(current.status, analysis.status)?;
        self.engine
            .check_analysis_type_change(analysis.id, analysis.analysis_type)
            .await?;
        self.engine
            .check_analysis_identity(analysis.analysis_type, &analysis.identifier, Some(analysis.id))
            .await?;

        let target = Some(RecordRef::new(RecordKind::Analysis, analysis.id));
        found(
            stored(self.analyses.update(&analysis).await, target)?,
            RecordKind::Analysis,
            analysis.id,
        )
    }

    pub async fn set_analysis_status(&self, id: Uuid, status: AnalysisStatus) -> StrataResult<Analysis> {
        let current = self.get_analysis(id).await?;
        self.engine.check_analysis_status(current.status, status)?;

        let analysis = found(
            stored(self.analyses.update_status(id, status).await, None)?,
            RecordKind::Analysis,
            id,
        )?;
        info!(analysis_id = %id, from = %current.status, to = %status, "Changed analysis status");
        Ok(analysis)
    }

    pub async fn delete_analysis(&self, id: Uuid) -> StrataResult<()> {
        self.get_analysis(id).await?;
        self.engine.check_analysis_deletion(id).await?;
        let target = Some(RecordRef::new(RecordKind::Analysis, id));
        let deleted = stored(self.analyses.delete(id).await, target)?;
        removed(deleted, RecordKind::Analysis, id)
    }

    pub async fn link_analysis_subject(
        &self,
        analysis_id: Uuid,
        subject: SubjectRef,
        summary: Option<String>,
    ) -> StrataResult<AnalysisSubject> {
        let mut link = AnalysisSubject::new(analysis_id, subject);
        link.summary = summary;
        validate_model(&link)?;
        self.engine.check_analysis_subject(analysis_id, subject).await?;

        let link = stored(self.analyses.add_subject(&link).await, None)?;
        info!(analysis_id = %analysis_id, subject = %subject, "Linked analysis subject");
        Ok(link)
    }

    pub async fn unlink_analysis_subject(&self, analysis_id: Uuid, subject: SubjectRef) -> StrataResult<()> {
        let deleted = stored(self.analyses.remove_subject(analysis_id, subject).await, None)?;
        unlinked(deleted, RecordRef::new(RecordKind::Analysis, analysis_id), subject.record())
    }

    pub async fn subjects_of_analysis(&self, analysis_id: Uuid) -> StrataResult<Vec<AnalysisSubject>> {
        stored(self.analyses.subjects_of(analysis_id).await, None)
    }

    // ===== Media objects =====

    pub async fn get_media(&self, id: Uuid) -> StrataResult<MediaObject> {
        found(stored(self.media.find_by_id(id).await, None)?, RecordKind::MediaObject, id)
    }

    pub async fn media_of(&self, subject: SubjectRef) -> StrataResult<Vec<MediaObject>> {
        stored(self.media.find_by_subject(subject).await, None)
    }

    /// Registers a file by its content hash. The bytes themselves are not kept.
    pub async fn register_media(
        &self,
        original_filename: &str,
        mime_type: &str,
        content: &[u8],
        description: Option<String>,
    ) -> StrataResult<MediaObject> {
        let mut media = MediaObject::from_bytes(original_filename, mime_type, content);
        media.description = description;
        validate_model(&media)?;
        self.engine.check_media_identity(&media.sha256).await?;

        let media = stored(self.media.create(&media).await, None)?;
        info!(media_id = %media.id, sha256 = %media.sha256, size_bytes = media.size_bytes, "Registered media object");
        Ok(media)
    }

    pub async fn update_media(&self, media: MediaObject) -> StrataResult<MediaObject> {
        validate_model(&media)?;
        let target = Some(RecordRef::new(RecordKind::MediaObject, media.id));
        found(
            stored(self.media.update(&media).await, target)?,
            RecordKind::MediaObject,
            media.id,
        )
    }

    pub async fn delete_media(&self, id: Uuid) -> StrataResult<()> {
        self.get_media(id).await?;
        self.engine.check_media_deletion(id).await?;
        let target = Some(RecordRef::new(RecordKind::MediaObject, id));
        let deleted = stored(self.media.delete(id).await, target)?;
        removed(deleted, RecordKind::MediaObject, id)
    }

    pub async fn link_media_subject(
        &self,
        media_object_id: Uuid,
        subject: SubjectRef,
        description: Option<String>,
    ) -> StrataResult<MediaObjectSubject> {
        let mut link = MediaObjectSubject::new(media_object_id, subject);
        link.description = description;
        validate_model(&link)?;
        self.engine.check_media_subject(media_object_id, subject).await?;

        let link = stored(self.media.add_subject(&link).await, None)?;
        info!(media_id = %media_object_id, subject = %subject, "Linked media subject");
        Ok(link)
    }

    pub async fn unlink_media_subject(&self, media_object_id: Uuid, subject: SubjectRef) -> StrataResult<()> {
        let deleted = stored(self.media.remove_subject(media_object_id, subject).await, None)?;
        unlinked(deleted, RecordRef::new(RecordKind::MediaObject, media_object_id), subject.record())
    }

    pub async fn subjects_of_media(&self, media_object_id: Uuid) -> StrataResult<Vec<MediaObjectSubject>> {
        stored(self.media.subjects_of(media_object_id).await, None)
    }
}
