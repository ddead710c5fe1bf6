//! Catalogue integration tests.
//!
//! Need a PostgreSQL database in `DATABASE_URL`; run with `cargo test -- --ignored`.

use std::time::{Duration, Instant};

use strata_catalogue::{CatalogueService, ConsistencyAuditor};
use strata_database::{
    initialize_database, violation_in_chain, AnalysisRepository, AuditRepository, DatabaseConfig,
    PostgresPool, RelationshipRepository, SiteRepository, StratigraphicUnitRepository,
};
use strata_models::{
    Analysis, AnalysisStatus, AnalysisSubject, AnalysisType, BotanyCharcoal, ConsistencyViolation,
    Context, ContextType, Dependent, Pottery, RecordKind, RecordRef, SampleType, Site,
    StratigraphicRelation, StratigraphicRelationship, StratigraphicUnit, SubjectKind, SubjectRef,
    ZooBone,
};
use strata_utils::StrataError;
use uuid::Uuid;

async fn pool() -> PostgresPool {
    let config = DatabaseConfig {
        postgres_url: std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
        max_connections: 4,
        connection_timeout: Duration::from_secs(10),
        run_migrations: true,
    };
    initialize_database(&config).await.expect("database should initialize")
}

fn violation(error: StrataError) -> ConsistencyViolation {
    match error {
        StrataError::Consistency(violation) => violation,
        other => panic!("expected a consistency violation, got {:?}", other),
    }
}

fn raised(error: anyhow::Error) -> ConsistencyViolation {
    violation_in_chain(&error, None).expect("trigger should raise a violation")
}

/// Site codes are short, so retry on the rare clash with an earlier run.
async fn fresh_site(service: &CatalogueService) -> Site {
    for _ in 0..50 {
        let bytes = Uuid::new_v4().into_bytes();
        let code: String = bytes[..3].iter().map(|b| (b'A' + b % 26) as char).collect();
        let site = Site::new(code, format!("Test site {}", Uuid::new_v4()));
        match service.create_site(site).await {
            Ok(site) => return site,
            Err(StrataError::Consistency(ConsistencyViolation::DuplicateIdentity { .. })) => continue,
            Err(other) => panic!("site creation failed: {:?}", other),
        }
    }
    panic!("no free site code found");
}

async fn unit(service: &CatalogueService, site: &Site, number: i32) -> StratigraphicUnit {
    service
        .create_unit(StratigraphicUnit::new(site.id, 2024, number))
        .await
        .expect("unit should be created")
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_cross_site_context_link_is_rejected() {
    let service = CatalogueService::new(pool().await);
    let (north, south) = (fresh_site(&service).await, fresh_site(&service).await);
    let su = unit(&service, &north, 1).await;
    let context = service
        .create_context(Context::new(south.id, ContextType::Layer, "Layer 1"))
        .await
        .unwrap();

    let error = service.link_context_unit(context.id, su.id).await.unwrap_err();
    match violation(error) {
        ConsistencyViolation::SiteMismatch { left_site, right_site, .. } => {
            assert_eq!(left_site, south.id);
            assert_eq!(right_site, north.id);
        }
        other => panic!("unexpected violation {:?}", other),
    }
}

#[tokio::test]
#[ignore]
async fn test_trigger_rejects_cross_site_relationship() {
    let pool = pool().await;
    let service = CatalogueService::new(pool.clone());
    let (north, south) = (fresh_site(&service).await, fresh_site(&service).await);
    let a = unit(&service, &north, 1).await;
    let b = unit(&service, &south, 1).await;

    // Straight to the repository, so only the trigger stands in the way.
    let relationships = RelationshipRepository::new(pool);
    let relationship = StratigraphicRelationship::new(a.id, StratigraphicRelation::Covers, b.id);
    let error = relationships.create(&relationship).await.unwrap_err();

    let from_trigger = raised(error);
    assert_eq!(from_trigger.code(), "site_mismatch");

    let from_engine = violation(
        service
            .relate_units(a.id, StratigraphicRelation::Covers, b.id)
            .await
            .unwrap_err(),
    );
    assert_eq!(from_engine, from_trigger);
}

#[tokio::test]
#[ignore]
async fn test_cycle_is_rejected_by_both_layers() {
    let pool = pool().await;
    let service = CatalogueService::new(pool.clone());
    let site = fresh_site(&service).await;
    let (a, b, c) = (
        unit(&service, &site, 1).await,
        unit(&service, &site, 2).await,
        unit(&service, &site, 3).await,
    );

    service.relate_units(a.id, StratigraphicRelation::Covers, b.id).await.unwrap();
    service.relate_units(b.id, StratigraphicRelation::Cuts, c.id).await.unwrap();

    let error = service
        .relate_units(c.id, StratigraphicRelation::Covers, a.id)
        .await
        .unwrap_err();
    let from_engine = violation(error);
    match &from_engine {
        ConsistencyViolation::StratigraphicCycle { path, .. } => {
            assert_eq!(path, &vec![c.id, a.id, b.id, c.id]);
        }
        other => panic!("unexpected violation {:?}", other),
    }

    let relationships = RelationshipRepository::new(pool);
    let closing = StratigraphicRelationship::new(c.id, StratigraphicRelation::Covers, a.id);
    let from_trigger = raised(relationships.create(&closing).await.unwrap_err());
    assert_eq!(from_trigger, from_engine);

    // Read from the other side the same loop still closes at c.
    let inverse = StratigraphicRelationship::new(a.id, StratigraphicRelation::CoveredBy, c.id);
    match raised(relationships.create(&inverse).await.unwrap_err()) {
        ConsistencyViolation::StratigraphicCycle { lft_su_id, path, .. } => {
            assert_eq!(lft_su_id, a.id);
            assert_eq!(path, vec![c.id, a.id, b.id, c.id]);
        }
        other => panic!("unexpected violation {:?}", other),
    }
}

#[tokio::test]
#[ignore]
async fn test_cycle_check_scales_over_layered_sequence() {
    const LAYERS: i32 = 20;

    let pool = pool().await;
    let service = CatalogueService::new(pool.clone());
    let site = fresh_site(&service).await;

    let mut layers = Vec::new();
    for layer in 0..LAYERS {
        layers.push([
            unit(&service, &site, layer * 2 + 1).await,
            unit(&service, &site, layer * 2 + 2).await,
        ]);
    }
    // Every unit covers both units of the layer below: 2^19 distinct chains
    // from the top layer to the bottom one.
    for pair in layers.windows(2) {
        for upper in &pair[0] {
            for lower in &pair[1] {
                service
                    .relate_units(upper.id, StratigraphicRelation::Covers, lower.id)
                    .await
                    .unwrap();
            }
        }
    }

    let top = unit(&service, &site, LAYERS * 2 + 1).await;
    let relationships = RelationshipRepository::new(pool);

    let started = Instant::now();
    relationships
        .create(&StratigraphicRelationship::new(top.id, StratigraphicRelation::Covers, layers[0][0].id))
        .await
        .unwrap();
    let elapsed = started.elapsed();
    assert!(elapsed < Duration::from_secs(1), "insert took {:?}", elapsed);

    // Closing the loop from the bottom is caught with the same chain by both layers.
    let bottom = layers[LAYERS as usize - 1][1].id;
    let started = Instant::now();
    let from_trigger = raised(
        relationships
            .create(&StratigraphicRelationship::new(bottom, StratigraphicRelation::Covers, top.id))
            .await
            .unwrap_err(),
    );
    assert!(started.elapsed() < Duration::from_secs(1));

    let from_engine = violation(
        service
            .relate_units(bottom, StratigraphicRelation::Covers, top.id)
            .await
            .unwrap_err(),
    );
    assert_eq!(from_trigger, from_engine);
    match from_engine {
        ConsistencyViolation::StratigraphicCycle { path, .. } => {
            assert_eq!(path.len(), LAYERS as usize + 2);
            assert_eq!(path.first(), Some(&bottom));
            assert_eq!(path.last(), Some(&bottom));
        }
        other => panic!("unexpected violation {:?}", other),
    }
}

#[tokio::test]
#[ignore]
async fn test_relationship_reads_from_either_side() {
    let pool = pool().await;
    let service = CatalogueService::new(pool.clone());
    let relationships = RelationshipRepository::new(pool);
    let site = fresh_site(&service).await;
    let (a, b) = (unit(&service, &site, 1).await, unit(&service, &site, 2).await);

    service.relate_units(a.id, StratigraphicRelation::Fills, b.id).await.unwrap();

    let from_b = service.relationships_of(b.id).await.unwrap();
    assert_eq!(from_b.len(), 1);
    assert_eq!(from_b[0].relation, StratigraphicRelation::FilledBy);
    assert_eq!(from_b[0].other_su_id, a.id);

    let error = service
        .relate_units(b.id, StratigraphicRelation::FilledBy, a.id)
        .await
        .unwrap_err();
    let from_engine = violation(error);
    assert_eq!(
        from_engine,
        ConsistencyViolation::DuplicateRelationship {
            lft_su_id: b.id,
            rgt_su_id: a.id,
            existing: Some(StratigraphicRelation::FilledBy),
        }
    );

    let repeated = StratigraphicRelationship::new(b.id, StratigraphicRelation::FilledBy, a.id);
    let from_trigger = raised(relationships.create(&repeated).await.unwrap_err());
    assert_eq!(from_trigger, from_engine);
}

#[tokio::test]
#[ignore]
async fn test_pottery_inventory_unique_per_site() {
    let service = CatalogueService::new(pool().await);
    let (north, south) = (fresh_site(&service).await, fresh_site(&service).await);
    let (n1, n2) = (unit(&service, &north, 1).await, unit(&service, &north, 2).await);
    let s1 = unit(&service, &south, 1).await;

    service.create_pottery(Pottery::new(n1.id, "P-001")).await.unwrap();
    service.create_pottery(Pottery::new(s1.id, "P-001")).await.unwrap();

    let error = service.create_pottery(Pottery::new(n2.id, "P-001")).await.unwrap_err();
    assert_eq!(violation(error).code(), "duplicate_identity");
}

#[tokio::test]
#[ignore]
async fn test_deletion_reports_dependents() {
    let pool = pool().await;
    let service = CatalogueService::new(pool.clone());
    let site = fresh_site(&service).await;
    let su = unit(&service, &site, 1).await;
    service.create_pottery(Pottery::new(su.id, "P-100")).await.unwrap();
    service.create_zoo_bone(ZooBone::new(su.id, "Bos taurus", "femur")).await.unwrap();

    let from_engine = violation(service.delete_unit(su.id).await.unwrap_err());
    match &from_engine {
        ConsistencyViolation::DeletionBlocked { record, dependents } => {
            assert_eq!(record.kind, RecordKind::StratigraphicUnit);
            assert_eq!(
                dependents,
                &vec![Dependent::new("potteries", 1), Dependent::new("zoo_bones", 1)]
            );
        }
        other => panic!("unexpected violation {:?}", other),
    }

    // The trigger gives the same answer when the check is skipped.
    let error = StratigraphicUnitRepository::new(pool.clone()).delete(su.id).await.unwrap_err();
    assert_eq!(raised(error), from_engine);

    let from_engine = violation(service.delete_site(site.id).await.unwrap_err());
    let error = SiteRepository::new(pool).delete(site.id).await.unwrap_err();
    assert_eq!(raised(error), from_engine);
}

#[tokio::test]
#[ignore]
async fn test_deleting_missing_records_is_not_found() {
    let service = CatalogueService::new(pool().await);

    for error in [
        service.delete_site(Uuid::new_v4()).await.unwrap_err(),
        service.delete_unit(Uuid::new_v4()).await.unwrap_err(),
        service.delete_analysis(Uuid::new_v4()).await.unwrap_err(),
        service.delete_media(Uuid::new_v4()).await.unwrap_err(),
    ] {
        assert!(matches!(error, StrataError::NotFound { .. }), "got {:?}", error);
        assert_eq!(error.http_status_code(), 404);
    }

    let site = fresh_site(&service).await;
    let su = unit(&service, &site, 1).await;
    let context = service
        .create_context(Context::new(site.id, ContextType::Layer, "Layer 1"))
        .await
        .unwrap();
    let error = service.unlink_context_unit(context.id, su.id).await.unwrap_err();
    assert_eq!(error.http_status_code(), 404);
    assert!(error.to_string().contains(&su.id.to_string()));
}

#[tokio::test]
#[ignore]
async fn test_unit_can_not_leave_site_while_linked() {
    let service = CatalogueService::new(pool().await);
    let (north, south) = (fresh_site(&service).await, fresh_site(&service).await);
    let su = unit(&service, &north, 1).await;
    let sample = service
        .create_sample(strata_models::Sample::new(north.id, SampleType::Sediment, 2024, 1))
        .await
        .unwrap();
    service.link_sample_unit(sample.id, su.id).await.unwrap();

    let mut moved = su.clone();
    moved.site_id = south.id;
    let error = service.update_unit(moved).await.unwrap_err();
    assert_eq!(violation(error).code(), "site_reassignment");

    service.unlink_sample_unit(sample.id, su.id).await.unwrap();
    let mut moved = su.clone();
    moved.site_id = south.id;
    let moved = service.update_unit(moved).await.unwrap();
    assert_eq!(moved.site_id, south.id);
}

#[tokio::test]
#[ignore]
async fn test_site_reassignment_matches_across_layers() {
    let pool = pool().await;
    let service = CatalogueService::new(pool.clone());
    let (north, south) = (fresh_site(&service).await, fresh_site(&service).await);
    let (su, other) = (unit(&service, &north, 1).await, unit(&service, &north, 2).await);
    service.relate_units(su.id, StratigraphicRelation::Covers, other.id).await.unwrap();
    service.create_pottery(Pottery::new(su.id, "P-300")).await.unwrap();
    service
        .create_botany_charcoal(BotanyCharcoal::new(su.id, "Quercus", 3))
        .await
        .unwrap();

    let mut moved = su.clone();
    moved.site_id = south.id;
    let from_engine = violation(service.update_unit(moved.clone()).await.unwrap_err());
    assert_eq!(
        from_engine,
        ConsistencyViolation::SiteReassignment {
            record: RecordRef::new(RecordKind::StratigraphicUnit, su.id),
            dependents: vec![
                Dependent::new("stratigraphic_relationships", 1),
                Dependent::new("potteries", 1),
                Dependent::new("botany_charcoals", 1),
            ],
        }
    );

    let error = StratigraphicUnitRepository::new(pool).update(&moved).await.unwrap_err();
    assert_eq!(raised(error), from_engine);
}

#[tokio::test]
#[ignore]
async fn test_analysis_subjects_and_status() {
    let pool = pool().await;
    let service = CatalogueService::new(pool.clone());
    let site = fresh_site(&service).await;
    let su = unit(&service, &site, 1).await;
    let pottery = service.create_pottery(Pottery::new(su.id, "P-200")).await.unwrap();
    let bone = service
        .create_zoo_bone(ZooBone::new(su.id, "Ovis aries", "tibia"))
        .await
        .unwrap();

    let analysis = service
        .create_analysis(Analysis::new(AnalysisType::Radiocarbon, Uuid::new_v4().to_string(), 2024))
        .await
        .unwrap();

    service
        .link_analysis_subject(analysis.id, SubjectRef::new(SubjectKind::ZooBone, bone.id), None)
        .await
        .unwrap();
    let pottery_ref = SubjectRef::new(SubjectKind::Pottery, pottery.id);
    let error = service
        .link_analysis_subject(analysis.id, pottery_ref, None)
        .await
        .unwrap_err();
    let from_engine = violation(error);
    assert_eq!(
        from_engine,
        ConsistencyViolation::SubjectNotAdmitted {
            analysis_type: AnalysisType::Radiocarbon,
            subject_kind: SubjectKind::Pottery,
        }
    );

    let error = AnalysisRepository::new(pool)
        .add_subject(&AnalysisSubject::new(analysis.id, pottery_ref))
        .await
        .unwrap_err();
    assert_eq!(raised(error), from_engine);

    let error = service.delete_zoo_bone(bone.id).await.unwrap_err();
    assert_eq!(violation(error).code(), "deletion_blocked");

    let running = service
        .set_analysis_status(analysis.id, AnalysisStatus::InProgress)
        .await
        .unwrap();
    assert_eq!(running.status, AnalysisStatus::InProgress);
    let error = service
        .set_analysis_status(analysis.id, AnalysisStatus::Planned)
        .await
        .unwrap_err();
    assert_eq!(violation(error).code(), "illegal_status_transition");
}

#[tokio::test]
#[ignore]
async fn test_media_registered_once_per_content() {
    let service = CatalogueService::new(pool().await);
    let content = Uuid::new_v4().as_bytes().to_vec();

    let media = service
        .register_media("section.jpg", "image/jpeg", &content, None)
        .await
        .unwrap();
    assert_eq!(media.size_bytes, content.len() as i64);

    let error = service
        .register_media("copy.jpg", "image/jpeg", &content, None)
        .await
        .unwrap_err();
    assert_eq!(violation(error).code(), "duplicate_identity");
}

#[tokio::test]
#[ignore]
async fn test_audit_runs_clean_over_triggered_writes() {
    let pool = pool().await;
    let service = CatalogueService::new(pool.clone());
    let site = fresh_site(&service).await;
    let (a, b) = (unit(&service, &site, 1).await, unit(&service, &site, 2).await);
    service.relate_units(a.id, StratigraphicRelation::Covers, b.id).await.unwrap();

    let report = ConsistencyAuditor::new(AuditRepository::new(pool), 100)
        .run()
        .await
        .unwrap();
    assert!(report
        .findings
        .iter()
        .all(|finding| !finding.records.contains(&a.id) && !finding.records.contains(&b.id)));
}
