//! Lookups the consistency engine needs to decide whether a write keeps the
//! catalogue consistent.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use strata_models::{
    AnalysisType, Dependent, RecordKind, RecordRef, SampleType, StratigraphicRelationship,
    SubjectKind, SubjectRef,
};
use uuid::Uuid;

use crate::repositories::stratigraphic_unit::RelationshipRow;

/// Read-only view over the catalogue used by the consistency checks.
///
/// `exclude` arguments name the record being updated so it does not collide
/// with itself.
#[async_trait]
pub trait ScopeLookup: Send + Sync {
    /// Site a subject belongs to, `None` when the subject does not exist.
    async fn site_of(&self, subject: SubjectRef) -> Result<Option<Uuid>>;

    async fn analysis_type(&self, analysis_id: Uuid) -> Result<Option<AnalysisType>>;

    /// Distinct kinds of the subjects already linked to an analysis.
    async fn analysis_subject_kinds(&self, analysis_id: Uuid) -> Result<Vec<SubjectKind>>;

    async fn media_exists(&self, media_id: Uuid) -> Result<bool>;

    async fn site_code_taken(&self, code: &str, exclude: Option<Uuid>) -> Result<bool>;

    async fn site_name_taken(&self, name: &str, exclude: Option<Uuid>) -> Result<bool>;

    async fn su_identity_taken(
        &self,
        site_id: Uuid,
        year: i32,
        number: i32,
        exclude: Option<Uuid>,
    ) -> Result<bool>;

    async fn context_name_taken(&self, site_id: Uuid, name: &str, exclude: Option<Uuid>) -> Result<bool>;

    async fn sample_identity_taken(
        &self,
        site_id: Uuid,
        sample_type: SampleType,
        year: i32,
        number: i32,
        exclude: Option<Uuid>,
    ) -> Result<bool>;

    async fn inventory_taken(&self, site_id: Uuid, inventory: &str, exclude: Option<Uuid>) -> Result<bool>;

    async fn analysis_identity_taken(
        &self,
        analysis_type: AnalysisType,
        identifier: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool>;

    async fn media_hash_taken(&self, sha256: &str) -> Result<bool>;

    async fn context_su_linked(&self, context_id: Uuid, su_id: Uuid) -> Result<bool>;

    async fn sample_su_linked(&self, sample_id: Uuid, su_id: Uuid) -> Result<bool>;

    /// Any relationship between the two units, whichever way it was recorded.
    async fn relationship_between(&self, a: Uuid, b: Uuid) -> Result<Option<StratigraphicRelationship>>;

    /// `(later, earlier)` pairs for every ordering relationship in a site.
    async fn precedence_edges(&self, site_id: Uuid) -> Result<Vec<(Uuid, Uuid)>>;

    async fn analysis_subject_linked(&self, analysis_id: Uuid, subject: SubjectRef) -> Result<bool>;

    async fn media_subject_linked(&self, media_id: Uuid, subject: SubjectRef) -> Result<bool>;

    /// Relations that would block deleting `record`, with non-zero counts only.
    async fn deletion_dependents(&self, record: RecordRef) -> Result<Vec<Dependent>>;

    /// Relations that tie `record` to its current site, with non-zero counts only.
    async fn site_dependents(&self, record: RecordRef) -> Result<Vec<Dependent>>;
}

/// A named count query over one dependent relation. `$1` is the record id.
#[derive(Debug, Clone, Copy)]
pub struct DependentQuery {
    pub relation: &'static str,
    pub sql: &'static str,
}

const fn dependent(relation: &'static str, sql: &'static str) -> DependentQuery {
    DependentQuery { relation, sql }
}

const SITE_DELETION: &[DependentQuery] = &[
    dependent("stratigraphic_units", "SELECT COUNT(*) FROM stratigraphic_units WHERE site_id = $1"),
    dependent("contexts", "SELECT COUNT(*) FROM contexts WHERE site_id = $1"),
    dependent("samples", "SELECT COUNT(*) FROM samples WHERE site_id = $1"),
];

const SU_FINDS: &[DependentQuery] = &[
    dependent("context_stratigraphic_units", "SELECT COUNT(*) FROM context_stratigraphic_units WHERE su_id = $1"),
    dependent("sample_stratigraphic_units", "SELECT COUNT(*) FROM sample_stratigraphic_units WHERE su_id = $1"),
    dependent("potteries", "SELECT COUNT(*) FROM potteries WHERE su_id = $1"),
    dependent("zoo_bones", "SELECT COUNT(*) FROM zoo_bones WHERE su_id = $1"),
    dependent("zoo_teeth", "SELECT COUNT(*) FROM zoo_teeth WHERE su_id = $1"),
    dependent("botany_charcoals", "SELECT COUNT(*) FROM botany_charcoals WHERE su_id = $1"),
    dependent("botany_seeds", "SELECT COUNT(*) FROM botany_seeds WHERE su_id = $1"),
];

const SU_SITE_BOUND: &[DependentQuery] = &[
    dependent("context_stratigraphic_units", "SELECT COUNT(*) FROM context_stratigraphic_units WHERE su_id = $1"),
    dependent("sample_stratigraphic_units", "SELECT COUNT(*) FROM sample_stratigraphic_units WHERE su_id = $1"),
    dependent(
        "stratigraphic_relationships",
        "SELECT COUNT(*) FROM stratigraphic_relationships WHERE lft_su_id = $1 OR rgt_su_id = $1",
    ),
    dependent("potteries", "SELECT COUNT(*) FROM potteries WHERE su_id = $1"),
    dependent("zoo_bones", "SELECT COUNT(*) FROM zoo_bones WHERE su_id = $1"),
    dependent("zoo_teeth", "SELECT COUNT(*) FROM zoo_teeth WHERE su_id = $1"),
    dependent("botany_charcoals", "SELECT COUNT(*) FROM botany_charcoals WHERE su_id = $1"),
    dependent("botany_seeds", "SELECT COUNT(*) FROM botany_seeds WHERE su_id = $1"),
];

const CONTEXT_SITE_BOUND: &[DependentQuery] = &[dependent(
    "context_stratigraphic_units",
    "SELECT COUNT(*) FROM context_stratigraphic_units WHERE context_id = $1",
)];

const SAMPLE_SITE_BOUND: &[DependentQuery] = &[dependent(
    "sample_stratigraphic_units",
    "SELECT COUNT(*) FROM sample_stratigraphic_units WHERE sample_id = $1",
)];

/// Rows owned through a restricting foreign key. Join rows that cascade with
/// their owner are not listed.
pub fn deletion_queries(kind: RecordKind) -> &'static [DependentQuery] {
    match kind {
        RecordKind::Site => SITE_DELETION,
        RecordKind::StratigraphicUnit => SU_FINDS,
        _ => &[],
    }
}

pub fn site_bound_queries(kind: RecordKind) -> &'static [DependentQuery] {
    match kind {
        RecordKind::StratigraphicUnit => SU_SITE_BOUND,
        RecordKind::Context => CONTEXT_SITE_BOUND,
        RecordKind::Sample => SAMPLE_SITE_BOUND,
        _ => &[],
    }
}

/// Every kind that can be a subject also loses its analysis and media links.
fn subject_kind_of(kind: RecordKind) -> Option<SubjectKind> {
    SubjectKind::ALL
        .iter()
        .copied()
        .find(|subject| RecordKind::from(*subject) == kind)
}

/// SQL-backed [`ScopeLookup`].
#[derive(Clone)]
pub struct ScopeRepository {
    pool: PgPool,
}

impl ScopeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, sql: &str, id: Uuid) -> Result<bool> {
        let found: bool = sqlx::query_scalar(sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }

    async fn count_all(&self, queries: &[DependentQuery], id: Uuid) -> Result<Vec<Dependent>> {
        let mut dependents = Vec::new();
        for query in queries {
            let count: i64 = sqlx::query_scalar(query.sql)
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .with_context(|| format!("Failed to count {}", query.relation))?;
            if count > 0 {
                dependents.push(Dependent::new(query.relation, count));
            }
        }
        Ok(dependents)
    }

    async fn count_subject_links(&self, table: &str, subject: SubjectRef) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE subject_kind = $1 AND subject_id = $2",
            table
        );
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(subject.kind.as_str())
            .bind(subject.id)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to count {}", table))?;
        Ok(count)
    }
}

#[async_trait]
impl ScopeLookup for ScopeRepository {
    async fn site_of(&self, subject: SubjectRef) -> Result<Option<Uuid>> {
        let table = subject.kind.table_name();
        let sql = match subject.kind {
            SubjectKind::Site => "SELECT id FROM sites WHERE id = $1".to_string(),
            kind if kind.is_su_scoped() => format!(
                "SELECT su.site_id FROM {} f JOIN stratigraphic_units su ON su.id = f.su_id WHERE f.id = $1",
                table
            ),
            _ => format!("SELECT site_id FROM {} WHERE id = $1", table),
        };

        let site_id: Option<Uuid> = sqlx::query_scalar(&sql)
            .bind(subject.id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to resolve site of {}", subject))?;
        Ok(site_id)
    }

    async fn analysis_type(&self, analysis_id: Uuid) -> Result<Option<AnalysisType>> {
        let stored: Option<String> =
            sqlx::query_scalar("SELECT analysis_type FROM analyses WHERE id = $1")
                .bind(analysis_id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to fetch analysis type")?;
        stored.map(|text| text.parse().map_err(anyhow::Error::from)).transpose()
    }

    async fn analysis_subject_kinds(&self, analysis_id: Uuid) -> Result<Vec<SubjectKind>> {
        let kinds: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT subject_kind FROM analysis_subjects WHERE analysis_id = $1 ORDER BY subject_kind",
        )
        .bind(analysis_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch analysis subject kinds")?;
        kinds
            .iter()
            .map(|kind| kind.parse().map_err(anyhow::Error::from))
            .collect()
    }

    async fn media_exists(&self, media_id: Uuid) -> Result<bool> {
        self.exists("SELECT EXISTS (SELECT 1 FROM media_objects WHERE id = $1)", media_id)
            .await
    }

    async fn site_code_taken(&self, code: &str, exclude: Option<Uuid>) -> Result<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM sites WHERE code = $1 AND id IS DISTINCT FROM $2)",
        )
        .bind(code)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn site_name_taken(&self, name: &str, exclude: Option<Uuid>) -> Result<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM sites WHERE name = $1 AND id IS DISTINCT FROM $2)",
        )
        .bind(name)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn su_identity_taken(
        &self,
        site_id: Uuid,
        year: i32,
        number: i32,
        exclude: Option<Uuid>,
    ) -> Result<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM stratigraphic_units
                WHERE site_id = $1 AND year = $2 AND number = $3 AND id IS DISTINCT FROM $4
            )
            "#,
        )
        .bind(site_id)
        .bind(year)
        .bind(number)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn context_name_taken(&self, site_id: Uuid, name: &str, exclude: Option<Uuid>) -> Result<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM contexts
                WHERE site_id = $1 AND name = $2 AND id IS DISTINCT FROM $3
            )
            "#,
        )
        .bind(site_id)
        .bind(name)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn sample_identity_taken(
        &self,
        site_id: Uuid,
        sample_type: SampleType,
        year: i32,
        number: i32,
        exclude: Option<Uuid>,
    ) -> Result<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM samples
                WHERE site_id = $1 AND sample_type = $2 AND year = $3 AND number = $4
                  AND id IS DISTINCT FROM $5
            )
            "#,
        )
        .bind(site_id)
        .bind(sample_type.as_str())
        .bind(year)
        .bind(number)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn inventory_taken(&self, site_id: Uuid, inventory: &str, exclude: Option<Uuid>) -> Result<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM potteries p
                JOIN stratigraphic_units su ON su.id = p.su_id
                WHERE su.site_id = $1 AND p.inventory = $2 AND p.id IS DISTINCT FROM $3
            )
            "#,
        )
        .bind(site_id)
        .bind(inventory)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn analysis_identity_taken(
        &self,
        analysis_type: AnalysisType,
        identifier: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM analyses
                WHERE analysis_type = $1 AND identifier = $2 AND id IS DISTINCT FROM $3
            )
            "#,
        )
        .bind(analysis_type.as_str())
        .bind(identifier)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn media_hash_taken(&self, sha256: &str) -> Result<bool> {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM media_objects WHERE sha256 = $1)")
                .bind(sha256)
                .fetch_one(&self.pool)
                .await?;
        Ok(taken)
    }

    async fn context_su_linked(&self, context_id: Uuid, su_id: Uuid) -> Result<bool> {
        let linked: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM context_stratigraphic_units WHERE context_id = $1 AND su_id = $2)",
        )
        .bind(context_id)
        .bind(su_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(linked)
    }

    async fn sample_su_linked(&self, sample_id: Uuid, su_id: Uuid) -> Result<bool> {
        let linked: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM sample_stratigraphic_units WHERE sample_id = $1 AND su_id = $2)",
        )
        .bind(sample_id)
        .bind(su_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(linked)
    }

    async fn relationship_between(&self, a: Uuid, b: Uuid) -> Result<Option<StratigraphicRelationship>> {
        let row: Option<RelationshipRow> = sqlx::query_as(
            r#"
            SELECT id, lft_su_id, relation, rgt_su_id, created_at
            FROM stratigraphic_relationships
            WHERE (lft_su_id = $1 AND rgt_su_id = $2) OR (lft_su_id = $2 AND rgt_su_id = $1)
            LIMIT 1
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch relationship between units")?;

        row.map(StratigraphicRelationship::try_from).transpose()
    }

    async fn precedence_edges(&self, site_id: Uuid) -> Result<Vec<(Uuid, Uuid)>> {
        let edges: Vec<(Uuid, Uuid)> = sqlx::query_as(
            r#"
            SELECT p.later_su_id, p.earlier_su_id
            FROM stratigraphic_precedence p
            JOIN stratigraphic_units su ON su.id = p.later_su_id
            WHERE su.site_id = $1
            "#,
        )
        .bind(site_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch stratigraphic precedence")?;
        Ok(edges)
    }

    async fn analysis_subject_linked(&self, analysis_id: Uuid, subject: SubjectRef) -> Result<bool> {
        let linked: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM analysis_subjects
                WHERE analysis_id = $1 AND subject_kind = $2 AND subject_id = $3
            )
            "#,
        )
        .bind(analysis_id)
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(linked)
    }

    async fn media_subject_linked(&self, media_id: Uuid, subject: SubjectRef) -> Result<bool> {
        let linked: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM media_object_subjects
                WHERE media_object_id = $1 AND subject_kind = $2 AND subject_id = $3
            )
            "#,
        )
        .bind(media_id)
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(linked)
    }

    async fn deletion_dependents(&self, record: RecordRef) -> Result<Vec<Dependent>> {
        let mut dependents = self.count_all(deletion_queries(record.kind), record.id).await?;

        if let Some(kind) = subject_kind_of(record.kind) {
            let subject = SubjectRef::new(kind, record.id);
            for table in ["analysis_subjects", "media_object_subjects"] {
                let count = self.count_subject_links(table, subject).await?;
                if count > 0 {
                    dependents.push(Dependent::new(table, count));
                }
            }
        }
        Ok(dependents)
    }

    async fn site_dependents(&self, record: RecordRef) -> Result<Vec<Dependent>> {
        self.count_all(site_bound_queries(record.kind), record.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_owners_have_deletion_queries() {
        assert_eq!(deletion_queries(RecordKind::Site).len(), 3);
        assert!(deletion_queries(RecordKind::Pottery).is_empty());
        assert!(deletion_queries(RecordKind::Analysis).is_empty());
    }

    #[test]
    fn test_dependent_queries_are_parameterised() {
        let all = [
            deletion_queries(RecordKind::Site),
            deletion_queries(RecordKind::StratigraphicUnit),
            site_bound_queries(RecordKind::StratigraphicUnit),
            site_bound_queries(RecordKind::Context),
            site_bound_queries(RecordKind::Sample),
        ];
        for query in all.iter().flat_map(|queries| queries.iter()) {
            assert!(query.sql.contains("$1"), "{} is not parameterised", query.relation);
            assert!(query.sql.contains(query.relation), "{} counts another table", query.relation);
        }
    }

    #[test]
    fn test_subject_kind_of() {
        assert_eq!(subject_kind_of(RecordKind::ZooTooth), Some(SubjectKind::ZooTooth));
        assert_eq!(subject_kind_of(RecordKind::Analysis), None);
        assert_eq!(subject_kind_of(RecordKind::StratigraphicRelationship), None);
    }
}
