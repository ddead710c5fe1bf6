//! Audit Repository
//!
//! Whole-catalogue scans for rows breaking cross-record rules. Triggers keep
//! these empty in normal operation; the scans exist for data loaded with
//! triggers disabled. Every scan is capped by `limit`.

use anyhow::{Context, Result};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use strata_models::SubjectKind;

/// A join row whose two ends sit in different sites.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct LinkMismatchRow {
    pub link_id: Uuid,
    pub left_id: Uuid,
    pub left_site: Uuid,
    pub right_id: Uuid,
    pub right_site: Uuid,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DuplicateInventoryRow {
    pub site_id: Uuid,
    pub inventory: String,
    pub pottery_ids: Vec<Uuid>,
}

/// A subject link of an analysis or a media object.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct SubjectLinkRow {
    pub link_id: Uuid,
    pub owner_id: Uuid,
    pub subject_kind: String,
    pub subject_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct UnadmittedSubjectRow {
    pub link_id: Uuid,
    pub analysis_id: Uuid,
    pub analysis_type: String,
    pub subject_kind: String,
    pub subject_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PrecedenceEdgeRow {
    pub site_id: Uuid,
    pub later_su_id: Uuid,
    pub earlier_su_id: Uuid,
}

#[derive(Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn cross_site_context_links(&self, limit: i64) -> Result<Vec<LinkMismatchRow>> {
        let rows = sqlx::query_as(
            r#"
            SELECT l.id AS link_id, c.id AS left_id, c.site_id AS left_site,
                   su.id AS right_id, su.site_id AS right_site
            FROM context_stratigraphic_units l
            JOIN contexts c ON c.id = l.context_id
            JOIN stratigraphic_units su ON su.id = l.su_id
            WHERE c.site_id <> su.site_id
            ORDER BY l.id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to scan context links across sites")?;

        Ok(rows)
    }

    pub async fn cross_site_sample_links(&self, limit: i64) -> Result<Vec<LinkMismatchRow>> {
        let rows = sqlx::query_as(
            r#"
            SELECT l.id AS link_id, s.id AS left_id, s.site_id AS left_site,
                   su.id AS right_id, su.site_id AS right_site
            FROM sample_stratigraphic_units l
            JOIN samples s ON s.id = l.sample_id
            JOIN stratigraphic_units su ON su.id = l.su_id
            WHERE s.site_id <> su.site_id
            ORDER BY l.id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to scan sample links across sites")?;

        Ok(rows)
    }

    pub async fn cross_site_relationships(&self, limit: i64) -> Result<Vec<LinkMismatchRow>> {
        let rows = sqlx::query_as(
            r#"
            SELECT r.id AS link_id, l.id AS left_id, l.site_id AS left_site,
                   g.id AS right_id, g.site_id AS right_site
            FROM stratigraphic_relationships r
            JOIN stratigraphic_units l ON l.id = r.lft_su_id
            JOIN stratigraphic_units g ON g.id = r.rgt_su_id
            WHERE l.site_id <> g.site_id
            ORDER BY r.id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to scan stratigraphic relationships across sites")?;

        Ok(rows)
    }

    pub async fn duplicate_inventories(&self, limit: i64) -> Result<Vec<DuplicateInventoryRow>> {
        let rows = sqlx::query_as(
            r#"
            SELECT su.site_id, p.inventory, array_agg(p.id ORDER BY p.created_at) AS pottery_ids
            FROM potteries p
            JOIN stratigraphic_units su ON su.id = p.su_id
            GROUP BY su.site_id, p.inventory
            HAVING COUNT(*) > 1
            ORDER BY su.site_id, p.inventory
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to scan duplicate pottery inventories")?;

        Ok(rows)
    }

    /// Analysis subjects pointing at rows that no longer exist.
    pub async fn orphaned_analysis_subjects(&self, limit: i64) -> Result<Vec<SubjectLinkRow>> {
        self.orphaned_subjects("analysis_subjects", "analysis_id", limit)
            .await
            .context("Failed to scan orphaned analysis subjects")
    }

    pub async fn orphaned_media_subjects(&self, limit: i64) -> Result<Vec<SubjectLinkRow>> {
        self.orphaned_subjects("media_object_subjects", "media_object_id", limit)
            .await
            .context("Failed to scan orphaned media subjects")
    }

    async fn orphaned_subjects(&self, table: &str, owner: &str, limit: i64) -> Result<Vec<SubjectLinkRow>> {
        let mut orphans = Vec::new();
        for kind in SubjectKind::ALL {
            let remaining = limit - orphans.len() as i64;
            if remaining <= 0 {
                break;
            }

            let sql = format!(
                r#"
                SELECT s.id AS link_id, s.{owner} AS owner_id, s.subject_kind, s.subject_id
                FROM {table} s
                WHERE s.subject_kind = $1
                  AND NOT EXISTS (SELECT 1 FROM {subjects} t WHERE t.id = s.subject_id)
                ORDER BY s.id
                LIMIT $2
                "#,
                owner = owner,
                table = table,
                subjects = kind.table_name(),
            );
            let rows: Vec<SubjectLinkRow> = sqlx::query_as(&sql)
                .bind(kind.as_str())
                .bind(remaining)
                .fetch_all(&self.pool)
                .await?;
            orphans.extend(rows);
        }
        Ok(orphans)
    }

    pub async fn unadmitted_analysis_subjects(&self, limit: i64) -> Result<Vec<UnadmittedSubjectRow>> {
        let rows = sqlx::query_as(
            r#"
            SELECT s.id AS link_id, a.id AS analysis_id, a.analysis_type,
                   s.subject_kind, s.subject_id
            FROM analysis_subjects s
            JOIN analyses a ON a.id = s.analysis_id
            WHERE NOT EXISTS (
                SELECT 1 FROM analysis_type_subject_kinds k
                WHERE k.analysis_type = a.analysis_type AND k.subject_kind = s.subject_kind
            )
            ORDER BY s.id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to scan non-admitted analysis subjects")?;

        Ok(rows)
    }

    /// Every precedence edge, grouped by the site of its later unit.
    pub async fn precedence_edges(&self) -> Result<Vec<PrecedenceEdgeRow>> {
        let rows = sqlx::query_as(
            r#"
            SELECT su.site_id, p.later_su_id, p.earlier_su_id
            FROM stratigraphic_precedence p
            JOIN stratigraphic_units su ON su.id = p.later_su_id
            ORDER BY su.site_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch stratigraphic precedence")?;

        Ok(rows)
    }
}
