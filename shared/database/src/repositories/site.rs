//! Site Repository

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use strata_models::Site;

#[derive(Clone)]
pub struct SiteRepository {
    pool: PgPool,
}

impl SiteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Site>> {
        let row: Option<SiteRow> = sqlx::query_as(
            r#"
            SELECT id, code, name, description, chronology_lower, chronology_upper,
                   created_at, updated_at
            FROM sites
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch site by ID")?;

        Ok(row.map(Into::into))
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<Site>> {
        let row: Option<SiteRow> = sqlx::query_as(
            r#"
            SELECT id, code, name, description, chronology_lower, chronology_upper,
                   created_at, updated_at
            FROM sites
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch site by code")?;

        Ok(row.map(Into::into))
    }

    pub async fn find_all(&self) -> Result<Vec<Site>> {
        let rows: Vec<SiteRow> = sqlx::query_as(
            r#"
            SELECT id, code, name, description, chronology_lower, chronology_upper,
                   created_at, updated_at
            FROM sites
            ORDER BY code
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch all sites")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn create(&self, site: &Site) -> Result<Site> {
        let row: SiteRow = sqlx::query_as(
            r#"
            INSERT INTO sites
                (id, code, name, description, chronology_lower, chronology_upper,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, code, name, description, chronology_lower, chronology_upper,
                      created_at, updated_at
            "#,
        )
        .bind(site.id)
        .bind(&site.code)
        .bind(&site.name)
        .bind(&site.description)
        .bind(site.chronology_lower)
        .bind(site.chronology_upper)
        .bind(site.created_at)
        .bind(site.updated_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create site")?;

        Ok(row.into())
    }

    pub async fn update(&self, site: &Site) -> Result<Option<Site>> {
        let row: Option<SiteRow> = sqlx::query_as(
            r#"
            UPDATE sites
            SET code = $2, name = $3, description = $4,
                chronology_lower = $5, chronology_upper = $6, updated_at = $7
            WHERE id = $1
            RETURNING id, code, name, description, chronology_lower, chronology_upper,
                      created_at, updated_at
            "#,
        )
        .bind(site.id)
        .bind(&site.code)
        .bind(&site.name)
        .bind(&site.description)
        .bind(site.chronology_lower)
        .bind(site.chronology_upper)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update site")?;

        Ok(row.map(Into::into))
    }

    /// Returns `false` when no site had this id.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sites WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete site")?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, FromRow)]
struct SiteRow {
    id: Uuid,
    code: String,
    name: String,
    description: Option<String>,
    chronology_lower: Option<i32>,
    chronology_upper: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SiteRow> for Site {
    fn from(row: SiteRow) -> Self {
        Site {
            id: row.id,
            code: row.code,
            name: row.name,
            description: row.description,
            chronology_lower: row.chronology_lower,
            chronology_upper: row.chronology_upper,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
