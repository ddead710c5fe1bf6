//! Sample Repository

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use strata_models::{Sample, SampleStratigraphicUnit};

use super::parse_term;

#[derive(Clone)]
pub struct SampleRepository {
    pool: PgPool,
}

impl SampleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Sample>> {
        let row: Option<SampleRow> = sqlx::query_as(
            r#"
            SELECT id, site_id, sample_type, year, number, description, created_at, updated_at
            FROM samples
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch sample by ID")?;

        row.map(Sample::try_from).transpose()
    }

    pub async fn find_by_site(&self, site_id: Uuid) -> Result<Vec<Sample>> {
        let rows: Vec<SampleRow> = sqlx::query_as(
            r#"
            SELECT id, site_id, sample_type, year, number, description, created_at, updated_at
            FROM samples
            WHERE site_id = $1
            ORDER BY sample_type, year, number
            "#,
        )
        .bind(site_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch samples by site")?;

        rows.into_iter().map(Sample::try_from).collect()
    }

    pub async fn create(&self, sample: &Sample) -> Result<Sample> {
        let row: SampleRow = sqlx::query_as(
            r#"
            INSERT INTO samples
                (id, site_id, sample_type, year, number, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, site_id, sample_type, year, number, description, created_at, updated_at
            "#,
        )
        .bind(sample.id)
        .bind(sample.site_id)
        .bind(sample.sample_type.as_str())
        .bind(sample.year)
        .bind(sample.number)
        .bind(&sample.description)
        .bind(sample.created_at)
        .bind(sample.updated_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create sample")?;

        row.try_into()
    }

    pub async fn update(&self, sample: &Sample) -> Result<Option<Sample>> {
        let row: Option<SampleRow> = sqlx::query_as(
            r#"
            UPDATE samples
            SET site_id = $2, sample_type = $3, year = $4, number = $5, description = $6,
                updated_at = $7
            WHERE id = $1
            RETURNING id, site_id, sample_type, year, number, description, created_at, updated_at
            "#,
        )
        .bind(sample.id)
        .bind(sample.site_id)
        .bind(sample.sample_type.as_str())
        .bind(sample.year)
        .bind(sample.number)
        .bind(&sample.description)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update sample")?;

        row.map(Sample::try_from).transpose()
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM samples WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete sample")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn link_unit(&self, link: &SampleStratigraphicUnit) -> Result<SampleStratigraphicUnit> {
        let row: SampleLinkRow = sqlx::query_as(
            r#"
            INSERT INTO sample_stratigraphic_units (id, sample_id, su_id)
            VALUES ($1, $2, $3)
            RETURNING id, sample_id, su_id
            "#,
        )
        .bind(link.id)
        .bind(link.sample_id)
        .bind(link.su_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to link stratigraphic unit to sample")?;

        Ok(row.into())
    }

    pub async fn unlink_unit(&self, sample_id: Uuid, su_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM sample_stratigraphic_units WHERE sample_id = $1 AND su_id = $2",
        )
        .bind(sample_id)
        .bind(su_id)
        .execute(&self.pool)
        .await
        .context("Failed to unlink stratigraphic unit from sample")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn units_of(&self, sample_id: Uuid) -> Result<Vec<SampleStratigraphicUnit>> {
        let rows: Vec<SampleLinkRow> = sqlx::query_as(
            "SELECT id, sample_id, su_id FROM sample_stratigraphic_units WHERE sample_id = $1",
        )
        .bind(sample_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch sample units")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, FromRow)]
struct SampleRow {
    id: Uuid,
    site_id: Uuid,
    sample_type: String,
    year: i32,
    number: i32,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SampleRow> for Sample {
    type Error = anyhow::Error;

    fn try_from(row: SampleRow) -> Result<Self> {
        Ok(Sample {
            id: row.id,
            site_id: row.site_id,
            sample_type: parse_term(&row.sample_type)?,
            year: row.year,
            number: row.number,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SampleLinkRow {
    id: Uuid,
    sample_id: Uuid,
    su_id: Uuid,
}

impl From<SampleLinkRow> for SampleStratigraphicUnit {
    fn from(row: SampleLinkRow) -> Self {
        SampleStratigraphicUnit {
            id: row.id,
            sample_id: row.sample_id,
            su_id: row.su_id,
        }
    }
}
