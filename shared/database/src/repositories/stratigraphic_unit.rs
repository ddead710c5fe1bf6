//! Stratigraphic unit and relationship repositories.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use strata_models::{StratigraphicRelationship, StratigraphicUnit};

use super::parse_term;

#[derive(Clone)]
pub struct StratigraphicUnitRepository {
    pool: PgPool,
}

impl StratigraphicUnitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<StratigraphicUnit>> {
        let row: Option<StratigraphicUnitRow> = sqlx::query_as(
            r#"
            SELECT id, site_id, year, number, description, interpretation,
                   chronology_lower, chronology_upper, created_at, updated_at
            FROM stratigraphic_units
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch stratigraphic unit by ID")?;

        Ok(row.map(Into::into))
    }

    pub async fn find_by_site(&self, site_id: Uuid) -> Result<Vec<StratigraphicUnit>> {
        let rows: Vec<StratigraphicUnitRow> = sqlx::query_as(
            r#"
            SELECT id, site_id, year, number, description, interpretation,
                   chronology_lower, chronology_upper, created_at, updated_at
            FROM stratigraphic_units
            WHERE site_id = $1
            ORDER BY year, number
            "#,
        )
        .bind(site_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch stratigraphic units by site")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn create(&self, unit: &StratigraphicUnit) -> Result<StratigraphicUnit> {
        let row: StratigraphicUnitRow = sqlx::query_as(
            r#"
            INSERT INTO stratigraphic_units
                (id, site_id, year, number, description, interpretation,
                 chronology_lower, chronology_upper, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, site_id, year, number, description, interpretation,
                      chronology_lower, chronology_upper, created_at, updated_at
            "#,
        )
        .bind(unit.id)
        .bind(unit.site_id)
        .bind(unit.year)
        .bind(unit.number)
        .bind(&unit.description)
        .bind(&unit.interpretation)
        .bind(unit.chronology_lower)
        .bind(unit.chronology_upper)
        .bind(unit.created_at)
        .bind(unit.updated_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create stratigraphic unit")?;

        Ok(row.into())
    }

    pub async fn update(&self, unit: &StratigraphicUnit) -> Result<Option<StratigraphicUnit>> {
        let row: Option<StratigraphicUnitRow> = sqlx::query_as(
            r#"
            UPDATE stratigraphic_units
            SET site_id = $2, year = $3, number = $4, description = $5, interpretation = $6,
                chronology_lower = $7, chronology_upper = $8, updated_at = $9
            WHERE id = $1
            RETURNING id, site_id, year, number, description, interpretation,
                      chronology_lower, chronology_upper, created_at, updated_at
            "#,
        )
        .bind(unit.id)
        .bind(unit.site_id)
        .bind(unit.year)
        .bind(unit.number)
        .bind(&unit.description)
        .bind(&unit.interpretation)
        .bind(unit.chronology_lower)
        .bind(unit.chronology_upper)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update stratigraphic unit")?;

        Ok(row.map(Into::into))
    }

    /// Relationships of the unit go with it.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM stratigraphic_units WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete stratigraphic unit")?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, FromRow)]
struct StratigraphicUnitRow {
    id: Uuid,
    site_id: Uuid,
    year: i32,
    number: i32,
    description: Option<String>,
    interpretation: Option<String>,
    chronology_lower: Option<i32>,
    chronology_upper: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StratigraphicUnitRow> for StratigraphicUnit {
    fn from(row: StratigraphicUnitRow) -> Self {
        StratigraphicUnit {
            id: row.id,
            site_id: row.site_id,
            year: row.year,
            number: row.number,
            description: row.description,
            interpretation: row.interpretation,
            chronology_lower: row.chronology_lower,
            chronology_upper: row.chronology_upper,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Relationships are stored once, in the direction they were recorded.
#[derive(Clone)]
pub struct RelationshipRepository {
    pool: PgPool,
}

impl RelationshipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<StratigraphicRelationship>> {
        let row: Option<RelationshipRow> = sqlx::query_as(
            r#"
            SELECT id, lft_su_id, relation, rgt_su_id, created_at
            FROM stratigraphic_relationships
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch stratigraphic relationship by ID")?;

        row.map(StratigraphicRelationship::try_from).transpose()
    }

    /// Every relationship the unit takes part in, on either side.
    pub async fn find_by_unit(&self, su_id: Uuid) -> Result<Vec<StratigraphicRelationship>> {
        let rows: Vec<RelationshipRow> = sqlx::query_as(
            r#"
            SELECT id, lft_su_id, relation, rgt_su_id, created_at
            FROM stratigraphic_relationships
            WHERE lft_su_id = $1 OR rgt_su_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(su_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch stratigraphic relationships by unit")?;

        rows.into_iter().map(StratigraphicRelationship::try_from).collect()
    }

    pub async fn find_by_site(&self, site_id: Uuid) -> Result<Vec<StratigraphicRelationship>> {
        let rows: Vec<RelationshipRow> = sqlx::query_as(
            r#"
            SELECT r.id, r.lft_su_id, r.relation, r.rgt_su_id, r.created_at
            FROM stratigraphic_relationships r
            JOIN stratigraphic_units su ON su.id = r.lft_su_id
            WHERE su.site_id = $1
            ORDER BY r.created_at
            "#,
        )
        .bind(site_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch stratigraphic relationships by site")?;

        rows.into_iter().map(StratigraphicRelationship::try_from).collect()
    }

    pub async fn create(&self, relationship: &StratigraphicRelationship) -> Result<StratigraphicRelationship> {
        let row: RelationshipRow = sqlx::query_as(
            r#"
            INSERT INTO stratigraphic_relationships (id, lft_su_id, relation, rgt_su_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, lft_su_id, relation, rgt_su_id, created_at
            "#,
        )
        .bind(relationship.id)
        .bind(relationship.lft_su_id)
        .bind(relationship.relation.as_str())
        .bind(relationship.rgt_su_id)
        .bind(relationship.created_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create stratigraphic relationship")?;

        row.try_into()
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM stratigraphic_relationships WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete stratigraphic relationship")?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct RelationshipRow {
    id: Uuid,
    lft_su_id: Uuid,
    relation: String,
    rgt_su_id: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<RelationshipRow> for StratigraphicRelationship {
    type Error = anyhow::Error;

    fn try_from(row: RelationshipRow) -> Result<Self> {
        Ok(StratigraphicRelationship {
            id: row.id,
            lft_su_id: row.lft_su_id,
            relation: parse_term(&row.relation)?,
            rgt_su_id: row.rgt_su_id,
            created_at: row.created_at,
        })
    }
}
