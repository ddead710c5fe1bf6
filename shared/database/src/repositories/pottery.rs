//! Pottery Repository
//!
//! Inventory numbers are unique per site, which is enforced by trigger since
//! the site is only reachable through the stratigraphic unit.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use strata_models::Pottery;

#[derive(Clone)]
pub struct PotteryRepository {
    pool: PgPool,
}

impl PotteryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Pottery>> {
        let row: Option<PotteryRow> = sqlx::query_as(
            r#"
            SELECT id, su_id, inventory, culture_context, chronology, functional_group, form,
                   surface_treatment, decoration, notes, created_at, updated_at
            FROM potteries
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch pottery by ID")?;

        Ok(row.map(Into::into))
    }

    pub async fn find_by_unit(&self, su_id: Uuid) -> Result<Vec<Pottery>> {
        let rows: Vec<PotteryRow> = sqlx::query_as(
            r#"
            SELECT id, su_id, inventory, culture_context, chronology, functional_group, form,
                   surface_treatment, decoration, notes, created_at, updated_at
            FROM potteries
            WHERE su_id = $1
            ORDER BY inventory
            "#,
        )
        .bind(su_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch pottery by stratigraphic unit")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn find_by_inventory(&self, site_id: Uuid, inventory: &str) -> Result<Option<Pottery>> {
        let row: Option<PotteryRow> = sqlx::query_as(
            r#"
            SELECT p.id, p.su_id, p.inventory, p.culture_context, p.chronology, p.functional_group,
                   p.form, p.surface_treatment, p.decoration, p.notes, p.created_at, p.updated_at
            FROM potteries p
            JOIN stratigraphic_units su ON su.id = p.su_id
            WHERE su.site_id = $1 AND p.inventory = $2
            "#,
        )
        .bind(site_id)
        .bind(inventory)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch pottery by inventory")?;

        Ok(row.map(Into::into))
    }

    pub async fn create(&self, pottery: &Pottery) -> Result<Pottery> {
        let row: PotteryRow = sqlx::query_as(
            r#"
            INSERT INTO potteries
                (id, su_id, inventory, culture_context, chronology, functional_group, form,
                 surface_treatment, decoration, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id, su_id, inventory, culture_context, chronology, functional_group, form,
                      surface_treatment, decoration, notes, created_at, updated_at
            "#,
        )
        .bind(pottery.id)
        .bind(pottery.su_id)
        .bind(&pottery.inventory)
        .bind(&pottery.culture_context)
        .bind(&pottery.chronology)
        .bind(&pottery.functional_group)
        .bind(&pottery.form)
        .bind(&pottery.surface_treatment)
        .bind(&pottery.decoration)
        .bind(&pottery.notes)
        .bind(pottery.created_at)
        .bind(pottery.updated_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create pottery")?;

        Ok(row.into())
    }

    pub async fn update(&self, pottery: &Pottery) -> Result<Option<Pottery>> {
        let row: Option<PotteryRow> = sqlx::query_as(
            r#"
            UPDATE potteries
            SET su_id = $2, inventory = $3, culture_context = $4, chronology = $5,
                functional_group = $6, form = $7, surface_treatment = $8, decoration = $9,
                notes = $10, updated_at = $11
            WHERE id = $1
            RETURNING id, su_id, inventory, culture_context, chronology, functional_group, form,
                      surface_treatment, decoration, notes, created_at, updated_at
            "#,
        )
        .bind(pottery.id)
        .bind(pottery.su_id)
        .bind(&pottery.inventory)
        .bind(&pottery.culture_context)
        .bind(&pottery.chronology)
        .bind(&pottery.functional_group)
        .bind(&pottery.form)
        .bind(&pottery.surface_treatment)
        .bind(&pottery.decoration)
        .bind(&pottery.notes)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update pottery")?;

        Ok(row.map(Into::into))
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM potteries WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete pottery")?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, FromRow)]
struct PotteryRow {
    id: Uuid,
    su_id: Uuid,
    inventory: String,
    culture_context: Option<String>,
    chronology: Option<String>,
    functional_group: Option<String>,
    form: Option<String>,
    surface_treatment: Option<String>,
    decoration: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PotteryRow> for Pottery {
    fn from(row: PotteryRow) -> Self {
        Pottery {
            id: row.id,
            su_id: row.su_id,
            inventory: row.inventory,
            culture_context: row.culture_context,
            chronology: row.chronology,
            functional_group: row.functional_group,
            form: row.form,
            surface_treatment: row.surface_treatment,
            decoration: row.decoration,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
