//! Zoological and botanical finds.
//!
//! Every find belongs to exactly one stratigraphic unit and reaches its site
//! through it.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use strata_models::{BoneSide, BotanyCharcoal, BotanySeed, ZooBone, ZooTooth};

use super::parse_term;

fn parse_side(side: Option<String>) -> Result<Option<BoneSide>> {
    side.as_deref().map(parse_term).transpose()
}

#[derive(Clone)]
pub struct ZooRepository {
    pool: PgPool,
}

impl ZooRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_bone(&self, id: Uuid) -> Result<Option<ZooBone>> {
        let row: Option<ZooBoneRow> = sqlx::query_as(
            r#"
            SELECT id, su_id, taxon, element, side, count, notes, created_at
            FROM zoo_bones
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch zoo bone by ID")?;

        row.map(ZooBone::try_from).transpose()
    }

    pub async fn bones_by_unit(&self, su_id: Uuid) -> Result<Vec<ZooBone>> {
        let rows: Vec<ZooBoneRow> = sqlx::query_as(
            r#"
            SELECT id, su_id, taxon, element, side, count, notes, created_at
            FROM zoo_bones
            WHERE su_id = $1
            ORDER BY taxon, element
            "#,
        )
        .bind(su_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch zoo bones by stratigraphic unit")?;

        rows.into_iter().map(ZooBone::try_from).collect()
    }

    pub async fn create_bone(&self, bone: &ZooBone) -> Result<ZooBone> {
        let row: ZooBoneRow = sqlx::query_as(
            r#"
            INSERT INTO zoo_bones (id, su_id, taxon, element, side, count, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, su_id, taxon, element, side, count, notes, created_at
            "#,
        )
        .bind(bone.id)
        .bind(bone.su_id)
        .bind(&bone.taxon)
        .bind(&bone.element)
        .bind(bone.side.map(|side| side.as_str()))
        .bind(bone.count)
        .bind(&bone.notes)
        .bind(bone.created_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create zoo bone")?;

        row.try_into()
    }

    pub async fn update_bone(&self, bone: &ZooBone) -> Result<Option<ZooBone>> {
        let row: Option<ZooBoneRow> = sqlx::query_as(
            r#"
            UPDATE zoo_bones
            SET su_id = $2, taxon = $3, element = $4, side = $5, count = $6, notes = $7
            WHERE id = $1
            RETURNING id, su_id, taxon, element, side, count, notes, created_at
            "#,
        )
        .bind(bone.id)
        .bind(bone.su_id)
        .bind(&bone.taxon)
        .bind(&bone.element)
        .bind(bone.side.map(|side| side.as_str()))
        .bind(bone.count)
        .bind(&bone.notes)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update zoo bone")?;

        row.map(ZooBone::try_from).transpose()
    }

    pub async fn delete_bone(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM zoo_bones WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete zoo bone")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn find_tooth(&self, id: Uuid) -> Result<Option<ZooTooth>> {
        let row: Option<ZooToothRow> = sqlx::query_as(
            r#"
            SELECT id, su_id, taxon, element, side, wear_stage, notes, created_at
            FROM zoo_teeth
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch zoo tooth by ID")?;

        row.map(ZooTooth::try_from).transpose()
    }

    pub async fn teeth_by_unit(&self, su_id: Uuid) -> Result<Vec<ZooTooth>> {
        let rows: Vec<ZooToothRow> = sqlx::query_as(
            r#"
            SELECT id, su_id, taxon, element, side, wear_stage, notes, created_at
            FROM zoo_teeth
            WHERE su_id = $1
            ORDER BY taxon, element
            "#,
        )
        .bind(su_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch zoo teeth by stratigraphic unit")?;

        rows.into_iter().map(ZooTooth::try_from).collect()
    }

    pub async fn create_tooth(&self, tooth: &ZooTooth) -> Result<ZooTooth> {
        let row: ZooToothRow = sqlx::query_as(
            r#"
            INSERT INTO zoo_teeth (id, su_id, taxon, element, side, wear_stage, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, su_id, taxon, element, side, wear_stage, notes, created_at
            "#,
        )
        .bind(tooth.id)
        .bind(tooth.su_id)
        .bind(&tooth.taxon)
        .bind(&tooth.element)
        .bind(tooth.side.map(|side| side.as_str()))
        .bind(tooth.wear_stage)
        .bind(&tooth.notes)
        .bind(tooth.created_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create zoo tooth")?;

        row.try_into()
    }

    pub async fn update_tooth(&self, tooth: &ZooTooth) -> Result<Option<ZooTooth>> {
        let row: Option<ZooToothRow> = sqlx::query_as(
            r#"
            UPDATE zoo_teeth
            SET su_id = $2, taxon = $3, element = $4, side = $5, wear_stage = $6, notes = $7
            WHERE id = $1
            RETURNING id, su_id, taxon, element, side, wear_stage, notes, created_at
            "#,
        )
        .bind(tooth.id)
        .bind(tooth.su_id)
        .bind(&tooth.taxon)
        .bind(&tooth.element)
        .bind(tooth.side.map(|side| side.as_str()))
        .bind(tooth.wear_stage)
        .bind(&tooth.notes)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update zoo tooth")?;

        row.map(ZooTooth::try_from).transpose()
    }

    pub async fn delete_tooth(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM zoo_teeth WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete zoo tooth")?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Clone)]
pub struct BotanyRepository {
    pool: PgPool,
}

impl BotanyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_charcoal(&self, id: Uuid) -> Result<Option<BotanyCharcoal>> {
        let row: Option<BotanyRow> = sqlx::query_as(
            "SELECT id, su_id, taxon, count, notes, created_at FROM botany_charcoals WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch charcoal by ID")?;

        Ok(row.map(Into::into))
    }

    pub async fn charcoals_by_unit(&self, su_id: Uuid) -> Result<Vec<BotanyCharcoal>> {
        let rows: Vec<BotanyRow> = sqlx::query_as(
            r#"
            SELECT id, su_id, taxon, count, notes, created_at
            FROM botany_charcoals
            WHERE su_id = $1
            ORDER BY taxon
            "#,
        )
        .bind(su_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch charcoals by stratigraphic unit")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn create_charcoal(&self, charcoal: &BotanyCharcoal) -> Result<BotanyCharcoal> {
        let row: BotanyRow = sqlx::query_as(
            r#"
            INSERT INTO botany_charcoals (id, su_id, taxon, count, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, su_id, taxon, count, notes, created_at
            "#,
        )
        .bind(charcoal.id)
        .bind(charcoal.su_id)
        .bind(&charcoal.taxon)
        .bind(charcoal.count)
        .bind(&charcoal.notes)
        .bind(charcoal.created_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create charcoal")?;

        Ok(row.into())
    }

    pub async fn update_charcoal(&self, charcoal: &BotanyCharcoal) -> Result<Option<BotanyCharcoal>> {
        let row: Option<BotanyRow> = sqlx::query_as(
            r#"
            UPDATE botany_charcoals
            SET su_id = $2, taxon = $3, count = $4, notes = $5
            WHERE id = $1
            RETURNING id, su_id, taxon, count, notes, created_at
            "#,
        )
        .bind(charcoal.id)
        .bind(charcoal.su_id)
        .bind(&charcoal.taxon)
        .bind(charcoal.count)
        .bind(&charcoal.notes)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update charcoal")?;

        Ok(row.map(Into::into))
    }

    pub async fn delete_charcoal(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM botany_charcoals WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete charcoal")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn find_seed(&self, id: Uuid) -> Result<Option<BotanySeed>> {
        let row: Option<BotanyRow> = sqlx::query_as(
            "SELECT id, su_id, taxon, count, notes, created_at FROM botany_seeds WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch seed by ID")?;

        Ok(row.map(Into::into))
    }

    pub async fn seeds_by_unit(&self, su_id: Uuid) -> Result<Vec<BotanySeed>> {
        let rows: Vec<BotanyRow> = sqlx::query_as(
            r#"
            SELECT id, su_id, taxon, count, notes, created_at
            FROM botany_seeds
            WHERE su_id = $1
            ORDER BY taxon
            "#,
        )
        .bind(su_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch seeds by stratigraphic unit")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn create_seed(&self, seed: &BotanySeed) -> Result<BotanySeed> {
        let row: BotanyRow = sqlx::query_as(
            r#"
            INSERT INTO botany_seeds (id, su_id, taxon, count, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, su_id, taxon, count, notes, created_at
            "#,
        )
        .bind(seed.id)
        .bind(seed.su_id)
        .bind(&seed.taxon)
        .bind(seed.count)
        .bind(&seed.notes)
        .bind(seed.created_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create seed")?;

        Ok(row.into())
    }

    pub async fn update_seed(&self, seed: &BotanySeed) -> Result<Option<BotanySeed>> {
        let row: Option<BotanyRow> = sqlx::query_as(
            r#"
            UPDATE botany_seeds
            SET su_id = $2, taxon = $3, count = $4, notes = $5
            WHERE id = $1
            RETURNING id, su_id, taxon, count, notes, created_at
            "#,
        )
        .bind(seed.id)
        .bind(seed.su_id)
        .bind(&seed.taxon)
        .bind(seed.count)
        .bind(&seed.notes)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update seed")?;

        Ok(row.map(Into::into))
    }

    pub async fn delete_seed(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM botany_seeds WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete seed")?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, FromRow)]
struct ZooBoneRow {
    id: Uuid,
    su_id: Uuid,
    taxon: String,
    element: String,
    side: Option<String>,
    count: i32,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ZooBoneRow> for ZooBone {
    type Error = anyhow::Error;

    fn try_from(row: ZooBoneRow) -> Result<Self> {
        Ok(ZooBone {
            id: row.id,
            su_id: row.su_id,
            taxon: row.taxon,
            element: row.element,
            side: parse_side(row.side)?,
            count: row.count,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ZooToothRow {
    id: Uuid,
    su_id: Uuid,
    taxon: String,
    element: String,
    side: Option<String>,
    wear_stage: Option<i32>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ZooToothRow> for ZooTooth {
    type Error = anyhow::Error;

    fn try_from(row: ZooToothRow) -> Result<Self> {
        Ok(ZooTooth {
            id: row.id,
            su_id: row.su_id,
            taxon: row.taxon,
            element: row.element,
            side: parse_side(row.side)?,
            wear_stage: row.wear_stage,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

/// Charcoal and seed rows share a shape.
#[derive(Debug, FromRow)]
struct BotanyRow {
    id: Uuid,
    su_id: Uuid,
    taxon: String,
    count: i32,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<BotanyRow> for BotanyCharcoal {
    fn from(row: BotanyRow) -> Self {
        BotanyCharcoal {
            id: row.id,
            su_id: row.su_id,
            taxon: row.taxon,
            count: row.count,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

impl From<BotanyRow> for BotanySeed {
    fn from(row: BotanyRow) -> Self {
        BotanySeed {
            id: row.id,
            su_id: row.su_id,
            taxon: row.taxon,
            count: row.count,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}
