//! Context Repository
//!
//! Contexts group stratigraphic units of their own site.

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use strata_models::{Context, ContextStratigraphicUnit};

use super::parse_term;

#[derive(Clone)]
pub struct ContextRepository {
    pool: PgPool,
}

impl ContextRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Context>> {
        let row: Option<ContextRow> = sqlx::query_as(
            r#"
            SELECT id, site_id, context_type, name, description, created_at, updated_at
            FROM contexts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch context by ID")?;

        row.map(Context::try_from).transpose()
    }

    pub async fn find_by_site(&self, site_id: Uuid) -> Result<Vec<Context>> {
        let rows: Vec<ContextRow> = sqlx::query_as(
            r#"
            SELECT id, site_id, context_type, name, description, created_at, updated_at
            FROM contexts
            WHERE site_id = $1
            ORDER BY name
            "#,
        )
        .bind(site_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch contexts by site")?;

        rows.into_iter().map(Context::try_from).collect()
    }

    pub async fn create(&self, context: &Context) -> Result<Context> {
        let row: ContextRow = sqlx::query_as(
            r#"
            INSERT INTO contexts (id, site_id, context_type, name, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, site_id, context_type, name, description, created_at, updated_at
            "#,
        )
        .bind(context.id)
        .bind(context.site_id)
        .bind(context.context_type.as_str())
        .bind(&context.name)
        .bind(&context.description)
        .bind(context.created_at)
        .bind(context.updated_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create context")?;

        row.try_into()
    }

    pub async fn update(&self, context: &Context) -> Result<Option<Context>> {
        let row: Option<ContextRow> = sqlx::query_as(
            r#"
            UPDATE contexts
            SET site_id = $2, context_type = $3, name = $4, description = $5, updated_at = $6
            WHERE id = $1
            RETURNING id, site_id, context_type, name, description, created_at, updated_at
            "#,
        )
        .bind(context.id)
        .bind(context.site_id)
        .bind(context.context_type.as_str())
        .bind(&context.name)
        .bind(&context.description)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update context")?;

        row.map(Context::try_from).transpose()
    }

    /// Unit links go with the context.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM contexts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete context")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn link_unit(&self, link: &ContextStratigraphicUnit) -> Result<ContextStratigraphicUnit> {
        let row: ContextLinkRow = sqlx::query_as(
            r#"
            INSERT INTO context_stratigraphic_units (id, context_id, su_id)
            VALUES ($1, $2, $3)
            RETURNING id, context_id, su_id
            "#,
        )
        .bind(link.id)
        .bind(link.context_id)
        .bind(link.su_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to link stratigraphic unit to context")?;

        Ok(row.into())
    }

    pub async fn unlink_unit(&self, context_id: Uuid, su_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM context_stratigraphic_units WHERE context_id = $1 AND su_id = $2",
        )
        .bind(context_id)
        .bind(su_id)
        .execute(&self.pool)
        .await
        .context("Failed to unlink stratigraphic unit from context")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn units_of(&self, context_id: Uuid) -> Result<Vec<ContextStratigraphicUnit>> {
        let rows: Vec<ContextLinkRow> = sqlx::query_as(
            r#"
            SELECT id, context_id, su_id
            FROM context_stratigraphic_units
            WHERE context_id = $1
            "#,
        )
        .bind(context_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch context units")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, FromRow)]
struct ContextRow {
    id: Uuid,
    site_id: Uuid,
    context_type: String,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ContextRow> for Context {
    type Error = anyhow::Error;

    fn try_from(row: ContextRow) -> Result<Self> {
        Ok(Context {
            id: row.id,
            site_id: row.site_id,
            context_type: parse_term(&row.context_type)?,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ContextLinkRow {
    id: Uuid,
    context_id: Uuid,
    su_id: Uuid,
}

impl From<ContextLinkRow> for ContextStratigraphicUnit {
    fn from(row: ContextLinkRow) -> Self {
        ContextStratigraphicUnit {
            id: row.id,
            context_id: row.context_id,
            su_id: row.su_id,
        }
    }
}
