//! Analysis Repository
//!
//! Analyses and the polymorphic subjects they were performed on.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use strata_models::{Analysis, AnalysisStatus, AnalysisSubject, SubjectRef};

use super::parse_term;

#[derive(Clone)]
pub struct AnalysisRepository {
    pool: PgPool,
}

impl AnalysisRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Analysis>> {
        let row: Option<AnalysisRow> = sqlx::query_as(
            r#"
            SELECT id, analysis_type, identifier, year, laboratory, responsible, status, summary,
                   created_at, updated_at
            FROM analyses
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch analysis by ID")?;

        row.map(Analysis::try_from).transpose()
    }

    /// Analyses performed on a subject.
    pub async fn find_by_subject(&self, subject: SubjectRef) -> Result<Vec<Analysis>> {
        let rows: Vec<AnalysisRow> = sqlx::query_as(
            r#"
            SELECT a.id, a.analysis_type, a.identifier, a.year, a.laboratory, a.responsible,
                   a.status, a.summary, a.created_at, a.updated_at
            FROM analyses a
            JOIN analysis_subjects s ON s.analysis_id = a.id
            WHERE s.subject_kind = $1 AND s.subject_id = $2
            ORDER BY a.year, a.identifier
            "#,
        )
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch analyses by subject")?;

        rows.into_iter().map(Analysis::try_from).collect()
    }

    pub async fn create(&self, analysis: &Analysis) -> Result<Analysis> {
        let row: AnalysisRow = sqlx::query_as(
            r#"
            INSERT INTO analyses
                (id, analysis_type, identifier, year, laboratory, responsible, status, summary,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, analysis_type, identifier, year, laboratory, responsible, status, summary,
                      created_at, updated_at
            "#,
        )
        .bind(analysis.id)
        .bind(analysis.analysis_type.as_str())
        .bind(&analysis.identifier)
        .bind(analysis.year)
        .bind(&analysis.laboratory)
        .bind(&analysis.responsible)
        .bind(analysis.status.as_str())
        .bind(&analysis.summary)
        .bind(analysis.created_at)
        .bind(analysis.updated_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create analysis")?;

        row.try_into()
    }

    pub async fn update(&self, analysis: &Analysis) -> Result<Option<Analysis>> {
        let row: Option<AnalysisRow> = sqlx::query_as(
            r#"
            UPDATE analyses
            SET analysis_type = $2, identifier = $3, year = $4, laboratory = $5,
                responsible = $6, status = $7, summary = $8, updated_at = $9
            WHERE id = $1
            RETURNING id, analysis_type, identifier, year, laboratory, responsible, status, summary,
                      created_at, updated_at
            "#,
        )
        .bind(analysis.id)
        .bind(analysis.analysis_type.as_str())
        .bind(&analysis.identifier)
        .bind(analysis.year)
        .bind(&analysis.laboratory)
        .bind(&analysis.responsible)
        .bind(analysis.status.as_str())
        .bind(&analysis.summary)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update analysis")?;

        row.map(Analysis::try_from).transpose()
    }

    pub async fn update_status(&self, id: Uuid, status: AnalysisStatus) -> Result<Option<Analysis>> {
        let row: Option<AnalysisRow> = sqlx::query_as(
            r#"
            UPDATE analyses
            SET status = $2, updated_at = $3
            WHERE id = $1
            RETURNING id, analysis_type, identifier, year, laboratory, responsible, status, summary,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update analysis status")?;

        row.map(Analysis::try_from).transpose()
    }

    /// Subject links go with the analysis.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM analyses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete analysis")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn add_subject(&self, subject: &AnalysisSubject) -> Result<AnalysisSubject> {
        let row: AnalysisSubjectRow = sqlx::query_as(
            r#"
            INSERT INTO analysis_subjects (id, analysis_id, subject_kind, subject_id, summary)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, analysis_id, subject_kind, subject_id, summary
            "#,
        )
        .bind(subject.id)
        .bind(subject.analysis_id)
        .bind(subject.subject.kind.as_str())
        .bind(subject.subject.id)
        .bind(&subject.summary)
        .fetch_one(&self.pool)
        .await
        .context("Failed to link analysis subject")?;

        row.try_into()
    }

    pub async fn remove_subject(&self, analysis_id: Uuid, subject: SubjectRef) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM analysis_subjects
            WHERE analysis_id = $1 AND subject_kind = $2 AND subject_id = $3
            "#,
        )
        .bind(analysis_id)
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .execute(&self.pool)
        .await
        .context("Failed to unlink analysis subject")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn subjects_of(&self, analysis_id: Uuid) -> Result<Vec<AnalysisSubject>> {
        let rows: Vec<AnalysisSubjectRow> = sqlx::query_as(
            r#"
            SELECT id, analysis_id, subject_kind, subject_id, summary
            FROM analysis_subjects
            WHERE analysis_id = $1
            ORDER BY subject_kind, subject_id
            "#,
        )
        .bind(analysis_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch analysis subjects")?;

        rows.into_iter().map(AnalysisSubject::try_from).collect()
    }
}

#[derive(Debug, FromRow)]
struct AnalysisRow {
    id: Uuid,
    analysis_type: String,
    identifier: String,
    year: i32,
    laboratory: Option<String>,
    responsible: Option<String>,
    status: String,
    summary: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AnalysisRow> for Analysis {
    type Error = anyhow::Error;

    fn try_from(row: AnalysisRow) -> Result<Self> {
        Ok(Analysis {
            id: row.id,
            analysis_type: parse_term(&row.analysis_type)?,
            identifier: row.identifier,
            year: row.year,
            laboratory: row.laboratory,
            responsible: row.responsible,
            status: parse_term(&row.status)?,
            summary: row.summary,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct AnalysisSubjectRow {
    id: Uuid,
    analysis_id: Uuid,
    subject_kind: String,
    subject_id: Uuid,
    summary: Option<String>,
}

impl TryFrom<AnalysisSubjectRow> for AnalysisSubject {
    type Error = anyhow::Error;

    fn try_from(row: AnalysisSubjectRow) -> Result<Self> {
        Ok(AnalysisSubject {
            id: row.id,
            analysis_id: row.analysis_id,
            subject: SubjectRef::new(parse_term(&row.subject_kind)?, row.subject_id),
            summary: row.summary,
        })
    }
}
