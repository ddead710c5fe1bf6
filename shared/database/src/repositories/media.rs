//! Media object metadata. Only the content hash of a file is kept.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use strata_models::{MediaObject, MediaObjectSubject, SubjectRef};

use super::parse_term;

#[derive(Clone)]
pub struct MediaRepository {
    pool: PgPool,
}

impl MediaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<MediaObject>> {
        let row: Option<MediaRow> = sqlx::query_as(
            r#"
            SELECT id, sha256, original_filename, mime_type, size_bytes, description, uploaded_at
            FROM media_objects
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch media object by ID")?;

        Ok(row.map(Into::into))
    }

    pub async fn find_by_hash(&self, sha256: &str) -> Result<Option<MediaObject>> {
        let row: Option<MediaRow> = sqlx::query_as(
            r#"
            SELECT id, sha256, original_filename, mime_type, size_bytes, description, uploaded_at
            FROM media_objects
            WHERE sha256 = $1
            "#,
        )
        .bind(sha256)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch media object by hash")?;

        Ok(row.map(Into::into))
    }

    pub async fn find_by_subject(&self, subject: SubjectRef) -> Result<Vec<MediaObject>> {
        let rows: Vec<MediaRow> = sqlx::query_as(
            r#"
            SELECT m.id, m.sha256, m.original_filename, m.mime_type, m.size_bytes,
                   m.description, m.uploaded_at
            FROM media_objects m
            JOIN media_object_subjects s ON s.media_object_id = m.id
            WHERE s.subject_kind = $1 AND s.subject_id = $2
            ORDER BY m.uploaded_at
            "#,
        )
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch media objects by subject")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn create(&self, media: &MediaObject) -> Result<MediaObject> {
        let row: MediaRow = sqlx::query_as(
            r#"
            INSERT INTO media_objects
                (id, sha256, original_filename, mime_type, size_bytes, description, uploaded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, sha256, original_filename, mime_type, size_bytes, description, uploaded_at
            "#,
        )
        .bind(media.id)
        .bind(&media.sha256)
        .bind(&media.original_filename)
        .bind(&media.mime_type)
        .bind(media.size_bytes)
        .bind(&media.description)
        .bind(media.uploaded_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create media object")?;

        Ok(row.into())
    }

    /// The content hash and size are fixed at upload.
    pub async fn update(&self, media: &MediaObject) -> Result<Option<MediaObject>> {
        let row: Option<MediaRow> = sqlx::query_as(
            r#"
            UPDATE media_objects
            SET original_filename = $2, mime_type = $3, description = $4
            WHERE id = $1
            RETURNING id, sha256, original_filename, mime_type, size_bytes, description, uploaded_at
            "#,
        )
        .bind(media.id)
        .bind(&media.original_filename)
        .bind(&media.mime_type)
        .bind(&media.description)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update media object")?;

        Ok(row.map(Into::into))
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM media_objects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete media object")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn add_subject(&self, subject: &MediaObjectSubject) -> Result<MediaObjectSubject> {
        let row: MediaSubjectRow = sqlx::query_as(
            r#"
            INSERT INTO media_object_subjects (id, media_object_id, subject_kind, subject_id, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, media_object_id, subject_kind, subject_id, description
            "#,
        )
        .bind(subject.id)
        .bind(subject.media_object_id)
        .bind(subject.subject.kind.as_str())
        .bind(subject.subject.id)
        .bind(&subject.description)
        .fetch_one(&self.pool)
        .await
        .context("Failed to link media subject")?;

        row.try_into()
    }

    pub async fn remove_subject(&self, media_object_id: Uuid, subject: SubjectRef) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM media_object_subjects
            WHERE media_object_id = $1 AND subject_kind = $2 AND subject_id = $3
            "#,
        )
        .bind(media_object_id)
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .execute(&self.pool)
        .await
        .context("Failed to unlink media subject")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn subjects_of(&self, media_object_id: Uuid) -> Result<Vec<MediaObjectSubject>> {
        let rows: Vec<MediaSubjectRow> = sqlx::query_as(
            r#"
            SELECT id, media_object_id, subject_kind, subject_id, description
            FROM media_object_subjects
            WHERE media_object_id = $1
            ORDER BY subject_kind, subject_id
            "#,
        )
        .bind(media_object_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch media subjects")?;

        rows.into_iter().map(MediaObjectSubject::try_from).collect()
    }
}

#[derive(Debug, FromRow)]
struct MediaRow {
    id: Uuid,
    sha256: String,
    original_filename: String,
    mime_type: String,
    size_bytes: i64,
    description: Option<String>,
    uploaded_at: DateTime<Utc>,
}

impl From<MediaRow> for MediaObject {
    fn from(row: MediaRow) -> Self {
        MediaObject {
            id: row.id,
            sha256: row.sha256,
            original_filename: row.original_filename,
            mime_type: row.mime_type,
            size_bytes: row.size_bytes,
            description: row.description,
            uploaded_at: row.uploaded_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct MediaSubjectRow {
    id: Uuid,
    media_object_id: Uuid,
    subject_kind: String,
    subject_id: Uuid,
    description: Option<String>,
}

impl TryFrom<MediaSubjectRow> for MediaObjectSubject {
    type Error = anyhow::Error;

    fn try_from(row: MediaSubjectRow) -> Result<Self> {
        Ok(MediaObjectSubject {
            id: row.id,
            media_object_id: row.media_object_id,
            subject: SubjectRef::new(parse_term(&row.subject_kind)?, row.subject_id),
            description: row.description,
        })
    }
}
