//! Media objects (photos, drawings, reports) and what they depict.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::subject::SubjectRef;

/// A media object is identified by the SHA-256 of its content, so the same
/// file is never catalogued twice.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct MediaObject {
    pub id: Uuid,
    #[validate(custom = "validate_sha256")]
    pub sha256: String,
    #[validate(length(min = 1, max = 255, message = "File name must be between 1 and 255 characters"))]
    pub original_filename: String,
    #[validate(custom = "validate_mime_type")]
    pub mime_type: String,
    #[validate(range(min = 0))]
    pub size_bytes: i64,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl MediaObject {
    pub fn from_bytes(original_filename: impl Into<String>, mime_type: impl Into<String>, content: &[u8]) -> Self {
        Self {
            id: Uuid::new_v4(),
            sha256: content_hash(content),
            original_filename: original_filename.into(),
            mime_type: mime_type.into(),
            size_bytes: content.len() as i64,
            description: None,
            uploaded_at: Utc::now(),
        }
    }
}

pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct MediaObjectSubject {
    pub id: Uuid,
    pub media_object_id: Uuid,
    pub subject: SubjectRef,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
}

impl MediaObjectSubject {
    pub fn new(media_object_id: Uuid, subject: SubjectRef) -> Self {
        Self {
            id: Uuid::new_v4(),
            media_object_id,
            subject,
            description: None,
        }
    }
}

pub fn validate_sha256(hash: &str) -> Result<(), ValidationError> {
    if hash.len() == 64 && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        Ok(())
    } else {
        let mut error = ValidationError::new("sha256");
        error.message = Some("Hash must be 64 lower-case hexadecimal characters".into());
        Err(error)
    }
}

fn mime_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"^[a-z]+/[a-z0-9][a-z0-9.+-]*$").expect("mime type pattern")
    })
}

pub fn validate_mime_type(mime_type: &str) -> Result<(), ValidationError> {
    if mime_regex().is_match(mime_type) {
        Ok(())
    } else {
        let mut error = ValidationError::new("mime_type");
        error.message = Some("MIME type must look like type/subtype".into());
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_hashes_content() {
        let media = MediaObject::from_bytes("section.jpg", "image/jpeg", b"abc");
        assert_eq!(
            media.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(media.size_bytes, 3);
        assert!(media.validate().is_ok());
    }

    #[test]
    fn test_mime_type_format() {
        assert!(validate_mime_type("application/pdf").is_ok());
        assert!(validate_mime_type("image/svg+xml").is_ok());
        assert!(validate_mime_type("pdf").is_err());
    }

    #[test]
    fn test_sha256_format() {
        assert!(validate_sha256(&"a".repeat(64)).is_ok());
        assert!(validate_sha256(&"A".repeat(64)).is_err());
        assert!(validate_sha256("abc").is_err());
    }
}
