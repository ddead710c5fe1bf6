//! Excavation sites.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// An excavated site. Every other scoped record belongs to exactly one site.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[validate(schema(function = "validate_site_chronology", skip_on_field_errors = false))]
pub struct Site {
    pub id: Uuid,
    #[validate(custom = "validate_site_code")]
    pub code: String,
    #[validate(length(min = 1, max = 255, message = "Site name must be between 1 and 255 characters"))]
    pub name: String,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    pub chronology_lower: Option<i32>,
    pub chronology_upper: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Site {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            name: name.into(),
            description: None,
            chronology_lower: None,
            chronology_upper: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_chronology(mut self, lower: Option<i32>, upper: Option<i32>) -> Self {
        self.chronology_lower = lower;
        self.chronology_upper = upper;
        self
    }
}

fn site_code_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"^[A-Z]{2,3}$").expect("site code pattern"))
}

/// Site codes are two or three upper-case letters, e.g. `ED` or `KHG`.
pub fn validate_site_code(code: &str) -> Result<(), ValidationError> {
    if site_code_regex().is_match(code) {
        Ok(())
    } else {
        let mut error = ValidationError::new("site_code");
        error.message = Some("Site code must be 2 or 3 upper-case letters".into());
        Err(error)
    }
}

/// Lower bound must not be later than the upper bound. Open bounds always pass.
pub fn chronology_in_order(lower: Option<i32>, upper: Option<i32>) -> Result<(), ValidationError> {
    match (lower, upper) {
        (Some(lower), Some(upper)) if lower > upper => {
            let mut error = ValidationError::new("chronology");
            error.message = Some("Chronology lower bound is later than the upper bound".into());
            error.add_param("lower".into(), &lower);
            error.add_param("upper".into(), &upper);
            Err(error)
        }
        _ => Ok(()),
    }
}

fn validate_site_chronology(site: &Site) -> Result<(), ValidationError> {
    chronology_in_order(site.chronology_lower, site.chronology_upper)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_code_format() {
        assert!(validate_site_code("ED").is_ok());
        assert!(validate_site_code("KHG").is_ok());
        assert!(validate_site_code("ed").is_err());
        assert!(validate_site_code("ABCD").is_err());
        assert!(validate_site_code("A1").is_err());
    }

    #[test]
    fn test_valid_site() {
        let site = Site::new("ED", "Ed-Dur").with_chronology(Some(-300), Some(200));
        assert!(site.validate().is_ok());
    }

    #[test]
    fn test_inverted_chronology_rejected() {
        let site = Site::new("ED", "Ed-Dur").with_chronology(Some(200), Some(-300));
        let errors = site.validate().unwrap_err();
        assert!(errors.errors().contains_key("__all__"));
    }

    #[test]
    fn test_empty_name_rejected() {
        let site = Site::new("ED", "");
        let errors = site.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
    }
}
