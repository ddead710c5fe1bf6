//! Pottery sherds and vessels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// A catalogued pottery item. Its inventory number is unique within the site
/// of the SU it was recovered from.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct Pottery {
    pub id: Uuid,
    pub su_id: Uuid,
    #[validate(custom = "validate_inventory")]
    pub inventory: String,
    #[validate(length(max = 255))]
    pub culture_context: Option<String>,
    #[validate(length(max = 255))]
    pub chronology: Option<String>,
    #[validate(length(max = 255))]
    pub functional_group: Option<String>,
    #[validate(length(max = 255))]
    pub form: Option<String>,
    #[validate(length(max = 255))]
    pub surface_treatment: Option<String>,
    #[validate(length(max = 255))]
    pub decoration: Option<String>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pottery {
    pub fn new(su_id: Uuid, inventory: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            su_id,
            inventory: inventory.into(),
            culture_context: None,
            chronology: None,
            functional_group: None,
            form: None,
            surface_treatment: None,
            decoration: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

fn inventory_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"^[A-Za-z0-9._/-]{1,32}$").expect("inventory pattern"))
}

pub fn validate_inventory(inventory: &str) -> Result<(), ValidationError> {
    if inventory_regex().is_match(inventory) {
        Ok(())
    } else {
        let mut error = ValidationError::new("inventory");
        error.message = Some("Inventory must be 1-32 letters, digits or . _ / -".into());
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_format() {
        assert!(validate_inventory("ED-2019/0042").is_ok());
        assert!(validate_inventory("").is_err());
        assert!(validate_inventory("has space").is_err());
        assert!(validate_inventory(&"9".repeat(33)).is_err());
    }

    #[test]
    fn test_pottery_validation() {
        let mut pottery = Pottery::new(Uuid::new_v4(), "P.001");
        assert!(pottery.validate().is_ok());

        pottery.decoration = Some("x".repeat(256));
        assert!(pottery.validate().unwrap_err().field_errors().contains_key("decoration"));
    }
}
