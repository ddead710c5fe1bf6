//! Excavation contexts and samples, both grouped per site and linked to SUs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::vocabulary::{ContextType, SampleType};

/// An interpretive grouping of stratigraphic units (a pit fill, a wall, a burial).
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct Context {
    pub id: Uuid,
    pub site_id: Uuid,
    pub context_type: ContextType,
    #[validate(length(min = 1, max = 255, message = "Context name must be between 1 and 255 characters"))]
    pub name: String,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Context {
    pub fn new(site_id: Uuid, context_type: ContextType, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            site_id,
            context_type,
            name: name.into(),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextStratigraphicUnit {
    pub id: Uuid,
    pub context_id: Uuid,
    pub su_id: Uuid,
}

impl ContextStratigraphicUnit {
    pub fn new(context_id: Uuid, su_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            context_id,
            su_id,
        }
    }
}

/// A sample taken on site, numbered per site, type and year.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct Sample {
    pub id: Uuid,
    pub site_id: Uuid,
    pub sample_type: SampleType,
    #[validate(range(min = 1900, max = 2100, message = "Sampling year must be between 1900 and 2100"))]
    pub year: i32,
    #[validate(range(min = 1, message = "Sample number must be positive"))]
    pub number: i32,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sample {
    pub fn new(site_id: Uuid, sample_type: SampleType, year: i32, number: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            site_id,
            sample_type,
            year,
            number,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SampleStratigraphicUnit {
    pub id: Uuid,
    pub sample_id: Uuid,
    pub su_id: Uuid,
}

impl SampleStratigraphicUnit {
    pub fn new(sample_id: Uuid, su_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            sample_id,
            su_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_name_required() {
        let context = Context::new(Uuid::new_v4(), ContextType::Fill, "");
        assert!(context.validate().is_err());
    }

    #[test]
    fn test_sample_bounds() {
        let sample = Sample::new(Uuid::new_v4(), SampleType::Charcoal, 2021, 3);
        assert!(sample.validate().is_ok());

        let sample = Sample::new(Uuid::new_v4(), SampleType::Charcoal, 2021, -3);
        assert!(sample.validate().is_err());
    }
}
