//! Zoological and botanical finds. All of them hang off a stratigraphic unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::vocabulary::BoneSide;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ZooBone {
    pub id: Uuid,
    pub su_id: Uuid,
    #[validate(length(min = 1, max = 255, message = "Taxon is required"))]
    pub taxon: String,
    #[validate(length(min = 1, max = 255, message = "Skeletal element is required"))]
    pub element: String,
    pub side: Option<BoneSide>,
    #[validate(range(min = 1, message = "Count must be positive"))]
    pub count: i32,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ZooBone {
    pub fn new(su_id: Uuid, taxon: impl Into<String>, element: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            su_id,
            taxon: taxon.into(),
            element: element.into(),
            side: None,
            count: 1,
            notes: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ZooTooth {
    pub id: Uuid,
    pub su_id: Uuid,
    #[validate(length(min = 1, max = 255, message = "Taxon is required"))]
    pub taxon: String,
    #[validate(length(min = 1, max = 255, message = "Tooth element is required"))]
    pub element: String,
    pub side: Option<BoneSide>,
    /// Grant-style wear stage.
    #[validate(range(min = 0, max = 10))]
    pub wear_stage: Option<i32>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ZooTooth {
    pub fn new(su_id: Uuid, taxon: impl Into<String>, element: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            su_id,
            taxon: taxon.into(),
            element: element.into(),
            side: None,
            wear_stage: None,
            notes: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct BotanyCharcoal {
    pub id: Uuid,
    pub su_id: Uuid,
    #[validate(length(min = 1, max = 255, message = "Taxon is required"))]
    pub taxon: String,
    #[validate(range(min = 1, message = "Count must be positive"))]
    pub count: i32,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BotanyCharcoal {
    pub fn new(su_id: Uuid, taxon: impl Into<String>, count: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            su_id,
            taxon: taxon.into(),
            count,
            notes: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct BotanySeed {
    pub id: Uuid,
    pub su_id: Uuid,
    #[validate(length(min = 1, max = 255, message = "Taxon is required"))]
    pub taxon: String,
    #[validate(range(min = 1, message = "Count must be positive"))]
    pub count: i32,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BotanySeed {
    pub fn new(su_id: Uuid, taxon: impl Into<String>, count: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            su_id,
            taxon: taxon.into(),
            count,
            notes: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tooth_wear_stage_bounds() {
        let mut tooth = ZooTooth::new(Uuid::new_v4(), "Ovis aries", "M3");
        tooth.wear_stage = Some(11);
        assert!(tooth.validate().is_err());
        tooth.wear_stage = Some(4);
        assert!(tooth.validate().is_ok());
    }

    #[test]
    fn test_seed_count_positive() {
        assert!(BotanySeed::new(Uuid::new_v4(), "Hordeum vulgare", 0).validate().is_err());
        assert!(BotanyCharcoal::new(Uuid::new_v4(), "Quercus", 12).validate().is_ok());
    }
}
