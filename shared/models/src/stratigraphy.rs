//! Stratigraphic units and the relationships between them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::site::chronology_in_order;

/// A stratigraphic unit (SU), identified within its site by excavation year and number.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[validate(schema(function = "validate_su_chronology", skip_on_field_errors = false))]
pub struct StratigraphicUnit {
    pub id: Uuid,
    pub site_id: Uuid,
    #[validate(range(min = 1900, max = 2100, message = "Excavation year must be between 1900 and 2100"))]
    pub year: i32,
    #[validate(range(min = 1, message = "SU number must be positive"))]
    pub number: i32,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    #[validate(length(max = 4000))]
    pub interpretation: Option<String>,
    pub chronology_lower: Option<i32>,
    pub chronology_upper: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StratigraphicUnit {
    pub fn new(site_id: Uuid, year: i32, number: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            site_id,
            year,
            number,
            description: None,
            interpretation: None,
            chronology_lower: None,
            chronology_upper: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Human readable code, e.g. `ED.2019.104`.
    pub fn code(&self, site_code: &str) -> String {
        format!("{}.{}.{}", site_code, self.year, self.number)
    }
}

fn validate_su_chronology(su: &StratigraphicUnit) -> Result<(), ValidationError> {
    chronology_in_order(su.chronology_lower, su.chronology_upper)
}

vocabulary! {
    /// Relation between two stratigraphic units, read left to right:
    /// "SU 12 covers SU 13".
    StratigraphicRelation {
        Covers => "covers",
        CoveredBy => "covered_by",
        Cuts => "cuts",
        CutBy => "cut_by",
        Fills => "fills",
        FilledBy => "filled_by",
        Abuts => "abuts",
        AbuttedBy => "abutted_by",
        Equals => "equals",
        BondsWith => "bonds_with",
    }
}

/// Relative order the relation implies for its left unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    /// The left unit was formed after the right one.
    Later,
    /// The left unit was formed before the right one.
    Earlier,
}

impl StratigraphicRelation {
    /// The same fact seen from the right unit.
    pub fn inverse(&self) -> Self {
        use StratigraphicRelation::*;

        match self {
            Covers => CoveredBy,
            CoveredBy => Covers,
            Cuts => CutBy,
            CutBy => Cuts,
            Fills => FilledBy,
            FilledBy => Fills,
            Abuts => AbuttedBy,
            AbuttedBy => Abuts,
            Equals => Equals,
            BondsWith => BondsWith,
        }
    }

    /// Abutting, equal and bonded units carry no temporal order.
    pub fn precedence(&self) -> Option<Precedence> {
        use StratigraphicRelation::*;

        match self {
            Covers | Cuts | Fills => Some(Precedence::Later),
            CoveredBy | CutBy | FilledBy => Some(Precedence::Earlier),
            Abuts | AbuttedBy | Equals | BondsWith => None,
        }
    }

    pub fn is_symmetric(&self) -> bool {
        self.inverse() == *self
    }
}

/// A stored relationship. It is kept in the direction it was recorded and
/// presented from either unit's side through [`StratigraphicRelationship::seen_from`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StratigraphicRelationship {
    pub id: Uuid,
    pub lft_su_id: Uuid,
    pub relation: StratigraphicRelation,
    pub rgt_su_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A relationship as read from one of its units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationView {
    pub relationship_id: Uuid,
    pub relation: StratigraphicRelation,
    pub other_su_id: Uuid,
}

impl StratigraphicRelationship {
    pub fn new(lft_su_id: Uuid, relation: StratigraphicRelation, rgt_su_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            lft_su_id,
            relation,
            rgt_su_id,
            created_at: Utc::now(),
        }
    }

    pub fn involves(&self, su_id: Uuid) -> bool {
        self.lft_su_id == su_id || self.rgt_su_id == su_id
    }

    pub fn seen_from(&self, su_id: Uuid) -> Option<RelationView> {
        if su_id == self.lft_su_id {
            Some(RelationView {
                relationship_id: self.id,
                relation: self.relation,
                other_su_id: self.rgt_su_id,
            })
        } else if su_id == self.rgt_su_id {
            Some(RelationView {
                relationship_id: self.id,
                relation: self.relation.inverse(),
                other_su_id: self.lft_su_id,
            })
        } else {
            None
        }
    }

    /// `(later, earlier)` when the relation orders the two units in time.
    pub fn precedence_edge(&self) -> Option<(Uuid, Uuid)> {
        match self.relation.precedence()? {
            Precedence::Later => Some((self.lft_su_id, self.rgt_su_id)),
            Precedence::Earlier => Some((self.rgt_su_id, self.lft_su_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_su_code() {
        let su = StratigraphicUnit::new(Uuid::new_v4(), 2019, 104);
        assert_eq!(su.code("ED"), "ED.2019.104");
    }

    #[test]
    fn test_su_year_bounds() {
        let su = StratigraphicUnit::new(Uuid::new_v4(), 1850, 1);
        assert!(su.validate().unwrap_err().field_errors().contains_key("year"));

        let su = StratigraphicUnit::new(Uuid::new_v4(), 2020, 0);
        assert!(su.validate().unwrap_err().field_errors().contains_key("number"));
    }

    #[test]
    fn test_inverse_and_precedence_agree() {
        for relation in StratigraphicRelation::ALL {
            let inverse = relation.inverse();
            match (relation.precedence(), inverse.precedence()) {
                (Some(Precedence::Later), Some(Precedence::Earlier))
                | (Some(Precedence::Earlier), Some(Precedence::Later))
                | (None, None) => {}
                other => panic!("{} and {} disagree: {:?}", relation, inverse, other),
            }
        }
    }

    #[test]
    fn test_seen_from_right_side_inverts() {
        let upper = Uuid::new_v4();
        let lower = Uuid::new_v4();
        let rel = StratigraphicRelationship::new(upper, StratigraphicRelation::Covers, lower);

        let view = rel.seen_from(lower).unwrap();
        assert_eq!(view.relation, StratigraphicRelation::CoveredBy);
        assert_eq!(view.other_su_id, upper);
        assert!(rel.seen_from(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_precedence_edge_direction() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let rel = StratigraphicRelationship::new(a, StratigraphicRelation::FilledBy, b);
        assert_eq!(rel.precedence_edge(), Some((b, a)));

        let rel = StratigraphicRelationship::new(a, StratigraphicRelation::Abuts, b);
        assert_eq!(rel.precedence_edge(), None);
    }
}
