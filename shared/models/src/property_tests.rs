//! Property-based tests for the Strata domain models.

use proptest::prelude::*;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::{
    validate_inventory, validate_site_code, AnalysisType, Site, StratigraphicRelation,
    StratigraphicRelationship, StratigraphicUnit, SubjectKind,
};

prop_compose! {
    fn arb_uuid()(bytes in prop::array::uniform16(0u8..)) -> Uuid {
        Uuid::from_bytes(bytes)
    }
}

fn arb_relation() -> impl Strategy<Value = StratigraphicRelation> {
    prop::sample::select(StratigraphicRelation::ALL.to_vec())
}

fn arb_analysis_type() -> impl Strategy<Value = AnalysisType> {
    prop::sample::select(AnalysisType::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_inverse_is_an_involution(relation in arb_relation()) {
        prop_assert_eq!(relation.inverse().inverse(), relation);
    }

    #[test]
    fn prop_relation_text_roundtrip(relation in arb_relation()) {
        prop_assert_eq!(StratigraphicRelation::from_str(relation.as_str()).unwrap(), relation);
    }

    /// Reading a relationship from either side yields the same precedence edge.
    #[test]
    fn prop_views_agree_on_precedence(
        lft in arb_uuid(),
        rgt in arb_uuid(),
        relation in arb_relation(),
    ) {
        prop_assume!(lft != rgt);
        let stored = StratigraphicRelationship::new(lft, relation, rgt);
        let view = stored.seen_from(rgt).unwrap();
        let flipped = StratigraphicRelationship::new(rgt, view.relation, view.other_su_id);
        prop_assert_eq!(stored.precedence_edge(), flipped.precedence_edge());
    }

    #[test]
    fn prop_upper_case_codes_accepted(code in "[A-Z]{2,3}") {
        prop_assert!(validate_site_code(&code).is_ok());
        prop_assert!(Site::new(code, "Site").validate().is_ok());
    }

    #[test]
    fn prop_codes_with_other_characters_rejected(code in "[A-Z]{0,1}[a-z0-9 ]{1,3}") {
        prop_assert!(validate_site_code(&code).is_err());
    }

    #[test]
    fn prop_inventory_rejects_whitespace(prefix in "[A-Z0-9]{1,10}", suffix in "[A-Z0-9]{1,10}") {
        let inventory = format!("{} {}", prefix, suffix);
        prop_assert!(validate_inventory(&inventory).is_err());
    }

    #[test]
    fn prop_su_chronology_order(lower in -5000i32..2000, span in 0i32..3000) {
        let mut su = StratigraphicUnit::new(Uuid::new_v4(), 2020, 1);
        su.chronology_lower = Some(lower);
        su.chronology_upper = Some(lower + span);
        prop_assert!(su.validate().is_ok());

        if span > 0 {
            su.chronology_lower = Some(lower + span);
            su.chronology_upper = Some(lower);
            prop_assert!(su.validate().is_err());
        }
    }

    /// Every analysis type admits at least one kind, never a whole site.
    #[test]
    fn prop_admission_matrix_shape(analysis_type in arb_analysis_type()) {
        prop_assert!(!analysis_type.admitted_subjects().is_empty());
        prop_assert!(!analysis_type.admits(SubjectKind::Site));
    }
}
