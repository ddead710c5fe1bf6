pub mod config;
pub mod logging;
pub mod error;
pub mod validation;

pub use config::*;
pub use logging::*;
pub use error::*;
pub use validation::*;

#[cfg(test)]
mod tests {
    use super::*;
    use strata_models::{ConsistencyViolation, RecordKind};
    use uuid::Uuid;

    #[test]
    fn test_config_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.database.max_connections, 10);
        assert!(config.database.run_migrations);
        assert!(!config.audit.fail_on_findings);
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        std::env::set_var("STRATA__AUDIT__FAIL_ON_FINDINGS", "notabool");
        let result = AppConfig::load();
        std::env::remove_var("STRATA__AUDIT__FAIL_ON_FINDINGS");

        assert!(result.is_err());
    }

    #[test]
    fn test_error_handling() {
        let error = StrataError::validation("test_field", "test message");
        assert_eq!(error.error_code(), "VALIDATION_ERROR");
        assert_eq!(error.http_status_code(), 400);
    }

    #[test]
    fn test_violation_status_codes() {
        let missing: StrataError = ConsistencyViolation::missing(RecordKind::Site, Uuid::nil()).into();
        assert_eq!(missing.http_status_code(), 422);

        let conflict: StrataError = ConsistencyViolation::SelfRelationship { su_id: Uuid::nil() }.into();
        assert_eq!(conflict.http_status_code(), 409);
        assert_eq!(conflict.error_code(), "CONSISTENCY_CONFLICT");
    }

    #[test]
    fn test_error_response_carries_violation() {
        let error: StrataError = ConsistencyViolation::SelfRelationship { su_id: Uuid::nil() }.into();
        let response = ErrorResponse::from(error);
        let details = response.details.unwrap();
        assert_eq!(details["code"], "self_relationship");
    }
}
