use crate::error::{StrataError, StrataResult};
use validator::{Validate, ValidationError, ValidationErrors};

/// Field name the validator crate uses for struct-level (schema) errors.
const SCHEMA_FIELD: &str = "__all__";

pub fn validate_model<T: Validate>(model: &T) -> StrataResult<()> {
    match model.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let field = first_field(&errors);
            Err(StrataError::validation(field, format_validation_errors(&errors)))
        }
    }
}

fn first_field(errors: &ValidationErrors) -> String {
    let mut fields: Vec<&str> = errors.field_errors().keys().copied().collect();
    fields.sort_unstable();
    match fields.as_slice() {
        [] => "model".to_string(),
        [single] if *single == SCHEMA_FIELD => "model".to_string(),
        [single] => single.to_string(),
        _ => "model".to_string(),
    }
}

pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut field_errors: Vec<_> = errors.field_errors().into_iter().collect();
    // HashMap order is not stable; keep messages deterministic.
    field_errors.sort_by_key(|(field, _)| *field);

    let mut messages = Vec::new();
    for (field, field_errors) in field_errors {
        for error in field_errors {
            messages.push(describe(field, error));
        }
    }

    messages.join(", ")
}

fn describe(field: &str, error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return if field == SCHEMA_FIELD {
            message.to_string()
        } else {
            format!("{}: {}", field, message)
        };
    }

    match error.code.as_ref() {
        "length" => format!("Length validation failed for field '{}'", field),
        "range" => format!("Value out of range for field '{}'", field),
        "required" => format!("Field '{}' is required", field),
        code => format!("Validation failed for field '{}': {}", field, code),
    }
}

pub fn validate_uuid(uuid_str: &str) -> StrataResult<uuid::Uuid> {
    uuid::Uuid::parse_str(uuid_str)
        .map_err(|_| StrataError::validation("uuid", "Invalid UUID format"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_models::{Pottery, Site, StratigraphicUnit};

    #[test]
    fn test_valid_model_passes() {
        assert!(validate_model(&Site::new("ED", "Ed-Dur")).is_ok());
    }

    #[test]
    fn test_custom_message_is_reported() {
        let err = validate_model(&Site::new("ed", "Ed-Dur")).unwrap_err();
        match err {
            StrataError::Validation { field, message } => {
                assert_eq!(field, "code");
                assert_eq!(message, "code: Site code must be 2 or 3 upper-case letters");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_schema_errors_are_reported_without_field_prefix() {
        let site = Site::new("ED", "Ed-Dur").with_chronology(Some(10), Some(-10));
        let err = validate_model(&site).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: model - Chronology lower bound is later than the upper bound"
        );
    }

    #[test]
    fn test_multiple_fields_are_sorted() {
        let mut su = StratigraphicUnit::new(uuid::Uuid::new_v4(), 1700, 0);
        su.description = Some("x".repeat(5000));
        let message = match validate_model(&su).unwrap_err() {
            StrataError::Validation { message, .. } => message,
            other => panic!("unexpected {:?}", other),
        };
        let description = message.find("description").unwrap();
        let number = message.find("number").unwrap();
        let year = message.find("year").unwrap();
        assert!(description < number && number < year);
    }

    #[test]
    fn test_inventory_rejected() {
        let pottery = Pottery::new(uuid::Uuid::new_v4(), "bad inventory");
        assert!(validate_model(&pottery).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("not-a-uuid").is_err());
        assert!(validate_uuid("67e55044-10b1-426f-9247-bb680e5fe0c8").is_ok());
    }
}
