//! Validation Utilities

use validator::{Validate, ValidationErrors};

use super::error::{AppError, FieldError};

/// Convert validation errors to AppError
pub fn validation_error(errors: ValidationErrors) -> AppError {
    let mut field_errors: Vec<FieldError> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| FieldError {
                field: field.to_string(),
                message: e
                    .message
                    .clone()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string()),
            })
        })
        .collect();
    // HashMap order is unstable
    field_errors.sort_by(|a, b| a.field.cmp(&b.field));

    let message = field_errors
        .first()
        .map(|e| format!("{}: {}", e.field, e.message))
        .unwrap_or_else(|| "Validation failed".into());

    AppError::Validation {
        message,
        errors: field_errors,
    }
}

/// Runs the derived validator and converts failures.
pub fn validate<T: Validate>(body: &T) -> Result<(), AppError> {
    body.validate().map_err(validation_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct Sample {
        #[validate(email(message = "Invalid email format"))]
        email: String,
        #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
        password: String,
    }

    #[test]
    fn test_errors_are_sorted_by_field() {
        let err = validate(&Sample {
            email: "nope".into(),
            password: "short".into(),
        })
        .unwrap_err();

        match err {
            AppError::Validation { message, errors } => {
                assert_eq!(message, "email: Invalid email format");
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[1].field, "password");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_valid_body_passes() {
        assert!(validate(&Sample {
            email: "ann@example.com".into(),
            password: "password123".into(),
        })
        .is_ok());
    }
}
