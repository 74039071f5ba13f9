//! Validation Utilities

use validator::{Validate, ValidationErrors};

use super::error::{AppError, FieldError};

/// Run `validator` rules on a request body, mapping failures to `AppError::Validation`.
pub fn validate_body<T: Validate>(body: &T) -> Result<(), AppError> {
    body.validate().map_err(validation_error)
}

/// Convert validation errors to `AppError`.
///
/// Every failing rule becomes a [`FieldError`], ordered by field name. The
/// headline message is the first of them as `field: reason`.
pub fn validation_error(errors: ValidationErrors) -> AppError {
    let mut by_field: Vec<_> = errors.field_errors().into_iter().collect();
    by_field.sort_by(|a, b| a.0.cmp(&b.0));

    let fields: Vec<FieldError> = by_field
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| FieldError {
                field: field.to_string(),
                message: e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string()),
            })
        })
        .collect();

    let message = fields
        .first()
        .map(|e| format!("{}: {}", e.field, e.message))
        .unwrap_or_else(|| "Validation failed".into());

    AppError::Validation { message, fields }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct Body {
        #[validate(length(max = 3, message = "too long"))]
        text: String,
        #[validate(range(min = 1))]
        count: u32,
    }

    #[test]
    fn test_reports_every_field_and_first_as_message() {
        let err = validate_body(&Body {
            text: "abcd".into(),
            count: 0,
        })
        .unwrap_err();

        match err {
            AppError::Validation { message, fields } => {
                assert_eq!(message, "count: range");
                assert_eq!(
                    fields,
                    vec![
                        FieldError {
                            field: "count".into(),
                            message: "range".into(),
                        },
                        FieldError {
                            field: "text".into(),
                            message: "too long".into(),
                        },
                    ]
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_valid_body_passes() {
        assert!(validate_body(&Body {
            text: "abc".into(),
            count: 1
        })
        .is_ok());
    }
}
