use serde::Deserialize;
use serde_json::Value;
use validator::{Validate, ValidationError};

/// Body of `POST /jobs`.
///
/// The bounds are opaque: any string or number is accepted and stored as text.
/// Whether they are real years is only discovered when the worker runs the job.
#[derive(Deserialize, Debug, Validate)]
pub struct SubmitJob {
    #[validate(custom(function = "validate_bound"))]
    pub start: Value,
    #[validate(custom(function = "validate_bound"))]
    pub end: Value,
}

fn validate_bound(value: &Value) -> Result<(), ValidationError> {
    match value {
        Value::String(_) | Value::Number(_) => Ok(()),
        _ => {
            let mut err = ValidationError::new("range_bound");
            err.message = Some("Range bounds must be a string or a number".into());
            Err(err)
        }
    }
}

/// Text form of a bound: strings verbatim, numbers as written
pub fn bound_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl SubmitJob {
    pub fn bounds(&self) -> (String, String) {
        (bound_text(&self.start), bound_text(&self.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_and_strings_are_accepted() {
        let req: SubmitJob = serde_json::from_value(json!({"start": 1975, "end": "1980"})).unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.bounds(), ("1975".to_string(), "1980".to_string()));
    }

    #[test]
    fn test_bounds_are_not_checked_as_years() {
        let req: SubmitJob = serde_json::from_value(json!({"start": "soon", "end": "later"})).unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_structured_bounds_are_rejected() {
        let req: SubmitJob = serde_json::from_value(json!({"start": null, "end": [1980]})).unwrap();
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("start"));
        assert!(fields.contains_key("end"));
    }
}
