//! Image generation payloads

use domain::{ImageRequest, ModelMetadata, ParameterSchema};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::InferenceError;

/// Field clamped into range instead of rejected
const IMAGE_COUNT_FIELD: &str = "n";

/// Validate an image request against `meta.post_parameters` and build the body
///
/// Enumerated fields reject unknown values, numeric fields reject values
/// outside their range except `n`, which is clamped. Parameters without a
/// schema entry are dropped.
pub fn build_image_payload(
    model: &str,
    meta: &ModelMetadata,
    request: &ImageRequest,
) -> Result<Value, InferenceError> {
    let prompt = request
        .prompt()
        .ok_or_else(|| InferenceError::MissingRequiredField("prompt".to_string()))?;

    let mut body = Map::new();
    body.insert("model".to_string(), json!(model));
    body.insert("prompt".to_string(), json!(prompt));

    let mut validated = Map::new();
    for (field, value) in &request.params {
        if field == "model" || field == "prompt" {
            continue;
        }
        let Some(schema) = meta.post_parameters.as_ref().and_then(|p| p.get(field)) else {
            debug!(param = %field, model, "Dropping image parameter without schema");
            continue;
        };
        validated.insert(field.clone(), validate(field, value, schema)?);
    }

    super::merge_whitelisted(&mut body, validated, |_| true);
    Ok(Value::Object(body))
}

fn validate(field: &str, value: &Value, schema: &ParameterSchema) -> Result<Value, InferenceError> {
    match schema {
        ParameterSchema::Enum { values, .. } => {
            if values.contains(value) {
                Ok(value.clone())
            } else {
                Err(InferenceError::ParameterNotAllowed {
                    field: field.to_string(),
                    value: value.to_string(),
                    allowed: values.iter().map(ToString::to_string).collect(),
                })
            }
        },
        ParameterSchema::Integer { min, max, .. } => {
            let Some(number) = value.as_i64() else {
                return Err(out_of_range(field, value, "expected an integer"));
            };
            if field == IMAGE_COUNT_FIELD {
                let low = min.unwrap_or(i64::MIN);
                let high = max.unwrap_or(i64::MAX).max(low);
                return Ok(json!(number.clamp(low, high)));
            }
            check_bounds(field, value, number, *min, *max)?;
            Ok(value.clone())
        },
        ParameterSchema::Number { min, max } => {
            let Some(number) = value.as_f64() else {
                return Err(out_of_range(field, value, "expected a number"));
            };
            check_bounds(field, value, number, *min, *max)?;
            Ok(value.clone())
        },
        ParameterSchema::String => {
            if value.is_string() {
                Ok(value.clone())
            } else {
                Err(out_of_range(field, value, "expected a string"))
            }
        },
    }
}

fn check_bounds<T>(
    field: &str,
    value: &Value,
    number: T,
    min: Option<T>,
    max: Option<T>,
) -> Result<(), InferenceError>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if let Some(min) = min {
        if number < min {
            return Err(out_of_range(field, value, &format!("min {min}")));
        }
    }
    if let Some(max) = max {
        if number > max {
            return Err(out_of_range(field, value, &format!("max {max}")));
        }
    }
    Ok(())
}

fn out_of_range(field: &str, value: &Value, bound: &str) -> InferenceError {
    InferenceError::ParameterOutOfRange {
        field: field.to_string(),
        value: value.to_string(),
        bound: bound.to_string(),
    }
}
