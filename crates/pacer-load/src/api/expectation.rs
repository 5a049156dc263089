use crate::api::client::HttpOutcome;
use serde_json::Value;

pub const JSON_MEDIA_TYPE: &str = "application/json";

/// Required structure of a JSON response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyShape {
    Any,
    /// A single object carrying every listed field.
    Object(&'static [&'static str]),
    /// An array whose every element is an object carrying every listed field.
    ArrayOfObjects(&'static [&'static str]),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Mismatch {
    #[error("expected status {expected}, got {actual}")]
    Status { expected: u16, actual: u16 },
    #[error("expected media type {expected}, got {actual}")]
    MediaType { expected: String, actual: String },
    #[error("body is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("expected a JSON {expected}, got {actual}")]
    Shape {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("record {index} is missing field '{field}'")]
    MissingField { index: usize, field: &'static str },
}

/// What every response of a case must look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expectation {
    pub status: u16,
    pub media_type: Option<&'static str>,
    pub body: BodyShape,
}

impl Expectation {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            media_type: None,
            body: BodyShape::Any,
        }
    }

    pub fn json(status: u16, body: BodyShape) -> Self {
        Self {
            status,
            media_type: Some(JSON_MEDIA_TYPE),
            body,
        }
    }

    pub fn with_body(mut self, body: BodyShape) -> Self {
        self.body = body;
        self
    }

    pub fn check(&self, outcome: &HttpOutcome) -> Result<(), Mismatch> {
        if outcome.status != self.status {
            return Err(Mismatch::Status {
                expected: self.status,
                actual: outcome.status,
            });
        }

        if let Some(expected) = self.media_type {
            if outcome.content_type.as_deref() != Some(expected) {
                return Err(Mismatch::MediaType {
                    expected: expected.to_string(),
                    actual: outcome
                        .content_type
                        .clone()
                        .unwrap_or_else(|| "<none>".to_string()),
                });
            }
        }

        match self.body {
            BodyShape::Any => Ok(()),
            BodyShape::Object(fields) => {
                let value = parse(&outcome.body)?;
                check_record(&value, 0, fields)
            }
            BodyShape::ArrayOfObjects(fields) => {
                let value = parse(&outcome.body)?;
                let items = value.as_array().ok_or(Mismatch::Shape {
                    expected: "array",
                    actual: json_kind(&value),
                })?;
                items
                    .iter()
                    .enumerate()
                    .try_for_each(|(index, item)| check_record(item, index, fields))
            }
        }
    }
}

fn parse(body: &str) -> Result<Value, Mismatch> {
    serde_json::from_str(body).map_err(|e| Mismatch::InvalidJson(e.to_string()))
}

fn check_record(value: &Value, index: usize, fields: &'static [&'static str]) -> Result<(), Mismatch> {
    let object = value.as_object().ok_or(Mismatch::Shape {
        expected: "object",
        actual: json_kind(value),
    })?;
    match fields.iter().find(|field| !object.contains_key(**field)) {
        Some(field) => Err(Mismatch::MissingField {
            index,
            field: *field,
        }),
        None => Ok(()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
