//! Turning a raw model completion into structured feedback.
//!
//! Two stages: [`strip_code_fence`] removes a markdown fence the model may
//! wrap around its answer, then [`parse_completion`] reads the JSON object and
//! reports whether it produced fields or fell back.

use serde_json::{Map, Value};

/// Which of the three generated fields a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    UserResponse,
    Summary,
    Actions,
}

impl FieldKind {
    pub fn key(self) -> &'static str {
        match self {
            FieldKind::UserResponse => "user_response",
            FieldKind::Summary => "summary",
            FieldKind::Actions => "actions",
        }
    }

    /// Separator used when the model answers with a list
    pub fn separator(self) -> &'static str {
        match self {
            FieldKind::Actions => "\n",
            FieldKind::UserResponse | FieldKind::Summary => " ",
        }
    }

    /// Substitute for a key that is missing or empty in an otherwise valid object
    pub fn missing_fallback(self) -> &'static str {
        match self {
            FieldKind::UserResponse => "Thank you for your feedback!",
            FieldKind::Summary => "User shared their experience with the product.",
            FieldKind::Actions => "- Review this feedback with the team.",
        }
    }

    /// Substitute used when the whole completion is unusable
    pub fn failure_fallback(self) -> &'static str {
        match self {
            FieldKind::UserResponse => "Thank you for your feedback! Our team will review it.",
            FieldKind::Summary => "User shared feedback about their experience.",
            FieldKind::Actions => {
                "- Review this feedback.\n- Consider reaching out to the user.\n- Check if similar feedback exists."
            }
        }
    }
}

/// A generated value as the model returned it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Scalar(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Read a JSON value. Falsy values (null, false, 0, "", [], {}) count as absent.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null | Value::Bool(false) => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(FieldValue::Scalar(s.clone())),
            Value::Number(n) if n.as_f64() == Some(0.0) => None,
            Value::Array(items) if items.is_empty() => None,
            Value::Array(items) => Some(FieldValue::List(items.iter().map(item_text).collect())),
            Value::Object(map) if map.is_empty() => None,
            other => Some(FieldValue::Scalar(other.to_string())),
        }
    }

    pub fn join(&self, separator: &str) -> String {
        match self {
            FieldValue::Scalar(s) => s.clone(),
            FieldValue::List(items) => items.join(separator),
        }
    }
}

fn item_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The three generated fields, already flattened to text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackFields {
    pub user_response: String,
    pub summary: String,
    pub actions: String,
}

impl FeedbackFields {
    pub fn failure_fallback() -> Self {
        Self {
            user_response: FieldKind::UserResponse.failure_fallback().to_string(),
            summary: FieldKind::Summary.failure_fallback().to_string(),
            actions: FieldKind::Actions.failure_fallback().to_string(),
        }
    }
}

/// Result of reading a completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    /// An object was read; `defaulted` names keys that needed the missing-key fallback
    Fields {
        fields: FeedbackFields,
        defaulted: Vec<&'static str>,
    },
    /// Nothing usable; the reason is kept for diagnostics
    Fallback { reason: String },
}

impl Parsed {
    #[cfg(test)]
    pub fn into_fields(self) -> FeedbackFields {
        match self {
            Parsed::Fields { fields, .. } => fields,
            Parsed::Fallback { .. } => FeedbackFields::failure_fallback(),
        }
    }
}

/// Remove a surrounding ```` ``` ```` / ```` ```json ```` fence, if any
pub fn strip_code_fence(text: &str) -> &str {
    let mut text = text.trim();

    if let Some(rest) = text.strip_prefix("```") {
        text = match rest.get(..4) {
            Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
            _ => rest,
        };
        text = text.trim();

        if let Some(body) = text.strip_suffix("```") {
            text = body.trim();
        }
    }

    text
}

/// Parse a completion into fields, falling back per key or as a whole
pub fn parse_completion(raw: &str) -> Parsed {
    let text = strip_code_fence(raw);

    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            return Parsed::Fallback {
                reason: format!("invalid JSON: {e}"),
            };
        }
    };

    let Value::Object(object) = value else {
        return Parsed::Fallback {
            reason: "completion is not a JSON object".to_string(),
        };
    };

    let mut defaulted = Vec::new();
    let mut field = |kind: FieldKind| resolve_field(&object, kind, &mut defaulted);

    let fields = FeedbackFields {
        user_response: field(FieldKind::UserResponse),
        summary: field(FieldKind::Summary),
        actions: field(FieldKind::Actions),
    };

    Parsed::Fields { fields, defaulted }
}

fn resolve_field(
    object: &Map<String, Value>,
    kind: FieldKind,
    defaulted: &mut Vec<&'static str>,
) -> String {
    let joined = object
        .get(kind.key())
        .and_then(FieldValue::from_json)
        .map(|value| value.join(kind.separator()))
        .filter(|text| !text.trim().is_empty());

    match joined {
        Some(text) => text,
        None => {
            defaulted.push(kind.key());
            kind.missing_fallback().to_string()
        }
    }
}
