//! Normalized API specification model.
//!
//! The fetcher reduces every supported documentation format (OpenAPI
//! v2/v3 or an unstructured description) to this shape. Everything
//! downstream (mapper, test runner, drift detector) works only on
//! these types, never on raw documents.

use serde::{Deserialize, Serialize};

/// Detected authentication scheme for an API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AuthScheme {
    #[default]
    None,
    ApiKey,
    Bearer,
    Oauth2,
    Basic,
}

/// Closed set of primitive type tags for schema fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

/// One named field in a request or response schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType, required: bool) -> Self {
        Self {
            name: name.into(),
            field_type,
            required,
        }
    }
}

/// One endpoint of a normalized specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    /// Path template, e.g. `/pets/{id}`.
    pub path: String,
    /// Uppercase HTTP method.
    pub method: String,
    #[serde(default)]
    pub request_fields: Vec<FieldDef>,
    #[serde(default)]
    pub response_fields: Vec<FieldDef>,
}

impl EndpointSpec {
    /// Fields readable from this endpoint: the response schema if it
    /// declares one, otherwise the request schema.
    pub fn readable_fields(&self) -> &[FieldDef] {
        if self.response_fields.is_empty() {
            &self.request_fields
        } else {
            &self.response_fields
        }
    }

    /// Fields this endpoint accepts on write: request schema first.
    pub fn writable_fields(&self) -> &[FieldDef] {
        if self.request_fields.is_empty() {
            &self.response_fields
        } else {
            &self.request_fields
        }
    }
}

/// A fully normalized API specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedSpec {
    pub title: String,
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthScheme,
    pub endpoints: Vec<EndpointSpec>,
}

impl NormalizedSpec {
    /// Find an endpoint by path, preferring an exact method match when
    /// `method` is given.
    pub fn endpoint(&self, path: &str, method: Option<&str>) -> Option<&EndpointSpec> {
        match method {
            Some(m) => self
                .endpoints
                .iter()
                .find(|e| e.path == path && e.method.eq_ignore_ascii_case(m)),
            None => self.endpoints.iter().find(|e| e.path == path),
        }
    }
}

/// Whether an HTTP method may mutate third-party state.
///
/// Shadow calls with `skip_destructive` set only make real calls for
/// safe methods; everything else is simulated against the schema.
pub fn is_destructive(method: &str) -> bool {
    !matches!(
        method.to_ascii_uppercase().as_str(),
        "GET" | "HEAD" | "OPTIONS"
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec() -> NormalizedSpec {
        NormalizedSpec {
            title: "Petstore".to_string(),
            base_url: "https://petstore.example".to_string(),
            auth: AuthScheme::ApiKey,
            endpoints: vec![
                EndpointSpec {
                    path: "/pets".to_string(),
                    method: "GET".to_string(),
                    request_fields: vec![],
                    response_fields: vec![FieldDef::new("name", FieldType::String, true)],
                },
                EndpointSpec {
                    path: "/pets".to_string(),
                    method: "POST".to_string(),
                    request_fields: vec![FieldDef::new("name", FieldType::String, true)],
                    response_fields: vec![],
                },
            ],
        }
    }

    #[test]
    fn endpoint_lookup_prefers_method() {
        let spec = sample_spec();
        let ep = spec.endpoint("/pets", Some("post")).unwrap();
        assert_eq!(ep.method, "POST");
        assert!(spec.endpoint("/missing", None).is_none());
    }

    #[test]
    fn readable_fields_fall_back_to_request() {
        let spec = sample_spec();
        let post = spec.endpoint("/pets", Some("POST")).unwrap();
        assert_eq!(post.readable_fields()[0].name, "name");
    }

    #[test]
    fn destructive_methods() {
        assert!(!is_destructive("GET"));
        assert!(!is_destructive("head"));
        assert!(is_destructive("POST"));
        assert!(is_destructive("DELETE"));
    }

    #[test]
    fn spec_round_trips_through_json() {
        let spec = sample_spec();
        let value = serde_json::to_value(&spec).unwrap();
        let back: NormalizedSpec = serde_json::from_value(value).unwrap();
        assert_eq!(back, spec);
    }
}
