//! OpenAPI v2/v3 normalization into the core specification model.

use serde_json::Value;
use weave_core::spec::{AuthScheme, EndpointSpec, FieldDef, FieldType, NormalizedSpec};

use crate::FetcherError;

const HTTP_METHODS: &[&str] = &["get", "put", "post", "delete", "patch", "head", "options"];

/// Normalize an OpenAPI document, detecting v2 vs v3.
pub fn normalize(doc: &Value, fallback_base_url: &str) -> Result<NormalizedSpec, FetcherError> {
    let is_v2 = doc.get("swagger").and_then(Value::as_str).is_some();
    let is_v3 = doc.get("openapi").and_then(Value::as_str).is_some();

    if !is_v2 && !is_v3 {
        return Err(FetcherError::Parse(
            "document has neither a 'swagger' nor an 'openapi' version field".to_string(),
        ));
    }

    let title = doc
        .pointer("/info/title")
        .and_then(Value::as_str)
        .unwrap_or("untitled")
        .to_string();

    let base_url = if is_v2 {
        base_url_v2(doc)
    } else {
        base_url_v3(doc)
    }
    .unwrap_or_else(|| fallback_base_url.to_string());

    let auth = detect_auth(doc, is_v2);

    let mut endpoints = Vec::new();
    if let Some(paths) = doc.get("paths").and_then(Value::as_object) {
        for (path, item) in paths {
            let Some(item) = item.as_object() else { continue };
            for (method, op) in item {
                if !HTTP_METHODS.contains(&method.as_str()) {
                    continue;
                }
                endpoints.push(EndpointSpec {
                    path: path.clone(),
                    method: method.to_ascii_uppercase(),
                    request_fields: request_fields(op, doc, is_v2),
                    response_fields: response_fields(op, doc, is_v2),
                });
            }
        }
    }

    Ok(NormalizedSpec {
        title,
        base_url,
        auth,
        endpoints,
    })
}

/// Best-effort normalization of an unstructured JSON sample: infer a
/// single read endpoint whose fields mirror the sample's shape.
pub fn normalize_sample(
    doc: &Value,
    fallback_base_url: &str,
) -> Result<NormalizedSpec, FetcherError> {
    // An array sample describes its element shape.
    let object = match doc {
        Value::Array(items) => items.first().and_then(Value::as_object),
        Value::Object(map) => Some(map),
        _ => None,
    };

    let Some(object) = object else {
        return Err(FetcherError::UnsupportedSchema(
            "unstructured document is not an object or array of objects".to_string(),
        ));
    };

    let fields: Vec<FieldDef> = object
        .iter()
        .map(|(name, value)| FieldDef::new(name.clone(), type_of_value(value), false))
        .collect();

    Ok(NormalizedSpec {
        title: "inferred".to_string(),
        base_url: fallback_base_url.to_string(),
        auth: AuthScheme::None,
        endpoints: vec![EndpointSpec {
            path: "/".to_string(),
            method: "GET".to_string(),
            request_fields: vec![],
            response_fields: fields,
        }],
    })
}

// ---------------------------------------------------------------------------
// Base URL
// ---------------------------------------------------------------------------

fn base_url_v2(doc: &Value) -> Option<String> {
    let host = doc.get("host").and_then(Value::as_str)?;
    let base_path = doc.get("basePath").and_then(Value::as_str).unwrap_or("");
    let scheme = doc
        .pointer("/schemes/0")
        .and_then(Value::as_str)
        .unwrap_or("https");
    Some(format!("{scheme}://{host}{base_path}"))
}

fn base_url_v3(doc: &Value) -> Option<String> {
    let url = doc.pointer("/servers/0/url").and_then(Value::as_str)?;
    // Relative server URLs are useless without the document origin;
    // let the caller's fallback win.
    if url.starts_with('/') {
        return None;
    }
    Some(url.to_string())
}

// ---------------------------------------------------------------------------
// Auth detection
// ---------------------------------------------------------------------------

fn detect_auth(doc: &Value, is_v2: bool) -> AuthScheme {
    let schemes = if is_v2 {
        doc.get("securityDefinitions")
    } else {
        doc.pointer("/components/securitySchemes")
    };
    let Some(schemes) = schemes.and_then(Value::as_object) else {
        return AuthScheme::None;
    };

    for scheme in schemes.values() {
        let kind = scheme.get("type").and_then(Value::as_str).unwrap_or("");
        match kind {
            "apiKey" => return AuthScheme::ApiKey,
            "oauth2" => return AuthScheme::Oauth2,
            "basic" => return AuthScheme::Basic,
            "http" => {
                let http_scheme = scheme.get("scheme").and_then(Value::as_str).unwrap_or("");
                if http_scheme.eq_ignore_ascii_case("bearer") {
                    return AuthScheme::Bearer;
                }
                if http_scheme.eq_ignore_ascii_case("basic") {
                    return AuthScheme::Basic;
                }
            }
            _ => {}
        }
    }
    AuthScheme::None
}

// ---------------------------------------------------------------------------
// Field extraction
// ---------------------------------------------------------------------------

fn request_fields(op: &Value, doc: &Value, is_v2: bool) -> Vec<FieldDef> {
    let mut fields = Vec::new();

    if is_v2 {
        // v2: body parameter schema + query parameters.
        if let Some(params) = op.get("parameters").and_then(Value::as_array) {
            for param in params {
                match param.get("in").and_then(Value::as_str) {
                    Some("body") => {
                        if let Some(schema) = param.get("schema") {
                            fields.extend(schema_fields(schema, doc));
                        }
                    }
                    Some("query") => {
                        if let Some(name) = param.get("name").and_then(Value::as_str) {
                            let ty = param
                                .get("type")
                                .and_then(Value::as_str)
                                .map(type_from_tag)
                                .unwrap_or(FieldType::String);
                            let required = param
                                .get("required")
                                .and_then(Value::as_bool)
                                .unwrap_or(false);
                            fields.push(FieldDef::new(name, ty, required));
                        }
                    }
                    _ => {}
                }
            }
        }
    } else if let Some(schema) = op.pointer("/requestBody/content/application~1json/schema") {
        fields.extend(schema_fields(schema, doc));
    }

    fields
}

fn response_fields(op: &Value, doc: &Value, is_v2: bool) -> Vec<FieldDef> {
    let responses = op.get("responses").and_then(Value::as_object);
    let Some(responses) = responses else {
        return vec![];
    };

    // Prefer 200, then 201, then default.
    let response = responses
        .get("200")
        .or_else(|| responses.get("201"))
        .or_else(|| responses.get("default"));
    let Some(response) = response else {
        return vec![];
    };

    let schema = if is_v2 {
        response.get("schema")
    } else {
        response.pointer("/content/application~1json/schema")
    };
    schema.map(|s| schema_fields(s, doc)).unwrap_or_default()
}

/// Enumerate the named fields of a schema, resolving `$ref` and
/// unwrapping array items one level.
fn schema_fields(schema: &Value, doc: &Value) -> Vec<FieldDef> {
    let schema = resolve_ref(schema, doc);

    // Arrays describe their element shape.
    if schema.get("type").and_then(Value::as_str) == Some("array") {
        if let Some(items) = schema.get("items") {
            return schema_fields(items, doc);
        }
        return vec![];
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return vec![];
    };

    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    properties
        .iter()
        .map(|(name, prop)| {
            let prop = resolve_ref(prop, doc);
            let ty = prop
                .get("type")
                .and_then(Value::as_str)
                .map(type_from_tag)
                // Schemas with no type tag are almost always nested
                // object refs.
                .unwrap_or(FieldType::Object);
            FieldDef::new(name.clone(), ty, required.contains(&name.as_str()))
        })
        .collect()
}

/// Follow a local `$ref` (`#/definitions/X` or `#/components/schemas/X`).
fn resolve_ref<'a>(schema: &'a Value, doc: &'a Value) -> &'a Value {
    let Some(reference) = schema.get("$ref").and_then(Value::as_str) else {
        return schema;
    };
    let Some(pointer) = reference.strip_prefix('#') else {
        return schema;
    };
    doc.pointer(pointer).unwrap_or(schema)
}

fn type_from_tag(tag: &str) -> FieldType {
    match tag {
        "integer" | "number" => FieldType::Number,
        "boolean" => FieldType::Boolean,
        "array" => FieldType::Array,
        "object" => FieldType::Object,
        _ => FieldType::String,
    }
}

fn type_of_value(value: &Value) -> FieldType {
    match value {
        Value::Number(_) => FieldType::Number,
        Value::Bool(_) => FieldType::Boolean,
        Value::Array(_) => FieldType::Array,
        Value::Object(_) => FieldType::Object,
        _ => FieldType::String,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn petstore_v2() -> Value {
        json!({
            "swagger": "2.0",
            "info": { "title": "Petstore" },
            "host": "petstore.example",
            "basePath": "/v2",
            "schemes": ["https"],
            "securityDefinitions": {
                "api_key": { "type": "apiKey", "name": "api_key", "in": "header" }
            },
            "paths": {
                "/pets": {
                    "get": {
                        "responses": {
                            "200": {
                                "schema": {
                                    "type": "array",
                                    "items": { "$ref": "#/definitions/Pet" }
                                }
                            }
                        }
                    },
                    "post": {
                        "parameters": [
                            { "in": "body", "name": "body",
                              "schema": { "$ref": "#/definitions/Pet" } }
                        ],
                        "responses": { "200": {} }
                    }
                }
            },
            "definitions": {
                "Pet": {
                    "type": "object",
                    "required": ["name"],
                    "properties": {
                        "name": { "type": "string" },
                        "age": { "type": "integer" },
                        "vaccinated": { "type": "boolean" }
                    }
                }
            }
        })
    }

    fn todos_v3() -> Value {
        json!({
            "openapi": "3.0.0",
            "info": { "title": "Todos" },
            "servers": [{ "url": "https://todos.example/api" }],
            "components": {
                "securitySchemes": {
                    "bearerAuth": { "type": "http", "scheme": "bearer" }
                },
                "schemas": {
                    "Todo": {
                        "type": "object",
                        "required": ["title"],
                        "properties": {
                            "title": { "type": "string" },
                            "completed": { "type": "boolean" }
                        }
                    }
                }
            },
            "paths": {
                "/todos": {
                    "post": {
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/Todo" }
                                }
                            }
                        },
                        "responses": { "201": {} }
                    }
                }
            }
        })
    }

    #[test]
    fn v2_document_normalizes() {
        let spec = normalize(&petstore_v2(), "https://fallback.example").unwrap();
        assert_eq!(spec.title, "Petstore");
        assert_eq!(spec.base_url, "https://petstore.example/v2");
        assert_eq!(spec.auth, AuthScheme::ApiKey);
        assert_eq!(spec.endpoints.len(), 2);

        let get = spec.endpoint("/pets", Some("GET")).unwrap();
        let names: Vec<_> = get.response_fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["age", "name", "vaccinated"]);
        let name = get.response_fields.iter().find(|f| f.name == "name").unwrap();
        assert!(name.required);
        assert_eq!(name.field_type, FieldType::String);
    }

    #[test]
    fn v3_document_normalizes() {
        let spec = normalize(&todos_v3(), "https://fallback.example").unwrap();
        assert_eq!(spec.base_url, "https://todos.example/api");
        assert_eq!(spec.auth, AuthScheme::Bearer);

        let post = spec.endpoint("/todos", Some("POST")).unwrap();
        assert_eq!(post.request_fields.len(), 2);
        let title = post.request_fields.iter().find(|f| f.name == "title").unwrap();
        assert!(title.required);
    }

    #[test]
    fn missing_version_field_is_parse_error() {
        let result = normalize(&json!({ "info": {} }), "https://x.example");
        assert_matches!(result, Err(FetcherError::Parse(_)));
    }

    #[test]
    fn relative_v3_server_uses_fallback() {
        let mut doc = todos_v3();
        doc["servers"] = json!([{ "url": "/api" }]);
        let spec = normalize(&doc, "https://origin.example").unwrap();
        assert_eq!(spec.base_url, "https://origin.example");
    }

    #[test]
    fn sample_inference() {
        let sample = json!([{ "id": 1, "email": "a@b.c", "done": false }]);
        let spec = normalize_sample(&sample, "https://sample.example").unwrap();
        let ep = &spec.endpoints[0];
        assert_eq!(ep.method, "GET");
        let id = ep.response_fields.iter().find(|f| f.name == "id").unwrap();
        assert_eq!(id.field_type, FieldType::Number);
    }

    #[test]
    fn scalar_sample_is_unsupported() {
        let result = normalize_sample(&json!(42), "https://x.example");
        assert_matches!(result, Err(FetcherError::UnsupportedSchema(_)));
    }
}
