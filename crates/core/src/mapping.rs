//! Schema-aware field mapping between two normalized endpoints.
//!
//! For every destination field the mapper tries, in order: exact name
//! with compatible type, a user hint, fuzzy name similarity, then
//! type-coercion candidates. Fields with no candidate are surfaced as
//! gaps, never silently dropped.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::spec::{EndpointSpec, FieldDef, FieldType};

/// Minimum normalized similarity for a fuzzy name match.
pub const FUZZY_THRESHOLD: f64 = 0.8;

/// Kind of one field-level transformation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformationKind {
    Direct,
    SemanticMapping,
    ParseNumeric,
    Stringify,
    ParseBoolean,
    CollectIntoArray,
    Custom,
}

impl TransformationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::SemanticMapping => "semantic-mapping",
            Self::ParseNumeric => "parse-numeric",
            Self::Stringify => "stringify",
            Self::ParseBoolean => "parse-boolean",
            Self::CollectIntoArray => "collect-into-array",
            Self::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "direct" => Some(Self::Direct),
            "semantic-mapping" => Some(Self::SemanticMapping),
            "parse-numeric" => Some(Self::ParseNumeric),
            "stringify" => Some(Self::Stringify),
            "parse-boolean" => Some(Self::ParseBoolean),
            "collect-into-array" => Some(Self::CollectIntoArray),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// One planned field-level rule, before persistence assigns it an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedTransformation {
    pub source_field: String,
    pub dest_field: String,
    pub kind: TransformationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

/// Output of one mapper run: the ordered rule set, the destination
/// fields no rule could cover, and the bucketed complexity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingPlan {
    pub transformations: Vec<PlannedTransformation>,
    pub unmapped: Vec<String>,
    /// Count of non-direct transformations, bucketed into 1..=10.
    pub complexity: i16,
}

/// Canonical form for name comparison: lowercase with `_`/`-` stripped.
fn canonicalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Normalized name similarity in `[0, 1]` over canonicalized names.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let (a, b) = (canonicalize(a), canonicalize(b));
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / max_len as f64
}

/// Whether a source value of `from` can flow into a destination field
/// of `to` without coercion.
fn types_compatible(from: FieldType, to: FieldType) -> bool {
    from == to
}

/// Coercion kind for a `from -> to` type pair, if one exists.
fn coercion_kind(from: FieldType, to: FieldType) -> Option<TransformationKind> {
    match (from, to) {
        (FieldType::String, FieldType::Number) => Some(TransformationKind::ParseNumeric),
        (FieldType::String, FieldType::Boolean) => Some(TransformationKind::ParseBoolean),
        (FieldType::Number | FieldType::Boolean, FieldType::String) => {
            Some(TransformationKind::Stringify)
        }
        // A scalar source feeding an array destination gets wrapped.
        (FieldType::String | FieldType::Number | FieldType::Boolean, FieldType::Array) => {
            Some(TransformationKind::CollectIntoArray)
        }
        _ => None,
    }
}

fn find_exact<'a>(fields: &'a [FieldDef], name: &str) -> Option<&'a FieldDef> {
    fields.iter().find(|f| f.name == name)
}

/// Best fuzzy candidate at or above [`FUZZY_THRESHOLD`].
fn find_fuzzy<'a>(fields: &'a [FieldDef], name: &str) -> Option<(&'a FieldDef, f64)> {
    fields
        .iter()
        .map(|f| (f, name_similarity(&f.name, name)))
        .filter(|(_, sim)| *sim >= FUZZY_THRESHOLD)
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
}

/// Produce an ordered transformation plan from a source endpoint to a
/// destination endpoint.
///
/// `hints` maps source field names to destination field names; a hint
/// match overrides the inferred kind with `semantic-mapping`.
///
/// Fails with `IncompatibleSchema` only when neither endpoint exposes
/// any enumerable fields.
pub fn plan_mapping(
    source: &EndpointSpec,
    dest: &EndpointSpec,
    hints: &HashMap<String, String>,
) -> Result<MappingPlan, CoreError> {
    let source_fields = source.readable_fields();
    let dest_fields = dest.writable_fields();

    if source_fields.is_empty() && dest_fields.is_empty() {
        return Err(CoreError::IncompatibleSchema(format!(
            "neither {} {} nor {} {} exposes enumerable fields",
            source.method, source.path, dest.method, dest.path
        )));
    }

    // Invert hints for destination-side lookup.
    let hinted_source: HashMap<&str, &str> = hints
        .iter()
        .map(|(src, dst)| (dst.as_str(), src.as_str()))
        .collect();

    let mut transformations = Vec::new();
    let mut unmapped = Vec::new();

    for dest_field in dest_fields {
        let rule = map_one(dest_field, source_fields, &hinted_source);
        match rule {
            Some(t) => transformations.push(t),
            None => unmapped.push(dest_field.name.clone()),
        }
    }

    let complexity = bucket_complexity(&transformations);

    Ok(MappingPlan {
        transformations,
        unmapped,
        complexity,
    })
}

/// Resolve the rule for a single destination field, trying each
/// strategy in the specified order.
fn map_one(
    dest_field: &FieldDef,
    source_fields: &[FieldDef],
    hinted_source: &HashMap<&str, &str>,
) -> Option<PlannedTransformation> {
    // 1. Exact name + compatible type.
    if let Some(src) = find_exact(source_fields, &dest_field.name) {
        if types_compatible(src.field_type, dest_field.field_type) {
            return Some(PlannedTransformation {
                source_field: src.name.clone(),
                dest_field: dest_field.name.clone(),
                kind: TransformationKind::Direct,
                config: None,
            });
        }
    }

    // 2. User hint, overriding the inferred kind.
    if let Some(src_name) = hinted_source.get(dest_field.name.as_str()) {
        if let Some(src) = find_exact(source_fields, src_name) {
            return Some(PlannedTransformation {
                source_field: src.name.clone(),
                dest_field: dest_field.name.clone(),
                kind: TransformationKind::SemanticMapping,
                config: Some(serde_json::json!({ "hinted": true })),
            });
        }
    }

    // 3. Fuzzy name similarity with compatible type.
    if let Some((src, sim)) = find_fuzzy(source_fields, &dest_field.name) {
        if types_compatible(src.field_type, dest_field.field_type) {
            return Some(PlannedTransformation {
                source_field: src.name.clone(),
                dest_field: dest_field.name.clone(),
                kind: TransformationKind::SemanticMapping,
                config: Some(serde_json::json!({ "similarity": sim })),
            });
        }
    }

    // 4. Type-coercion candidates: exact name first, then fuzzy.
    let coercion_candidate = find_exact(source_fields, &dest_field.name)
        .or_else(|| find_fuzzy(source_fields, &dest_field.name).map(|(f, _)| f));
    if let Some(src) = coercion_candidate {
        if let Some(kind) = coercion_kind(src.field_type, dest_field.field_type) {
            return Some(PlannedTransformation {
                source_field: src.name.clone(),
                dest_field: dest_field.name.clone(),
                kind,
                config: None,
            });
        }
    }

    // 5. Gap, surfaced to the caller rather than silently dropped.
    None
}

/// Count of non-direct transformations, bucketed into 1..=10.
fn bucket_complexity(transformations: &[PlannedTransformation]) -> i16 {
    let non_direct = transformations
        .iter()
        .filter(|t| t.kind != TransformationKind::Direct)
        .count();
    (non_direct as i16).clamp(1, 10)
}

// ---------------------------------------------------------------------------
// Applying a plan
// ---------------------------------------------------------------------------

/// Apply an ordered transformation list to a source payload, producing
/// the destination payload.
///
/// Missing source values are skipped; the synthetic test runner's
/// schema simulation catches required-field gaps on the destination
/// side.
pub fn apply_transformations(
    transformations: &[PlannedTransformation],
    source_payload: &Value,
) -> Value {
    let mut out = serde_json::Map::new();

    for t in transformations {
        let Some(value) = source_payload.get(&t.source_field) else {
            continue;
        };
        let converted = convert(value, t.kind);
        out.insert(t.dest_field.clone(), converted);
    }

    Value::Object(out)
}

fn convert(value: &Value, kind: TransformationKind) -> Value {
    match kind {
        TransformationKind::Direct
        | TransformationKind::SemanticMapping
        | TransformationKind::Custom => value.clone(),
        TransformationKind::ParseNumeric => match value {
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            other => other.clone(),
        },
        TransformationKind::Stringify => match value {
            Value::String(_) => value.clone(),
            other => Value::String(other.to_string()),
        },
        TransformationKind::ParseBoolean => match value {
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Value::Bool(true),
                "false" | "0" | "no" => Value::Bool(false),
                _ => Value::Null,
            },
            other => other.clone(),
        },
        TransformationKind::CollectIntoArray => match value {
            Value::Array(_) => value.clone(),
            other => Value::Array(vec![other.clone()]),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
