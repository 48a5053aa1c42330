//! Synthetic test runner.
//!
//! Drives a batch of shadow calls through the mapped endpoint pair:
//! generate a seeded payload shaped like the source schema, read from
//! the source endpoint for real, run the transformation rules, then
//! either write to the destination for real (safe methods) or simulate
//! the write against the destination schema. Every call becomes a
//! classified outcome row; transport failures are data, not errors.

use std::time::{Duration, Instant};

use serde_json::Value;
use weave_core::mapping::{apply_transformations, PlannedTransformation};
use weave_core::outcome::{classify_status, OutcomeClass};
use weave_core::payload::generate_payload;
use weave_core::spec::{is_destructive, EndpointSpec};
use weave_db::models::test_outcome::NewTestOutcome;

/// Pause between consecutive outbound calls, to stay polite with
/// third-party rate limits.
const INTER_CALL_DELAY: Duration = Duration::from_millis(100);

/// Per-call deadline. A call past this is classified `connectivity`.
const CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Bounds on the per-run batch size.
pub const MIN_SAMPLE_SIZE: i64 = 1;
pub const MAX_SAMPLE_SIZE: i64 = 100;

/// One batch of synthetic calls to execute.
pub struct RunSpec<'a> {
    pub source_base: &'a str,
    pub source: &'a EndpointSpec,
    pub dest_base: &'a str,
    pub dest: &'a EndpointSpec,
    pub transformations: &'a [PlannedTransformation],
    pub sample_size: i64,
    /// When set, destructive destination methods are simulated against
    /// the schema instead of called.
    pub skip_destructive: bool,
    /// Base seed; iteration `i` derives its payload from `seed + i`.
    pub seed: u64,
}

pub struct TestRunner {
    http: reqwest::Client,
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRunner {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Execute a batch and return its outcomes in call order.
    ///
    /// Each iteration produces two outcomes: the source read and the
    /// destination write (real or simulated).
    pub async fn run(&self, spec: RunSpec<'_>) -> Vec<NewTestOutcome> {
        let sample_size = spec.sample_size.clamp(MIN_SAMPLE_SIZE, MAX_SAMPLE_SIZE);
        let mut outcomes = Vec::with_capacity(sample_size as usize * 2);

        for i in 0..sample_size {
            let payload = generate_payload(spec.source.readable_fields(), spec.seed + i as u64);

            let (source_outcome, body) = self.call_source(&spec).await;
            outcomes.push(source_outcome);

            tokio::time::sleep(INTER_CALL_DELAY).await;

            // Transform the live response when the read succeeded and
            // returned an object; otherwise fall back to the generated
            // payload so the destination side still gets exercised.
            let source_value = body.filter(Value::is_object).unwrap_or(payload);
            let transformed = apply_transformations(spec.transformations, &source_value);

            let dest_outcome = if spec.skip_destructive && is_destructive(&spec.dest.method) {
                simulate_write(spec.dest, &transformed)
            } else {
                self.call_dest(&spec, &transformed).await
            };
            outcomes.push(dest_outcome);

            if i + 1 < sample_size {
                tokio::time::sleep(INTER_CALL_DELAY).await;
            }
        }

        outcomes
    }

    async fn call_source(&self, spec: &RunSpec<'_>) -> (NewTestOutcome, Option<Value>) {
        let url = format!(
            "{}{}",
            spec.source_base.trim_end_matches('/'),
            substitute_path_params(&spec.source.path)
        );
        let started = Instant::now();

        let response = self
            .http
            .request(method_of(&spec.source.method), &url)
            .timeout(CALL_TIMEOUT)
            .send()
            .await;
        let latency_ms = started.elapsed().as_millis() as i32;

        match response {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let body = resp.json::<Value>().await.ok().map(first_object);
                (
                    outcome_for(spec.source, Some(status), latency_ms),
                    body.flatten(),
                )
            }
            Err(err) => {
                tracing::debug!(%url, error = %err, "source call failed");
                (outcome_for(spec.source, None, latency_ms), None)
            }
        }
    }

    async fn call_dest(&self, spec: &RunSpec<'_>, body: &Value) -> NewTestOutcome {
        let url = format!(
            "{}{}",
            spec.dest_base.trim_end_matches('/'),
            substitute_path_params(&spec.dest.path)
        );
        let started = Instant::now();

        let response = self
            .http
            .request(method_of(&spec.dest.method), &url)
            .timeout(CALL_TIMEOUT)
            .json(body)
            .send()
            .await;
        let latency_ms = started.elapsed().as_millis() as i32;

        match response {
            Ok(resp) => outcome_for(spec.dest, Some(resp.status().as_u16()), latency_ms),
            Err(err) => {
                tracing::debug!(%url, error = %err, "destination call failed");
                outcome_for(spec.dest, None, latency_ms)
            }
        }
    }
}

/// Validate a transformed payload against the destination schema
/// instead of issuing a destructive call.
///
/// A payload covering every required writable field counts as a 200;
/// a gap counts as a 422, which classifies as schema-mismatch.
pub fn simulate_write(dest: &EndpointSpec, payload: &Value) -> NewTestOutcome {
    let missing = dest
        .writable_fields()
        .iter()
        .filter(|f| f.required && payload.get(&f.name).is_none())
        .count();

    let status = if missing == 0 { 200 } else { 422 };
    outcome_for(dest, Some(status), 0)
}

fn outcome_for(endpoint: &EndpointSpec, status: Option<u16>, latency_ms: i32) -> NewTestOutcome {
    let class = classify_status(status);
    NewTestOutcome {
        endpoint: format!("{} {}", endpoint.method, endpoint.path),
        method: endpoint.method.clone(),
        status_code: status.map(|s| s as i16),
        latency_ms,
        success: class == OutcomeClass::Success,
        classification: class.as_str().to_string(),
    }
}

fn method_of(method: &str) -> reqwest::Method {
    method
        .to_ascii_uppercase()
        .parse()
        .unwrap_or(reqwest::Method::GET)
}

/// Replace `{param}` path segments with a fixed placeholder id.
fn substitute_path_params(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut in_param = false;
    for c in path.chars() {
        match c {
            '{' => {
                in_param = true;
                out.push('1');
            }
            '}' => in_param = false,
            _ if in_param => {}
            _ => out.push(c),
        }
    }
    out
}

/// A list response stands in for one record: take the first object.
fn first_object(value: Value) -> Option<Value> {
    match value {
        Value::Object(_) => Some(value),
        Value::Array(items) => items.into_iter().find(Value::is_object),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use weave_core::spec::{FieldDef, FieldType};

    fn dest_endpoint() -> EndpointSpec {
        EndpointSpec {
            path: "/contacts".to_string(),
            method: "POST".to_string(),
            request_fields: vec![
                FieldDef::new("full_name", FieldType::String, true),
                FieldDef::new("email", FieldType::String, true),
                FieldDef::new("note", FieldType::String, false),
            ],
            response_fields: vec![],
        }
    }

    // ----- simulate_write -----

    #[test]
    fn simulation_passes_when_required_fields_present() {
        let outcome = simulate_write(
            &dest_endpoint(),
            &json!({"full_name": "Ada", "email": "ada@example.com"}),
        );
        assert!(outcome.success);
        assert_eq!(outcome.status_code, Some(200));
        assert_eq!(outcome.classification, "success");
    }

    #[test]
    fn simulation_flags_missing_required_field_as_schema_mismatch() {
        let outcome = simulate_write(&dest_endpoint(), &json!({"full_name": "Ada"}));
        assert!(!outcome.success);
        assert_eq!(outcome.status_code, Some(422));
        assert_eq!(outcome.classification, "schema-mismatch");
    }

    #[test]
    fn simulation_ignores_optional_gaps() {
        let outcome = simulate_write(
            &dest_endpoint(),
            &json!({"full_name": "Ada", "email": "a@b.c"}),
        );
        assert!(outcome.success);
    }

    // ----- helpers -----

    #[test]
    fn path_params_substituted() {
        assert_eq!(substitute_path_params("/pets/{petId}"), "/pets/1");
        assert_eq!(
            substitute_path_params("/orgs/{org}/repos/{repo}"),
            "/orgs/1/repos/1"
        );
        assert_eq!(substitute_path_params("/plain"), "/plain");
    }

    #[test]
    fn first_object_unwraps_list_responses() {
        assert_eq!(
            first_object(json!([{"a": 1}, {"b": 2}])),
            Some(json!({"a": 1}))
        );
        assert_eq!(first_object(json!({"a": 1})), Some(json!({"a": 1})));
        assert_eq!(first_object(json!("scalar")), None);
    }

    #[test]
    fn outcome_endpoint_label_is_method_and_path() {
        let outcome = simulate_write(&dest_endpoint(), &json!({}));
        assert_eq!(outcome.endpoint, "POST /contacts");
        assert_eq!(outcome.method, "POST");
    }
}
