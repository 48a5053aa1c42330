//! Specification drift detection.
//!
//! Pure comparison of a stored endpoint schema against a freshly
//! re-fetched one. The refetch itself is the strategist's job; this
//! module never touches the network.

use serde::{Deserialize, Serialize};

use crate::mapping::{name_similarity, FUZZY_THRESHOLD};
use crate::spec::{EndpointSpec, FieldDef};

/// What happened to one field between two spec snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeKind {
    Removed,
    TypeChanged,
    RenamedCandidate,
    Added,
}

/// One entry of a drift report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub kind: ChangeKind,
    /// True when the change breaks a field the mapping actively uses.
    pub breaking: bool,
    /// For renamed candidates: the new name the field likely moved to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renamed_to: Option<String>,
}

/// Drift report for one endpoint pair snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriftReport {
    pub changes: Vec<FieldChange>,
}

impl DriftReport {
    pub fn has_breaking(&self) -> bool {
        self.changes.iter().any(|c| c.breaking)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Compare the stored shape of an endpoint against its re-fetched
/// shape.
///
/// `active_fields` names the fields the current mapping reads or
/// writes; a `removed` or `type-changed` entry for one of those is
/// classified as breaking. A removed field with a sufficiently similar
/// added field is downgraded to a `renamed-candidate`.
pub fn detect_drift(
    old: &EndpointSpec,
    new: &EndpointSpec,
    active_fields: &[String],
) -> DriftReport {
    let old_fields = all_fields(old);
    let new_fields = all_fields(new);

    let mut changes = Vec::new();
    let mut matched_new: Vec<&str> = Vec::new();

    for old_field in &old_fields {
        match new_fields.iter().find(|f| f.name == old_field.name) {
            Some(new_field) => {
                matched_new.push(new_field.name.as_str());
                if new_field.field_type != old_field.field_type {
                    changes.push(FieldChange {
                        field: old_field.name.clone(),
                        kind: ChangeKind::TypeChanged,
                        breaking: is_active(&old_field.name, active_fields),
                        renamed_to: None,
                    });
                }
            }
            None => {
                // Look for a rename before declaring the field gone.
                let candidate = new_fields
                    .iter()
                    .filter(|f| !old_fields.iter().any(|o| o.name == f.name))
                    .filter(|f| f.field_type == old_field.field_type)
                    .map(|f| (f, name_similarity(&f.name, &old_field.name)))
                    .filter(|(_, sim)| *sim >= FUZZY_THRESHOLD)
                    .max_by(|(_, a), (_, b)| a.total_cmp(b));

                match candidate {
                    Some((new_field, _)) => {
                        matched_new.push(new_field.name.as_str());
                        changes.push(FieldChange {
                            field: old_field.name.clone(),
                            kind: ChangeKind::RenamedCandidate,
                            breaking: false,
                            renamed_to: Some(new_field.name.clone()),
                        });
                    }
                    None => changes.push(FieldChange {
                        field: old_field.name.clone(),
                        kind: ChangeKind::Removed,
                        breaking: is_active(&old_field.name, active_fields),
                        renamed_to: None,
                    }),
                }
            }
        }
    }

    for new_field in &new_fields {
        let known = old_fields.iter().any(|o| o.name == new_field.name)
            || matched_new.contains(&new_field.name.as_str());
        if !known {
            changes.push(FieldChange {
                field: new_field.name.clone(),
                kind: ChangeKind::Added,
                breaking: false,
                renamed_to: None,
            });
        }
    }

    DriftReport { changes }
}

fn is_active(field: &str, active_fields: &[String]) -> bool {
    active_fields.iter().any(|f| f == field)
}

/// Request and response fields of an endpoint, deduplicated by name.
fn all_fields(ep: &EndpointSpec) -> Vec<FieldDef> {
    let mut fields: Vec<FieldDef> = Vec::new();
    for f in ep.request_fields.iter().chain(ep.response_fields.iter()) {
        if !fields.iter().any(|existing| existing.name == f.name) {
            fields.push(f.clone());
        }
    }
    fields
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::FieldType;

    fn ep(fields: Vec<FieldDef>) -> EndpointSpec {
        EndpointSpec {
            path: "/users".to_string(),
            method: "GET".to_string(),
            request_fields: vec![],
            response_fields: fields,
        }
    }

    fn f(name: &str, t: FieldType) -> FieldDef {
        FieldDef::new(name, t, false)
    }

    #[test]
    fn removed_active_field_is_breaking() {
        let old = ep(vec![f("email", FieldType::String), f("name", FieldType::String)]);
        let new = ep(vec![f("name", FieldType::String)]);

        let report = detect_drift(&old, &new, &["email".to_string()]);
        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].kind, ChangeKind::Removed);
        assert!(report.changes[0].breaking);
        assert!(report.has_breaking());
    }

    #[test]
    fn removed_unused_field_is_benign() {
        let old = ep(vec![f("email", FieldType::String), f("name", FieldType::String)]);
        let new = ep(vec![f("name", FieldType::String)]);

        let report = detect_drift(&old, &new, &["name".to_string()]);
        assert!(!report.has_breaking());
    }

    #[test]
    fn type_change_detected() {
        let old = ep(vec![f("age", FieldType::Number)]);
        let new = ep(vec![f("age", FieldType::String)]);

        let report = detect_drift(&old, &new, &["age".to_string()]);
        assert_eq!(report.changes[0].kind, ChangeKind::TypeChanged);
        assert!(report.changes[0].breaking);
    }

    #[test]
    fn rename_downgrades_removal() {
        let old = ep(vec![f("user_name", FieldType::String)]);
        let new = ep(vec![f("userName", FieldType::String)]);

        let report = detect_drift(&old, &new, &["user_name".to_string()]);
        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].kind, ChangeKind::RenamedCandidate);
        assert_eq!(report.changes[0].renamed_to.as_deref(), Some("userName"));
        assert!(!report.has_breaking());
    }

    #[test]
    fn additions_reported_as_benign() {
        let old = ep(vec![f("name", FieldType::String)]);
        let new = ep(vec![f("name", FieldType::String), f("avatar", FieldType::String)]);

        let report = detect_drift(&old, &new, &[]);
        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].kind, ChangeKind::Added);
        assert!(!report.changes[0].breaking);
    }

    #[test]
    fn unchanged_spec_is_empty_report() {
        let old = ep(vec![f("name", FieldType::String)]);
        let report = detect_drift(&old, &old.clone(), &["name".to_string()]);
        assert!(report.is_empty());
    }
}
