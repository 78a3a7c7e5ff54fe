//! Change Classifier: field-level diff of two snapshots and its severity.

use std::collections::BTreeSet;

use serde::Serialize;

use docledger_storage::{ChangeSeverity, DocumentSnapshot};

use crate::registry::{FieldClass, FieldRegistry};

/// Changed fields between two snapshots plus their overall severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub changed_fields: BTreeSet<String>,
    pub severity: ChangeSeverity,
}

/// Symmetric field-level diff. A field present on one side only, or whose
/// values differ structurally (nested arrays and objects included), is
/// reported as changed.
pub fn changed_fields(previous: &DocumentSnapshot, new: &DocumentSnapshot) -> BTreeSet<String> {
    let mut changed: BTreeSet<String> = previous
        .iter()
        .filter(|(field, old)| new.get(field.as_str()) != Some(*old))
        .map(|(field, _)| field.clone())
        .collect();
    changed.extend(
        new.keys()
            .filter(|field| !previous.contains_key(field.as_str()))
            .cloned(),
    );
    changed
}

/// Severity of an explicit changed-field set.
///
/// `Accounting` if any field is classified accounting for `object_type`,
/// else `NonAccounting` if the set is non-empty, else `None`.
pub fn classify_change<I, S>(registry: &FieldRegistry, object_type: &str, fields: I) -> ChangeSeverity
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut severity = ChangeSeverity::None;
    for field in fields {
        match registry.classify_field(object_type, field.as_ref()) {
            FieldClass::Accounting => return ChangeSeverity::Accounting,
            FieldClass::NonAccounting => severity = ChangeSeverity::NonAccounting,
        }
    }
    severity
}

/// Classify a new snapshot against its predecessor. Creation (`previous` is
/// `None`) is not a change: no fields, severity `None`.
pub fn classify(
    registry: &FieldRegistry,
    previous: Option<&DocumentSnapshot>,
    new: &DocumentSnapshot,
    object_type: &str,
) -> Classification {
    let Some(previous) = previous else {
        return Classification {
            changed_fields: BTreeSet::new(),
            severity: ChangeSeverity::None,
        };
    };
    let changed_fields = changed_fields(previous, new);
    let severity = classify_change(registry, object_type, &changed_fields);
    Classification {
        changed_fields,
        severity,
    }
}
