//! Field Classification Registry.
//!
//! A static table keyed by `(object_type, field_name)` that says whether a
//! field feeds downstream accounting records. Lookups go through
//! [`FieldRegistry::classify_field`]; fields missing from the table fall back
//! to the registry's explicit `unclassified` default.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldClass {
    Accounting,
    NonAccounting,
}

impl fmt::Display for FieldClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldClass::Accounting => write!(f, "accounting"),
            FieldClass::NonAccounting => write!(f, "non_accounting"),
        }
    }
}

/// Invoice fields that change the amounts, parties, or dates that postings
/// are generated from.
const INVOICE_ACCOUNTING_FIELDS: &[&str] = &[
    "amount",
    "currency",
    "customer_id",
    "discount",
    "due_date",
    "exchange_rate",
    "invoice_number",
    "issue_date",
    "line_items",
    "subtotal",
    "supplier_id",
    "tax_amount",
    "tax_rate",
    "total",
];

const INVOICE_NON_ACCOUNTING_FIELDS: &[&str] = &[
    "attachments",
    "footer",
    "internal_reference",
    "memo",
    "notes",
    "payment_instructions",
    "tags",
];

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRegistry {
    objects: BTreeMap<String, BTreeMap<String, FieldClass>>,
    unclassified: FieldClass,
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::invoice_defaults()
    }
}

impl FieldRegistry {
    /// An empty registry. Every lookup returns `unclassified`.
    pub fn new(unclassified: FieldClass) -> Self {
        Self {
            objects: BTreeMap::new(),
            unclassified,
        }
    }

    /// The built-in invoice table, with unknown fields treated as
    /// non-accounting.
    pub fn invoice_defaults() -> Self {
        let mut registry = Self::new(FieldClass::NonAccounting);
        for field in INVOICE_ACCOUNTING_FIELDS {
            registry.insert("invoice", field, FieldClass::Accounting);
        }
        for field in INVOICE_NON_ACCOUNTING_FIELDS {
            registry.insert("invoice", field, FieldClass::NonAccounting);
        }
        registry
    }

    /// Build a registry from a parsed table, rejecting blank keys.
    pub fn from_table(
        objects: BTreeMap<String, BTreeMap<String, FieldClass>>,
        unclassified: FieldClass,
    ) -> Result<Self, LedgerError> {
        for (object_type, fields) in &objects {
            if object_type.trim().is_empty() {
                return Err(LedgerError::Config(
                    "registry object type must not be empty".to_string(),
                ));
            }
            if let Some(field) = fields.keys().find(|f| f.trim().is_empty()) {
                return Err(LedgerError::Config(format!(
                    "registry field name {:?} for '{}' must not be empty",
                    field, object_type
                )));
            }
        }
        Ok(Self {
            objects,
            unclassified,
        })
    }

    /// Builder-style insert.
    pub fn with_field(mut self, object_type: &str, field: &str, class: FieldClass) -> Self {
        self.insert(object_type, field, class);
        self
    }

    fn insert(&mut self, object_type: &str, field: &str, class: FieldClass) {
        self.objects
            .entry(object_type.to_string())
            .or_default()
            .insert(field.to_string(), class);
    }

    pub fn classify_field(&self, object_type: &str, field: &str) -> FieldClass {
        self.lookup(object_type, field).unwrap_or(self.unclassified)
    }

    /// The explicit table entry, if any.
    pub fn lookup(&self, object_type: &str, field: &str) -> Option<FieldClass> {
        self.objects
            .get(object_type)
            .and_then(|fields| fields.get(field))
            .copied()
    }

    pub fn unclassified(&self) -> FieldClass {
        self.unclassified
    }

    pub fn object_types(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    pub fn fields(&self, object_type: &str) -> impl Iterator<Item = (&str, FieldClass)> {
        self.objects
            .get(object_type)
            .into_iter()
            .flat_map(|fields| fields.iter().map(|(k, v)| (k.as_str(), *v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_amount_is_accounting() {
        let r = FieldRegistry::invoice_defaults();
        assert_eq!(r.classify_field("invoice", "amount"), FieldClass::Accounting);
        assert_eq!(r.classify_field("invoice", "line_items"), FieldClass::Accounting);
    }

    #[test]
    fn invoice_notes_is_non_accounting() {
        let r = FieldRegistry::invoice_defaults();
        assert_eq!(r.classify_field("invoice", "notes"), FieldClass::NonAccounting);
        assert_eq!(r.lookup("invoice", "notes"), Some(FieldClass::NonAccounting));
    }

    #[test]
    fn unknown_field_uses_default() {
        let r = FieldRegistry::invoice_defaults();
        assert_eq!(r.lookup("invoice", "colour"), None);
        assert_eq!(r.classify_field("invoice", "colour"), FieldClass::NonAccounting);
    }

    #[test]
    fn default_is_configurable() {
        let r = FieldRegistry::new(FieldClass::Accounting).with_field(
            "invoice",
            "notes",
            FieldClass::NonAccounting,
        );
        assert_eq!(r.classify_field("invoice", "colour"), FieldClass::Accounting);
        assert_eq!(r.classify_field("credit_note", "x"), FieldClass::Accounting);
        assert_eq!(r.classify_field("invoice", "notes"), FieldClass::NonAccounting);
    }

    #[test]
    fn fields_are_keyed_by_object_type() {
        let r = FieldRegistry::new(FieldClass::NonAccounting).with_field(
            "bill",
            "amount",
            FieldClass::Accounting,
        );
        assert_eq!(r.classify_field("bill", "amount"), FieldClass::Accounting);
        assert_eq!(r.classify_field("invoice", "amount"), FieldClass::NonAccounting);
        assert_eq!(r.object_types().collect::<Vec<_>>(), vec!["bill"]);
    }

    #[test]
    fn from_table_rejects_blank_field() {
        let mut fields = BTreeMap::new();
        fields.insert("  ".to_string(), FieldClass::Accounting);
        let mut objects = BTreeMap::new();
        objects.insert("invoice".to_string(), fields);
        let err = FieldRegistry::from_table(objects, FieldClass::NonAccounting).unwrap_err();
        assert!(matches!(err, LedgerError::Config(_)));
    }
}
