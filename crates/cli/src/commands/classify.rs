use std::path::Path;

use docledger_ledger::{classifier, FieldClass};

use super::load_config;
use crate::{print_json, OutputFormat};

pub(crate) fn cmd_classify(
    object_type: &str,
    fields: &[String],
    config_path: Option<&Path>,
    output: OutputFormat,
    quiet: bool,
) {
    let config = load_config(config_path, output, quiet);
    let registry = &config.registry;
    let severity = classifier::classify_change(registry, object_type, fields);

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            let per_field: serde_json::Map<String, serde_json::Value> = fields
                .iter()
                .map(|f| {
                    (
                        f.clone(),
                        serde_json::json!({
                            "class": registry.classify_field(object_type, f),
                            "registered": registry.lookup(object_type, f).is_some(),
                        }),
                    )
                })
                .collect();
            print_json(&serde_json::json!({
                "object_type": object_type,
                "severity": severity,
                "fields": per_field,
            }));
        }
        OutputFormat::Text => {
            println!("{}", severity);
            for field in fields {
                let class = match registry.classify_field(object_type, field) {
                    FieldClass::Accounting => "accounting",
                    FieldClass::NonAccounting => "non_accounting",
                };
                let note = if registry.lookup(object_type, field).is_none() {
                    " (unclassified default)"
                } else {
                    ""
                };
                println!("  {}: {}{}", field, class, note);
            }
        }
    }
}
