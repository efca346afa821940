//! Validate JSON configuration against a [`Schema`].
//!
//! ```
//! use googlespreadsheets_provider::schema::{Attribute, Schema};
//! use googlespreadsheets_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("spreadsheet_id", Attribute::required_string())
//!     .with_attribute("range", Attribute::required_string());
//!
//! let diagnostics = validate(&schema, &json!({"spreadsheet_id": "abc"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute.as_deref(), Some("range"));
//! ```

use crate::schema::{Attribute, AttributeType, Block, Diagnostic, NestedBlock, Schema};
use serde_json::Value;

/// Validate a JSON value against a schema.
///
/// Returns one diagnostic per problem; an empty list means the value is valid.
///
/// - Required attributes must be present and non-null
/// - Computed-only attributes are skipped (the provider sets them)
/// - Attribute types must match the schema
/// - Nested block lists are checked against `min_items`/`max_items` and validated recursively
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Like [`validate`], returning `Err` with the diagnostics when any were found.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => {
            // Treat an absent block like an empty object so required
            // attributes are still reported.
            validate_block(block, &Value::Object(Default::default()), path, diagnostics);
            return;
        }
        other => {
            let mut diag = Diagnostic::error("Expected object")
                .with_detail(format!("Got {}", value_type_name(other)));
            if !path.is_empty() {
                diag = diag.with_attribute(path);
            }
            diagnostics.push(diag);
            return;
        }
    };

    for (name, attr) in &block.attributes {
        validate_attribute(attr, obj.get(name), &join_path(path, name), diagnostics);
    }

    for (name, nested) in &block.blocks {
        validate_nested_block(nested, obj.get(name), &join_path(path, name), diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        }
        Some(v) => validate_attribute_type(&attr.attr_type, v, path, diagnostics),
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        }
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        }
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        }
        AttributeType::List(element_type) => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, item, &item_path, diagnostics);
                }
            }
            None => diagnostics.push(type_error(path, "list", value)),
        },
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let items = match value {
        None | Some(Value::Null) => &[][..],
        Some(Value::Array(items)) => items.as_slice(),
        Some(other) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(other)))
                    .with_attribute(path),
            );
            return;
        }
    };

    let len = items.len() as u32;
    if len < nested.min_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' requires at least {} item(s), got {}",
                path, nested.min_items, len
            ))
            .with_attribute(path),
        );
    }
    if nested.max_items > 0 && len > nested.max_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' allows at most {} item(s), got {}",
                path, nested.max_items, len
            ))
            .with_attribute(path),
        );
    }

    for (i, item) in items.iter().enumerate() {
        validate_block(&nested.block, item, &format!("{}.{}", path, i), diagnostics);
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) if n.is_i64() => true,
        // JSON producers sometimes emit whole numbers as floats.
        Value::Number(n) => n
            .as_f64()
            .is_some_and(|f| f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64),
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(got)))
        .with_attribute(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, Block, NestedBlock, Schema};
    use serde_json::json;

    fn rows_schema() -> Schema {
        Schema::v0()
            .with_attribute("spreadsheet_id", Attribute::required_string())
            .with_attribute("range", Attribute::required_string())
            .with_attribute("clear_on_destroy", Attribute::optional_bool())
            .with_attribute("id", Attribute::computed_string())
            .with_block(
                "rows",
                NestedBlock::list(
                    Block::new().with_attribute("values", Attribute::required_string_list()),
                )
                .with_min_items(1),
            )
    }

    #[test]
    fn test_valid_rows_config() {
        let config = json!({
            "spreadsheet_id": "abc",
            "range": "Sheet1!A1:B2",
            "rows": [{"values": ["a", "b"]}, {"values": []}]
        });
        assert!(validate(&rows_schema(), &config).is_empty());
        assert!(validate_result(&rows_schema(), &config).is_ok());
    }

    #[test]
    fn test_missing_required_attribute() {
        let config = json!({"range": "A1", "rows": [{"values": ["x"]}]});
        let diagnostics = validate(&rows_schema(), &config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("spreadsheet_id"));
    }

    #[test]
    fn test_null_config_reports_every_required_field() {
        let diagnostics = validate(&rows_schema(), &Value::Null);
        // spreadsheet_id, range, and the rows min_items check
        assert_eq!(diagnostics.len(), 3);
    }

    #[test]
    fn test_rows_block_min_items() {
        let config = json!({"spreadsheet_id": "abc", "range": "A1", "rows": []});
        let diagnostics = validate(&rows_schema(), &config);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at least 1"));
    }

    #[test]
    fn test_non_string_cell_in_config() {
        let config = json!({
            "spreadsheet_id": "abc",
            "range": "A1",
            "rows": [{"values": ["ok", 42]}]
        });
        let diagnostics = validate(&rows_schema(), &config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("rows.0.values.1"));
    }

    #[test]
    fn test_rows_must_be_a_list() {
        let config = json!({"spreadsheet_id": "abc", "range": "A1", "rows": {"values": []}});
        let diagnostics = validate(&rows_schema(), &config);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected list"));
    }

    #[test]
    fn test_computed_attribute_skipped() {
        let config = json!({
            "spreadsheet_id": "abc",
            "range": "A1",
            "id": 12,
            "rows": [{"values": []}]
        });
        assert!(validate(&rows_schema(), &config).is_empty());
    }

    #[test]
    fn test_int64_and_bool() {
        let schema = Schema::v0()
            .with_attribute("max_retries", Attribute::optional_int64())
            .with_attribute("clear_on_destroy", Attribute::optional_bool());

        assert!(validate(&schema, &json!({"max_retries": 3, "clear_on_destroy": true})).is_empty());
        assert!(validate(&schema, &json!({"max_retries": 3.0})).is_empty());
        assert_eq!(validate(&schema, &json!({"max_retries": 2.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"clear_on_destroy": "yes"})).len(), 1);
    }
}
