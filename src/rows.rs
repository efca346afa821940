//! The `googlespreadsheets_rows` resource.
//!
//! A resource instance owns one A1 range of one spreadsheet. Its `rows` are
//! written with a single `values.update` call and read back with
//! `values.get`; row and cell order is preserved in both directions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::ProviderError;
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::sheets::{SheetsApi, ValueInputOption, ValueMatrix};
use crate::types::{AttributeChange, ImportedResource, PlanResult};

pub const RESOURCE_TYPE: &str = "googlespreadsheets_rows";

/// Attributes compared when planning, in reporting order.
const PLANNED_ATTRIBUTES: [&str; 5] = ["spreadsheet_id", "range", "rows", "clear_on_destroy", "id"];

/// One spreadsheet row, cells left to right.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    #[serde(default)]
    pub values: Vec<String>,
}

impl Row {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// A fetched cell that is not a string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellError {
    /// Row and column are 1-based.
    #[error("cell at row {row}, column {column} is {found}, expected a string")]
    NonString {
        row: usize,
        column: usize,
        found: &'static str,
    },
}

/// State of a rows resource; also the shape of its configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowsState {
    /// `<spreadsheet_id>/<range>`, computed.
    #[serde(default)]
    pub id: String,
    pub spreadsheet_id: String,
    pub range: String,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub clear_on_destroy: bool,
}

pub fn resource_id(spreadsheet_id: &str, range: &str) -> String {
    format!("{}/{}", spreadsheet_id, range)
}

/// Split an import id into `(spreadsheet_id, range)` at the first `/`.
///
/// Spreadsheet IDs never contain `/`; sheet names in the range may.
pub fn parse_resource_id(id: &str) -> Result<(&str, &str), ProviderError> {
    match id.split_once('/') {
        Some((spreadsheet_id, range)) if !spreadsheet_id.is_empty() && !range.is_empty() => {
            Ok((spreadsheet_id, range))
        }
        _ => Err(ProviderError::InvalidRequest(format!(
            "import id '{}' must have the form <spreadsheet_id>/<range>",
            id
        ))),
    }
}

/// Rows as a row-major value matrix. Jagged rows are kept as-is.
pub fn to_value_matrix(rows: &[Row]) -> ValueMatrix {
    rows.iter()
        .map(|row| row.values.iter().cloned().map(Value::String).collect())
        .collect()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Decode fetched values, rejecting any cell that is not a string.
pub fn decode_rows(values: ValueMatrix) -> Result<Vec<Row>, CellError> {
    values
        .into_iter()
        .enumerate()
        .map(|(r, cells)| {
            cells
                .into_iter()
                .enumerate()
                .map(|(c, cell)| match cell {
                    Value::String(s) => Ok(s),
                    other => Err(CellError::NonString {
                        row: r + 1,
                        column: c + 1,
                        found: json_type(&other),
                    }),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(|values| Row { values })
        })
        .collect()
}

pub fn schema() -> Schema {
    Schema::v0()
        .with_description("Values of one range of a Google spreadsheet")
        .with_attribute(
            "id",
            Attribute::computed_string().with_description("<spreadsheet_id>/<range>"),
        )
        .with_attribute(
            "spreadsheet_id",
            Attribute::required_string().with_description("ID of the target spreadsheet"),
        )
        .with_attribute(
            "range",
            Attribute::required_string().with_description("A1 notation range, e.g. Sheet1!A1:C10"),
        )
        .with_attribute(
            "clear_on_destroy",
            Attribute::optional_bool()
                .with_default(Value::Bool(false))
                .with_description("Clear the range when the resource is destroyed"),
        )
        .with_block(
            "rows",
            NestedBlock::list(
                Block::new()
                    .with_attribute("values", Attribute::required_string_list())
                    .with_description("One row, cells left to right; values are entered as if typed"),
            )
            .with_min_items(1),
        )
}

/// Plan a create, update or destroy.
///
/// Nothing forces replacement: a new spreadsheet or range is simply written.
pub fn plan(prior: Option<&Value>, proposed: &Value) -> Result<PlanResult, ProviderError> {
    let prior = prior.filter(|p| !p.is_null());

    if proposed.is_null() {
        let changes = prior
            .and_then(|p| p.get("id"))
            .filter(|id| !id.is_null())
            .map(|id| vec![AttributeChange::removed("id", id.clone())])
            .unwrap_or_default();
        return Ok(PlanResult::in_place(Value::Null, changes));
    }

    let mut planned: RowsState = serde_json::from_value(proposed.clone())?;
    planned.id = resource_id(&planned.spreadsheet_id, &planned.range);
    let planned_value = serde_json::to_value(&planned)?;

    let changes = match prior {
        None => PLANNED_ATTRIBUTES
            .iter()
            .filter(|attr| **attr == "id" || proposed.get(**attr).is_some_and(|v| !v.is_null()))
            .filter_map(|attr| {
                planned_value
                    .get(*attr)
                    .map(|v| AttributeChange::added(*attr, v.clone()))
            })
            .collect(),
        Some(prior) => PLANNED_ATTRIBUTES
            .iter()
            .filter_map(|attr| AttributeChange::between(*attr, prior.get(*attr), planned_value.get(*attr)))
            .collect(),
    };

    Ok(PlanResult::in_place(planned_value, changes))
}

async fn fetch(
    api: &dyn SheetsApi,
    spreadsheet_id: &str,
    range: &str,
    clear_on_destroy: bool,
) -> Result<RowsState, ProviderError> {
    let sheet = api.get_spreadsheet(spreadsheet_id).await?;
    let values = api.get_values(&sheet.spreadsheet_id, range).await?;
    let rows = decode_rows(values)?;
    debug!(spreadsheet_id = %sheet.spreadsheet_id, range, rows = rows.len(), "rows read");

    Ok(RowsState {
        id: resource_id(&sheet.spreadsheet_id, range),
        spreadsheet_id: sheet.spreadsheet_id,
        range: range.to_string(),
        rows,
        clear_on_destroy,
    })
}

/// Write the planned rows, then read the range back. Used by create and update.
pub async fn apply(api: &dyn SheetsApi, planned: Value) -> Result<Value, ProviderError> {
    let desired: RowsState = serde_json::from_value(planned)?;
    let sheet = api.get_spreadsheet(&desired.spreadsheet_id).await?;

    api.update_values(
        &sheet.spreadsheet_id,
        &desired.range,
        to_value_matrix(&desired.rows),
        ValueInputOption::UserEntered,
    )
    .await?;
    info!(
        spreadsheet_id = %sheet.spreadsheet_id,
        range = %desired.range,
        rows = desired.rows.len(),
        "rows written"
    );

    let state = fetch(
        api,
        &sheet.spreadsheet_id,
        &desired.range,
        desired.clear_on_destroy,
    )
    .await?;
    Ok(serde_json::to_value(state)?)
}

pub async fn read(api: &dyn SheetsApi, current: Value) -> Result<Value, ProviderError> {
    let current: RowsState = serde_json::from_value(current)?;
    let state = fetch(
        api,
        &current.spreadsheet_id,
        &current.range,
        current.clear_on_destroy,
    )
    .await?;
    Ok(serde_json::to_value(state)?)
}

/// Forget the resource. The range is only cleared when `clear_on_destroy` is set.
pub async fn delete(api: &dyn SheetsApi, current: Value) -> Result<(), ProviderError> {
    let current: RowsState = serde_json::from_value(current)?;
    if !current.clear_on_destroy {
        debug!(id = %current.id, "removing rows from state only");
        return Ok(());
    }

    let sheet = api.get_spreadsheet(&current.spreadsheet_id).await?;
    api.clear_values(&sheet.spreadsheet_id, &current.range).await?;
    info!(spreadsheet_id = %sheet.spreadsheet_id, range = %current.range, "range cleared");
    Ok(())
}

/// Import `<spreadsheet_id>/<range>` as a rows resource.
pub async fn import(api: &dyn SheetsApi, id: &str) -> Result<Vec<ImportedResource>, ProviderError> {
    let (spreadsheet_id, range) = parse_resource_id(id)?;
    let state = fetch(api, spreadsheet_id, range, false).await?;
    Ok(vec![ImportedResource::new(
        RESOURCE_TYPE,
        serde_json::to_value(state)?,
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemorySheets, SheetsCall};
    use serde_json::json;

    fn config(rows: Value) -> Value {
        json!({
            "spreadsheet_id": "sheet-1",
            "range": "Sheet1!A1:C3",
            "rows": rows
        })
    }

    #[test]
    fn test_value_matrix_keeps_jagged_rows() {
        let rows = vec![Row::new(["a"]), Row::new(["b", "c"]), Row::default()];
        assert_eq!(
            to_value_matrix(&rows),
            vec![vec![json!("a")], vec![json!("b"), json!("c")], vec![]]
        );
    }

    #[test]
    fn test_decode_rows_rejects_non_strings() {
        let rows = decode_rows(vec![vec![json!("x"), json!("y")], vec![]]).unwrap();
        assert_eq!(rows, vec![Row::new(["x", "y"]), Row::default()]);

        let err = decode_rows(vec![vec![json!("x")], vec![json!("ok"), json!(42)]]).unwrap_err();
        assert_eq!(
            err,
            CellError::NonString {
                row: 2,
                column: 2,
                found: "a number"
            }
        );
        assert_eq!(
            err.to_string(),
            "cell at row 2, column 2 is a number, expected a string"
        );
    }

    #[test]
    fn test_parse_resource_id() {
        assert_eq!(
            parse_resource_id("abc/Sheet1!A1:B2").unwrap(),
            ("abc", "Sheet1!A1:B2")
        );
        // sheet names may contain '/'
        assert_eq!(
            parse_resource_id("abc/Q1/Q2!A1").unwrap(),
            ("abc", "Q1/Q2!A1")
        );
        assert!(matches!(
            parse_resource_id("no-separator"),
            Err(ProviderError::InvalidRequest(_))
        ));
        assert!(parse_resource_id("/A1").is_err());
        assert!(parse_resource_id("abc/").is_err());
    }

    #[test]
    fn test_plan_create_lists_configured_attributes() {
        let proposed = config(json!([{"values": ["a"]}]));
        let plan = plan(None, &proposed).unwrap();

        assert_eq!(plan.planned_state["id"], "sheet-1/Sheet1!A1:C3");
        let paths: Vec<_> = plan.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, ["spreadsheet_id", "range", "rows", "id"]);
        assert!(plan.changes.iter().all(|c| c.before.is_none()));
        assert!(!plan.requires_replace);
    }

    #[test]
    fn test_plan_update_reports_changed_attributes() {
        let prior = plan(None, &config(json!([{"values": ["a"]}])))
            .unwrap()
            .planned_state;

        let same = plan(Some(&prior), &config(json!([{"values": ["a"]}]))).unwrap();
        assert!(same.changes.is_empty());

        let mut moved = config(json!([{"values": ["a", "b"]}]));
        moved["range"] = json!("Sheet2!A1");
        let changed = plan(Some(&prior), &moved).unwrap();
        let paths: Vec<_> = changed.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, ["range", "rows", "id"]);
        assert_eq!(changed.planned_state["id"], "sheet-1/Sheet2!A1");
        assert!(!changed.requires_replace);
    }

    #[test]
    fn test_plan_destroy() {
        let prior = json!({"id": "sheet-1/A1", "spreadsheet_id": "sheet-1", "range": "A1"});
        let plan = plan(Some(&prior), &Value::Null).unwrap();
        assert!(plan.planned_state.is_null());
        assert_eq!(plan.changes, vec![AttributeChange::removed("id", json!("sheet-1/A1"))]);
    }

    #[test]
    fn test_plan_rejects_malformed_config() {
        let err = plan(None, &json!({"spreadsheet_id": "x"})).unwrap_err();
        assert!(matches!(err, ProviderError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_write_then_read_round_trips() {
        let fake = InMemorySheets::new().with_spreadsheet("sheet-1");
        let rows = json!([
            {"values": ["name", "qty", "note"]},
            {"values": ["apples", "3"]},
            {"values": ["pears", "10", "ripe"]}
        ]);

        let state = apply(&fake, config(rows.clone())).await.unwrap();
        assert_eq!(state["id"], "sheet-1/Sheet1!A1:C3");
        assert_eq!(state["spreadsheet_id"], "sheet-1");
        assert_eq!(state["rows"], rows);

        let read_back = read(&fake, state.clone()).await.unwrap();
        assert_eq!(read_back, state);

        let update = fake
            .calls()
            .into_iter()
            .find(|c| matches!(c, SheetsCall::UpdateValues { .. }))
            .unwrap();
        assert!(matches!(
            update,
            SheetsCall::UpdateValues {
                option: ValueInputOption::UserEntered,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_identical_updates_are_idempotent() {
        let fake = InMemorySheets::new().with_spreadsheet("sheet-1");
        let desired = config(json!([{"values": ["a", "b"]}, {"values": ["c"]}]));

        let first = apply(&fake, desired.clone()).await.unwrap();
        let stored_first = fake.values("sheet-1", "Sheet1!A1:C3");
        let second = apply(&fake, desired).await.unwrap();
        let stored_second = fake.values("sheet-1", "Sheet1!A1:C3");

        assert_eq!(first, second);
        assert_eq!(stored_first, stored_second);
    }

    #[tokio::test]
    async fn test_read_empty_range() {
        let fake = InMemorySheets::new().with_spreadsheet("sheet-1");
        let state = read(
            &fake,
            json!({"spreadsheet_id": "sheet-1", "range": "Sheet1!Z1:Z9", "rows": []}),
        )
        .await
        .unwrap();
        assert_eq!(state["rows"], json!([]));
        assert_eq!(state["id"], "sheet-1/Sheet1!Z1:Z9");
    }

    #[tokio::test]
    async fn test_read_reports_non_string_cells() {
        let fake = InMemorySheets::new().with_values(
            "sheet-1",
            "Sheet1!A1:C3",
            vec![vec![json!("a"), json!(true)]],
        );
        let err = read(&fake, config(json!([]))).await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::InvalidCell(CellError::NonString {
                row: 1,
                column: 2,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_missing_spreadsheet_is_not_found() {
        let fake = InMemorySheets::new();
        let err = apply(&fake, config(json!([{"values": ["a"]}])))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
        // nothing is written when the spreadsheet cannot be resolved
        assert_eq!(fake.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_without_clear_makes_no_call() {
        let fake = InMemorySheets::new().with_values(
            "sheet-1",
            "Sheet1!A1:C3",
            vec![vec![json!("keep")]],
        );
        let state = json!({
            "id": "sheet-1/Sheet1!A1:C3",
            "spreadsheet_id": "sheet-1",
            "range": "Sheet1!A1:C3",
            "rows": [{"values": ["keep"]}]
        });

        delete(&fake, state).await.unwrap();
        assert!(fake.calls().is_empty());
        assert_eq!(
            fake.values("sheet-1", "Sheet1!A1:C3"),
            Some(vec![vec![json!("keep")]])
        );
    }

    #[tokio::test]
    async fn test_delete_with_clear_on_destroy() {
        let fake = InMemorySheets::new().with_values(
            "sheet-1",
            "Sheet1!A1:C3",
            vec![vec![json!("gone")]],
        );
        let state = json!({
            "id": "sheet-1/Sheet1!A1:C3",
            "spreadsheet_id": "sheet-1",
            "range": "Sheet1!A1:C3",
            "rows": [{"values": ["gone"]}],
            "clear_on_destroy": true
        });

        delete(&fake, state).await.unwrap();
        assert_eq!(
            fake.calls().last(),
            Some(&SheetsCall::ClearValues {
                spreadsheet_id: "sheet-1".to_string(),
                range: "Sheet1!A1:C3".to_string()
            })
        );
        assert_eq!(fake.values("sheet-1", "Sheet1!A1:C3"), None);
    }

    #[tokio::test]
    async fn test_import() {
        let fake = InMemorySheets::new().with_values(
            "sheet-1",
            "Data/2024!A1:B2",
            vec![vec![json!("a"), json!("b")], vec![json!("c")]],
        );

        let imported = import(&fake, "sheet-1/Data/2024!A1:B2").await.unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].resource_type, RESOURCE_TYPE);
        assert_eq!(imported[0].state["id"], "sheet-1/Data/2024!A1:B2");
        assert_eq!(imported[0].state["range"], "Data/2024!A1:B2");
        assert_eq!(
            imported[0].state["rows"],
            json!([{"values": ["a", "b"]}, {"values": ["c"]}])
        );
        assert_eq!(imported[0].state["clear_on_destroy"], false);
    }
}
