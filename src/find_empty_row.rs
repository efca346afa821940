//! The `googlespreadsheets_find_empty_row` data source.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::ProviderError;
use crate::rows::resource_id;
use crate::schema::{Attribute, Schema};
use crate::sheets::SheetsApi;

pub const DATA_SOURCE_TYPE: &str = "googlespreadsheets_find_empty_row";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FindEmptyRowConfig {
    pub spreadsheet_id: String,
    pub range: String,
}

/// 1-based position of the first row with no cells.
///
/// An empty range reports position 1. A range whose rows all have cells is
/// [`ProviderError::NoEmptyRow`].
pub fn first_empty_row<T>(rows: &[Vec<T>], range: &str) -> Result<usize, ProviderError> {
    if rows.is_empty() {
        return Ok(1);
    }
    rows.iter()
        .position(|row| row.is_empty())
        .map(|index| index + 1)
        .ok_or_else(|| ProviderError::NoEmptyRow(range.to_string()))
}

pub fn schema() -> Schema {
    Schema::v0()
        .with_description("Finds the first empty row of a spreadsheet range")
        .with_attribute("spreadsheet_id", Attribute::required_string())
        .with_attribute(
            "range",
            Attribute::required_string().with_description("A1 notation range to scan"),
        )
        .with_attribute(
            "position",
            Attribute::computed_string()
                .with_description("1-based row of the first empty row within the range"),
        )
        .with_attribute("id", Attribute::computed_string())
}

pub async fn read(api: &dyn SheetsApi, config: Value) -> Result<Value, ProviderError> {
    let config: FindEmptyRowConfig = serde_json::from_value(config)?;

    let sheet = api.get_spreadsheet(&config.spreadsheet_id).await?;
    let values = api.get_values(&sheet.spreadsheet_id, &config.range).await?;
    let position = first_empty_row(&values, &config.range)?;
    debug!(
        spreadsheet_id = %sheet.spreadsheet_id,
        range = %config.range,
        scanned = values.len(),
        position,
        "empty row found"
    );

    Ok(json!({
        "id": resource_id(&sheet.spreadsheet_id, &config.range),
        "spreadsheet_id": sheet.spreadsheet_id,
        "range": config.range,
        "position": position.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemorySheets;

    fn rows(shape: &[&[&str]]) -> Vec<Vec<Value>> {
        shape
            .iter()
            .map(|row| row.iter().map(|cell| json!(cell)).collect())
            .collect()
    }

    #[test]
    fn test_scan_stops_at_first_empty_row() {
        let values = rows(&[&["a"], &["b", "c"], &[], &["d"]]);
        assert_eq!(first_empty_row(&values, "A1:B4").unwrap(), 3);

        let values = rows(&[&[], &[]]);
        assert_eq!(first_empty_row(&values, "A1:B2").unwrap(), 1);
    }

    #[test]
    fn test_scan_without_empty_row_is_an_error() {
        let values = rows(&[&["a"], &["b"]]);
        let err = first_empty_row(&values, "Sheet1!A1:A2").unwrap_err();
        assert!(matches!(err, ProviderError::NoEmptyRow(ref r) if r == "Sheet1!A1:A2"));
    }

    #[test]
    fn test_scan_of_empty_range() {
        let values: Vec<Vec<Value>> = Vec::new();
        assert_eq!(first_empty_row(&values, "A1:A10").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_read_data_source() {
        let fake = InMemorySheets::new().with_values(
            "sheet-1",
            "Log!A1:B10",
            rows(&[&["2024-01-01", "ok"], &[], &["2024-01-03"]]),
        );

        let state = read(
            &fake,
            json!({"spreadsheet_id": "sheet-1", "range": "Log!A1:B10"}),
        )
        .await
        .unwrap();

        assert_eq!(state["position"], "2");
        assert_eq!(state["id"], "sheet-1/Log!A1:B10");
        assert_eq!(state["spreadsheet_id"], "sheet-1");
    }

    #[tokio::test]
    async fn test_read_data_source_full_range() {
        let fake = InMemorySheets::new().with_values("sheet-1", "A1:A2", rows(&[&["x"], &["y"]]));
        let err = read(&fake, json!({"spreadsheet_id": "sheet-1", "range": "A1:A2"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NoEmptyRow(_)));
    }

    #[tokio::test]
    async fn test_read_data_source_missing_spreadsheet() {
        let fake = InMemorySheets::new();
        let err = read(&fake, json!({"spreadsheet_id": "nope", "range": "A1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }
}
