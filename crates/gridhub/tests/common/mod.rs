//! Shared fixtures for the mock-server integration tests.
#![allow(dead_code)]

use gridhub::{ApiClient, Credentials, Spreadsheet};
use httpmock::MockServer;
use serde_json::{json, Value};

pub const DOC_ID: &str = "doc1";

pub fn doc_with(server: &MockServer, credentials: Credentials) -> Spreadsheet {
    Spreadsheet::with_client(
        DOC_ID,
        ApiClient::with_base_url(credentials, server.base_url()),
    )
}

pub fn bearer_doc(server: &MockServer) -> Spreadsheet {
    doc_with(server, Credentials::bearer("test-token"))
}

pub fn api_key_doc(server: &MockServer) -> Spreadsheet {
    doc_with(server, Credentials::api_key("test-key"))
}

pub fn sheet_properties(sheet_id: i32, title: &str, index: u32, rows: u32, cols: u32) -> Value {
    json!({
        "sheetId": sheet_id,
        "title": title,
        "index": index,
        "sheetType": "GRID",
        "gridProperties": { "rowCount": rows, "columnCount": cols },
    })
}

/// An info payload wrapping per-sheet JSON: either bare properties or a
/// full sheet object with `data`.
pub fn info_payload(sheets: Vec<Value>) -> Value {
    let sheets: Vec<Value> = sheets
        .into_iter()
        .map(|s| {
            if s.get("properties").is_some() {
                s
            } else {
                json!({ "properties": s })
            }
        })
        .collect();
    json!({
        "spreadsheetId": DOC_ID,
        "properties": {
            "title": "Test Doc",
            "locale": "en_US",
            "timeZone": "Etc/UTC",
            "autoRecalc": "ON_CHANGE",
        },
        "sheets": sheets,
    })
}

/// One cell of grid data holding a user-entered string.
pub fn text_cell(text: &str) -> Value {
    json!({
        "userEnteredValue": { "stringValue": text },
        "effectiveValue": { "stringValue": text },
        "formattedValue": text,
    })
}

pub fn number_cell(n: f64) -> Value {
    json!({
        "userEnteredValue": { "numberValue": n },
        "effectiveValue": { "numberValue": n },
        "formattedValue": n.to_string(),
    })
}
