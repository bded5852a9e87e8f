//! Document-level loading, reconciliation, and capability behavior against
//! a mock GridHub server.

mod common;

use common::*;
use gridhub::{AddSheetOptions, CellFilter, Error};
use httpmock::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn accessors_fail_before_first_load() {
    let server = MockServer::start_async().await;
    let doc = bearer_doc(&server);

    assert!(matches!(doc.title(), Err(Error::NotLoaded)));
    assert!(matches!(doc.properties(), Err(Error::NotLoaded)));
    assert!(matches!(doc.worksheets(), Err(Error::NotLoaded)));
    assert!(matches!(doc.worksheet_by_id(0), Err(Error::NotLoaded)));
}

#[tokio::test]
async fn load_info_populates_properties_and_sheets() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/spreadsheets/{DOC_ID}"));
            then.status(200).json_body(info_payload(vec![
                sheet_properties(0, "Sheet1", 0, 100, 26),
                sheet_properties(7, "Prices", 1, 50, 4),
            ]));
        })
        .await;

    let doc = bearer_doc(&server);
    doc.load_info(false).await.expect("load_info");
    mock.assert_async().await;

    assert_eq!(doc.title().unwrap(), "Test Doc");
    assert_eq!(doc.locale().unwrap(), "en_US");
    assert_eq!(doc.time_zone().unwrap(), "Etc/UTC");
    assert_eq!(doc.sheet_count().unwrap(), 2);

    let sheets = doc.worksheets().unwrap();
    assert_eq!(sheets[0].title(), "Sheet1");
    assert_eq!(sheets[1].title(), "Prices");
    assert_eq!(sheets[1].sheet_id(), 7);
    assert_eq!(sheets[1].row_count(), 50);
    assert_eq!(sheets[1].column_count(), 4);
}

#[tokio::test]
async fn reloading_updates_existing_worksheets_in_place() {
    let server = MockServer::start_async().await;
    let mut first = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/spreadsheets/{DOC_ID}"));
            then.status(200)
                .json_body(info_payload(vec![sheet_properties(0, "Sheet1", 0, 100, 26)]));
        })
        .await;

    let doc = bearer_doc(&server);
    doc.load_info(false).await.expect("first load");
    let sheet = doc.worksheet_by_id(0).expect("sheet 0");
    assert_eq!(sheet.title(), "Sheet1");
    assert_eq!(sheet.row_count(), 100);

    // The server renamed and resized the sheet behind our back.
    first.delete_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/spreadsheets/{DOC_ID}"));
            then.status(200)
                .json_body(info_payload(vec![sheet_properties(0, "Renamed", 0, 200, 26)]));
        })
        .await;

    doc.load_info(false).await.expect("second load");

    // The handle we kept observes the change: same object, new state.
    assert_eq!(sheet.title(), "Renamed");
    assert_eq!(sheet.row_count(), 200);
    assert_eq!(doc.sheet_count().unwrap(), 1);
}

#[tokio::test]
async fn add_sheet_reconciles_and_returns_the_new_sheet() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/spreadsheets/{DOC_ID}"));
            then.status(200)
                .json_body(info_payload(vec![sheet_properties(0, "Sheet1", 0, 100, 26)]));
        })
        .await;

    let doc = bearer_doc(&server);
    doc.load_info(false).await.expect("load_info");

    let update = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/spreadsheets/{DOC_ID}:batchUpdate"))
                .body_contains("\"addSheet\"")
                .body_contains("\"title\":\"New\"");
            then.status(200).json_body(json!({
                "spreadsheetId": DOC_ID,
                "replies": [
                    { "addSheet": { "properties": sheet_properties(5, "New", 1, 50, 10) } }
                ],
                "updatedSpreadsheet": info_payload(vec![
                    sheet_properties(0, "Sheet1", 0, 100, 26),
                    sheet_properties(5, "New", 1, 50, 10),
                ]),
            }));
        })
        .await;

    let sheet = doc
        .add_sheet(AddSheetOptions {
            title: Some("New".into()),
            ..Default::default()
        })
        .await
        .expect("add_sheet");
    update.assert_async().await;

    assert_eq!(sheet.sheet_id(), 5);
    assert_eq!(sheet.title(), "New");
    assert_eq!(doc.sheet_count().unwrap(), 2);
}

#[tokio::test]
async fn delete_sheet_removes_it_from_the_local_map() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/spreadsheets/{DOC_ID}"));
            then.status(200).json_body(info_payload(vec![
                sheet_properties(0, "Sheet1", 0, 100, 26),
                sheet_properties(5, "Scratch", 1, 50, 10),
            ]));
        })
        .await;

    let doc = bearer_doc(&server);
    doc.load_info(false).await.expect("load_info");

    let update = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/spreadsheets/{DOC_ID}:batchUpdate"))
                .body_contains("\"deleteSheet\"")
                .body_contains("\"sheetId\":5");
            then.status(200).json_body(json!({
                "spreadsheetId": DOC_ID,
                "replies": [{}],
                "updatedSpreadsheet": info_payload(vec![sheet_properties(0, "Sheet1", 0, 100, 26)]),
            }));
        })
        .await;

    doc.delete_sheet(5).await.expect("delete_sheet");
    update.assert_async().await;

    assert!(matches!(doc.worksheet_by_id(5), Err(Error::SheetNotFound(5))));
    assert_eq!(doc.sheet_count().unwrap(), 1);
}

#[tokio::test]
async fn failed_mutation_leaves_the_cache_untouched() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/spreadsheets/{DOC_ID}"));
            then.status(200)
                .json_body(info_payload(vec![sheet_properties(0, "Sheet1", 0, 100, 26)]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/spreadsheets/{DOC_ID}:batchUpdate"));
            then.status(400).json_body(json!({
                "error": { "code": 400, "message": "Invalid request", "status": "INVALID_ARGUMENT" }
            }));
        })
        .await;

    let doc = bearer_doc(&server);
    doc.load_info(false).await.expect("load_info");

    let err = doc.delete_sheet(0).await.expect_err("server rejected");
    assert!(matches!(err, Error::Api(_)));

    // The sheet is still present locally.
    assert!(doc.worksheet_by_id(0).is_ok());
}

#[tokio::test]
async fn elevated_load_cells_uses_the_filter_endpoint() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/spreadsheets/{DOC_ID}"));
            then.status(200)
                .json_body(info_payload(vec![sheet_properties(0, "Sheet1", 0, 100, 26)]));
        })
        .await;

    let doc = bearer_doc(&server);
    doc.load_info(false).await.expect("load_info");
    let sheet = doc.worksheet_by_id(0).unwrap();

    let fetch = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/spreadsheets/{DOC_ID}:getByDataFilter"))
                .body_contains("\"a1Range\"")
                .body_contains("'Sheet1'!A1:B1");
            then.status(200).json_body(info_payload(vec![json!({
                "properties": sheet_properties(0, "Sheet1", 0, 100, 26),
                "data": [{
                    "startRow": 0,
                    "startColumn": 0,
                    "rowData": [{ "values": [text_cell("hello"), number_cell(2.0)] }],
                }],
            })]));
        })
        .await;

    sheet
        .load_cells_filtered(vec![CellFilter::from("A1:B1")])
        .await
        .expect("load_cells_filtered");
    fetch.assert_async().await;

    assert_eq!(
        sheet.get_cell(0, 0).unwrap().formatted_value().as_deref(),
        Some("hello")
    );
    assert_eq!(
        sheet.get_cell(0, 1).unwrap().formatted_value().as_deref(),
        Some("2")
    );
}

#[tokio::test]
async fn api_key_load_cells_uses_the_plain_ranges_fetch() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/spreadsheets/{DOC_ID}"))
                .query_param_missing("includeGridData");
            then.status(200)
                .json_body(info_payload(vec![sheet_properties(0, "Sheet1", 0, 100, 26)]));
        })
        .await;

    let doc = api_key_doc(&server);
    doc.load_info(false).await.expect("load_info");
    let sheet = doc.worksheet_by_id(0).unwrap();

    let fetch = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/spreadsheets/{DOC_ID}"))
                .query_param("includeGridData", "true")
                .query_param("ranges", "'Sheet1'!A1:A1");
            then.status(200).json_body(info_payload(vec![json!({
                "properties": sheet_properties(0, "Sheet1", 0, 100, 26),
                "data": [{
                    "startRow": 0,
                    "startColumn": 0,
                    "rowData": [{ "values": [text_cell("public")] }],
                }],
            })]));
        })
        .await;

    sheet
        .load_cells_filtered(vec![CellFilter::from("A1:A1")])
        .await
        .expect("load_cells_filtered");
    fetch.assert_async().await;

    assert_eq!(
        sheet.get_cell(0, 0).unwrap().formatted_value().as_deref(),
        Some("public")
    );
}

#[tokio::test]
async fn bounds_filters_are_rejected_under_api_key_without_network() {
    let server = MockServer::start_async().await;
    let catch_all = server
        .mock_async(|when, then| {
            when.path_contains("/");
            then.status(500);
        })
        .await;

    let doc = api_key_doc(&server);
    let err = doc
        .load_cells(vec![CellFilter::Bounds {
            sheet_id: Some(0),
            start_row_index: Some(0),
            end_row_index: Some(5),
            start_column_index: Some(0),
            end_column_index: Some(2),
        }])
        .await
        .expect_err("bounds filter needs elevated credentials");

    assert!(matches!(err, Error::BoundsFilterReadOnly));
    assert_eq!(catch_all.hits_async().await, 0);
}

#[tokio::test]
async fn filters_naming_another_sheet_are_rejected() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/spreadsheets/{DOC_ID}"));
            then.status(200)
                .json_body(info_payload(vec![sheet_properties(0, "Sheet1", 0, 100, 26)]));
        })
        .await;

    let doc = bearer_doc(&server);
    doc.load_info(false).await.expect("load_info");
    let sheet = doc.worksheet_by_id(0).unwrap();

    let err = sheet
        .load_cells_filtered(vec![CellFilter::from("'Other'!A1:B2")])
        .await
        .expect_err("wrong sheet");
    assert!(matches!(err, Error::WrongSheetTitle { .. }));
}
