//! Async HTTP client for the GridHub API.
//!
//! One method per remote operation, each a single request/response round
//! trip. The client holds no document state; caching and reconciliation are
//! the `gridhub` crate's job.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use url::Url;

use crate::auth::Credentials;
use crate::error::{ApiError, Result, StatusError};
use crate::types::*;

/// Production endpoint of the GridHub service.
pub const DEFAULT_BASE_URL: &str = "https://api.gridhub.dev/v1";

/// GridHub API client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

/// Remote error body: `{"error": {"code": 403, "message": ..., "status": ...}}`.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: ErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetByDataFilterBody<'a> {
    data_filters: &'a [DataFilter],
    include_grid_data: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSpreadsheetBody<'a> {
    properties: &'a SpreadsheetProperties,
}

impl ApiClient {
    /// Create a client against the production endpoint.
    pub fn new(credentials: Credentials) -> Self {
        Self::with_base_url(credentials, DEFAULT_BASE_URL.to_string())
    }

    /// Create a client against a custom endpoint (self-hosted instances,
    /// tests against a mock server).
    pub fn with_base_url(credentials: Credentials, base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("gridhub/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url,
            credentials,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    // ========================================================================
    // Spreadsheet endpoints
    // ========================================================================

    /// Fetch the full document: properties, sheet list, and (optionally)
    /// grid data restricted to `ranges`.
    pub async fn get_spreadsheet(
        &self,
        spreadsheet_id: &str,
        include_grid_data: bool,
        ranges: &[String],
    ) -> Result<SpreadsheetPayload> {
        let url = self.url(&["spreadsheets", spreadsheet_id])?;
        let mut req = self.http.get(url);
        if include_grid_data {
            req = req.query(&[("includeGridData", "true")]);
        }
        for range in ranges {
            req = req.query(&[("ranges", range.as_str())]);
        }
        tracing::debug!(spreadsheet_id, include_grid_data, "fetching spreadsheet");
        self.send_json(req).await
    }

    /// Fetch cells selected by data filters. Requires read/write
    /// credentials; the plain ranges fetch is the API-key alternative.
    pub async fn get_by_data_filter(
        &self,
        spreadsheet_id: &str,
        filters: &[DataFilter],
    ) -> Result<SpreadsheetPayload> {
        let url = self.url(&["spreadsheets", &format!("{spreadsheet_id}:getByDataFilter")])?;
        let body = GetByDataFilterBody {
            data_filters: filters,
            include_grid_data: true,
        };
        tracing::debug!(spreadsheet_id, filters = filters.len(), "fetching cells by filter");
        self.send_json(self.http.post(url).json(&body)).await
    }

    /// Create a new spreadsheet document.
    pub async fn create_spreadsheet(
        &self,
        properties: &SpreadsheetProperties,
    ) -> Result<SpreadsheetPayload> {
        if !self.credentials.can_write() {
            return Err(ApiError::ReadOnly {
                operation: "creating a spreadsheet",
            });
        }
        let url = self.url(&["spreadsheets"])?;
        let body = CreateSpreadsheetBody { properties };
        self.send_json(self.http.post(url).json(&body)).await
    }

    /// Apply a list of change descriptors in one atomic round trip.
    pub async fn batch_update(
        &self,
        spreadsheet_id: &str,
        body: &BatchUpdateRequest,
    ) -> Result<BatchUpdateResponse> {
        let url = self.url(&["spreadsheets", &format!("{spreadsheet_id}:batchUpdate")])?;
        tracing::debug!(
            spreadsheet_id,
            requests = body.requests.len(),
            "applying batch update"
        );
        self.send_json(self.http.post(url).json(body)).await
    }

    // ========================================================================
    // Value-range endpoints
    // ========================================================================

    pub async fn values_get(&self, spreadsheet_id: &str, range: &str) -> Result<ValueRange> {
        let url = self.url(&["spreadsheets", spreadsheet_id, "values", range])?;
        self.send_json(self.http.get(url)).await
    }

    pub async fn values_batch_get(
        &self,
        spreadsheet_id: &str,
        ranges: &[String],
    ) -> Result<BatchGetValuesResponse> {
        let url = self.url(&["spreadsheets", spreadsheet_id, "values:batchGet"])?;
        let mut req = self.http.get(url);
        for range in ranges {
            req = req.query(&[("ranges", range.as_str())]);
        }
        self.send_json(req).await
    }

    pub async fn values_update(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &ValueRange,
        input: ValueInputOption,
    ) -> Result<UpdateValuesResponse> {
        let url = self.url(&["spreadsheets", spreadsheet_id, "values", range])?;
        let req = self
            .http
            .put(url)
            .query(&[("valueInputOption", input.as_str())])
            .json(values);
        self.send_json(req).await
    }

    pub async fn values_append(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &ValueRange,
        input: ValueInputOption,
        insert: InsertDataOption,
    ) -> Result<AppendValuesResponse> {
        let url = self.url(&[
            "spreadsheets",
            spreadsheet_id,
            "values",
            &format!("{range}:append"),
        ])?;
        let req = self
            .http
            .post(url)
            .query(&[
                ("valueInputOption", input.as_str()),
                ("insertDataOption", insert.as_str()),
            ])
            .json(values);
        self.send_json(req).await
    }

    pub async fn values_clear(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<ClearValuesResponse> {
        let url = self.url(&[
            "spreadsheets",
            spreadsheet_id,
            "values",
            &format!("{range}:clear"),
        ])?;
        let req = self.http.post(url).json(&serde_json::json!({}));
        self.send_json(req).await
    }

    // ========================================================================
    // Export / permissions pass-throughs
    // ========================================================================

    /// Download the document (or one sheet, for single-sheet formats) in the
    /// given format. Returns the raw bytes.
    pub async fn export(
        &self,
        spreadsheet_id: &str,
        format: ExportFormat,
        sheet_id: Option<i32>,
    ) -> Result<Vec<u8>> {
        let url = self.url(&["spreadsheets", spreadsheet_id, "export"])?;
        let mut req = self.http.get(url).query(&[("format", format.as_str())]);
        if let Some(sheet_id) = sheet_id {
            req = req.query(&[("sheetId", sheet_id.to_string())]);
        }
        let resp = self.credentials.decorate(req).send().await?;
        let resp = self.check(resp).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    pub async fn list_permissions(&self, spreadsheet_id: &str) -> Result<Vec<Permission>> {
        let url = self.url(&["spreadsheets", spreadsheet_id, "permissions"])?;
        let list: PermissionList = self.send_json(self.http.get(url)).await?;
        Ok(list.permissions)
    }

    pub async fn create_permission(
        &self,
        spreadsheet_id: &str,
        permission: &Permission,
    ) -> Result<Permission> {
        let url = self.url(&["spreadsheets", spreadsheet_id, "permissions"])?;
        self.send_json(self.http.post(url).json(permission)).await
    }

    pub async fn delete_permission(
        &self,
        spreadsheet_id: &str,
        permission_id: &str,
    ) -> Result<()> {
        let url = self.url(&[
            "spreadsheets",
            spreadsheet_id,
            "permissions",
            permission_id,
        ])?;
        let resp = self.credentials.decorate(self.http.delete(url)).send().await?;
        self.check(resp).await?;
        Ok(())
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T> {
        let resp = self.credentials.decorate(req).send().await?;
        let resp = self.check(resp).await?;
        Ok(resp.json::<T>().await?)
    }

    /// Map non-2xx replies to [`ApiError::Status`], attaching the remote
    /// error body when it parses and an auth hint where one helps.
    async fn check(&self, resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let detail: ErrorDetail = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_default();

        let hint = if status.as_u16() == 403 && self.credentials.is_api_key() {
            Some(
                "API keys can only read public documents; make the document \
                 public or authenticate with a bearer token"
                    .to_string(),
            )
        } else {
            None
        };

        Err(ApiError::Status(StatusError {
            status: status.as_u16(),
            code: detail.status,
            message: detail.message.unwrap_or(body),
            hint,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn client_for(server: &MockServer, credentials: Credentials) -> ApiClient {
        ApiClient::with_base_url(credentials, server.base_url())
    }

    #[tokio::test]
    async fn values_get_decodes_value_range() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/spreadsheets/doc1/values/'Sheet1'!A1:B2")
                    .query_param("key", "k");
                then.status(200).json_body(json!({
                    "range": "'Sheet1'!A1:B2",
                    "majorDimension": "ROWS",
                    "values": [["a", "b"], ["1", "2"]],
                }));
            })
            .await;

        let client = client_for(&server, Credentials::api_key("k"));
        let vr = client
            .values_get("doc1", "'Sheet1'!A1:B2")
            .await
            .expect("values_get");
        mock.assert_async().await;
        assert_eq!(vr.values.len(), 2);
        assert_eq!(vr.values[0][0], json!("a"));
    }

    #[tokio::test]
    async fn batch_update_posts_operation_keyed_requests() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/spreadsheets/doc1:batchUpdate")
                    .json_body_partial(
                        json!({
                            "requests": [{ "deleteSheet": { "sheetId": 2 } }],
                            "includeSpreadsheetInResponse": true,
                        })
                        .to_string(),
                    );
                then.status(200).json_body(json!({
                    "spreadsheetId": "doc1",
                    "replies": [{}],
                }));
            })
            .await;

        let client = client_for(&server, Credentials::bearer("tok"));
        let body = BatchUpdateRequest {
            requests: vec![Request::DeleteSheet(DeleteSheetRequest { sheet_id: 2 })],
            include_spreadsheet_in_response: true,
            response_ranges: vec![],
            response_include_grid_data: false,
        };
        let resp = client.batch_update("doc1", &body).await.expect("batch_update");
        mock.assert_async().await;
        assert_eq!(resp.spreadsheet_id, "doc1");
        assert_eq!(resp.replies.len(), 1);
    }

    #[tokio::test]
    async fn forbidden_under_api_key_gains_a_hint() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/spreadsheets/doc1");
                then.status(403).json_body(json!({
                    "error": {
                        "code": 403,
                        "message": "The caller does not have permission",
                        "status": "PERMISSION_DENIED",
                    }
                }));
            })
            .await;

        let client = client_for(&server, Credentials::api_key("k"));
        let err = client
            .get_spreadsheet("doc1", false, &[])
            .await
            .expect_err("should be forbidden");

        assert_eq!(err.status_code(), Some(403));
        let msg = err.to_string();
        assert!(msg.contains("PERMISSION_DENIED"), "{msg}");
        assert!(msg.contains("make the document public"), "{msg}");
    }

    #[tokio::test]
    async fn bearer_errors_carry_no_api_key_hint() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/spreadsheets/doc1");
                then.status(403).body("forbidden");
            })
            .await;

        let client = client_for(&server, Credentials::bearer("tok"));
        let err = client
            .get_spreadsheet("doc1", false, &[])
            .await
            .expect_err("should be forbidden");
        assert!(!err.to_string().contains("API keys"));
    }

    #[tokio::test]
    async fn create_spreadsheet_is_refused_client_side_under_api_key() {
        let server = MockServer::start_async().await;
        let catch_all = server
            .mock_async(|when, then| {
                when.path_contains("/");
                then.status(500);
            })
            .await;

        let client = client_for(&server, Credentials::api_key("k"));
        let err = client
            .create_spreadsheet(&SpreadsheetProperties::default())
            .await
            .expect_err("read-only credentials");
        assert!(matches!(err, ApiError::ReadOnly { .. }));
        // No request must have reached the server.
        assert_eq!(catch_all.hits_async().await, 0);
    }
}
