//! Document entity: the top-level owner of one remote spreadsheet.
//!
//! Every mutating call funnels through one of two primitives — a single
//! change or a batched change list — and both treat the server's reply as a
//! potential full-state refresh: the properties bag is replaced and every
//! echoed sheet is reconciled, because the server may adjust unrelated
//! fields (row counts, sheet indexes) as side effects. Nothing is applied
//! speculatively; a failed call leaves the cache exactly as it was.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use gridhub_api::types::{
    AddSheetRequest, BatchUpdateRequest, BatchUpdateResponse, DataFilter, DeleteSheetRequest,
    ExportFormat, GridProperties, Permission, Reply, Request, SheetProperties, SpreadsheetPayload,
    SpreadsheetProperties, UpdateSpreadsheetPropertiesRequest,
};
use gridhub_api::{ApiClient, Credentials};

use crate::error::{Error, Result};
use crate::filter::CellFilter;
use crate::lock;
use crate::mask::build_field_mask;
use crate::worksheet::{self, SheetShared, Worksheet};

pub(crate) struct DocShared {
    pub(crate) spreadsheet_id: String,
    pub(crate) api: ApiClient,
    pub(crate) state: Mutex<DocState>,
}

pub(crate) struct DocState {
    /// `None` until the first `load_info` (or reconciled mutation reply);
    /// accessors fail until then rather than serving guesses.
    pub(crate) properties: Option<SpreadsheetProperties>,
    pub(crate) sheets: HashMap<i32, Arc<SheetShared>>,
}

/// Options for [`Spreadsheet::add_sheet`].
#[derive(Debug, Clone, Default)]
pub struct AddSheetOptions {
    pub title: Option<String>,
    pub index: Option<u32>,
    pub row_count: Option<u32>,
    pub column_count: Option<u32>,
    /// Written as the new sheet's header row after creation.
    pub headers: Option<Vec<String>>,
    pub header_row_number: Option<u32>,
}

/// Partial document-property update; the field mask is derived from exactly
/// the fields present.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPropertyUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_recalc: Option<String>,
}

/// Handle to one remote spreadsheet document. Cheap to clone; clones share
/// the same cache and API client.
#[derive(Clone)]
pub struct Spreadsheet {
    shared: Arc<DocShared>,
}

impl Spreadsheet {
    /// Point a new handle at an existing document. No network IO happens
    /// until [`Spreadsheet::load_info`].
    pub fn new(spreadsheet_id: impl Into<String>, credentials: Credentials) -> Self {
        Self::with_client(spreadsheet_id, ApiClient::new(credentials))
    }

    /// Like [`Spreadsheet::new`], with a caller-configured client
    /// (self-hosted endpoints, tests).
    pub fn with_client(spreadsheet_id: impl Into<String>, api: ApiClient) -> Self {
        Self {
            shared: Arc::new(DocShared {
                spreadsheet_id: spreadsheet_id.into(),
                api,
                state: Mutex::new(DocState {
                    properties: None,
                    sheets: HashMap::new(),
                }),
            }),
        }
    }

    pub(crate) fn from_shared(shared: Arc<DocShared>) -> Self {
        Self { shared }
    }

    /// Create a brand-new document and return a loaded handle to it.
    /// Requires read/write credentials.
    pub async fn create(api: ApiClient, properties: SpreadsheetProperties) -> Result<Spreadsheet> {
        let payload = api.create_spreadsheet(&properties).await?;
        let doc = Spreadsheet::with_client(payload.spreadsheet_id.clone(), api);
        doc.reconcile(payload);
        Ok(doc)
    }

    // ========================================================================
    // Properties
    // ========================================================================

    pub fn id(&self) -> &str {
        &self.shared.spreadsheet_id
    }

    pub fn is_loaded(&self) -> bool {
        lock(&self.shared.state).properties.is_some()
    }

    /// The full properties bag. Fails before the first load — the bag is
    /// never partially trusted.
    pub fn properties(&self) -> Result<SpreadsheetProperties> {
        lock(&self.shared.state)
            .properties
            .clone()
            .ok_or(Error::NotLoaded)
    }

    pub fn title(&self) -> Result<String> {
        Ok(self.properties()?.title.unwrap_or_default())
    }

    pub fn locale(&self) -> Result<String> {
        Ok(self.properties()?.locale.unwrap_or_default())
    }

    pub fn time_zone(&self) -> Result<String> {
        Ok(self.properties()?.time_zone.unwrap_or_default())
    }

    pub fn auto_recalc(&self) -> Result<String> {
        Ok(self.properties()?.auto_recalc.unwrap_or_default())
    }

    // ========================================================================
    // Loading / reconciliation
    // ========================================================================

    /// Fetch the whole document and replace the local view of it. Existing
    /// [`Worksheet`] objects are updated in place so held handles stay
    /// valid; sheets removed server-side are *not* pruned by this call.
    pub async fn load_info(&self, include_cell_data: bool) -> Result<()> {
        let payload = self
            .shared
            .api
            .get_spreadsheet(&self.shared.spreadsheet_id, include_cell_data, &[])
            .await?;
        self.reconcile(payload);
        Ok(())
    }

    /// Bulk-load cells across sheets. With read/write credentials this uses
    /// the filter endpoint (A1 or bounds filters); under an API key it
    /// falls back to the plain ranges fetch, which accepts only A1 text —
    /// bounds filters are rejected with a clear error rather than silently
    /// dropped.
    pub async fn load_cells(&self, filters: Vec<CellFilter>) -> Result<()> {
        if filters.is_empty() {
            return Ok(());
        }
        let payload = if self.shared.api.credentials().can_write() {
            let data_filters: Vec<DataFilter> = filters
                .into_iter()
                .map(CellFilter::into_data_filter)
                .collect();
            self.shared
                .api
                .get_by_data_filter(&self.shared.spreadsheet_id, &data_filters)
                .await?
        } else {
            let ranges = filters
                .into_iter()
                .map(CellFilter::into_a1)
                .collect::<Result<Vec<_>>>()?;
            self.shared
                .api
                .get_spreadsheet(&self.shared.spreadsheet_id, true, &ranges)
                .await?
        };
        self.reconcile(payload);
        Ok(())
    }

    /// Merge an authoritative server payload into the cache: replace the
    /// properties bag, then update-or-create each sheet (mutating existing
    /// sheet objects in place to preserve identity for held handles).
    fn reconcile(&self, payload: SpreadsheetPayload) {
        let mut state = lock(&self.shared.state);
        if let Some(properties) = payload.properties {
            state.properties = Some(properties);
        }
        for sheet in payload.sheets.unwrap_or_default() {
            let Some(sheet_id) = sheet.properties.sheet_id else {
                continue;
            };
            match state.sheets.get(&sheet_id) {
                Some(existing) => worksheet::absorb_payload(existing, sheet),
                None => {
                    state.sheets.insert(sheet_id, worksheet::shared_from_payload(sheet));
                }
            }
        }
    }

    // ========================================================================
    // Sheet access
    // ========================================================================

    pub fn sheet_count(&self) -> Result<usize> {
        let state = lock(&self.shared.state);
        if state.properties.is_none() {
            return Err(Error::NotLoaded);
        }
        Ok(state.sheets.len())
    }

    /// All sheets, ordered by their index property.
    pub fn worksheets(&self) -> Result<Vec<Worksheet>> {
        let mut sheets = {
            let state = lock(&self.shared.state);
            if state.properties.is_none() {
                return Err(Error::NotLoaded);
            }
            state
                .sheets
                .values()
                .map(|shared| Worksheet {
                    doc: self.shared.clone(),
                    shared: shared.clone(),
                })
                .collect::<Vec<_>>()
        };
        sheets.sort_by_key(|sheet| sheet.index().unwrap_or(u32::MAX));
        Ok(sheets)
    }

    pub fn worksheet_by_id(&self, sheet_id: i32) -> Result<Worksheet> {
        let state = lock(&self.shared.state);
        if state.properties.is_none() {
            return Err(Error::NotLoaded);
        }
        state
            .sheets
            .get(&sheet_id)
            .map(|shared| Worksheet {
                doc: self.shared.clone(),
                shared: shared.clone(),
            })
            .ok_or(Error::SheetNotFound(sheet_id))
    }

    pub fn worksheet_by_title(&self, title: &str) -> Result<Worksheet> {
        let sheets = self.worksheets()?;
        sheets
            .into_iter()
            .find(|sheet| sheet.title() == title)
            .ok_or_else(|| Error::SheetTitleNotFound(title.to_string()))
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Add a sheet; returns a handle to it (already reconciled into the
    /// sheet map). Headers, when given, are written as a follow-up.
    pub async fn add_sheet(&self, options: AddSheetOptions) -> Result<Worksheet> {
        let grid = if options.row_count.is_some() || options.column_count.is_some() {
            Some(GridProperties {
                row_count: options.row_count,
                column_count: options.column_count,
                ..Default::default()
            })
        } else {
            None
        };
        let has_properties =
            options.title.is_some() || options.index.is_some() || grid.is_some();
        let properties = has_properties.then(|| SheetProperties {
            sheet_id: None,
            title: options.title.clone(),
            index: options.index,
            grid_properties: grid,
            ..Default::default()
        });

        let reply = self
            .single_change(Request::AddSheet(AddSheetRequest { properties }))
            .await?;
        let new_id = reply
            .add_sheet
            .and_then(|r| r.properties.sheet_id)
            .ok_or(Error::MissingReply("addSheet"))?;
        let sheet = self.worksheet_by_id(new_id)?;

        if let Some(headers) = options.headers {
            let refs: Vec<&str> = headers.iter().map(String::as_str).collect();
            sheet.set_header_row(&refs, options.header_row_number).await?;
        }
        Ok(sheet)
    }

    /// Delete a sheet. This is the one place a sheet leaves the local map.
    pub async fn delete_sheet(&self, sheet_id: i32) -> Result<()> {
        self.single_change(Request::DeleteSheet(DeleteSheetRequest { sheet_id }))
            .await?;
        lock(&self.shared.state).sheets.remove(&sheet_id);
        Ok(())
    }

    /// Write a partial document-property update.
    pub async fn update_properties(&self, updates: DocumentPropertyUpdates) -> Result<()> {
        let value = serde_json::to_value(&updates).map_err(gridhub_api::ApiError::from)?;
        let map = value.as_object().cloned().unwrap_or_default();
        let fields = build_field_mask(&map);
        if fields.is_empty() {
            return Err(Error::NothingToSave);
        }

        let properties = SpreadsheetProperties {
            title: updates.title,
            locale: updates.locale,
            time_zone: updates.time_zone,
            auto_recalc: updates.auto_recalc,
            ..Default::default()
        };
        self.single_change(Request::UpdateSpreadsheetProperties(
            UpdateSpreadsheetPropertiesRequest { properties, fields },
        ))
        .await?;
        Ok(())
    }

    /// Apply one change descriptor and return its echoed reply. The reply's
    /// spreadsheet payload is reconciled before this returns.
    pub(crate) async fn single_change(&self, request: Request) -> Result<Reply> {
        let body = BatchUpdateRequest {
            requests: vec![request],
            include_spreadsheet_in_response: true,
            response_ranges: vec![],
            response_include_grid_data: false,
        };
        let response = self
            .shared
            .api
            .batch_update(&self.shared.spreadsheet_id, &body)
            .await?;
        if let Some(updated) = response.updated_spreadsheet {
            self.reconcile(updated);
        }
        Ok(response.replies.into_iter().next().unwrap_or_default())
    }

    /// Apply many change descriptors in one round trip. `response_ranges`
    /// asks the server to echo grid data for those ranges, which the
    /// reconcile pass merges into the cell caches.
    pub(crate) async fn batch_changes(
        &self,
        requests: Vec<Request>,
        response_ranges: Vec<String>,
    ) -> Result<BatchUpdateResponse> {
        let include_grid = !response_ranges.is_empty();
        let body = BatchUpdateRequest {
            requests,
            include_spreadsheet_in_response: true,
            response_ranges,
            response_include_grid_data: include_grid,
        };
        let mut response = self
            .shared
            .api
            .batch_update(&self.shared.spreadsheet_id, &body)
            .await?;
        if let Some(updated) = response.updated_spreadsheet.take() {
            self.reconcile(updated);
        }
        Ok(response)
    }

    // ========================================================================
    // Export / permissions pass-throughs
    // ========================================================================

    /// Download the document in the given format. Single-sheet formats
    /// (CSV, TSV) need a sheet id.
    pub async fn export(&self, format: ExportFormat, sheet_id: Option<i32>) -> Result<Vec<u8>> {
        if format.is_single_sheet() && sheet_id.is_none() {
            return Err(Error::SheetRequiredForExport(format.as_str()));
        }
        Ok(self
            .shared
            .api
            .export(&self.shared.spreadsheet_id, format, sheet_id)
            .await?)
    }

    pub async fn permissions(&self) -> Result<Vec<Permission>> {
        Ok(self
            .shared
            .api
            .list_permissions(&self.shared.spreadsheet_id)
            .await?)
    }

    pub async fn add_permission(&self, permission: &Permission) -> Result<Permission> {
        Ok(self
            .shared
            .api
            .create_permission(&self.shared.spreadsheet_id, permission)
            .await?)
    }

    pub async fn remove_permission(&self, permission_id: &str) -> Result<()> {
        Ok(self
            .shared
            .api
            .delete_permission(&self.shared.spreadsheet_id, permission_id)
            .await?)
    }
}

impl std::fmt::Debug for Spreadsheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.shared.state);
        f.debug_struct("Spreadsheet")
            .field("spreadsheet_id", &self.shared.spreadsheet_id)
            .field("loaded", &state.properties.is_some())
            .field("sheets", &state.sheets.len())
            .finish()
    }
}
