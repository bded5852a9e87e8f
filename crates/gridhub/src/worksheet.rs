//! Worksheet entity: one sheet's properties, its sparse cell arena, and its
//! row cache.
//!
//! The caches are keyed by stable coordinates and updated in place — an
//! "update" mutates the existing slot, never overwrites the map entry with
//! a fresh object. That is the mechanism by which handles held by callers
//! observe reloads and structural shifts.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use gridhub_api::types::{
    AddNamedRangeRequest, AutoFillRequest, BandedRange, BasicFilter,
    ClearBasicFilterRequest, ConditionalFormatRule, CopyPasteRequest, CutPasteRequest,
    DeleteDimensionRequest, DeleteRangeRequest, Dimension, DimensionProperties, DimensionRange,
    DuplicateSheetRequest, GridData, GridProperties, GridRange, InsertDimensionRequest,
    InsertRangeRequest, MergeCellsRequest, MergeType, MoveDimensionRequest, NamedRange,
    ProtectedRange, Request, SetBasicFilterRequest, SetDataValidationRequest, SheetPayload,
    SheetProperties, SortRangeRequest, SortSpec, UnmergeCellsRequest,
    AddBandingRequest, AddConditionalFormatRuleRequest, AddProtectedRangeRequest,
    UpdateBordersRequest, UpdateDimensionPropertiesRequest, UpdateSheetPropertiesRequest,
    ValueInputOption, ValueRange,
};
use gridhub_api::types::{Color, InsertDataOption};
use gridhub_api::ApiClient;

use crate::a1;
use crate::cell::{Cell, CellDraft, CellState};
use crate::document::{DocShared, Spreadsheet};
use crate::error::{Error, Result};
use crate::filter::CellFilter;
use crate::lock;
use crate::mask::build_field_mask;
use crate::row::{Row, RowState};

// ============================================================================
// Shared state
// ============================================================================

pub(crate) struct SheetShared {
    pub(crate) sheet_id: i32,
    pub(crate) state: Mutex<SheetState>,
}

pub(crate) struct SheetState {
    pub(crate) properties: SheetProperties,
    /// Sparse cell arena keyed by 0-based (row, column).
    pub(crate) cells: HashMap<(u32, u32), Arc<Mutex<CellState>>>,
    /// Row cache keyed by 1-based row number.
    pub(crate) rows: BTreeMap<u32, Arc<Mutex<RowState>>>,
    /// Loaded header list; `None` until the header row is read or written.
    pub(crate) headers: Option<Vec<String>>,
    /// 1-based row the headers live on. Data starts on the next row.
    pub(crate) header_row_number: u32,
    pub(crate) row_metadata: Vec<DimensionProperties>,
    pub(crate) column_metadata: Vec<DimensionProperties>,
}

impl SheetState {
    fn new(properties: SheetProperties) -> Self {
        Self {
            properties,
            cells: HashMap::new(),
            rows: BTreeMap::new(),
            headers: None,
            header_row_number: 1,
            row_metadata: Vec::new(),
            column_metadata: Vec::new(),
        }
    }
}

/// Build a fresh shared sheet from a server payload.
pub(crate) fn shared_from_payload(payload: SheetPayload) -> Arc<SheetShared> {
    let shared = Arc::new(SheetShared {
        sheet_id: payload.properties.sheet_id.unwrap_or_default(),
        state: Mutex::new(SheetState::new(payload.properties)),
    });
    if let Some(data) = payload.data {
        let mut state = lock(&shared.state);
        for grid in &data {
            absorb_grid_data(&mut state, grid);
        }
    }
    shared
}

/// Merge a server payload into an existing shared sheet, in place.
pub(crate) fn absorb_payload(shared: &SheetShared, payload: SheetPayload) {
    let mut state = lock(&shared.state);
    state.properties = payload.properties;
    if let Some(data) = payload.data {
        for grid in &data {
            absorb_grid_data(&mut state, grid);
        }
    }
}

/// Merge one rectangle of cell data into the arena: update in place where a
/// slot exists (so handles survive), construct where it does not.
fn absorb_grid_data(state: &mut SheetState, grid: &GridData) {
    let start_row = grid.start_row.unwrap_or(0);
    let start_col = grid.start_column.unwrap_or(0);

    if let Some(rows) = &grid.row_data {
        for (dr, row) in rows.iter().enumerate() {
            let Some(values) = &row.values else { continue };
            for (dc, data) in values.iter().enumerate() {
                let coord = (start_row + dr as u32, start_col + dc as u32);
                match state.cells.get(&coord) {
                    Some(slot) => lock(slot).absorb(data.clone()),
                    None => {
                        state.cells.insert(
                            coord,
                            Arc::new(Mutex::new(CellState::new(coord.0, coord.1, data.clone()))),
                        );
                    }
                }
            }
        }
    }

    if let Some(meta) = &grid.row_metadata {
        state.row_metadata = meta.clone();
    }
    if let Some(meta) = &grid.column_metadata {
        state.column_metadata = meta.clone();
    }
}

// ============================================================================
// Cache shifting (structural deletes)
// ============================================================================

/// After a confirmed whole-row delete of index range [start, end): mark
/// in-range cells dead, move every cell below up by the deleted count.
/// Slots are moved, never reallocated, so handle identity is preserved.
fn shift_cells_after_row_delete(state: &mut SheetState, start: u32, end: u32) {
    let count = end - start;
    let old = std::mem::take(&mut state.cells);
    for ((row, col), slot) in old {
        if row >= start && row < end {
            lock(&slot).deleted = true;
        } else if row >= end {
            lock(&slot).row -= count;
            state.cells.insert((row - count, col), slot);
        } else {
            state.cells.insert((row, col), slot);
        }
    }
}

fn shift_cells_after_column_delete(state: &mut SheetState, start: u32, end: u32) {
    let count = end - start;
    let old = std::mem::take(&mut state.cells);
    for ((row, col), slot) in old {
        if col >= start && col < end {
            lock(&slot).deleted = true;
        } else if col >= end {
            lock(&slot).col -= count;
            state.cells.insert((row, col - count), slot);
        } else {
            state.cells.insert((row, col), slot);
        }
    }
}

/// Same shift for the row cache. `start`/`end` are 0-based indexes; cached
/// rows are keyed 1-based.
fn shift_rows_after_delete(state: &mut SheetState, start: u32, end: u32) {
    let count = end - start;
    let old = std::mem::take(&mut state.rows);
    for (number, slot) in old {
        let index = number - 1;
        if index >= start && index < end {
            lock(&slot).deleted = true;
        } else if index >= end {
            lock(&slot).row_number -= count;
            state.rows.insert(number - count, slot);
        } else {
            state.rows.insert(number, slot);
        }
    }
}

fn upsert_row(
    state: &mut SheetState,
    row_number: u32,
    values: Vec<String>,
) -> Arc<Mutex<RowState>> {
    match state.rows.get(&row_number) {
        Some(slot) => {
            let mut row = lock(slot);
            row.values = values;
            row.row_number = row_number;
            drop(row);
            slot.clone()
        }
        None => {
            let slot = Arc::new(Mutex::new(RowState {
                row_number,
                values,
                deleted: false,
            }));
            state.rows.insert(row_number, slot.clone());
            slot
        }
    }
}

// ============================================================================
// Validation helpers
// ============================================================================

/// Headers must not be all-blank, and non-blank entries must be unique
/// (exact, case-sensitive). Blank entries may repeat; they mean "no column".
fn validate_headers(headers: &[String]) -> Result<()> {
    if headers.iter().all(|h| h.is_empty()) {
        return Err(Error::BlankHeaderRow);
    }
    let mut seen = HashSet::new();
    for header in headers {
        if !header.is_empty() && !seen.insert(header.as_str()) {
            return Err(Error::DuplicateHeader(header.clone()));
        }
    }
    Ok(())
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::Bool(true) => "TRUE".to_string(),
        serde_json::Value::Bool(false) => "FALSE".to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Options / typed partial updates
// ============================================================================

/// A row to append: positional values, or a header-keyed record converted
/// to positional through the current header order.
#[derive(Debug, Clone)]
pub enum RowContent {
    Values(Vec<String>),
    Fields(HashMap<String, String>),
}

impl From<Vec<String>> for RowContent {
    fn from(values: Vec<String>) -> Self {
        RowContent::Values(values)
    }
}

impl From<Vec<&str>> for RowContent {
    fn from(values: Vec<&str>) -> Self {
        RowContent::Values(values.into_iter().map(str::to_string).collect())
    }
}

impl From<HashMap<String, String>> for RowContent {
    fn from(fields: HashMap<String, String>) -> Self {
        RowContent::Fields(fields)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AddRowsOptions {
    /// Store values verbatim instead of parsing them as user input.
    pub raw: bool,
    /// Push existing rows down instead of overwriting blank rows below.
    pub insert: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GetRowsOptions {
    /// Data rows to skip, counted from the row after the header row.
    pub offset: u32,
    /// Maximum rows to fetch; `None` means through the end of the grid.
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct DuplicateSheetOptions {
    pub insert_index: Option<u32>,
    pub new_title: Option<String>,
    pub new_sheet_id: Option<i32>,
}

/// Partial sheet-property update; only the `Some` fields are written, and
/// the field mask is derived from exactly those fields.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetPropertyUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_to_left: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_properties: Option<GridPropertyUpdates>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridPropertyUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frozen_row_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frozen_column_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide_gridlines: Option<bool>,
}

// ============================================================================
// Worksheet handle
// ============================================================================

/// Handle to one sheet of a [`Spreadsheet`]. Cheap to clone; clones share
/// the same cache.
#[derive(Clone)]
pub struct Worksheet {
    pub(crate) doc: Arc<DocShared>,
    pub(crate) shared: Arc<SheetShared>,
}

impl Worksheet {
    // ========================================================================
    // Properties
    // ========================================================================

    pub fn sheet_id(&self) -> i32 {
        self.shared.sheet_id
    }

    pub fn title(&self) -> String {
        lock(&self.shared.state)
            .properties
            .title
            .clone()
            .unwrap_or_default()
    }

    /// Position among sibling sheets.
    pub fn index(&self) -> Option<u32> {
        lock(&self.shared.state).properties.index
    }

    pub fn sheet_type(&self) -> Option<String> {
        lock(&self.shared.state).properties.sheet_type.clone()
    }

    pub fn hidden(&self) -> bool {
        lock(&self.shared.state).properties.hidden.unwrap_or(false)
    }

    pub fn right_to_left(&self) -> bool {
        lock(&self.shared.state)
            .properties
            .right_to_left
            .unwrap_or(false)
    }

    pub fn tab_color(&self) -> Option<Color> {
        lock(&self.shared.state).properties.tab_color
    }

    pub fn row_count(&self) -> u32 {
        lock(&self.shared.state)
            .properties
            .grid_properties
            .as_ref()
            .and_then(|g| g.row_count)
            .unwrap_or(0)
    }

    pub fn column_count(&self) -> u32 {
        lock(&self.shared.state)
            .properties
            .grid_properties
            .as_ref()
            .and_then(|g| g.column_count)
            .unwrap_or(0)
    }

    pub fn properties(&self) -> SheetProperties {
        lock(&self.shared.state).properties.clone()
    }

    pub fn row_metadata(&self) -> Vec<DimensionProperties> {
        lock(&self.shared.state).row_metadata.clone()
    }

    pub fn column_metadata(&self) -> Vec<DimensionProperties> {
        lock(&self.shared.state).column_metadata.clone()
    }

    /// The owning document.
    pub fn document(&self) -> Spreadsheet {
        Spreadsheet::from_shared(self.doc.clone())
    }

    pub(crate) fn api(&self) -> &ApiClient {
        &self.doc.api
    }

    pub(crate) fn spreadsheet_id(&self) -> &str {
        &self.doc.spreadsheet_id
    }

    // ========================================================================
    // Cell-range operations
    // ========================================================================

    /// Load every cell of this sheet into the local cache.
    pub async fn load_cells(&self) -> Result<()> {
        self.load_cells_filtered(vec![CellFilter::A1(a1::sheet_range(&self.title()))])
            .await
    }

    /// Load the cells selected by `filters`. Each filter is pinned to this
    /// sheet; a filter naming another sheet is rejected.
    pub async fn load_cells_filtered(&self, filters: Vec<CellFilter>) -> Result<()> {
        let title = self.title();
        let scoped = filters
            .into_iter()
            .map(|f| f.scoped_to(self.shared.sheet_id, &title))
            .collect::<Result<Vec<_>>>()?;
        self.document().load_cells(scoped).await
    }

    /// Get the loaded cell at 0-based (row, column).
    ///
    /// Out-of-bounds coordinates and never-loaded coordinates are distinct
    /// errors; an absent cell is never fabricated as "empty".
    pub fn get_cell(&self, row: u32, column: u32) -> Result<Cell> {
        let state = lock(&self.shared.state);
        let grid = state.properties.grid_properties.clone().unwrap_or_default();
        let row_count = grid.row_count.unwrap_or(0);
        let column_count = grid.column_count.unwrap_or(0);
        if row >= row_count {
            return Err(Error::RowOutOfBounds(row, row_count));
        }
        if column >= column_count {
            return Err(Error::ColumnOutOfBounds(column, column_count));
        }
        match state.cells.get(&(row, column)) {
            Some(slot) => Ok(Cell {
                sheet: self.clone(),
                state: slot.clone(),
            }),
            None => Err(Error::CellNotLoaded(a1::to_a1(row, column))),
        }
    }

    pub fn get_cell_by_a1(&self, address: &str) -> Result<Cell> {
        let (row, column) = a1::parse_a1(address)?;
        self.get_cell(row, column)
    }

    /// Save every dirty cell in the cache in one batched call. A cache with
    /// nothing dirty is a successful no-op — no empty batch is ever sent.
    pub async fn save_updated_cells(&self) -> Result<()> {
        let dirty: Vec<Arc<Mutex<CellState>>> = {
            let state = lock(&self.shared.state);
            state
                .cells
                .values()
                .filter(|slot| lock(slot).is_dirty())
                .cloned()
                .collect()
        };
        if dirty.is_empty() {
            return Ok(());
        }
        self.save_slots(dirty).await
    }

    /// Save exactly the listed cells. Errors before any network IO when none
    /// of them is dirty, since the server rejects empty-effect batches.
    pub async fn save_cells(&self, cells: &[Cell]) -> Result<()> {
        for cell in cells {
            if !Arc::ptr_eq(&cell.sheet.shared, &self.shared) {
                return Err(Error::WrongSheet {
                    expected: self.shared.sheet_id,
                    found: cell.sheet.shared.sheet_id,
                });
            }
        }
        let dirty: Vec<Arc<Mutex<CellState>>> = cells
            .iter()
            .filter(|cell| lock(&cell.state).is_dirty())
            .map(|cell| cell.state.clone())
            .collect();
        if dirty.is_empty() {
            return Err(Error::NothingToSave);
        }
        self.save_slots(dirty).await
    }

    /// One independent update sub-request per cell (differing per-cell field
    /// masks must not clobber each other), submitted as a single batch. The
    /// echoed ranges refresh the cache; drafts clear only on success.
    async fn save_slots(&self, slots: Vec<Arc<Mutex<CellState>>>) -> Result<()> {
        let title = self.title();
        let mut requests = Vec::with_capacity(slots.len());
        let mut response_ranges = Vec::with_capacity(slots.len());
        for slot in &slots {
            let state = lock(slot);
            if let Some(request) = state.update_request(self.shared.sheet_id) {
                response_ranges.push(format!("{}!{}", a1::quote_title(&title), state.a1()));
                requests.push(request);
            }
        }
        if requests.is_empty() {
            return Err(Error::NothingToSave);
        }

        tracing::debug!(sheet_id = self.shared.sheet_id, cells = requests.len(), "saving cells");
        self.document()
            .batch_changes(requests, response_ranges)
            .await?;

        // Reconciling the echo cleared drafts for every echoed cell; clear
        // the rest explicitly so a successful save never leaves dirt behind.
        for slot in &slots {
            lock(slot).draft = CellDraft::default();
        }
        Ok(())
    }

    // ========================================================================
    // Header row
    // ========================================================================

    /// Loaded header list, if any.
    pub fn header_values(&self) -> Option<Vec<String>> {
        lock(&self.shared.state).headers.clone()
    }

    /// 1-based row number the headers live on.
    pub fn header_row_number(&self) -> u32 {
        lock(&self.shared.state).header_row_number
    }

    /// Read the header row (default: the configured header row) and adopt
    /// it as the sheet's row schema.
    pub async fn load_header_row(&self, row_number: Option<u32>) -> Result<()> {
        let hrn = row_number.unwrap_or_else(|| lock(&self.shared.state).header_row_number);
        let range = a1::row_only_range(&self.title(), hrn, hrn);
        let reply = self.api().values_get(self.spreadsheet_id(), &range).await?;

        let trimmed: Vec<String> = reply
            .values
            .first()
            .map(|row| row.iter().map(|v| value_to_string(v).trim().to_string()).collect())
            .unwrap_or_default();
        validate_headers(&trimmed)?;

        let mut state = lock(&self.shared.state);
        state.header_row_number = hrn;
        state.headers = Some(trimmed);
        Ok(())
    }

    /// Overwrite the entire header row (padding with empty strings beyond
    /// the given values, so stale trailing headers cannot linger).
    pub async fn set_header_row(&self, values: &[&str], row_number: Option<u32>) -> Result<()> {
        let trimmed: Vec<String> = values.iter().map(|s| s.trim().to_string()).collect();
        validate_headers(&trimmed)?;

        let column_count = self.column_count();
        if trimmed.len() > column_count as usize {
            return Err(Error::TooManyColumns {
                given: trimmed.len(),
                column_count,
            });
        }

        let hrn = row_number.unwrap_or_else(|| lock(&self.shared.state).header_row_number);
        let mut padded = trimmed;
        padded.resize(column_count.max(padded.len() as u32) as usize, String::new());

        let range = a1::row_span(&self.title(), hrn, padded.len() as u32);
        let body = ValueRange {
            range: None,
            major_dimension: None,
            values: vec![padded
                .iter()
                .cloned()
                .map(serde_json::Value::String)
                .collect()],
        };
        self.api()
            .values_update(self.spreadsheet_id(), &range, &body, ValueInputOption::Raw)
            .await?;

        let mut state = lock(&self.shared.state);
        state.header_row_number = hrn;
        state.headers = Some(padded);
        Ok(())
    }

    async fn ensure_headers(&self) -> Result<Vec<String>> {
        if let Some(headers) = self.header_values() {
            return Ok(headers);
        }
        self.load_header_row(None).await?;
        self.header_values().ok_or(Error::HeadersNotLoaded)
    }

    // ========================================================================
    // Row-based operations
    // ========================================================================

    /// Append rows after the last data row. With `options.insert`, existing
    /// rows are pushed down instead of blank rows being overwritten.
    pub async fn add_rows(
        &self,
        rows: Vec<RowContent>,
        options: AddRowsOptions,
    ) -> Result<Vec<Row>> {
        let headers = self.ensure_headers().await?;

        let mut lines = Vec::with_capacity(rows.len());
        for row in rows {
            lines.push(match row {
                RowContent::Values(values) => values,
                RowContent::Fields(fields) => {
                    for key in fields.keys() {
                        let known = headers.iter().any(|h| !h.trim().is_empty() && h == key);
                        if !known {
                            return Err(Error::UnknownHeader(key.clone()));
                        }
                    }
                    headers
                        .iter()
                        .map(|h| fields.get(h).cloned().unwrap_or_default())
                        .collect()
                }
            });
        }
        if lines.is_empty() {
            return Ok(Vec::new());
        }

        let hrn = self.header_row_number();
        let range = format!("{}!A{hrn}", a1::quote_title(&self.title()));
        let body = ValueRange {
            range: None,
            major_dimension: None,
            values: lines
                .iter()
                .map(|line| line.iter().cloned().map(serde_json::Value::String).collect())
                .collect(),
        };
        let input = if options.raw {
            ValueInputOption::Raw
        } else {
            ValueInputOption::UserEntered
        };
        let insert = if options.insert {
            InsertDataOption::InsertRows
        } else {
            InsertDataOption::Overwrite
        };

        let reply = self
            .api()
            .values_append(self.spreadsheet_id(), &range, &body, input, insert)
            .await?;

        let updated_range = reply
            .updates
            .as_ref()
            .and_then(|u| u.updated_range.clone())
            .ok_or_else(|| Error::InvalidRange("append reply had no updated range".into()))?;
        let (first_row_index, _) = a1::first_cell_of(&updated_range)?;
        let first_row_number = first_row_index + 1;

        let added = lines.len() as u32;
        let mut out = Vec::with_capacity(lines.len());
        let mut state = lock(&self.shared.state);
        for (i, line) in lines.into_iter().enumerate() {
            let number = first_row_number + i as u32;
            let slot = upsert_row(&mut state, number, line);
            out.push(Row {
                sheet: self.clone(),
                state: slot,
            });
        }

        // The grid grew: by the appended count on insert, or to cover the
        // new last row otherwise. Never shrunk here.
        let grid = state
            .properties
            .grid_properties
            .get_or_insert_with(GridProperties::default);
        let current = grid.row_count.unwrap_or(0);
        grid.row_count = Some(if options.insert {
            current + added
        } else {
            current.max(first_row_number + added - 1)
        });

        Ok(out)
    }

    /// Fetch a window of data rows in one rectangular read. When headers are
    /// not yet known, the header row rides along in the same request to save
    /// a round trip.
    pub async fn get_rows(&self, options: GetRowsOptions) -> Result<Vec<Row>> {
        let title = self.title();
        let (headers_known, hrn) = {
            let state = lock(&self.shared.state);
            (state.headers.is_some(), state.header_row_number)
        };

        let row_count = self.row_count();
        let first = hrn + 1 + options.offset;
        if first > row_count {
            return Ok(Vec::new());
        }
        let last = match options.limit {
            Some(0) => return Ok(Vec::new()),
            Some(limit) => (first + limit - 1).min(row_count),
            None => row_count,
        };

        let mut ranges = Vec::new();
        if !headers_known {
            ranges.push(a1::row_only_range(&title, hrn, hrn));
        }
        ranges.push(a1::row_only_range(&title, first, last));

        let reply = self
            .api()
            .values_batch_get(self.spreadsheet_id(), &ranges)
            .await?;
        let mut value_ranges = reply.value_ranges.into_iter();

        if !headers_known {
            let header_range = value_ranges
                .next()
                .ok_or_else(|| Error::InvalidRange("reply missing header range".into()))?;
            let trimmed: Vec<String> = header_range
                .values
                .first()
                .map(|row| row.iter().map(|v| value_to_string(v).trim().to_string()).collect())
                .unwrap_or_default();
            validate_headers(&trimmed)?;
            lock(&self.shared.state).headers = Some(trimmed);
        }

        let width = self.header_values().map(|h| h.len()).unwrap_or(0);
        let data = value_ranges.next().unwrap_or_default();

        let mut out = Vec::new();
        let mut state = lock(&self.shared.state);
        for (i, line) in data.values.into_iter().enumerate() {
            let number = first + i as u32;
            let mut values: Vec<String> = line.iter().map(value_to_string).collect();
            if width > 0 {
                values.resize(width, String::new());
            }
            let slot = upsert_row(&mut state, number, values);
            out.push(Row {
                sheet: self.clone(),
                state: slot,
            });
        }
        Ok(out)
    }

    /// Renumber the row cache after a single confirmed row deletion.
    pub(crate) fn shift_row_cache_after_delete(&self, row_number: u32) {
        let mut state = lock(&self.shared.state);
        shift_rows_after_delete(&mut state, row_number - 1, row_number);
    }

    // ========================================================================
    // Structural operations
    // ========================================================================

    /// Insert blank rows or columns at [start, end). No cached object can
    /// represent the not-yet-existing space, so the cache is not touched;
    /// re-fetch to see the inserted rows through cached handles.
    pub async fn insert_dimension(
        &self,
        dimension: Dimension,
        start_index: u32,
        end_index: u32,
        inherit_from_before: bool,
    ) -> Result<()> {
        let request = Request::InsertDimension(InsertDimensionRequest {
            range: DimensionRange {
                sheet_id: self.shared.sheet_id,
                dimension,
                start_index,
                end_index,
            },
            inherit_from_before: Some(inherit_from_before),
        });
        self.document().single_change(request).await?;
        Ok(())
    }

    /// Delete whole rows or columns at [start, end). After the server
    /// confirms, cached entities inside the range are marked deleted and
    /// everything past it shifts up/left — same objects, new coordinates.
    pub async fn delete_dimension(
        &self,
        dimension: Dimension,
        start_index: u32,
        end_index: u32,
    ) -> Result<()> {
        if end_index <= start_index {
            return Err(Error::InvalidRange(format!("{start_index}..{end_index}")));
        }
        let request = Request::DeleteDimension(DeleteDimensionRequest {
            range: DimensionRange {
                sheet_id: self.shared.sheet_id,
                dimension,
                start_index,
                end_index,
            },
        });
        self.document().single_change(request).await?;

        let mut state = lock(&self.shared.state);
        match dimension {
            Dimension::Rows => {
                shift_cells_after_row_delete(&mut state, start_index, end_index);
                shift_rows_after_delete(&mut state, start_index, end_index);
            }
            Dimension::Columns => {
                // Rows are row-indexed and keep their identity; their
                // content changed, so callers should reload headers.
                shift_cells_after_column_delete(&mut state, start_index, end_index);
            }
        }
        Ok(())
    }

    pub async fn delete_rows(&self, start_index: u32, row_count: u32) -> Result<()> {
        self.delete_dimension(Dimension::Rows, start_index, start_index + row_count)
            .await
    }

    pub async fn delete_columns(&self, start_index: u32, column_count: u32) -> Result<()> {
        self.delete_dimension(Dimension::Columns, start_index, start_index + column_count)
            .await
    }

    pub async fn insert_range(&self, range: GridRange, shift_dimension: Dimension) -> Result<()> {
        let range = self.own_range(range)?;
        self.document()
            .single_change(Request::InsertRange(InsertRangeRequest {
                range,
                shift_dimension,
            }))
            .await?;
        Ok(())
    }

    /// Delete an arbitrary sub-range with a shift. Partial-width shifts are
    /// not mirrored into the cache; use [`Worksheet::delete_rows`] /
    /// [`Worksheet::delete_columns`] for whole-dimension deletes, or reload
    /// the affected cells.
    pub async fn delete_range(&self, range: GridRange, shift_dimension: Dimension) -> Result<()> {
        let range = self.own_range(range)?;
        self.document()
            .single_change(Request::DeleteRange(DeleteRangeRequest {
                range,
                shift_dimension,
            }))
            .await?;
        Ok(())
    }

    /// Move rows or columns. The cache is not re-mapped for moves; reload
    /// to see the new layout through cached handles.
    pub async fn move_dimension(
        &self,
        dimension: Dimension,
        start_index: u32,
        end_index: u32,
        destination_index: u32,
    ) -> Result<()> {
        let request = Request::MoveDimension(MoveDimensionRequest {
            source: DimensionRange {
                sheet_id: self.shared.sheet_id,
                dimension,
                start_index,
                end_index,
            },
            destination_index,
        });
        self.document().single_change(request).await?;
        Ok(())
    }

    // ========================================================================
    // Pass-through request builders
    // ========================================================================

    pub async fn merge_cells(&self, range: GridRange, merge_type: MergeType) -> Result<()> {
        let range = self.own_range(range)?;
        self.document()
            .single_change(Request::MergeCells(MergeCellsRequest { range, merge_type }))
            .await?;
        Ok(())
    }

    pub async fn unmerge_cells(&self, range: GridRange) -> Result<()> {
        let range = self.own_range(range)?;
        self.document()
            .single_change(Request::UnmergeCells(UnmergeCellsRequest { range }))
            .await?;
        Ok(())
    }

    pub async fn update_borders(&self, mut request: UpdateBordersRequest) -> Result<()> {
        request.range = self.own_range(request.range)?;
        self.document()
            .single_change(Request::UpdateBorders(request))
            .await?;
        Ok(())
    }

    /// Update row/column metadata (pixel size, visibility) for a run of
    /// rows or columns.
    pub async fn update_dimension_properties(
        &self,
        dimension: Dimension,
        start_index: u32,
        end_index: u32,
        properties: DimensionProperties,
    ) -> Result<()> {
        let mut fields = Vec::new();
        if properties.pixel_size.is_some() {
            fields.push("pixelSize".to_string());
        }
        if properties.hidden_by_user.is_some() {
            fields.push("hiddenByUser".to_string());
        }
        for key in properties.extra.keys() {
            fields.push(key.clone());
        }
        if fields.is_empty() {
            return Err(Error::NothingToSave);
        }

        let request = Request::UpdateDimensionProperties(UpdateDimensionPropertiesRequest {
            range: DimensionRange {
                sheet_id: self.shared.sheet_id,
                dimension,
                start_index,
                end_index,
            },
            properties,
            fields: fields.join(","),
        });
        self.document().single_change(request).await?;
        Ok(())
    }

    pub async fn set_data_validation(&self, mut request: SetDataValidationRequest) -> Result<()> {
        request.range = self.own_range(request.range)?;
        self.document()
            .single_change(Request::SetDataValidation(request))
            .await?;
        Ok(())
    }

    pub async fn add_conditional_format_rule(
        &self,
        mut rule: ConditionalFormatRule,
        index: Option<u32>,
    ) -> Result<()> {
        rule.ranges = rule
            .ranges
            .into_iter()
            .map(|r| self.own_range(r))
            .collect::<Result<Vec<_>>>()?;
        self.document()
            .single_change(Request::AddConditionalFormatRule(
                AddConditionalFormatRuleRequest { rule, index },
            ))
            .await?;
        Ok(())
    }

    pub async fn add_protected_range(
        &self,
        mut protected_range: ProtectedRange,
    ) -> Result<ProtectedRange> {
        if let Some(range) = protected_range.range.take() {
            protected_range.range = Some(self.own_range(range)?);
        }
        let reply = self
            .document()
            .single_change(Request::AddProtectedRange(AddProtectedRangeRequest {
                protected_range,
            }))
            .await?;
        Ok(reply
            .add_protected_range
            .map(|r| r.protected_range)
            .unwrap_or_default())
    }

    pub async fn add_banding(&self, mut banded_range: BandedRange) -> Result<BandedRange> {
        banded_range.range = self.own_range(banded_range.range)?;
        let reply = self
            .document()
            .single_change(Request::AddBanding(AddBandingRequest { banded_range }))
            .await?;
        Ok(reply.add_banding.map(|r| r.banded_range).unwrap_or_default())
    }

    pub async fn add_named_range(&self, name: &str, range: GridRange) -> Result<NamedRange> {
        let range = self.own_range(range)?;
        let reply = self
            .document()
            .single_change(Request::AddNamedRange(AddNamedRangeRequest {
                named_range: NamedRange {
                    named_range_id: None,
                    name: name.to_string(),
                    range,
                },
            }))
            .await?;
        Ok(reply
            .add_named_range
            .map(|r| r.named_range)
            .unwrap_or_default())
    }

    pub async fn set_basic_filter(&self, mut filter: BasicFilter) -> Result<()> {
        filter.range = self.own_range(filter.range)?;
        self.document()
            .single_change(Request::SetBasicFilter(SetBasicFilterRequest { filter }))
            .await?;
        Ok(())
    }

    pub async fn clear_basic_filter(&self) -> Result<()> {
        self.document()
            .single_change(Request::ClearBasicFilter(ClearBasicFilterRequest {
                sheet_id: self.shared.sheet_id,
            }))
            .await?;
        Ok(())
    }

    pub async fn sort_range(&self, range: GridRange, sort_specs: Vec<SortSpec>) -> Result<()> {
        let range = self.own_range(range)?;
        self.document()
            .single_change(Request::SortRange(SortRangeRequest { range, sort_specs }))
            .await?;
        Ok(())
    }

    pub async fn copy_paste(&self, mut request: CopyPasteRequest) -> Result<()> {
        request.source = self.own_range(request.source)?;
        request.destination = self.own_range(request.destination)?;
        self.document()
            .single_change(Request::CopyPaste(request))
            .await?;
        Ok(())
    }

    pub async fn cut_paste(&self, mut request: CutPasteRequest) -> Result<()> {
        request.source = self.own_range(request.source)?;
        if request.destination.sheet_id != self.shared.sheet_id {
            return Err(Error::WrongSheet {
                expected: self.shared.sheet_id,
                found: request.destination.sheet_id,
            });
        }
        self.document()
            .single_change(Request::CutPaste(request))
            .await?;
        Ok(())
    }

    pub async fn auto_fill(&self, range: GridRange, use_alternate_series: bool) -> Result<()> {
        let range = self.own_range(range)?;
        self.document()
            .single_change(Request::AutoFill(AutoFillRequest {
                range: Some(range),
                source_and_destination: None,
                use_alternate_series: Some(use_alternate_series),
            }))
            .await?;
        Ok(())
    }

    /// Duplicate this sheet; returns a handle to the copy.
    pub async fn duplicate(&self, options: DuplicateSheetOptions) -> Result<Worksheet> {
        let reply = self
            .document()
            .single_change(Request::DuplicateSheet(DuplicateSheetRequest {
                source_sheet_id: self.shared.sheet_id,
                insert_sheet_index: options.insert_index,
                new_sheet_id: options.new_sheet_id,
                new_sheet_name: options.new_title,
            }))
            .await?;
        let new_id = reply
            .duplicate_sheet
            .and_then(|r| r.properties.sheet_id)
            .ok_or(Error::MissingReply("duplicateSheet"))?;
        self.document().worksheet_by_id(new_id)
    }

    /// Clear every value on the sheet and drop the local caches.
    pub async fn clear(&self) -> Result<()> {
        let range = a1::sheet_range(&self.title());
        self.api().values_clear(self.spreadsheet_id(), &range).await?;

        let mut state = lock(&self.shared.state);
        state.cells.clear();
        state.rows.clear();
        state.headers = None;
        Ok(())
    }

    /// Clear one range's values. The whole cell/row cache is invalidated
    /// rather than computing a partial invalidation.
    pub async fn clear_range(&self, range: &str) -> Result<()> {
        let scoped = CellFilter::from(range)
            .scoped_to(self.shared.sheet_id, &self.title())?
            .into_a1()?;
        self.api().values_clear(self.spreadsheet_id(), &scoped).await?;

        let mut state = lock(&self.shared.state);
        state.cells.clear();
        state.rows.clear();
        Ok(())
    }

    // ========================================================================
    // Property updates
    // ========================================================================

    /// Write a partial property update; the field mask is derived from
    /// exactly the fields present, so untouched properties survive.
    pub async fn update_properties(&self, updates: SheetPropertyUpdates) -> Result<()> {
        let value = serde_json::to_value(&updates).map_err(gridhub_api::ApiError::from)?;
        let map = value.as_object().cloned().unwrap_or_default();
        let fields = build_field_mask(&map);
        if fields.is_empty() {
            return Err(Error::NothingToSave);
        }

        let properties = SheetProperties {
            sheet_id: Some(self.shared.sheet_id),
            title: updates.title,
            index: updates.index,
            hidden: updates.hidden,
            tab_color: updates.tab_color,
            right_to_left: updates.right_to_left,
            grid_properties: updates.grid_properties.map(|g| GridProperties {
                row_count: g.row_count,
                column_count: g.column_count,
                frozen_row_count: g.frozen_row_count,
                frozen_column_count: g.frozen_column_count,
                hide_gridlines: g.hide_gridlines,
            }),
            ..Default::default()
        };
        self.document()
            .single_change(Request::UpdateSheetProperties(UpdateSheetPropertiesRequest {
                properties,
                fields,
            }))
            .await?;
        Ok(())
    }

    pub async fn rename(&self, title: &str) -> Result<()> {
        self.update_properties(SheetPropertyUpdates {
            title: Some(title.to_string()),
            ..Default::default()
        })
        .await
    }

    pub async fn resize(&self, row_count: u32, column_count: u32) -> Result<()> {
        self.update_properties(SheetPropertyUpdates {
            grid_properties: Some(GridPropertyUpdates {
                row_count: Some(row_count),
                column_count: Some(column_count),
                ..Default::default()
            }),
            ..Default::default()
        })
        .await
    }

    /// Delete this sheet from the document.
    pub async fn delete(&self) -> Result<()> {
        self.document().delete_sheet(self.shared.sheet_id).await
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Pin a caller-supplied range to this sheet, rejecting a range that
    /// names a different one.
    fn own_range(&self, mut range: GridRange) -> Result<GridRange> {
        if let Some(found) = range.sheet_id {
            if found != self.shared.sheet_id {
                return Err(Error::WrongSheet {
                    expected: self.shared.sheet_id,
                    found,
                });
            }
        }
        range.sheet_id = Some(self.shared.sheet_id);
        Ok(range)
    }
}

impl std::fmt::Debug for Worksheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worksheet")
            .field("sheet_id", &self.shared.sheet_id)
            .field("title", &self.title())
            .finish()
    }
}
