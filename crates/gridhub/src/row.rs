//! Row entity: one logical data row addressed by its 1-based row number.
//!
//! Field access resolves header names through the worksheet's *current*
//! header list on every call — nothing is baked in at construction, so a
//! header reload is observed by rows that already exist. Row numbers are
//! mutated in place when a deletion above shifts the row, so a held handle
//! keeps pointing at the same logical row.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use gridhub_api::types::{
    DeleteRangeRequest, Dimension, GridRange, Request, ValueInputOption, ValueRange,
};

use crate::a1;
use crate::error::{Error, Result};
use crate::lock;
use crate::worksheet::Worksheet;

/// Shared per-row slot in the worksheet's row cache.
pub(crate) struct RowState {
    /// 1-based row number, in the same coordinate space as A1 addressing.
    pub(crate) row_number: u32,
    pub(crate) values: Vec<String>,
    pub(crate) deleted: bool,
}

/// Handle to one data row of a [`Worksheet`].
#[derive(Clone)]
pub struct Row {
    pub(crate) sheet: Worksheet,
    pub(crate) state: Arc<Mutex<RowState>>,
}

impl Row {
    /// Current 1-based row number. Decrements when a row above is deleted.
    pub fn row_number(&self) -> u32 {
        lock(&self.state).row_number
    }

    pub fn is_deleted(&self) -> bool {
        lock(&self.state).deleted
    }

    /// Snapshot of the underlying value array, in column order.
    pub fn values(&self) -> Vec<String> {
        lock(&self.state).values.clone()
    }

    /// Value of the column whose header is `header`, or `None` for an
    /// unknown or blank header. Blank headers are "no column" and never
    /// match.
    pub fn get(&self, header: &str) -> Option<String> {
        if header.trim().is_empty() {
            return None;
        }
        let headers = self.sheet.header_values()?;
        let index = headers.iter().position(|h| h == header)?;
        lock(&self.state).values.get(index).cloned()
    }

    /// Set the value of the column whose header is `header`.
    ///
    /// Unknown headers are an error: silently dropping the write would lose
    /// data without a trace.
    pub fn set(&self, header: &str, value: impl Into<String>) -> Result<()> {
        let headers = self.sheet.header_values().ok_or(Error::HeadersNotLoaded)?;
        let index = headers
            .iter()
            .position(|h| !h.trim().is_empty() && h == header)
            .ok_or_else(|| Error::UnknownHeader(header.to_string()))?;

        let mut state = lock(&self.state);
        if state.deleted {
            return Err(Error::RowDeleted(state.row_number));
        }
        if state.values.len() <= index {
            state.values.resize(index + 1, String::new());
        }
        state.values[index] = value.into();
        Ok(())
    }

    /// Header → value map over all non-blank headers. Blank headers are
    /// skipped entirely, not present as empty-string keys.
    pub fn to_object(&self) -> HashMap<String, String> {
        let Some(headers) = self.sheet.header_values() else {
            return HashMap::new();
        };
        let state = lock(&self.state);
        headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.trim().is_empty())
            .map(|(i, h)| (h.clone(), state.values.get(i).cloned().unwrap_or_default()))
            .collect()
    }

    /// Write the full value array back to this row's exact range (row
    /// number × header width).
    ///
    /// With `raw = false` the server interprets values as if a user typed
    /// them (`"$5"` becomes a currency number); with `raw = true` they are
    /// stored verbatim.
    pub async fn save(&self, raw: bool) -> Result<()> {
        let (row_number, values) = {
            let state = lock(&self.state);
            if state.deleted {
                return Err(Error::RowDeleted(state.row_number));
            }
            (state.row_number, state.values.clone())
        };

        let headers = self.sheet.header_values().ok_or(Error::HeadersNotLoaded)?;
        let width = headers.len().max(1);
        let range = a1::row_span(&self.sheet.title(), row_number, width as u32);

        let mut padded = values;
        padded.resize(width, String::new());
        let body = ValueRange {
            range: None,
            major_dimension: None,
            values: vec![padded.into_iter().map(serde_json::Value::String).collect()],
        };
        let input = if raw {
            ValueInputOption::Raw
        } else {
            ValueInputOption::UserEntered
        };

        self.sheet
            .api()
            .values_update(self.sheet.spreadsheet_id(), &range, &body, input)
            .await?;
        Ok(())
    }

    /// Delete exactly this row's range with an upward shift, then renumber
    /// the worksheet's cached rows below it. The handle is dead afterwards.
    pub async fn delete(&self) -> Result<()> {
        let row_number = {
            let state = lock(&self.state);
            if state.deleted {
                return Err(Error::RowDeleted(state.row_number));
            }
            state.row_number
        };

        let headers = self.sheet.header_values().ok_or(Error::HeadersNotLoaded)?;
        let width = headers.len().max(1) as u32;

        // Zero-indexed, exclusive-ended, per the wire convention.
        let request = Request::DeleteRange(DeleteRangeRequest {
            range: GridRange {
                sheet_id: Some(self.sheet.sheet_id()),
                start_row_index: Some(row_number - 1),
                end_row_index: Some(row_number),
                start_column_index: Some(0),
                end_column_index: Some(width),
            },
            shift_dimension: Dimension::Rows,
        });
        self.sheet.document().single_change(request).await?;

        // Server confirmed: kill this handle's slot, then renumber the rest.
        lock(&self.state).deleted = true;
        self.sheet.shift_row_cache_after_delete(row_number);
        Ok(())
    }
}

impl std::fmt::Debug for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("Row")
            .field("row_number", &state.row_number)
            .field("deleted", &state.deleted)
            .field("values", &state.values)
            .finish()
    }
}
