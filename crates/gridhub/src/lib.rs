//! Rust client for the GridHub spreadsheet API.
//!
//! This crate models one remote spreadsheet document as live local objects:
//! a [`Spreadsheet`] owns [`Worksheet`]s, which own sparse caches of
//! [`Cell`]s and [`Row`]s. Mutations are buffered locally as drafts, batched
//! into minimal API calls, and the server's authoritative reply is merged
//! back into the same objects — so a handle you hold keeps reflecting the
//! document as structural changes shift coordinates underneath it.
//!
//! All durable state and computation (formula evaluation, number
//! formatting) live on the remote service; the client only ever writes the
//! *input* of a cell, never its computed value.
//!
//! # Example
//!
//! ```rust,no_run
//! use gridhub::{Credentials, Spreadsheet};
//!
//! # async fn example() -> gridhub::Result<()> {
//! let doc = Spreadsheet::new("1-abc", Credentials::bearer("token"));
//! doc.load_info(false).await?;
//!
//! let sheet = doc.worksheet_by_title("Expenses")?;
//! sheet.load_cells().await?;
//!
//! let cell = sheet.get_cell(0, 1)?;
//! cell.set_value(42.5)?;
//! cell.set_note("approved")?;
//! sheet.save_updated_cells().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! The model assumes one logical caller per [`Spreadsheet`]. Operations are
//! async and suspend only while a request is in flight; every response is
//! merged into the cache atomically with respect to that caller. Issuing
//! overlapping mutating calls from multiple tasks on the same document is
//! unsupported — the last response to be reconciled wins.

pub mod a1;
pub mod cell;
pub mod document;
pub mod error;
pub mod filter;
pub mod mask;
pub mod row;
pub mod worksheet;

pub use cell::{Cell, CellInput};
pub use document::{AddSheetOptions, DocumentPropertyUpdates, Spreadsheet};
pub use error::{Error, Result};
pub use filter::CellFilter;
pub use mask::build_field_mask;
pub use row::Row;
pub use worksheet::{
    AddRowsOptions, DuplicateSheetOptions, GetRowsOptions, GridPropertyUpdates, RowContent,
    SheetPropertyUpdates, Worksheet,
};

// Wire-layer types that appear in this crate's public API.
pub use gridhub_api::types::{
    BandedRange, BasicFilter, BooleanCondition, BooleanRule, Border, Borders, CellFormat, Color,
    ColorStyle, ConditionValue, ConditionalFormatRule, CopyPasteRequest, CutPasteRequest,
    DataValidationRule, Dimension, DimensionProperties, ErrorValue, ExportFormat, ExtendedValue,
    GridCoordinate, GridRange, MergeType, NamedRange, NumberFormat, Padding, Permission,
    ProtectedRange, SetDataValidationRequest, SheetProperties, SortOrder, SortSpec,
    SpreadsheetProperties, TextFormat, TextRotation, UpdateBordersRequest,
};
pub use gridhub_api::{ApiClient, Credentials};

use std::sync::{Mutex, MutexGuard};

/// Lock a cache mutex. Poisoning means a previous caller panicked mid-write;
/// the cache itself is still structurally sound, so we keep serving it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
