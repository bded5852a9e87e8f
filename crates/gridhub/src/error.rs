//! Error types for the gridhub model layer.
//!
//! Precondition failures are synchronous and never touch the network; the
//! cache is left exactly as it was. Remote failures arrive wrapped as
//! [`Error::Api`].

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Document properties were accessed before the first `load_info()`.
    #[error("spreadsheet info has not been loaded; call load_info() first")]
    NotLoaded,

    /// The coordinate is inside the grid but was never fetched. Absence is
    /// distinct from "empty but loaded".
    #[error("cell {0} has not been loaded; call load_cells() first")]
    CellNotLoaded(String),

    #[error("row index {0} out of bounds (row count {1})")]
    RowOutOfBounds(u32, u32),

    #[error("column index {0} out of bounds (column count {1})")]
    ColumnOutOfBounds(u32, u32),

    /// The row was removed by a structural delete; the handle is dead.
    #[error("row {0} has been deleted")]
    RowDeleted(u32),

    /// The cell's row or column was removed by a structural delete.
    #[error("cell {0} was removed by a structural change")]
    CellDeleted(String),

    /// Reading a value the server has not validated yet.
    #[error("cell {0} has an unsaved value; save or discard it before reading")]
    UnsavedValue(String),

    /// Reading a format field with a pending local override.
    #[error("cell {cell} has an unsaved {field} override; save or discard it before reading")]
    UnsavedFormat { cell: String, field: &'static str },

    #[error("invalid cell value: {0}")]
    InvalidValue(String),

    #[error("formula must start with '=': {0:?}")]
    InvalidFormula(String),

    #[error("invalid A1 address: {0:?}")]
    InvalidAddress(String),

    #[error("invalid A1 range: {0:?}")]
    InvalidRange(String),

    #[error("duplicate header {0:?}")]
    DuplicateHeader(String),

    #[error("header row is entirely blank")]
    BlankHeaderRow,

    #[error("header row has not been loaded; call load_header_row() first")]
    HeadersNotLoaded,

    #[error("unknown header {0:?}")]
    UnknownHeader(String),

    #[error("{given} values exceed the sheet's {column_count} columns")]
    TooManyColumns { given: usize, column_count: u32 },

    /// A save was requested but nothing is dirty; the server rejects
    /// empty-effect batches, so the call fails before building one.
    #[error("no unsaved changes to write")]
    NothingToSave,

    /// A caller-supplied range names a different sheet than the worksheet
    /// it was handed to.
    #[error("range targets sheet {found}, but this worksheet is sheet {expected}")]
    WrongSheet { expected: i32, found: i32 },

    #[error("range targets sheet {found:?}, but this worksheet is {expected:?}")]
    WrongSheetTitle { expected: String, found: String },

    #[error("sheet {0} not found in this spreadsheet")]
    SheetNotFound(i32),

    #[error("no sheet titled {0:?} in this spreadsheet")]
    SheetTitleNotFound(String),

    /// Rectangular-bounds filters only work through the elevated fetch
    /// endpoint, which API keys cannot use.
    #[error(
        "rectangular-bounds cell filters require read/write credentials; \
         pass an A1 range instead or authenticate with a bearer token"
    )]
    BoundsFilterReadOnly,

    #[error("export format {0:?} exports a single sheet; specify a sheet id")]
    SheetRequiredForExport(&'static str),

    /// The server accepted a change but its reply lacked the echoed result
    /// the operation depends on.
    #[error("server reply is missing the {0} result")]
    MissingReply(&'static str),

    /// A remote or transport failure from the wire layer.
    #[error(transparent)]
    Api(#[from] gridhub_api::ApiError),
}
