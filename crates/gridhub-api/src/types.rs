//! Wire types for the GridHub JSON protocol.
//!
//! These mirror the service's payloads one-to-one; the model layer owns all
//! interpretation. Unknown properties are carried through opaque `extra`
//! maps so a round trip never sheds server-side fields the client does not
//! understand.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Spreadsheet / sheet payloads
// ============================================================================

/// A full spreadsheet document as returned by fetch-info, getByDataFilter,
/// and the `updatedSpreadsheet` echo of a batch update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpreadsheetPayload {
    pub spreadsheet_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<SpreadsheetProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheets: Option<Vec<SheetPayload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spreadsheet_url: Option<String>,
}

/// Document-level properties. Treated by callers as an opaque bag: the known
/// fields are typed, everything else rides along in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpreadsheetProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_recalc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_format: Option<CellFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterative_calculation_settings: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spreadsheet_theme: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One sheet of a spreadsheet, with grid data when it was requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SheetPayload {
    pub properties: SheetProperties,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<GridData>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merges: Option<Vec<GridRange>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SheetProperties {
    /// Absent only in `addSheet` requests, where the server assigns the id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_properties: Option<GridProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_color_style: Option<ColorStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_to_left: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridProperties {
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
// Grid data
// ============================================================================

/// A rectangle of cell data anchored at (`start_row`, `start_column`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_row: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_data: Option<Vec<RowData>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_metadata: Option<Vec<DimensionProperties>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_metadata: Option<Vec<DimensionProperties>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RowData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<CellData>>,
}

/// One cell as the server knows it. The value the user typed and the value
/// the server computed from it are separate fields; the client never writes
/// the computed side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CellData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_entered_value: Option<ExtendedValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_value: Option<ExtendedValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_entered_format: Option<CellFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_format: Option<CellFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hyperlink: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_validation: Option<DataValidationRule>,
}

/// A cell value with its type tag. Externally tagged, so it serializes as
/// `{"numberValue": 3.5}`, `{"formulaValue": "=A1"}`, etc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExtendedValue {
    #[serde(rename = "numberValue")]
    Number(f64),
    #[serde(rename = "stringValue")]
    String(String),
    #[serde(rename = "boolValue")]
    Bool(bool),
    #[serde(rename = "formulaValue")]
    Formula(String),
    #[serde(rename = "errorValue")]
    Error(ErrorValue),
}

impl ExtendedValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExtendedValue::String(s) | ExtendedValue::Formula(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ExtendedValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ExtendedValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// A formula evaluation error (`#REF!`, `#DIV/0!`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorValue {
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============================================================================
// Cell formatting
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CellFormat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_format: Option<NumberFormat>,
    /// Legacy flat color. Mutually exclusive with `background_color_style`
    /// on the wire; the style wins if both are sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color_style: Option<ColorStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub borders: Option<Borders>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding: Option<Padding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizontal_alignment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_alignment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrap_strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_format: Option<TextFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_rotation: Option<TextRotation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hyperlink_display_type: Option<String>,
}

impl CellFormat {
    pub fn is_empty(&self) -> bool {
        self == &CellFormat::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NumberFormat {
    /// Format category: `NUMBER`, `PERCENT`, `CURRENCY`, `DATE`, ...
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// RGBA color with float channels in `[0, 1]`; omitted channels are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Color {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub red: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub green: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blue: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f32>,
}

impl Color {
    pub fn rgb(red: f32, green: f32, blue: f32) -> Self {
        Color {
            red: Some(red),
            green: Some(green),
            blue: Some(blue),
            alpha: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColorStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rgb_color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Borders {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<Border>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<Border>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<Border>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<Border>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Border {
    /// Line style: `SOLID`, `DASHED`, `DOTTED`, `DOUBLE`, ...
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_style: Option<ColorStyle>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Padding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextFormat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreground_color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreground_color_style: Option<ColorStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strikethrough: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Link {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextRotation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical: Option<bool>,
}

// ============================================================================
// Ranges, coordinates, dimensions
// ============================================================================

/// Half-open rectangle on a sheet. Indexes are zero-based; `None` means
/// unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_row_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_row_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_column_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_column_index: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridCoordinate {
    pub sheet_id: i32,
    pub row_index: u32,
    pub column_index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Dimension {
    Rows,
    Columns,
}

/// Half-open run of whole rows or columns, zero-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionRange {
    pub sheet_id: i32,
    pub dimension: Dimension,
    pub start_index: u32,
    pub end_index: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DimensionProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixel_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden_by_user: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden_by_filter: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Selects cells for a bulk fetch: either an A1 range string or a
/// rectangle of indexes. Externally tagged (`{"a1Range": ...}` /
/// `{"gridRange": {...}}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataFilter {
    A1Range(String),
    GridRange(GridRange),
}

// ============================================================================
// Change descriptors (batchUpdate vocabulary)
// ============================================================================

/// One change descriptor. Externally tagged, so each serializes under its
/// operation name: `{"addSheet": {...}}`, `{"updateCells": {...}}`, ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Request {
    UpdateSpreadsheetProperties(UpdateSpreadsheetPropertiesRequest),
    UpdateSheetProperties(UpdateSheetPropertiesRequest),
    AddSheet(AddSheetRequest),
    DeleteSheet(DeleteSheetRequest),
    DuplicateSheet(DuplicateSheetRequest),
    UpdateCells(UpdateCellsRequest),
    InsertDimension(InsertDimensionRequest),
    DeleteDimension(DeleteDimensionRequest),
    MoveDimension(MoveDimensionRequest),
    InsertRange(InsertRangeRequest),
    DeleteRange(DeleteRangeRequest),
    MergeCells(MergeCellsRequest),
    UnmergeCells(UnmergeCellsRequest),
    UpdateBorders(UpdateBordersRequest),
    UpdateDimensionProperties(UpdateDimensionPropertiesRequest),
    SetDataValidation(SetDataValidationRequest),
    AddConditionalFormatRule(AddConditionalFormatRuleRequest),
    AddProtectedRange(AddProtectedRangeRequest),
    AddBanding(AddBandingRequest),
    AddNamedRange(AddNamedRangeRequest),
    SetBasicFilter(SetBasicFilterRequest),
    ClearBasicFilter(ClearBasicFilterRequest),
    SortRange(SortRangeRequest),
    CopyPaste(CopyPasteRequest),
    CutPaste(CutPasteRequest),
    AutoFill(AutoFillRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSpreadsheetPropertiesRequest {
    pub properties: SpreadsheetProperties,
    /// Field mask naming exactly the properties to overwrite.
    pub fields: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSheetPropertiesRequest {
    pub properties: SheetProperties,
    pub fields: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddSheetRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<SheetProperties>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSheetRequest {
    pub sheet_id: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DuplicateSheetRequest {
    pub source_sheet_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_sheet_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_sheet_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_sheet_name: Option<String>,
}

/// Write full cell payloads. One sub-request per cell when the cells touch
/// different field sets, so one cell's mask never clobbers another's
/// untouched fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateCellsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<GridCoordinate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<GridRange>,
    pub rows: Vec<RowData>,
    pub fields: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertDimensionRequest {
    pub range: DimensionRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherit_from_before: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteDimensionRequest {
    pub range: DimensionRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveDimensionRequest {
    pub source: DimensionRange,
    pub destination_index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertRangeRequest {
    pub range: GridRange,
    pub shift_dimension: Dimension,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRangeRequest {
    pub range: GridRange,
    pub shift_dimension: Dimension,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeType {
    MergeAll,
    MergeColumns,
    MergeRows,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeCellsRequest {
    pub range: GridRange,
    pub merge_type: MergeType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmergeCellsRequest {
    pub range: GridRange,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateBordersRequest {
    pub range: GridRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<Border>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<Border>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<Border>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<Border>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_horizontal: Option<Border>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_vertical: Option<Border>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDimensionPropertiesRequest {
    pub range: DimensionRange,
    pub properties: DimensionProperties,
    pub fields: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BooleanCondition {
    /// Condition type: `NUMBER_GREATER`, `ONE_OF_LIST`, `CUSTOM_FORMULA`, ...
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<ConditionValue>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConditionValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_entered_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataValidationRule {
    pub condition: BooleanCondition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_custom_ui: Option<bool>,
}

/// Setting `rule: None` clears validation from the range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetDataValidationRequest {
    pub range: GridRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<DataValidationRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConditionalFormatRule {
    pub ranges: Vec<GridRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boolean_rule: Option<BooleanRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradient_rule: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BooleanRule {
    pub condition: BooleanCondition,
    pub format: CellFormat,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddConditionalFormatRuleRequest {
    pub rule: ConditionalFormatRule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProtectedRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protected_range_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<GridRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning_only: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddProtectedRangeRequest {
    pub protected_range: ProtectedRange,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BandingProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_band_color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_band_color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer_color: Option<Color>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BandedRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banded_range_id: Option<i32>,
    pub range: GridRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_properties: Option<BandingProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_properties: Option<BandingProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddBandingRequest {
    pub banded_range: BandedRange,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NamedRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub named_range_id: Option<String>,
    pub name: String,
    pub range: GridRange,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddNamedRangeRequest {
    pub named_range: NamedRange,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BasicFilter {
    pub range: GridRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_specs: Option<Vec<SortSpec>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criteria: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetBasicFilterRequest {
    pub filter: BasicFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearBasicFilterRequest {
    pub sheet_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SortSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortRangeRequest {
    pub range: GridRange,
    pub sort_specs: Vec<SortSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PasteType {
    PasteNormal,
    PasteValues,
    PasteFormat,
    PasteNoBorders,
    PasteFormula,
    PasteDataValidation,
    PasteConditionalFormatting,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CopyPasteRequest {
    pub source: GridRange,
    pub destination: GridRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paste_type: Option<PasteType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paste_orientation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CutPasteRequest {
    pub source: GridRange,
    pub destination: GridCoordinate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paste_type: Option<PasteType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoFillRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<GridRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_and_destination: Option<SourceAndDestination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_alternate_series: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAndDestination {
    pub source: GridRange,
    pub dimension: Dimension,
    pub fill_length: i32,
}

// ============================================================================
// Batch update envelope
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchUpdateRequest {
    pub requests: Vec<Request>,
    pub include_spreadsheet_in_response: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub response_ranges: Vec<String>,
    pub response_include_grid_data: bool,
}

/// Echoed results, one per change descriptor. Most operations reply with an
/// empty object; the `add*`/`duplicate*` family echoes what was created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Reply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_sheet: Option<AddSheetReply>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_sheet: Option<DuplicateSheetReply>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_named_range: Option<AddNamedRangeReply>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_protected_range: Option<AddProtectedRangeReply>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_banding: Option<AddBandingReply>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddSheetReply {
    pub properties: SheetProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DuplicateSheetReply {
    pub properties: SheetProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddNamedRangeReply {
    pub named_range: NamedRange,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddProtectedRangeReply {
    pub protected_range: ProtectedRange,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddBandingReply {
    pub banded_range: BandedRange,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchUpdateResponse {
    pub spreadsheet_id: String,
    pub replies: Vec<Reply>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_spreadsheet: Option<SpreadsheetPayload>,
}

// ============================================================================
// Value-range endpoints
// ============================================================================

/// How written strings are interpreted: `RAW` stores them verbatim,
/// `USER_ENTERED` parses them as if typed into the grid (so `"$5"` becomes
/// a currency-formatted number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueInputOption {
    Raw,
    UserEntered,
}

impl ValueInputOption {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueInputOption::Raw => "RAW",
            ValueInputOption::UserEntered => "USER_ENTERED",
        }
    }
}

/// Whether appended rows push existing data down or overwrite blank rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsertDataOption {
    Overwrite,
    InsertRows,
}

impl InsertDataOption {
    pub fn as_str(self) -> &'static str {
        match self {
            InsertDataOption::Overwrite => "OVERWRITE",
            InsertDataOption::InsertRows => "INSERT_ROWS",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValueRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub major_dimension: Option<Dimension>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchGetValuesResponse {
    pub spreadsheet_id: String,
    pub value_ranges: Vec<ValueRange>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateValuesResponse {
    pub spreadsheet_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_rows: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_columns: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_cells: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppendValuesResponse {
    pub spreadsheet_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updates: Option<UpdateValuesResponse>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClearValuesResponse {
    pub spreadsheet_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleared_range: Option<String>,
}

// ============================================================================
// Export and permissions (pass-through surfaces)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Tsv,
    Pdf,
    Xlsx,
    Ods,
    Html,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Tsv => "tsv",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Ods => "ods",
            ExportFormat::Html => "html",
        }
    }

    /// CSV and TSV export exactly one sheet; the rest export the document.
    pub fn is_single_sheet(self) -> bool {
        matches!(self, ExportFormat::Csv | ExportFormat::Tsv)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Permission {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Grantee type: `user`, `group`, `domain`, `anyone`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Access role: `owner`, `writer`, `commenter`, `reader`.
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PermissionList {
    pub permissions: Vec<Permission>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn extended_value_wire_shape() {
        let v = serde_json::to_value(ExtendedValue::Number(3.5)).unwrap();
        assert_eq!(v, json!({ "numberValue": 3.5 }));

        let v = serde_json::to_value(ExtendedValue::Formula("=A1".into())).unwrap();
        assert_eq!(v, json!({ "formulaValue": "=A1" }));

        let parsed: ExtendedValue = serde_json::from_value(json!({ "boolValue": true })).unwrap();
        assert_eq!(parsed, ExtendedValue::Bool(true));

        let parsed: ExtendedValue =
            serde_json::from_value(json!({ "errorValue": { "type": "REF", "message": "bad ref" } }))
                .unwrap();
        assert_eq!(
            parsed,
            ExtendedValue::Error(ErrorValue {
                error_type: "REF".into(),
                message: Some("bad ref".into()),
            })
        );
    }

    #[test]
    fn request_wire_shape_is_operation_keyed() {
        let req = Request::DeleteSheet(DeleteSheetRequest { sheet_id: 7 });
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({ "deleteSheet": { "sheetId": 7 } })
        );

        let req = Request::InsertDimension(InsertDimensionRequest {
            range: DimensionRange {
                sheet_id: 0,
                dimension: Dimension::Rows,
                start_index: 2,
                end_index: 4,
            },
            inherit_from_before: None,
        });
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "insertDimension": {
                    "range": {
                        "sheetId": 0,
                        "dimension": "ROWS",
                        "startIndex": 2,
                        "endIndex": 4,
                    }
                }
            })
        );
    }

    #[test]
    fn data_filter_wire_shape() {
        let f = DataFilter::A1Range("'Sheet1'!A1:B2".into());
        assert_eq!(
            serde_json::to_value(&f).unwrap(),
            json!({ "a1Range": "'Sheet1'!A1:B2" })
        );

        let f = DataFilter::GridRange(GridRange {
            sheet_id: Some(3),
            start_row_index: Some(0),
            end_row_index: Some(5),
            ..Default::default()
        });
        assert_eq!(
            serde_json::to_value(&f).unwrap(),
            json!({ "gridRange": { "sheetId": 3, "startRowIndex": 0, "endRowIndex": 5 } })
        );
    }

    #[test]
    fn spreadsheet_properties_keep_unknown_fields() {
        let payload = json!({
            "title": "Budget",
            "locale": "en_US",
            "timeZone": "America/New_York",
            "defaultColumnWidth": 100,
        });
        let props: SpreadsheetProperties = serde_json::from_value(payload.clone()).unwrap();
        assert_eq!(props.title.as_deref(), Some("Budget"));
        assert_eq!(props.extra.get("defaultColumnWidth"), Some(&json!(100)));
        // Round trip does not shed the unknown field.
        assert_eq!(serde_json::to_value(&props).unwrap(), payload);
    }

    #[test]
    fn cell_data_round_trip() {
        let payload = json!({
            "userEnteredValue": { "formulaValue": "=SUM(A1:A3)" },
            "effectiveValue": { "numberValue": 6.0 },
            "formattedValue": "6",
            "note": "checked",
        });
        let cell: CellData = serde_json::from_value(payload.clone()).unwrap();
        assert_eq!(
            cell.user_entered_value,
            Some(ExtendedValue::Formula("=SUM(A1:A3)".into()))
        );
        assert_eq!(cell.effective_value, Some(ExtendedValue::Number(6.0)));
        assert_eq!(serde_json::to_value(&cell).unwrap(), payload);
    }

    #[test]
    fn batch_update_request_skips_empty_response_ranges() {
        let body = BatchUpdateRequest {
            requests: vec![],
            include_spreadsheet_in_response: true,
            response_ranges: vec![],
            response_include_grid_data: false,
        };
        let v = serde_json::to_value(&body).unwrap();
        assert!(v.get("responseRanges").is_none());
    }
}
