//! Cell entity: last-known server state plus an uncommitted draft overlay.
//!
//! The two sides are kept disjoint. Reads serve server state only — reading
//! a value (or a format field) that has a pending draft is an error, which
//! forces the caller to save or discard before acting on data the server
//! has not validated. The draft is merged away only inside the success path
//! of a save.

use std::sync::{Arc, Mutex};

use gridhub_api::types::{
    Borders, CellData, CellFormat, Color, ColorStyle, ErrorValue, ExtendedValue, GridCoordinate,
    NumberFormat, Padding, Request, RowData, TextFormat, TextRotation, UpdateCellsRequest,
};

use crate::a1;
use crate::error::{Error, Result};
use crate::lock;
use crate::worksheet::Worksheet;

/// A value being written into a cell, before classification.
///
/// The type tag is derived from the input: booleans stay booleans, strings
/// beginning with `=` become formulas, other strings stay strings, finite
/// numbers stay numbers, and [`CellInput::Empty`] (or a `None`) writes an
/// empty string, clearing the cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellInput {
    Bool(bool),
    Number(f64),
    Text(String),
    Empty,
}

impl CellInput {
    /// Classify into a typed wire value. Non-finite numbers are rejected —
    /// the grid has no representation for them.
    fn into_extended(self) -> Result<ExtendedValue> {
        match self {
            CellInput::Bool(b) => Ok(ExtendedValue::Bool(b)),
            CellInput::Number(n) if n.is_finite() => Ok(ExtendedValue::Number(n)),
            CellInput::Number(n) => Err(Error::InvalidValue(format!("non-finite number {n}"))),
            CellInput::Text(s) if s.starts_with('=') => Ok(ExtendedValue::Formula(s)),
            CellInput::Text(s) => Ok(ExtendedValue::String(s)),
            CellInput::Empty => Ok(ExtendedValue::String(String::new())),
        }
    }
}

impl From<bool> for CellInput {
    fn from(b: bool) -> Self {
        CellInput::Bool(b)
    }
}

impl From<f64> for CellInput {
    fn from(n: f64) -> Self {
        CellInput::Number(n)
    }
}

impl From<f32> for CellInput {
    fn from(n: f32) -> Self {
        CellInput::Number(n as f64)
    }
}

impl From<i32> for CellInput {
    fn from(n: i32) -> Self {
        CellInput::Number(n as f64)
    }
}

impl From<i64> for CellInput {
    fn from(n: i64) -> Self {
        CellInput::Number(n as f64)
    }
}

impl From<u32> for CellInput {
    fn from(n: u32) -> Self {
        CellInput::Number(n as f64)
    }
}

impl From<&str> for CellInput {
    fn from(s: &str) -> Self {
        CellInput::Text(s.to_string())
    }
}

impl From<String> for CellInput {
    fn from(s: String) -> Self {
        CellInput::Text(s)
    }
}

impl<T: Into<CellInput>> From<Option<T>> for CellInput {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => CellInput::Empty,
        }
    }
}

/// Pending local edits, disjoint from server state.
///
/// `note: Some("")` is an explicit clear; `note: None` means no change —
/// the two must never be conflated.
#[derive(Debug, Clone, Default)]
pub(crate) struct CellDraft {
    pub(crate) value: Option<ExtendedValue>,
    pub(crate) note: Option<String>,
    /// Per-field format overrides; only the `Some` fields are pending.
    pub(crate) format: Option<CellFormat>,
    /// Wipe the cell's format to empty on save.
    pub(crate) clear_format: bool,
}

impl CellDraft {
    fn is_empty(&self) -> bool {
        self.value.is_none() && self.note.is_none() && self.format.is_none() && !self.clear_format
    }
}

/// Shared per-cell slot in the worksheet's arena. Coordinates are mutated in
/// place by structural shifts so that handles observe them.
pub(crate) struct CellState {
    pub(crate) row: u32,
    pub(crate) col: u32,
    pub(crate) deleted: bool,
    pub(crate) data: CellData,
    pub(crate) draft: CellDraft,
}

impl CellState {
    pub(crate) fn new(row: u32, col: u32, data: CellData) -> Self {
        Self {
            row,
            col,
            deleted: false,
            data,
            draft: CellDraft::default(),
        }
    }

    pub(crate) fn a1(&self) -> String {
        a1::to_a1(self.row, self.col)
    }

    /// Replace server state with a fresh authoritative payload. Any draft is
    /// dropped: this runs either on a reload (the caller asked for server
    /// truth) or on the success path of a save (the draft was accepted).
    pub(crate) fn absorb(&mut self, data: CellData) {
        self.data = data;
        self.draft = CellDraft::default();
    }

    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.deleted {
            Err(Error::CellDeleted(self.a1()))
        } else {
            Ok(())
        }
    }

    pub(crate) fn is_dirty(&self) -> bool {
        !self.deleted && !self.draft.is_empty()
    }

    /// Build the minimal single-cell update, or `None` when clean. Only the
    /// touched field groups appear in the mask, so untouched server fields
    /// survive the write.
    pub(crate) fn update_request(&self, sheet_id: i32) -> Option<Request> {
        if !self.is_dirty() {
            return None;
        }

        let mut cell = CellData::default();
        let mut fields = Vec::new();

        if let Some(value) = &self.draft.value {
            cell.user_entered_value = Some(value.clone());
            fields.push("userEnteredValue");
        }
        if let Some(note) = &self.draft.note {
            cell.note = Some(note.clone());
            fields.push("note");
        }
        if self.draft.clear_format {
            // Clear first, then whatever was set after the clear.
            cell.user_entered_format = Some(self.draft.format.clone().unwrap_or_default());
            fields.push("userEnteredFormat");
        } else if let Some(patch) = &self.draft.format {
            cell.user_entered_format =
                Some(merge_format(self.data.user_entered_format.as_ref(), patch));
            fields.push("userEnteredFormat");
        }

        Some(Request::UpdateCells(UpdateCellsRequest {
            start: Some(GridCoordinate {
                sheet_id,
                row_index: self.row,
                column_index: self.col,
            }),
            range: None,
            rows: vec![RowData {
                values: Some(vec![cell]),
            }],
            fields: fields.join(","),
        }))
    }
}

/// Overlay a draft patch on the last-known server format.
///
/// `backgroundColor` and `backgroundColorStyle` are mutually exclusive on
/// the wire (the style wins when both are present), so setting one drops
/// the other from the merged result.
fn merge_format(base: Option<&CellFormat>, patch: &CellFormat) -> CellFormat {
    let mut merged = base.cloned().unwrap_or_default();

    if patch.number_format.is_some() {
        merged.number_format = patch.number_format.clone();
    }
    if patch.background_color.is_some() {
        merged.background_color = patch.background_color;
        merged.background_color_style = None;
    }
    if patch.background_color_style.is_some() {
        merged.background_color_style = patch.background_color_style.clone();
        merged.background_color = None;
    }
    if patch.borders.is_some() {
        merged.borders = patch.borders.clone();
    }
    if patch.padding.is_some() {
        merged.padding = patch.padding;
    }
    if patch.horizontal_alignment.is_some() {
        merged.horizontal_alignment = patch.horizontal_alignment.clone();
    }
    if patch.vertical_alignment.is_some() {
        merged.vertical_alignment = patch.vertical_alignment.clone();
    }
    if patch.wrap_strategy.is_some() {
        merged.wrap_strategy = patch.wrap_strategy.clone();
    }
    if patch.text_direction.is_some() {
        merged.text_direction = patch.text_direction.clone();
    }
    if patch.text_format.is_some() {
        merged.text_format = patch.text_format.clone();
    }
    if patch.text_rotation.is_some() {
        merged.text_rotation = patch.text_rotation;
    }
    if patch.hyperlink_display_type.is_some() {
        merged.hyperlink_display_type = patch.hyperlink_display_type.clone();
    }

    merged
}

/// Handle to one cell of a [`Worksheet`].
///
/// Cheap to clone; clones share the same slot, so a structural shift or a
/// reload observed through one handle is visible through all of them.
#[derive(Clone)]
pub struct Cell {
    pub(crate) sheet: Worksheet,
    pub(crate) state: Arc<Mutex<CellState>>,
}

impl Cell {
    /// Current 0-based row index. Shifts when rows above are deleted.
    pub fn row(&self) -> u32 {
        lock(&self.state).row
    }

    /// Current 0-based column index.
    pub fn column(&self) -> u32 {
        lock(&self.state).col
    }

    pub fn a1(&self) -> String {
        lock(&self.state).a1()
    }

    /// Whether a structural delete removed this cell's row or column.
    pub fn is_deleted(&self) -> bool {
        lock(&self.state).deleted
    }

    // ========================================================================
    // Server-state reads
    // ========================================================================

    /// The server-computed value of the cell.
    ///
    /// Errors while an unsaved value draft exists: the effective value on
    /// the server no longer corresponds to what this client intends.
    pub fn value(&self) -> Result<Option<ExtendedValue>> {
        let state = lock(&self.state);
        if state.draft.value.is_some() {
            return Err(Error::UnsavedValue(state.a1()));
        }
        Ok(state.data.effective_value.clone())
    }

    /// The value as the server rendered it for display.
    pub fn formatted_value(&self) -> Option<String> {
        lock(&self.state).data.formatted_value.clone()
    }

    /// The formula text, if the cell's input is a formula.
    pub fn formula(&self) -> Option<String> {
        match &lock(&self.state).data.user_entered_value {
            Some(ExtendedValue::Formula(f)) => Some(f.clone()),
            _ => None,
        }
    }

    /// The evaluation error, if the server reported one.
    pub fn formula_error(&self) -> Option<ErrorValue> {
        match &lock(&self.state).data.effective_value {
            Some(ExtendedValue::Error(e)) => Some(e.clone()),
            _ => None,
        }
    }

    pub fn note(&self) -> Option<String> {
        lock(&self.state).data.note.clone()
    }

    pub fn hyperlink(&self) -> Option<String> {
        lock(&self.state).data.hyperlink.clone()
    }

    /// The full effective format (server-merged with defaults), for display.
    pub fn effective_format(&self) -> Option<CellFormat> {
        lock(&self.state).data.effective_format.clone()
    }

    // ========================================================================
    // Format reads (each refuses while that field has a pending override)
    // ========================================================================

    pub fn number_format(&self) -> Result<Option<NumberFormat>> {
        self.format_field("numberFormat", |p| p.number_format.is_some(), |f| {
            f.number_format.clone()
        })
    }

    pub fn background_color(&self) -> Result<Option<Color>> {
        self.format_field("backgroundColor", |p| p.background_color.is_some(), |f| {
            f.background_color
        })
    }

    pub fn background_color_style(&self) -> Result<Option<ColorStyle>> {
        self.format_field(
            "backgroundColorStyle",
            |p| p.background_color_style.is_some(),
            |f| f.background_color_style.clone(),
        )
    }

    pub fn borders(&self) -> Result<Option<Borders>> {
        self.format_field("borders", |p| p.borders.is_some(), |f| f.borders.clone())
    }

    pub fn padding(&self) -> Result<Option<Padding>> {
        self.format_field("padding", |p| p.padding.is_some(), |f| f.padding)
    }

    pub fn horizontal_alignment(&self) -> Result<Option<String>> {
        self.format_field(
            "horizontalAlignment",
            |p| p.horizontal_alignment.is_some(),
            |f| f.horizontal_alignment.clone(),
        )
    }

    pub fn vertical_alignment(&self) -> Result<Option<String>> {
        self.format_field(
            "verticalAlignment",
            |p| p.vertical_alignment.is_some(),
            |f| f.vertical_alignment.clone(),
        )
    }

    pub fn wrap_strategy(&self) -> Result<Option<String>> {
        self.format_field("wrapStrategy", |p| p.wrap_strategy.is_some(), |f| {
            f.wrap_strategy.clone()
        })
    }

    pub fn text_direction(&self) -> Result<Option<String>> {
        self.format_field("textDirection", |p| p.text_direction.is_some(), |f| {
            f.text_direction.clone()
        })
    }

    pub fn text_format(&self) -> Result<Option<TextFormat>> {
        self.format_field("textFormat", |p| p.text_format.is_some(), |f| {
            f.text_format.clone()
        })
    }

    pub fn text_rotation(&self) -> Result<Option<TextRotation>> {
        self.format_field("textRotation", |p| p.text_rotation.is_some(), |f| {
            f.text_rotation
        })
    }

    // ========================================================================
    // Draft writes
    // ========================================================================

    /// Stage a new input for the cell. The computed value stays whatever the
    /// server last reported until the draft is saved and echoed back.
    pub fn set_value(&self, value: impl Into<CellInput>) -> Result<()> {
        // Classify before touching the draft, so a bad input changes nothing.
        let pending = value.into().into_extended()?;
        let mut state = lock(&self.state);
        state.ensure_live()?;
        state.draft.value = Some(pending);
        Ok(())
    }

    /// Stage a formula. Must start with `=`.
    pub fn set_formula(&self, formula: &str) -> Result<()> {
        if !formula.starts_with('=') {
            return Err(Error::InvalidFormula(formula.to_string()));
        }
        self.set_value(formula)
    }

    /// Stage a note. An empty string clears the note on save.
    pub fn set_note(&self, note: impl Into<String>) -> Result<()> {
        let mut state = lock(&self.state);
        state.ensure_live()?;
        state.draft.note = Some(note.into());
        Ok(())
    }

    pub fn set_number_format(&self, format: NumberFormat) -> Result<()> {
        self.set_format_field(|f| f.number_format = Some(format))
    }

    pub fn set_background_color(&self, color: Color) -> Result<()> {
        self.set_format_field(|f| f.background_color = Some(color))
    }

    pub fn set_background_color_style(&self, style: ColorStyle) -> Result<()> {
        self.set_format_field(|f| f.background_color_style = Some(style))
    }

    pub fn set_borders(&self, borders: Borders) -> Result<()> {
        self.set_format_field(|f| f.borders = Some(borders))
    }

    pub fn set_padding(&self, padding: Padding) -> Result<()> {
        self.set_format_field(|f| f.padding = Some(padding))
    }

    pub fn set_horizontal_alignment(&self, alignment: impl Into<String>) -> Result<()> {
        self.set_format_field(|f| f.horizontal_alignment = Some(alignment.into()))
    }

    pub fn set_vertical_alignment(&self, alignment: impl Into<String>) -> Result<()> {
        self.set_format_field(|f| f.vertical_alignment = Some(alignment.into()))
    }

    pub fn set_wrap_strategy(&self, strategy: impl Into<String>) -> Result<()> {
        self.set_format_field(|f| f.wrap_strategy = Some(strategy.into()))
    }

    pub fn set_text_direction(&self, direction: impl Into<String>) -> Result<()> {
        self.set_format_field(|f| f.text_direction = Some(direction.into()))
    }

    pub fn set_text_format(&self, format: TextFormat) -> Result<()> {
        self.set_format_field(|f| f.text_format = Some(format))
    }

    pub fn set_text_rotation(&self, rotation: TextRotation) -> Result<()> {
        self.set_format_field(|f| f.text_rotation = Some(rotation))
    }

    /// Stage a wipe of the cell's entire format. Discards any pending
    /// per-field overrides; overrides staged *after* the clear compose with
    /// it ("clear, then apply these").
    pub fn clear_all_formatting(&self) -> Result<()> {
        let mut state = lock(&self.state);
        state.ensure_live()?;
        state.draft.format = None;
        state.draft.clear_format = true;
        Ok(())
    }

    // ========================================================================
    // Draft lifecycle
    // ========================================================================

    pub fn is_dirty(&self) -> bool {
        lock(&self.state).is_dirty()
    }

    /// Drop all pending edits without any network call.
    pub fn discard_unsaved_changes(&self) {
        lock(&self.state).draft = CellDraft::default();
    }

    /// Save exactly this cell through the worksheet's batch machinery.
    pub async fn save(&self) -> Result<()> {
        self.sheet.save_cells(std::slice::from_ref(self)).await
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn format_field<T>(
        &self,
        field: &'static str,
        has_draft: impl Fn(&CellFormat) -> bool,
        get: impl Fn(&CellFormat) -> Option<T>,
    ) -> Result<Option<T>> {
        let state = lock(&self.state);
        let overridden = state.draft.clear_format
            || state.draft.format.as_ref().is_some_and(|p| has_draft(p));
        if overridden {
            return Err(Error::UnsavedFormat {
                cell: state.a1(),
                field,
            });
        }
        Ok(state.data.user_entered_format.as_ref().and_then(get))
    }

    fn set_format_field(&self, set: impl FnOnce(&mut CellFormat)) -> Result<()> {
        let mut state = lock(&self.state);
        state.ensure_live()?;
        set(state.draft.format.get_or_insert_with(CellFormat::default));
        Ok(())
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("Cell")
            .field("a1", &state.a1())
            .field("dirty", &state.is_dirty())
            .field("deleted", &state.deleted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn classify(input: impl Into<CellInput>) -> Result<ExtendedValue> {
        input.into().into_extended()
    }

    #[test]
    fn input_classification() {
        assert_eq!(classify(true).unwrap(), ExtendedValue::Bool(true));
        assert_eq!(classify(3.14).unwrap(), ExtendedValue::Number(3.14));
        assert_eq!(classify(7i32).unwrap(), ExtendedValue::Number(7.0));
        assert_eq!(
            classify("=A1").unwrap(),
            ExtendedValue::Formula("=A1".into())
        );
        assert_eq!(
            classify("text").unwrap(),
            ExtendedValue::String("text".into())
        );
        assert_eq!(
            classify(None::<&str>).unwrap(),
            ExtendedValue::String(String::new())
        );
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        assert!(matches!(classify(f64::NAN), Err(Error::InvalidValue(_))));
        assert!(matches!(
            classify(f64::INFINITY),
            Err(Error::InvalidValue(_))
        ));
    }

    fn loaded_state() -> CellState {
        CellState::new(
            1,
            2,
            CellData {
                effective_value: Some(ExtendedValue::Number(5.0)),
                formatted_value: Some("5".into()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn fresh_cell_is_clean() {
        let state = loaded_state();
        assert!(!state.is_dirty());
        assert!(state.update_request(0).is_none());
    }

    #[test]
    fn drafts_mark_dirty_and_absorb_clears_them() {
        let mut state = loaded_state();
        state.draft.value = Some(ExtendedValue::Number(9.0));
        assert!(state.is_dirty());

        state.absorb(CellData {
            effective_value: Some(ExtendedValue::Number(9.0)),
            ..Default::default()
        });
        assert!(!state.is_dirty());
        assert_eq!(state.data.effective_value, Some(ExtendedValue::Number(9.0)));
    }

    #[test]
    fn empty_note_draft_is_still_a_change() {
        let mut state = loaded_state();
        state.draft.note = Some(String::new());
        assert!(state.is_dirty());

        let req = state.update_request(4).expect("dirty");
        match req {
            Request::UpdateCells(req) => {
                assert_eq!(req.fields, "note");
                let cell = &req.rows[0].values.as_ref().unwrap()[0];
                assert_eq!(cell.note.as_deref(), Some(""));
            }
            other => panic!("expected updateCells, got {other:?}"),
        }
    }

    #[test]
    fn update_request_lists_only_touched_groups() {
        let mut state = loaded_state();
        state.draft.value = Some(ExtendedValue::String("hi".into()));
        let req = state.update_request(0).expect("dirty");
        match req {
            Request::UpdateCells(req) => {
                assert_eq!(req.fields, "userEnteredValue");
                let start = req.start.expect("start coordinate");
                assert_eq!((start.row_index, start.column_index), (1, 2));
            }
            other => panic!("expected updateCells, got {other:?}"),
        }
    }

    #[test]
    fn clear_format_sends_an_empty_format() {
        let mut state = loaded_state();
        state.data.user_entered_format = Some(CellFormat {
            horizontal_alignment: Some("CENTER".into()),
            ..Default::default()
        });
        state.draft.clear_format = true;

        let req = state.update_request(0).expect("dirty");
        match req {
            Request::UpdateCells(req) => {
                assert_eq!(req.fields, "userEnteredFormat");
                let cell = &req.rows[0].values.as_ref().unwrap()[0];
                assert!(cell.user_entered_format.as_ref().unwrap().is_empty());
            }
            other => panic!("expected updateCells, got {other:?}"),
        }
    }

    #[test]
    fn background_color_and_style_are_mutually_exclusive() {
        let base = CellFormat {
            background_color_style: Some(ColorStyle {
                rgb_color: Some(Color::rgb(0.0, 0.0, 1.0)),
                theme_color: None,
            }),
            ..Default::default()
        };
        let patch = CellFormat {
            background_color: Some(Color::rgb(1.0, 0.0, 0.0)),
            ..Default::default()
        };
        let merged = merge_format(Some(&base), &patch);
        assert!(merged.background_color.is_some());
        assert!(merged.background_color_style.is_none());

        // And the other way around.
        let base = CellFormat {
            background_color: Some(Color::rgb(1.0, 0.0, 0.0)),
            ..Default::default()
        };
        let patch = CellFormat {
            background_color_style: Some(ColorStyle::default()),
            ..Default::default()
        };
        let merged = merge_format(Some(&base), &patch);
        assert!(merged.background_color.is_none());
        assert!(merged.background_color_style.is_some());
    }

    #[test]
    fn merge_preserves_untouched_fields() {
        let base = CellFormat {
            horizontal_alignment: Some("LEFT".into()),
            wrap_strategy: Some("WRAP".into()),
            ..Default::default()
        };
        let patch = CellFormat {
            horizontal_alignment: Some("RIGHT".into()),
            ..Default::default()
        };
        let merged = merge_format(Some(&base), &patch);
        assert_eq!(merged.horizontal_alignment.as_deref(), Some("RIGHT"));
        assert_eq!(merged.wrap_strategy.as_deref(), Some("WRAP"));
    }

    #[test]
    fn deleted_cells_refuse_edits() {
        let mut state = loaded_state();
        state.deleted = true;
        assert!(matches!(state.ensure_live(), Err(Error::CellDeleted(_))));
        assert!(!state.is_dirty());
    }
}
