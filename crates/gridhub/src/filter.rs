//! Cell-load filters.
//!
//! Callers describe what to load either as A1 text or as a rectangle of
//! indexes. Both shapes are normalized into one internal representation
//! before dispatch, and a filter that names a different sheet than the
//! worksheet it was handed to is rejected outright rather than quietly
//! applied elsewhere.

use gridhub_api::types::{DataFilter, GridRange};

use crate::a1;
use crate::error::{Error, Result};

/// Selects cells for a bulk load.
#[derive(Debug, Clone, PartialEq)]
pub enum CellFilter {
    /// A textual range, e.g. `"B2:D10"` or `"'Prices'!A1:C5"`.
    A1(String),
    /// A rectangle of 0-based half-open indexes; `None` means unbounded.
    Bounds {
        sheet_id: Option<i32>,
        start_row_index: Option<u32>,
        end_row_index: Option<u32>,
        start_column_index: Option<u32>,
        end_column_index: Option<u32>,
    },
}

impl From<&str> for CellFilter {
    fn from(range: &str) -> Self {
        CellFilter::A1(range.to_string())
    }
}

impl From<String> for CellFilter {
    fn from(range: String) -> Self {
        CellFilter::A1(range)
    }
}

impl From<GridRange> for CellFilter {
    fn from(range: GridRange) -> Self {
        CellFilter::Bounds {
            sheet_id: range.sheet_id,
            start_row_index: range.start_row_index,
            end_row_index: range.end_row_index,
            start_column_index: range.start_column_index,
            end_column_index: range.end_column_index,
        }
    }
}

impl CellFilter {
    /// Pin this filter to one worksheet: inject the sheet's identity where
    /// it is absent and reject it where it conflicts.
    pub(crate) fn scoped_to(self, sheet_id: i32, title: &str) -> Result<CellFilter> {
        match self {
            CellFilter::A1(range) => {
                let (prefix, local) = a1::split_range(&range)?;
                if let Some(found) = prefix {
                    if found != title {
                        return Err(Error::WrongSheetTitle {
                            expected: title.to_string(),
                            found,
                        });
                    }
                }
                let scoped = if local.is_empty() {
                    a1::quote_title(title)
                } else {
                    format!("{}!{}", a1::quote_title(title), local)
                };
                Ok(CellFilter::A1(scoped))
            }
            CellFilter::Bounds {
                sheet_id: found,
                start_row_index,
                end_row_index,
                start_column_index,
                end_column_index,
            } => {
                if let Some(found) = found {
                    if found != sheet_id {
                        return Err(Error::WrongSheet {
                            expected: sheet_id,
                            found,
                        });
                    }
                }
                Ok(CellFilter::Bounds {
                    sheet_id: Some(sheet_id),
                    start_row_index,
                    end_row_index,
                    start_column_index,
                    end_column_index,
                })
            }
        }
    }

    /// Lower into the wire filter used by the elevated fetch endpoint.
    pub(crate) fn into_data_filter(self) -> DataFilter {
        match self {
            CellFilter::A1(range) => DataFilter::A1Range(range),
            CellFilter::Bounds {
                sheet_id,
                start_row_index,
                end_row_index,
                start_column_index,
                end_column_index,
            } => DataFilter::GridRange(GridRange {
                sheet_id,
                start_row_index,
                end_row_index,
                start_column_index,
                end_column_index,
            }),
        }
    }

    /// Lower into a plain A1 range for the API-key fetch path, which only
    /// accepts textual ranges.
    pub(crate) fn into_a1(self) -> Result<String> {
        match self {
            CellFilter::A1(range) => Ok(range),
            CellFilter::Bounds { .. } => Err(Error::BoundsFilterReadOnly),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn a1_without_prefix_gains_the_sheet_title() {
        let f = CellFilter::from("A1:B2").scoped_to(3, "Data").unwrap();
        assert_eq!(f, CellFilter::A1("'Data'!A1:B2".into()));
    }

    #[test]
    fn a1_with_matching_prefix_is_normalized() {
        let f = CellFilter::from("Data!A1:B2").scoped_to(3, "Data").unwrap();
        assert_eq!(f, CellFilter::A1("'Data'!A1:B2".into()));
    }

    #[test]
    fn a1_with_conflicting_prefix_is_rejected() {
        let err = CellFilter::from("'Other'!A1").scoped_to(3, "Data").unwrap_err();
        assert!(matches!(err, Error::WrongSheetTitle { .. }));
    }

    #[test]
    fn bounds_gain_the_sheet_id() {
        let f = CellFilter::Bounds {
            sheet_id: None,
            start_row_index: Some(0),
            end_row_index: Some(4),
            start_column_index: None,
            end_column_index: None,
        };
        match f.scoped_to(7, "Data").unwrap() {
            CellFilter::Bounds { sheet_id, .. } => assert_eq!(sheet_id, Some(7)),
            other => panic!("expected bounds, got {other:?}"),
        }
    }

    #[test]
    fn bounds_with_conflicting_sheet_are_rejected() {
        let f = CellFilter::Bounds {
            sheet_id: Some(1),
            start_row_index: None,
            end_row_index: None,
            start_column_index: None,
            end_column_index: None,
        };
        let err = f.scoped_to(7, "Data").unwrap_err();
        assert!(matches!(err, Error::WrongSheet { expected: 7, found: 1 }));
    }

    #[test]
    fn bounds_cannot_lower_to_a1() {
        let f = CellFilter::Bounds {
            sheet_id: Some(1),
            start_row_index: None,
            end_row_index: None,
            start_column_index: None,
            end_column_index: None,
        };
        assert!(matches!(f.into_a1(), Err(Error::BoundsFilterReadOnly)));
        assert_eq!(
            CellFilter::from("'T'!A1").into_a1().unwrap(),
            "'T'!A1".to_string()
        );
    }
}
