//! Field-mask derivation for partial property updates.
//!
//! The remote API overwrites exactly the fields a mask names and leaves the
//! rest untouched, so the mask must list precisely the keys present in the
//! partial update — no more, no less.

use serde_json::{Map, Value};

/// Key whose sub-object is flattened into dotted paths instead of being
/// named bare.
const NESTED_KEY: &str = "gridProperties";

/// Build a comma-joined field mask from a partial properties object.
///
/// Nested `gridProperties.*` paths come first, then top-level keys, both in
/// map key order. The nested parent key itself never appears bare — it is
/// represented only through its children.
///
/// ```
/// use serde_json::json;
///
/// let props = json!({
///     "hidden": false,
///     "gridProperties": { "colCount": 78, "rowCount": 14 },
///     "tabColor": { "red": 1.0 },
/// });
/// let mask = gridhub::build_field_mask(props.as_object().unwrap());
/// assert_eq!(mask, "gridProperties.colCount,gridProperties.rowCount,hidden,tabColor");
/// ```
pub fn build_field_mask(props: &Map<String, Value>) -> String {
    let mut paths = Vec::new();

    if let Some(Value::Object(nested)) = props.get(NESTED_KEY) {
        for key in nested.keys() {
            paths.push(format!("{NESTED_KEY}.{key}"));
        }
    }
    for key in props.keys() {
        if key != NESTED_KEY {
            paths.push(key.clone());
        }
    }

    paths.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn mask_of(value: Value) -> String {
        build_field_mask(value.as_object().expect("object"))
    }

    #[test]
    fn nested_paths_come_first() {
        let mask = mask_of(json!({
            "hidden": false,
            "gridProperties": { "colCount": 78, "rowCount": 14 },
            "tabColor": { "red": 1.0, "green": 0.0, "blue": 0.0 },
        }));
        assert_eq!(mask, "gridProperties.colCount,gridProperties.rowCount,hidden,tabColor");
    }

    #[test]
    fn empty_input_yields_empty_mask() {
        assert_eq!(mask_of(json!({})), "");
    }

    #[test]
    fn top_level_only() {
        assert_eq!(mask_of(json!({ "title": "x", "index": 2 })), "index,title");
    }

    #[test]
    fn nested_only_never_names_the_parent_bare() {
        let mask = mask_of(json!({ "gridProperties": { "rowCount": 5 } }));
        assert_eq!(mask, "gridProperties.rowCount");
    }
}
