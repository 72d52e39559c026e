use serde_json::Value;

use crate::models::Metadata;

/// Returns true when `metadata` satisfies every filter entry.
///
/// A scalar or object filter value must equal the metadata value. An array
/// filter value matches when the metadata value equals any of its elements.
/// A filter key absent from the metadata never matches.
pub fn matches_filters(metadata: &Metadata, filters: Option<&Metadata>) -> bool {
    let Some(filters) = filters else {
        return true;
    };

    filters.iter().all(|(key, expected)| match metadata.get(key) {
        Some(actual) => value_matches(actual, expected),
        None => false,
    })
}

fn value_matches(actual: &Value, expected: &Value) -> bool {
    match expected {
        Value::Array(options) if !actual.is_array() => options.iter().any(|o| o == actual),
        _ => actual == expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(v: Value) -> Metadata {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_no_filters_matches_everything() {
        assert!(matches_filters(&Metadata::new(), None));
        assert!(matches_filters(&meta(json!({"lang": "rust"})), None));
    }

    #[test]
    fn test_empty_filter_map_matches_everything() {
        let filters = Metadata::new();
        assert!(matches_filters(&meta(json!({"a": 1})), Some(&filters)));
    }

    #[test]
    fn test_scalar_equality() {
        let doc = meta(json!({"lang": "rust", "year": 2024}));
        assert!(matches_filters(&doc, Some(&meta(json!({"lang": "rust"})))));
        assert!(matches_filters(
            &doc,
            Some(&meta(json!({"lang": "rust", "year": 2024})))
        ));
        assert!(!matches_filters(&doc, Some(&meta(json!({"lang": "go"})))));
        assert!(!matches_filters(&doc, Some(&meta(json!({"year": "2024"})))));
    }

    #[test]
    fn test_missing_key_does_not_match() {
        let doc = meta(json!({"lang": "rust"}));
        assert!(!matches_filters(&doc, Some(&meta(json!({"team": "core"})))));
    }

    #[test]
    fn test_array_filter_is_any_of() {
        let doc = meta(json!({"lang": "python"}));
        let filters = meta(json!({"lang": ["rust", "python"]}));
        assert!(matches_filters(&doc, Some(&filters)));

        let filters = meta(json!({"lang": ["rust", "go"]}));
        assert!(!matches_filters(&doc, Some(&filters)));
    }

    #[test]
    fn test_array_metadata_compared_whole() {
        let doc = meta(json!({"tags": ["a", "b"]}));
        assert!(matches_filters(&doc, Some(&meta(json!({"tags": ["a", "b"]})))));
        assert!(!matches_filters(&doc, Some(&meta(json!({"tags": ["a"]})))));
    }
}
