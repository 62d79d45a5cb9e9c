//! Action name variants.
//!
//! Front-ends name actions in camelCase (`testConnection`) or kebab-case,
//! backends usually register snake_case handlers.

use std::sync::LazyLock;

use regex::Regex;

static UPPER_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.)([A-Z][a-z]+)").expect("static regex"));
static LOWER_UPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("static regex"));

/// `testConnection` -> `test_connection`, `getHTTPResponse` -> `get_http_response`.
pub fn camel_to_snake(name: &str) -> String {
    let first = UPPER_WORD.replace_all(name, "${1}_${2}");
    LOWER_UPPER
        .replace_all(&first, "${1}_${2}")
        .to_lowercase()
}

/// Handler names tried for an action, in lookup order: literal, snake_case
/// and hyphens replaced by underscores. Always three entries; duplicates are
/// kept so failures report every attempt.
pub fn name_variants(action: &str) -> [String; 3] {
    [
        action.to_string(),
        camel_to_snake(action),
        action.replace('-', "_"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_to_snake() {
        assert_eq!(camel_to_snake("testConnection"), "test_connection");
        assert_eq!(camel_to_snake("listTablesForBase"), "list_tables_for_base");
        assert_eq!(camel_to_snake("getHTTPResponse"), "get_http_response");
        assert_eq!(camel_to_snake("already_snake"), "already_snake");
        assert_eq!(camel_to_snake("Simple"), "simple");
    }

    #[test]
    fn test_variants() {
        assert_eq!(
            name_variants("list-tables"),
            ["list-tables".to_string(), "list-tables".to_string(), "list_tables".to_string()]
        );
        assert_eq!(name_variants("testConnection")[1], "test_connection");
    }
}
