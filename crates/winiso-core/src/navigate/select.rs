//! Selection policies for the two dropdowns of the form.

/// How the product edition is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EditionPolicy {
    /// First option whose value is an all-digit string. Placeholder options
    /// carry an empty value, real editions a numeric id.
    ///
    /// This leans on the remote form listing a usable edition as the first
    /// numeric option. Nothing guarantees that; it is an assumption about a
    /// page we do not control.
    #[default]
    FirstNumeric,
    /// The option with exactly this value.
    Exact(String),
}

/// True for a non-empty string of ASCII digits (a non-negative integer id).
pub fn is_edition_id(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Pick the edition option value according to `policy`.
pub fn pick_edition<'a>(values: &'a [String], policy: &EditionPolicy) -> Option<&'a str> {
    values
        .iter()
        .map(String::as_str)
        .find(|v| match policy {
            EditionPolicy::FirstNumeric => is_edition_id(v),
            EditionPolicy::Exact(wanted) => v == wanted,
        })
}

/// The `language` field of a serialized option payload such as
/// `{"id":"18441","language":"English International"}`.
/// Malformed or non-object payloads behave like `{}`.
pub fn payload_language(raw: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw).unwrap_or_default();
    value
        .get("language")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

/// Pick the language option whose payload `language` equals `language`
/// exactly (case-sensitive).
pub fn pick_language<'a>(values: &'a [String], language: &str) -> Option<&'a str> {
    values
        .iter()
        .map(String::as_str)
        .find(|raw| payload_language(raw).as_deref() == Some(language))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_numeric_skips_placeholder() {
        let values = strings(&["", "5", "6"]);
        assert_eq!(pick_edition(&values, &EditionPolicy::FirstNumeric), Some("5"));
    }

    #[test]
    fn first_numeric_rejects_signs_and_words() {
        let values = strings(&["-1", "2.0", " 3", "abc", "3069"]);
        assert_eq!(
            pick_edition(&values, &EditionPolicy::FirstNumeric),
            Some("3069")
        );
        assert_eq!(
            pick_edition(&strings(&["", "none"]), &EditionPolicy::FirstNumeric),
            None
        );
    }

    #[test]
    fn exact_edition() {
        let values = strings(&["", "5", "6"]);
        assert_eq!(
            pick_edition(&values, &EditionPolicy::Exact("6".into())),
            Some("6")
        );
        assert_eq!(pick_edition(&values, &EditionPolicy::Exact("7".into())), None);
    }

    #[test]
    fn language_matches_payload_field() {
        let values = strings(&[r#"{"language":"French"}"#, r#"{"language":"English"}"#]);
        assert_eq!(
            pick_language(&values, "English"),
            Some(r#"{"language":"English"}"#)
        );
    }

    #[test]
    fn language_match_is_case_sensitive_and_exact() {
        let values = strings(&[r#"{"language":"english"}"#, r#"{"language":"English International"}"#]);
        assert_eq!(pick_language(&values, "English"), None);
    }

    #[test]
    fn malformed_payloads_never_match() {
        let values = strings(&["", "{not json", "42", r#"["English"]"#, r#"{"id":"1"}"#]);
        assert_eq!(pick_language(&values, "English"), None);
        assert_eq!(payload_language("{not json"), None);
        assert_eq!(payload_language(""), None);
    }

    #[test]
    fn malformed_entries_are_skipped_not_fatal() {
        let values = strings(&["", "garbage", r#"{"id":"9","language":"English"}"#]);
        assert_eq!(
            pick_language(&values, "English"),
            Some(r#"{"id":"9","language":"English"}"#)
        );
    }
}
