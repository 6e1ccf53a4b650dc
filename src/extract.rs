// ABOUTME: Locates inline <script> blocks in HTML pages and decodes the JSON they assign
// ABOUTME: Distinguishes a missing script (markup change) from undecodable JSON (data change)

use log::debug;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::{Map, Value};

use crate::error::AppError;

/// Assignment prefix of the shared-data script on profile and login pages
pub const SHARED_DATA_PREFIX: &str = "window._sharedData = ";

/// Identifies the inline script that carries a page's JSON payload.
///
/// The first `<script>` inside `<body>` whose text matches the pattern is
/// selected; the JSON object starts right after the end of the match.
#[derive(Debug, Clone)]
pub struct ScriptMarker {
    pattern: Regex,
}

impl ScriptMarker {
    /// Marker for an arbitrary regular expression
    pub fn new(pattern: &str) -> Result<Self, AppError> {
        let pattern = Regex::new(pattern)
            .map_err(|e| AppError::Generic(format!("Invalid script marker pattern: {}", e)))?;
        Ok(Self { pattern })
    }

    /// Marker matching a literal prefix
    pub fn literal(prefix: &str) -> Result<Self, AppError> {
        Self::new(&regex::escape(prefix))
    }

    /// `window._sharedData = {...};` on profile and login pages
    pub fn shared_data() -> Result<Self, AppError> {
        Self::literal(SHARED_DATA_PREFIX)
    }

    /// `window.__additionalDataLoaded('/{user}/p/{shortcode}/', {...});` on post pages
    pub fn additional_data(username: &str, shortcode: &str) -> Result<Self, AppError> {
        Self::literal(&format!(
            "window.__additionalDataLoaded('/{}/p/{}/',",
            username, shortcode
        ))
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

/// Extract the JSON object embedded after `marker` in `html`.
///
/// Everything past the last `}` of the script text (typically `;` or `);`)
/// is discarded before decoding.
pub fn extract(html: &str, marker: &ScriptMarker) -> Result<Map<String, Value>, AppError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("body script")
        .map_err(|e| AppError::Generic(format!("Invalid script selector: {:?}", e)))?;

    let (text, start) = document
        .select(&selector)
        .map(|script| script.text().collect::<String>())
        .find_map(|text| {
            let start = marker.pattern.find(&text)?.end();
            Some((text, start))
        })
        .ok_or_else(|| {
            AppError::Extraction(format!("no script matching `{}` in page", marker.as_str()))
        })?;

    let payload = &text[start..];
    let end = payload.rfind('}').ok_or_else(|| {
        AppError::MalformedData(format!(
            "script matching `{}` has no JSON object",
            marker.as_str()
        ))
    })?;

    debug!(
        "Decoding {} bytes of embedded JSON after `{}`",
        end + 1,
        marker.as_str()
    );

    serde_json::from_str(&payload[..=end]).map_err(|e| {
        AppError::MalformedData(format!(
            "embedded JSON after `{}` did not decode: {}",
            marker.as_str(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(script: &str) -> String {
        format!(
            "<!DOCTYPE html><html><head><script>var head = 1;</script></head>\
             <body><script>console.log('noise');</script><script>{}</script></body></html>",
            script
        )
    }

    #[test]
    fn test_extracts_shared_data() {
        let html = page(r#"window._sharedData = {"config": {"csrf_token": "tok"}, "n": [1, 2]};"#);
        let marker = ScriptMarker::shared_data().unwrap();

        let data = extract(&html, &marker).unwrap();

        assert_eq!(
            Value::Object(data),
            json!({"config": {"csrf_token": "tok"}, "n": [1, 2]})
        );
    }

    #[test]
    fn test_keys_keep_document_order() {
        let html = page(r#"window._sharedData = {"zeta": 1, "alpha": 2, "mid": 3};"#);
        let marker = ScriptMarker::shared_data().unwrap();

        let data = extract(&html, &marker).unwrap();
        let keys: Vec<_> = data.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_truncates_after_last_brace() {
        let html = page(r#"window._sharedData = {"a": {"b": 1}};  // trailing } junk"#);
        let marker = ScriptMarker::shared_data().unwrap();

        // the last brace belongs to the comment, so the JSON no longer decodes
        let result = extract(&html, &marker);
        assert!(matches!(result, Err(AppError::MalformedData(_))));

        let html = page(r#"window._sharedData = {"a": {"b": 1}};  "#);
        let data = extract(&html, &marker).unwrap();
        assert_eq!(Value::Object(data), json!({"a": {"b": 1}}));
    }

    #[test]
    fn test_additional_data_marker() {
        let html = page(
            r#"window.__additionalDataLoaded('/someone/p/B1x/',{"graphql": {"shortcode_media": {"id": "9"}}});"#,
        );
        let marker = ScriptMarker::additional_data("someone", "B1x").unwrap();

        let data = extract(&html, &marker).unwrap();
        assert_eq!(data["graphql"]["shortcode_media"]["id"], "9");

        // a different shortcode must not match this script
        let other = ScriptMarker::additional_data("someone", "ZZZ").unwrap();
        assert!(matches!(
            extract(&html, &other),
            Err(AppError::Extraction(_))
        ));
    }

    #[test]
    fn test_missing_marker_is_extraction_error() {
        let html = page("var unrelated = {};");
        let marker = ScriptMarker::shared_data().unwrap();

        assert!(matches!(
            extract(&html, &marker),
            Err(AppError::Extraction(_))
        ));
    }

    #[test]
    fn test_script_outside_body_ignored() {
        let html = r#"<html><head><script>window._sharedData = {"a": 1};</script></head><body></body></html>"#;
        let marker = ScriptMarker::shared_data().unwrap();

        assert!(matches!(
            extract(html, &marker),
            Err(AppError::Extraction(_))
        ));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let html = page(r#"window._sharedData = {"a": nope};"#);
        let marker = ScriptMarker::shared_data().unwrap();

        assert!(matches!(
            extract(&html, &marker),
            Err(AppError::MalformedData(_))
        ));

        let html = page("window._sharedData = null;");
        assert!(matches!(
            extract(&html, &marker),
            Err(AppError::MalformedData(_))
        ));
    }
}
