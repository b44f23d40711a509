//! Run flattening and link normalization (spec.md §4.3 "Run
//! flattening").

use percent_encoding::percent_decode_str;
use serde_json::Value;

const SITE_HOST: &str = "https://www.youtube.com";

/// Flattens a platform "runs" array into one string, with no
/// separator between runs: `parse_runs([{text:"a"},
/// {emoji:{shortcuts:[":x:"]}},{text:"b"}]) == "a:xb"`.
pub fn parse_runs(runs: &[Value]) -> String {
    runs.iter().map(render_run).collect()
}

fn render_run(run: &Value) -> String {
    if let Some(text) = run.get("text").and_then(Value::as_str) {
        if let Some(url) = run
            .pointer("/navigationEndpoint/commandMetadata/webCommandMetadata/url")
            .and_then(Value::as_str)
        {
            return normalize_link(url);
        }
        return text.to_string();
    }
    if let Some(emoji) = run.get("emoji") {
        if let Some(shortcut) = emoji
            .get("shortcuts")
            .and_then(Value::as_array)
            .and_then(|arr| arr.first())
            .and_then(Value::as_str)
        {
            return shortcut.to_string();
        }
        if let Some(emoji_id) = emoji.get("emojiId").and_then(Value::as_str) {
            return emoji_id.to_string();
        }
        return String::new();
    }
    // Unrecognized run shape: generic string coercion.
    run.to_string()
}

/// Normalizes a navigation-endpoint URL the way spec.md §4.3
/// describes:
/// - `/redirect...?q=X` resolves to `X` (percent-decoded).
/// - `//host/p` becomes `https://host/p`.
/// - `/p` gets the site host prepended.
/// - anything else passes through unchanged.
pub fn normalize_link(raw: &str) -> String {
    if let Some(rest) = raw.strip_prefix("/redirect") {
        if let Some(query_start) = rest.find('?') {
            let query = &rest[query_start + 1..];
            for pair in query.split('&') {
                if let Some(encoded) = pair.strip_prefix("q=") {
                    if let Ok(decoded) = percent_decode_str(encoded).decode_utf8() {
                        return decoded.into_owned();
                    }
                }
            }
        }
        return raw.to_string();
    }
    if let Some(rest) = raw.strip_prefix("//") {
        return format!("https://{}", rest);
    }
    if raw.starts_with('/') {
        return format!("{}{}", SITE_HOST, raw);
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_text_and_emoji_runs() {
        let runs = vec![
            json!({"text": "a"}),
            json!({"emoji": {"shortcuts": [":x:"]}}),
            json!({"text": "b"}),
        ];
        assert_eq!(parse_runs(&runs), "a:xb");
    }

    #[test]
    fn emoji_without_shortcuts_falls_back_to_id() {
        let runs = vec![json!({"emoji": {"emojiId": "1f600"}})];
        assert_eq!(parse_runs(&runs), "1f600");
    }

    #[test]
    fn redirect_link_resolves_query_target() {
        assert_eq!(
            normalize_link("/redirect?q=https%3A%2F%2Fa.test%2F"),
            "https://a.test/"
        );
    }

    #[test]
    fn protocol_relative_link_gets_https() {
        assert_eq!(normalize_link("//a.test/p"), "https://a.test/p");
    }

    #[test]
    fn root_relative_link_gets_site_host() {
        assert_eq!(
            normalize_link("/watch?v=x"),
            "https://www.youtube.com/watch?v=x"
        );
    }

    #[test]
    fn text_run_with_navigation_endpoint_uses_normalized_link() {
        let runs = vec![json!({
            "text": "click here",
            "navigationEndpoint": {
                "commandMetadata": {
                    "webCommandMetadata": {"url": "/watch?v=x"}
                }
            }
        })];
        assert_eq!(parse_runs(&runs), "https://www.youtube.com/watch?v=x");
    }

    #[test]
    fn text_run_falls_back_without_navigation_endpoint() {
        let runs = vec![json!({"text": "plain"})];
        assert_eq!(parse_runs(&runs), "plain");
    }
}
