//! Projection, badge flattening, nested-renderer merge, and record
//! assembly (spec.md §4.3 steps 2-8).

use crate::runs::parse_runs;
use chatdl_core::record::{AuthorType, Color};
use chatdl_core::time::time_to_seconds;
use serde_json::Value;
use std::collections::HashMap;

/// Glossary "Key remap table": source key -> canonical field name.
const KEY_REMAP: &[(&str, &str)] = &[
    ("timestampUsec", "timestamp"),
    ("authorExternalChannelId", "author_id"),
    ("authorName", "author"),
    ("message", "message"),
    ("timestampText", "time_text"),
    ("purchaseAmountText", "amount"),
    ("headerBackgroundColor", "header_color"),
    ("bodyBackgroundColor", "body_color"),
    ("amount", "amount"),
    ("startBackgroundColor", "body_color"),
    ("durationSec", "ticker_duration"),
    ("detailText", "message"),
    ("headerPrimaryText", "header_primary_text"),
    ("headerSubtext", "header_subtext"),
    ("sticker", "sticker"),
    ("backgroundColor", "body_color"),
];

fn remap(source_key: &str) -> Option<&'static str> {
    KEY_REMAP
        .iter()
        .find(|(src, _)| *src == source_key)
        .map(|(_, dest)| *dest)
}

/// Step 2: "If a projected value is a mapping containing `simpleText`,
/// unwrap it."
fn unwrap_simple_text(value: &Value) -> Value {
    if let Some(text) = value.get("simpleText") {
        return text.clone();
    }
    value.clone()
}

fn project_own_keys(payload: &Value) -> HashMap<String, Value> {
    let mut out = HashMap::new();
    if let Some(obj) = payload.as_object() {
        for (key, value) in obj {
            if let Some(dest) = remap(key) {
                out.insert(dest.to_string(), unwrap_simple_text(value));
            }
        }
    }
    out
}

/// Step 4: recurse into `showItemEndpoint.showLiveChatItemEndpoint.renderer`
/// if present and merge; "the outer fields win on conflict except
/// `message`" (inner/nested message wins when present).
pub fn project_payload(payload: &Value) -> HashMap<String, Value> {
    let mut merged = HashMap::new();
    if let Some(nested_wrapper) = payload.pointer("/showItemEndpoint/showLiveChatItemEndpoint/renderer")
    {
        if let Some(obj) = nested_wrapper.as_object() {
            if let Some((_, inner_payload)) = obj.iter().next() {
                merged = project_payload(inner_payload);
            }
        }
    }
    let outer = project_own_keys(payload);
    for (key, value) in outer {
        if key == "message" {
            merged.entry(key).or_insert(value);
        } else {
            merged.insert(key, value);
        }
    }
    merged
}

/// Step 3: flatten `authorBadges[*].liveChatAuthorBadgeRenderer` into
/// a comma-joined tooltip string (first-listed wins tie-break on
/// ordering) and the rank-max `author_type`.
pub fn flatten_badges(payload: &Value) -> (Option<String>, AuthorType) {
    let badges = payload
        .get("authorBadges")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut tooltips = Vec::new();
    let mut max_type = AuthorType::None;

    for badge in &badges {
        let Some(renderer) = badge.get("liveChatAuthorBadgeRenderer") else {
            continue;
        };
        if let Some(tooltip) = renderer.get("tooltip").and_then(Value::as_str) {
            tooltips.push(tooltip.to_string());
        }
        let icon_type = renderer.pointer("/icon/iconType").and_then(Value::as_str);
        let this_type = match icon_type {
            Some("VERIFIED") => AuthorType::Verified,
            Some("OWNER") => AuthorType::Owner,
            Some("MODERATOR") => AuthorType::Moderator,
            Some("MEMBER") => AuthorType::Member,
            _ => {
                // "if a badge has a tooltip but no icon type, treat it as MEMBER"
                if renderer.get("tooltip").and_then(Value::as_str).is_some() {
                    AuthorType::Member
                } else {
                    AuthorType::None
                }
            }
        };
        if this_type > max_type {
            max_type = this_type;
        }
    }

    let badges_str = if tooltips.is_empty() {
        None
    } else {
        Some(tooltips.join(", "))
    };
    (badges_str, max_type)
}

fn as_runs_or_text(value: &Value) -> Option<String> {
    if let Some(s) = value.as_str() {
        return Some(s.to_string());
    }
    if let Some(runs) = value.get("runs").and_then(Value::as_array) {
        return Some(parse_runs(runs));
    }
    if let Some(s) = value.get("simpleText").and_then(Value::as_str) {
        return Some(s.to_string());
    }
    None
}

fn sticker_label(sticker: &Value) -> String {
    sticker
        .pointer("/accessibility/accessibilityData/label")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

/// Step 5: choose the message source field by renderer class.
pub fn render_message(projected: &HashMap<String, Value>) -> String {
    if let Some(primary) = projected.get("header_primary_text").and_then(as_runs_or_text) {
        let mut out = primary;
        if let Some(sub) = projected.get("header_subtext").and_then(as_runs_or_text) {
            out.push_str(&format!(" ({})", sub));
        }
        if let Some(msg) = projected.get("message").and_then(as_runs_or_text) {
            out.push_str(": ");
            out.push_str(&msg);
        }
        return out;
    }
    if let Some(subtext) = projected.get("header_subtext").and_then(as_runs_or_text) {
        return subtext;
    }
    if let Some(sticker) = projected.get("sticker") {
        let mut out = format!("<<{}>>", sticker_label(sticker));
        if let Some(msg) = projected.get("message").and_then(as_runs_or_text) {
            out.push_str(": ");
            out.push_str(&msg);
        }
        return out;
    }
    if projected.get("amount").is_some() && projected.get("message").is_none() {
        return "<<no message>>".to_string();
    }
    projected
        .get("message")
        .and_then(as_runs_or_text)
        .unwrap_or_default()
}

pub fn parse_timestamp_usec(value: &Value) -> Option<i64> {
    if let Some(s) = value.as_str() {
        s.parse().ok()
    } else {
        value.as_i64()
    }
}

pub fn parse_int_field(value: &Value) -> Option<i64> {
    if let Some(s) = value.as_str() {
        s.parse().ok()
    } else {
        value.as_i64()
    }
}

/// Step 8: decompose a 32-bit ARGB integer (possibly sign-extended,
/// possibly string-encoded) into a [`Color`].
pub fn parse_color(value: &Value) -> Option<Color> {
    let n = parse_int_field(value)?;
    Some(Color::from_argb(n as u32))
}

pub fn author_field(projected: &HashMap<String, Value>, key: &str) -> Option<String> {
    projected.get(key).and_then(as_runs_or_text)
}

/// Step 7: convert a replay offset string to seconds.
pub fn time_text_to_seconds(time_text: &str) -> Option<i64> {
    time_to_seconds(time_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn projects_and_unwraps_simple_text() {
        let payload = json!({
            "authorName": {"simpleText": "Alice"},
            "timestampUsec": "123456"
        });
        let projected = project_own_keys(&payload);
        assert_eq!(projected["author"], json!("Alice"));
        assert_eq!(projected["timestamp"], json!("123456"));
    }

    #[test]
    fn nested_show_item_merges_outer_wins_except_message() {
        let payload = json!({
            "authorName": {"simpleText": "Outer"},
            "message": {"runs": [{"text": "outer message"}]},
            "showItemEndpoint": {
                "showLiveChatItemEndpoint": {
                    "renderer": {
                        "liveChatTextMessageRenderer": {
                            "authorName": {"simpleText": "Inner"},
                            "message": {"runs": [{"text": "inner message"}]}
                        }
                    }
                }
            }
        });
        let projected = project_payload(&payload);
        assert_eq!(projected["author"], json!("Outer"));
        assert_eq!(
            as_runs_or_text(&projected["message"]).unwrap(),
            "inner message"
        );
    }

    #[test]
    fn badges_flatten_to_max_rank() {
        let payload = json!({
            "authorBadges": [
                {"liveChatAuthorBadgeRenderer": {"tooltip": "Member (6 months)", "icon": {}}},
                {"liveChatAuthorBadgeRenderer": {"tooltip": "Verified", "icon": {"iconType": "VERIFIED"}}}
            ]
        });
        let (badges, author_type) = flatten_badges(&payload);
        assert_eq!(badges.as_deref(), Some("Member (6 months), Verified"));
        assert_eq!(author_type, AuthorType::Verified);
    }

    #[test]
    fn sticker_message_has_label_and_optional_text() {
        let mut projected = HashMap::new();
        projected.insert(
            "sticker".to_string(),
            json!({"accessibility": {"accessibilityData": {"label": "Sticker Name"}}}),
        );
        assert_eq!(render_message(&projected), "<<Sticker Name>>");
        projected.insert(
            "message".to_string(),
            json!({"runs": [{"text": "hi"}]}),
        );
        assert_eq!(render_message(&projected), "<<Sticker Name>>: hi");
    }

    #[test]
    fn amount_only_renders_no_message_literal() {
        let mut projected = HashMap::new();
        projected.insert("amount".to_string(), json!("$5.00"));
        assert_eq!(render_message(&projected), "<<no message>>");
    }

    #[test]
    fn header_primary_text_renders_membership_item() {
        let mut projected = HashMap::new();
        projected.insert(
            "header_primary_text".to_string(),
            json!({"runs": [{"text": "Member for 6 months"}]}),
        );
        projected.insert(
            "header_subtext".to_string(),
            json!({"runs": [{"text": "Welcome!"}]}),
        );
        assert_eq!(
            render_message(&projected),
            "Member for 6 months (Welcome!)"
        );
    }
}
