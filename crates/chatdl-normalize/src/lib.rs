//! Projects a raw renderer item (`{rendererName: payload}`) into
//! a canonical [`chatdl_core::ChatRecord`] (spec.md §4.3).

pub mod project;
pub mod renderer;
pub mod runs;

pub use renderer::{classify, is_ticker_renderer, Category};

use chatdl_core::record::ChatRecord;
use project::{
    author_field, flatten_badges, parse_color, parse_int_field, parse_timestamp_usec,
    project_payload, render_message, time_text_to_seconds,
};
use serde_json::Value;

/// Result of normalizing one raw item.
pub enum NormalizeOutcome {
    /// The renderer is known to carry no user-facing content
    /// (placeholders, mode-change banners, donation announcements).
    Ignored,
    Record(Box<ChatRecord>, Category),
}

/// Projects a single `{rendererName: payload}` object into a
/// [`ChatRecord`], or `Ignored` if the renderer carries no content
/// (spec.md §4.3 steps 1-8).
pub fn normalize_item(item: &Value) -> NormalizeOutcome {
    let Some(obj) = item.as_object() else {
        return NormalizeOutcome::Ignored;
    };
    let Some((renderer_name, payload)) = obj.iter().next() else {
        return NormalizeOutcome::Ignored;
    };

    let category = classify(renderer_name);
    if category == Category::Ignore {
        return NormalizeOutcome::Ignored;
    }

    let projected = project_payload(payload);
    let (badges, author_type) = flatten_badges(payload);

    let mut record = ChatRecord {
        message: render_message(&projected),
        ..Default::default()
    };

    record.author = author_field(&projected, "author");
    record.author_id = projected
        .get("author_id")
        .and_then(Value::as_str)
        .map(str::to_string);
    record.badges = badges;
    record.author_type = Some(author_type);
    record.amount = author_field(&projected, "amount");

    if let Some(ts) = projected.get("timestamp").and_then(parse_timestamp_usec) {
        record.set_timestamp_usec(ts);
    }
    if let Some(time_text) = author_field(&projected, "time_text") {
        record.time_in_seconds = time_text_to_seconds(&time_text);
        record.time_text = Some(time_text);
    }

    record.header_color = projected.get("header_color").and_then(parse_color);
    record.body_color = projected.get("body_color").and_then(parse_color);
    record.ticker_duration = projected
        .get("ticker_duration")
        .and_then(parse_int_field);

    NormalizeOutcome::Record(Box::new(record), category)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_message_normalizes_to_record() {
        let item = json!({
            "liveChatTextMessageRenderer": {
                "authorName": {"simpleText": "Alice"},
                "authorExternalChannelId": "UC123",
                "timestampUsec": "1000000",
                "message": {"runs": [{"text": "hello"}]}
            }
        });
        match normalize_item(&item) {
            NormalizeOutcome::Record(record, category) => {
                assert_eq!(category, Category::Message);
                assert_eq!(record.author.as_deref(), Some("Alice"));
                assert_eq!(record.author_id.as_deref(), Some("UC123"));
                assert_eq!(record.message, "hello");
                assert_eq!(record.timestamp, Some(1_000_000));
                assert!(!record.is_ticker());
            }
            NormalizeOutcome::Ignored => panic!("expected a record"),
        }
    }

    #[test]
    fn placeholder_renderer_is_ignored() {
        let item = json!({"liveChatPlaceholderItemRenderer": {}});
        assert!(matches!(normalize_item(&item), NormalizeOutcome::Ignored));
    }

    #[test]
    fn paid_message_carries_amount_and_colors() {
        let item = json!({
            "liveChatPaidMessageRenderer": {
                "authorName": {"simpleText": "Bob"},
                "purchaseAmountText": {"simpleText": "$5.00"},
                "headerBackgroundColor": 4278237132u32,
                "timestampUsec": "2000000",
                "message": {"runs": [{"text": "thanks"}]}
            }
        });
        match normalize_item(&item) {
            NormalizeOutcome::Record(record, category) => {
                assert_eq!(category, Category::Superchat);
                assert_eq!(record.amount.as_deref(), Some("$5.00"));
                assert!(record.header_color.is_some());
                assert_eq!(record.message, "thanks");
            }
            NormalizeOutcome::Ignored => panic!("expected a record"),
        }
    }

    #[test]
    fn ticker_record_reports_is_ticker() {
        let item = json!({
            "liveChatTickerPaidMessageItemRenderer": {
                "durationSec": "120",
                "amount": {"simpleText": "$2.00"}
            }
        });
        match normalize_item(&item) {
            NormalizeOutcome::Record(record, category) => {
                assert_eq!(category, Category::Superchat);
                assert!(record.is_ticker());
                assert_eq!(record.message, "<<no message>>");
            }
            NormalizeOutcome::Ignored => panic!("expected a record"),
        }
    }
}
