//! The canonical chat record (spec.md §3.1).
//!
//! Every field but `message` is optional. `ChatRecord` is the single
//! shape both the YT and TW connectors normalize into, and the only
//! shape the output sink ever sees.

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// `header_color`/`body_color` sub-record: an ARGB-derived color in
/// both tuple and hex form (spec.md §4.3 step 8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub rgba: [u8; 4],
    pub hex: String,
}

impl Color {
    /// Decomposes a 32-bit ARGB integer into RGBA + `#rrggbbaa` hex.
    pub fn from_argb(argb: u32) -> Self {
        let a = ((argb >> 24) & 0xFF) as u8;
        let r = ((argb >> 16) & 0xFF) as u8;
        let g = ((argb >> 8) & 0xFF) as u8;
        let b = (argb & 0xFF) as u8;
        Self {
            rgba: [r, g, b, a],
            hex: format!("#{:02x}{:02x}{:02x}{:02x}", r, g, b, a),
        }
    }
}

/// Highest-ranked badge icon identifier, total order per spec.md §3.1
/// invariant (iv): `"" < VERIFIED < MEMBER < MODERATOR < OWNER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorType {
    None,
    Verified,
    Member,
    Moderator,
    Owner,
}

impl AuthorType {
    fn rank(self) -> u8 {
        match self {
            AuthorType::None => 0,
            AuthorType::Verified => 1,
            AuthorType::Member => 2,
            AuthorType::Moderator => 3,
            AuthorType::Owner => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AuthorType::None => "",
            AuthorType::Verified => "verified",
            AuthorType::Member => "member",
            AuthorType::Moderator => "moderator",
            AuthorType::Owner => "owner",
        }
    }
}

impl PartialOrd for AuthorType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.rank().cmp(&other.rank()))
    }
}
impl Ord for AuthorType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_in_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_offset_time_msec: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_type: Option<AuthorType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badges: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker_duration: Option<i64>,
}

impl ChatRecord {
    /// Derives `datetime` (`YYYY-MM-DD HH:MM:SS`, local time) from a
    /// microsecond Unix timestamp and sets both fields.
    pub fn set_timestamp_usec(&mut self, timestamp_usec: i64) {
        self.timestamp = Some(timestamp_usec);
        let secs = timestamp_usec.div_euclid(1_000_000);
        let nanos = (timestamp_usec.rem_euclid(1_000_000) * 1_000) as u32;
        if let Some(dt) = Local.timestamp_opt(secs, nanos).single() {
            self.datetime = Some(dt.format("%Y-%m-%d %H:%M:%S").to_string());
        }
    }

    /// True when this record is a ticker-mirror item (invariant iii):
    /// retained in the buffer, suppressed from stdout.
    pub fn is_ticker(&self) -> bool {
        self.ticker_duration.is_some()
    }

    /// Exactly one of `timestamp`/`time_in_seconds` should be set for
    /// any non-ticker record (invariant i); used by tests and by
    /// callers that want to assert engine output sanity.
    pub fn has_exactly_one_time_field(&self) -> bool {
        self.timestamp.is_some() != self.time_in_seconds.is_some()
    }

    /// `message_to_string` formatter (spec.md §4.8):
    /// `[{datetime|time_text}] [({author_type_lower}) ]*[{amount}* ]{author}:\t{message}`
    pub fn to_display_string(&self) -> String {
        let mut out = String::new();
        let time_part = self
            .datetime
            .as_deref()
            .or(self.time_text.as_deref())
            .unwrap_or("");
        out.push('[');
        out.push_str(time_part);
        out.push(']');
        out.push(' ');
        if let Some(at) = self.author_type {
            if at != AuthorType::None {
                out.push('(');
                out.push_str(at.as_str());
                out.push(')');
                out.push(' ');
            }
        }
        if let Some(amount) = &self.amount {
            out.push_str(amount);
            out.push('*');
            out.push(' ');
        }
        out.push_str(self.author.as_deref().unwrap_or(""));
        out.push_str(":\t");
        out.push_str(&self.message);
        out
    }

    /// Serializes into a `serde_json::Map` with keys in sorted order,
    /// the form JSON/CSV output and the round-trip law (§8) require.
    pub fn to_sorted_value(&self) -> serde_json::Value {
        let value = serde_json::to_value(self).expect("ChatRecord always serializes");
        sort_object_keys(value)
    }
}

fn sort_object_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: std::collections::BTreeMap<String, serde_json::Value> = map
                .into_iter()
                .map(|(k, v)| (k, sort_object_keys(v)))
                .collect();
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k, v);
            }
            serde_json::Value::Object(out)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argb_to_rgba_hex() {
        let c = Color::from_argb(0x80FF0000);
        assert_eq!(c.rgba, [255, 0, 0, 128]);
        assert_eq!(c.hex, "#ff000080");
    }

    #[test]
    fn author_type_ordering() {
        assert!(AuthorType::Owner > AuthorType::Moderator);
        assert!(AuthorType::Moderator > AuthorType::Member);
        assert!(AuthorType::Member > AuthorType::Verified);
        assert!(AuthorType::Verified > AuthorType::None);
    }

    #[test]
    fn exactly_one_time_field() {
        let mut r = ChatRecord {
            message: "hi".into(),
            ..Default::default()
        };
        assert!(!r.has_exactly_one_time_field());
        r.timestamp = Some(1);
        assert!(r.has_exactly_one_time_field());
        r.time_in_seconds = Some(2);
        assert!(!r.has_exactly_one_time_field());
    }

    #[test]
    fn display_string_format() {
        let mut r = ChatRecord {
            message: "hello".into(),
            author: Some("Alice".into()),
            author_type: Some(AuthorType::Moderator),
            amount: Some("$5.00".into()),
            datetime: Some("2024-01-01 00:00:00".into()),
            ..Default::default()
        };
        r.ticker_duration = None;
        assert_eq!(
            r.to_display_string(),
            "[2024-01-01 00:00:00] (moderator) $5.00* Alice:\thello"
        );
    }

    #[test]
    fn sorted_value_round_trips() {
        let r = ChatRecord {
            message: "hi".into(),
            author: Some("bob".into()),
            timestamp: Some(42),
            ..Default::default()
        };
        let v = r.to_sorted_value();
        let back: ChatRecord = serde_json::from_value(v).unwrap();
        assert_eq!(back.message, "hi");
        assert_eq!(back.author.as_deref(), Some("bob"));
        assert_eq!(back.timestamp, Some(42));
    }
}
