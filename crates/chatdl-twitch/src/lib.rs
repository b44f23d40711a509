//! Cursor-paginated fetch from Twitch's public video-comments
//! endpoint (spec.md §4.7).

use chatdl_core::record::ChatRecord;
use chatdl_core::time::seconds_to_time;
use chatdl_core::Error;
use chatdl_http::HttpSession;
use chrono::TimeZone;
use serde_json::Value;

/// Public client id used by the reference clients for unauthenticated
/// comment pagination.
const CLIENT_ID: &str = "kimne78kx3ncx6brgo4mv6wki5h1ko";
const API_BASE: &str = "https://api.twitch.tv";

/// Fetches every comment for `video_id` from `start_time` up to (and
/// including) `end_time` (both in seconds), invoking `on_record` for
/// each one in arrival order and returning the full accumulated list.
pub async fn fetch_comments(
    session: &HttpSession,
    video_id: &str,
    start_time: i64,
    end_time: Option<i64>,
    on_record: impl FnMut(&ChatRecord),
) -> Result<Vec<ChatRecord>, Error> {
    fetch_comments_from(session, API_BASE, video_id, start_time, end_time, on_record).await
}

async fn fetch_comments_from(
    session: &HttpSession,
    base_url: &str,
    video_id: &str,
    start_time: i64,
    end_time: Option<i64>,
    mut on_record: impl FnMut(&ChatRecord),
) -> Result<Vec<ChatRecord>, Error> {
    let api_url = format!("{base_url}/v5/videos/{video_id}/comments?client_id={CLIENT_ID}");
    let mut cursor = String::new();
    let mut out = Vec::new();

    loop {
        let url = format!("{api_url}&cursor={cursor}&content_offset_seconds={start_time}");
        let response = session.get(&url).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::Http(format!("failed to decode twitch response: {e}")))?;

        if body.get("error").is_some() {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("twitch API error")
                .to_string();
            return Err(Error::TwitchError(message));
        }

        let comments = body
            .get("comments")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for comment in &comments {
            let offset_seconds = comment
                .get("content_offset_seconds")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            if (offset_seconds as i64) < start_time {
                continue;
            }
            if let Some(end) = end_time {
                if offset_seconds as i64 > end {
                    return Ok(out);
                }
            }
            let record = build_record(comment, offset_seconds)?;
            on_record(&record);
            out.push(record);
        }

        match body.get("_next").and_then(Value::as_str) {
            Some(next) => cursor = next.to_string(),
            None => return Ok(out),
        }
    }
}

fn build_record(comment: &Value, offset_seconds: f64) -> Result<ChatRecord, Error> {
    let created_at = comment
        .get("created_at")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Parsing {
            what: "twitch comment".to_string(),
            detail: "missing created_at".to_string(),
        })?;
    let timestamp_usec = timestamp_to_microseconds(created_at)?;
    let seconds = offset_seconds as i64;

    let mut record = ChatRecord {
        message: comment
            .pointer("/message/body")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        author: comment
            .pointer("/commenter/display_name")
            .and_then(Value::as_str)
            .map(str::to_string),
        ..Default::default()
    };
    // Twitch comments carry both an absolute timestamp and a
    // video-relative offset; the "exactly one time field" invariant
    // is a YouTube replay/live distinction, not a cross-platform rule.
    record.set_timestamp_usec(timestamp_usec);
    record.time_in_seconds = Some(seconds);
    record.time_text = Some(seconds_to_time(seconds));
    Ok(record)
}

/// RFC3339 timestamp to microseconds, preserving sub-second precision
/// `chrono::NaiveDateTime::parse_from_str` (second-granularity only)
/// cannot: the fractional part is split off and added back as a
/// float.
fn timestamp_to_microseconds(timestamp: &str) -> Result<i64, Error> {
    let trimmed = timestamp.trim_end_matches('Z');
    let (date_part, frac_part) = match trimmed.split_once('.') {
        Some((d, f)) => (d, f),
        None => (trimmed, ""),
    };
    let naive = chrono::NaiveDateTime::parse_from_str(
        &format!("{date_part}Z"),
        "%Y-%m-%dT%H:%M:%SZ",
    )
    .map_err(|e| Error::Parsing {
        what: "twitch created_at".to_string(),
        detail: e.to_string(),
    })?;
    let epoch_secs = chrono::Utc.from_utc_datetime(&naive).timestamp();
    let frac_str = if frac_part.is_empty() { "0" } else { frac_part };
    let frac: f64 = format!("0.{frac_str}").parse().unwrap_or(0.0);
    Ok(((epoch_secs as f64 + frac) * 1_000_000.0).round() as i64)
}
