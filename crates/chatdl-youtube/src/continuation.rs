//! Shared continuation fetch/parse helpers for Phase II and Phase III
//! (spec.md §4.6).
//!
//! Grounded on `__get_replay_info`/`__get_live_info`/
//! `__get_continuation_info`/`__get_youtube_json`
//! (`original_source/chat_replay_downloader.py:413-465`), extended
//! with the `logged_out` read the API-to-HTML fallback trigger needs.

use crate::discovery;
use chatdl_core::state::EngineConfig;
use chatdl_core::Error;
use chatdl_http::HttpSession;
use chatdl_scraper::BlobName;
use serde_json::Value;

const YT_HOME: &str = "https://www.youtube.com";

pub fn continuation_html_url(continuation: &str, is_live: bool) -> String {
    let path = if is_live { "live_chat" } else { "live_chat_replay" };
    format!("{YT_HOME}/{path}?continuation={continuation}")
}

pub fn api_continuation_url(config: &EngineConfig, is_live: bool) -> Result<String, Error> {
    let api_version = config.api_version.as_deref().ok_or_else(missing_config)?;
    let api_key = config.api_key.as_deref().ok_or_else(missing_config)?;
    let endpoint = if is_live {
        "live_chat/get_live_chat"
    } else {
        "live_chat/get_live_chat_replay"
    };
    Ok(format!(
        "{YT_HOME}/youtubei/{api_version}/{endpoint}?key={api_key}"
    ))
}

pub fn heartbeat_url(config: &EngineConfig) -> Result<String, Error> {
    let api_version = config.api_version.as_deref().ok_or_else(missing_config)?;
    let api_key = config.api_key.as_deref().ok_or_else(missing_config)?;
    Ok(format!(
        "{YT_HOME}/youtubei/{api_version}/player/heartbeat?key={api_key}&alt=json"
    ))
}

fn missing_config() -> Error {
    Error::Parsing {
        what: "engine config".to_string(),
        detail: "api_version/api_key not yet discovered".to_string(),
    }
}

/// `__get_continuation_info`: unwraps `continuationContents.
/// liveChatContinuation`, raising `NoContinuation` on absence, plus
/// this engine's extra `loggedOut` read for the fallback trigger.
pub fn parse_continuation_envelope(envelope: &Value) -> Result<(Value, bool), Error> {
    let logged_out = envelope
        .pointer("/responseContext/mainAppWebResponseContext/loggedOut")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let contents = envelope
        .pointer("/continuationContents/liveChatContinuation")
        .cloned()
        .ok_or(Error::NoContinuation)?;
    Ok((contents, logged_out))
}

/// `__get_youtube_json`'s error-code mapping: `403` -> unavailable,
/// `404` -> not found, anything else is a fatal parsing error.
pub fn check_youtube_json_error(response: &Value) -> Result<(), Error> {
    let Some(error) = response.get("error") else {
        return Ok(());
    };
    match error.get("code").and_then(Value::as_i64) {
        Some(403) => Err(Error::VideoUnavailable),
        Some(404) => Err(Error::VideoNotFound),
        _ => Err(Error::Parsing {
            what: "youtube api response".to_string(),
            detail: format!("error response: {error}"),
        }),
    }
}

/// Phase II / the non-API fallback branch of Phase III: fetch the
/// continuation as an HTML page instead of an API POST, refreshing
/// `ytcfg` in the process.
pub async fn fetch_via_html(
    session: &HttpSession,
    continuation: &str,
    is_live: bool,
) -> Result<(Value, Value, bool), Error> {
    let url = continuation_html_url(continuation, is_live);
    let ytcfg = chatdl_scraper::fetch_and_extract(session, &url, BlobName::Ytcfg).await?;
    let yt_initial_data =
        chatdl_scraper::fetch_and_extract(session, &url, BlobName::YtInitialData).await?;
    let (contents, logged_out) = parse_continuation_envelope(&yt_initial_data)?;
    Ok((ytcfg, contents, logged_out))
}

/// Phase III's default branch: an API continuation POST. Returns the
/// raw envelope; the caller (not this function) special-cases a
/// missing continuation alongside `loggedOut=true` into the API-to-
/// HTML fallback trigger rather than a hard `NoContinuation`.
pub async fn fetch_via_api(
    session: &HttpSession,
    config: &EngineConfig,
    continuation: &str,
    is_live: bool,
    offset_milliseconds: i64,
) -> Result<Value, Error> {
    let url = api_continuation_url(config, is_live)?;
    let mut payload = serde_json::json!({
        "context": config.context,
        "continuation": continuation,
    });
    if !is_live {
        payload["currentPlayerState"] =
            serde_json::json!({ "playerOffsetMs": offset_milliseconds.to_string() });
    }
    let response = session.post_json(&url, &payload).await?;
    let body: Value = response.json().await.map_err(|e| {
        Error::Http(format!("failed to decode continuation response: {e}"))
    })?;
    check_youtube_json_error(&body)?;
    Ok(body)
}

pub async fn fetch_heartbeat(
    session: &HttpSession,
    config: &EngineConfig,
    video_id: &str,
) -> Result<Value, Error> {
    let url = heartbeat_url(config)?;
    let payload = serde_json::json!({
        "context": config.context,
        "videoId": video_id,
        "heartbeatRequestParams": {
            "heartbeatChecks": ["HEARTBEAT_CHECK_TYPE_LIVE_STREAM_STATUS"]
        }
    });
    let response = session.post_json(&url, &payload).await?;
    let body: Value = response
        .json()
        .await
        .map_err(|e| Error::Http(format!("failed to decode heartbeat response: {e}")))?;
    check_youtube_json_error(&body)?;
    Ok(body)
}

/// Applies a heartbeat response's `scheduledStartTime`/`status` onto
/// `config`, the "merge playability into the state" step of the
/// abort-state updater.
pub fn apply_heartbeat(config: &mut EngineConfig, heartbeat: &Value) {
    if let Some(t) = discovery::get_scheduled_start_time(heartbeat) {
        config.scheduled_start_time = Some(t);
    }
    if let Some(status) = heartbeat
        .pointer("/playabilityStatus/status")
        .and_then(Value::as_str)
    {
        config.playability_status = Some(status.to_string());
    }
}
