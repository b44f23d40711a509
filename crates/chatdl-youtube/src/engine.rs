//! Phase I retry loop, Phase II bootstrap, and the Phase III polling
//! loop (spec.md §4.6), the state machine `get_youtube_messages`
//! (`original_source/chat_replay_downloader.py:605-788`) is
//! re-architected into, per Design Notes §9 ("coroutine-like sleep
//! then retry chains... an explicit state machine whose driver calls
//! a pluggable clock").

use crate::continuation;
use crate::discovery;
use crate::types::{MessageType, RunOptions};
use chatdl_core::record::ChatRecord;
use chatdl_core::state::{AbortState, EngineConfig};
use chatdl_core::{Clock, Error};
use chatdl_http::HttpSession;
use chatdl_normalize::{Category, NormalizeOutcome};
use chatdl_signal::ShutdownController;
use rand::Rng;
use serde_json::Value;
use std::time::Duration;

const PHASE1_RETRY_MIN_SECS: u64 = 45;
const PHASE1_RETRY_MAX_SECS: u64 = 60;

/// Runs one full engine session end to end, calling `on_record` for
/// every chat-or-superchat-class item accepted by the time-window and
/// message-type filters, and returning the full accumulated buffer.
///
/// `NoChatReplay`, parsing, and other fatal errors propagate; the
/// clean-loop-exit family (`VideoUnavailable`, `VideoNotFound`,
/// `NoContinuation`, `AbortConditionsSatisfied`) instead return the
/// buffer collected so far (§7).
pub async fn run(
    session: &HttpSession,
    options: RunOptions<'_>,
    mut on_record: impl FnMut(&ChatRecord),
) -> Result<Vec<ChatRecord>, Error> {
    let mut buffer = Vec::new();
    match run_inner(session, &options, &mut on_record, &mut buffer).await {
        Ok(()) => Ok(buffer),
        Err(e) if e.is_clean_loop_exit() => {
            tracing::info!(error = %e, "youtube engine loop exited cleanly");
            Ok(buffer)
        }
        Err(e) => Err(e),
    }
}

async fn run_inner(
    session: &HttpSession,
    options: &RunOptions<'_>,
    on_record: &mut impl FnMut(&ChatRecord),
    buffer: &mut Vec<ChatRecord>,
) -> Result<(), Error> {
    let (mut config, continuation_token, is_live) =
        discover_mode(session, options).await?;

    let (ytcfg, bootstrap_contents, _logged_out) =
        continuation::fetch_via_html(session, &continuation_token, is_live).await?;
    discovery::apply_ytcfg(&mut config, &ytcfg)?;

    let mut state = AbortState::new();
    let mut latched_orig_start = false;
    let mut last_heartbeat: Option<chrono::DateTime<chrono::Utc>> = None;

    let mut poll_continuation = continuation_token;
    let mut first_time = true;
    let mut use_non_api_fallback = false;
    let mut pending_first_info = Some(bootstrap_contents);

    let offset_milliseconds = if options.start_time > 0 {
        options.start_time * 1000
    } else {
        0
    };

    loop {
        update_abort_state(
            session,
            &options.video_id,
            &mut config,
            &mut state,
            &mut latched_orig_start,
            &mut last_heartbeat,
            options.clock,
        )
        .await?;

        if let Some(err) = options.abort.check(&state, options.clock, options.file_exists) {
            return Err(err);
        }

        let info = if first_time {
            first_time = false;
            pending_first_info.take().expect("bootstrap payload consumed once")
        } else if use_non_api_fallback {
            let (ytcfg, contents, _logged_out) =
                continuation::fetch_via_html(session, &poll_continuation, is_live).await?;
            discovery::apply_ytcfg(&mut config, &ytcfg)?;
            use_non_api_fallback = false;
            contents
        } else {
            let envelope = cancellable_future(
                continuation::fetch_via_api(
                    session,
                    &config,
                    &poll_continuation,
                    is_live,
                    offset_milliseconds,
                ),
                &options.shutdown,
            )
            .await?;

            match continuation::parse_continuation_envelope(&envelope) {
                Ok((contents, _logged_out)) => contents,
                Err(Error::NoContinuation) => {
                    let logged_out_now = envelope
                        .pointer("/responseContext/mainAppWebResponseContext/loggedOut")
                        .and_then(Value::as_bool)
                        .unwrap_or(false);
                    if logged_out_now {
                        // §9 open question: also fires benignly at the
                        // end of a normal live stream; one extra
                        // fallback request is expected either way.
                        tracing::debug!("api continuation missing with loggedOut=true, falling back to html");
                        use_non_api_fallback = true;
                        continue;
                    }
                    return Err(Error::NoContinuation);
                }
                Err(e) => return Err(e),
            }
        };

        let terminated = process_actions(&info, is_live, options, buffer, on_record)?;
        if terminated {
            return Ok(());
        }

        if !info.get("actions").map(|v| v.is_array()).unwrap_or(false) && !is_live {
            return Ok(());
        }

        match parse_continuation_advance(&info) {
            Some((next_continuation, timeout_ms)) => {
                poll_continuation = next_continuation;
                if let Some(ms) = timeout_ms {
                    if cancellable_sleep(Duration::from_millis(ms as u64), &options.shutdown).await
                    {
                        return Err(cancelled());
                    }
                }
            }
            None => return Ok(()),
        }
    }
}

/// Phase I: retry until a continuation title matches, the video is
/// confirmed to have no chat, or the abort conditions fire.
async fn discover_mode(
    session: &HttpSession,
    options: &RunOptions<'_>,
) -> Result<(EngineConfig, String, bool), Error> {
    let chat_replay_field = format!("{} chat replay", options.chat_type.title());
    let chat_live_field = format!("{} chat", options.chat_type.title());

    let mut orig_scheduled_start_time = None;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let discovery = discovery::fetch(session, &options.video_id).await?;

        if let Some(token) = discovery.continuation_by_title_map.get(&chat_replay_field) {
            return Ok((discovery.config, token.clone(), false));
        }
        if let Some(token) = discovery.continuation_by_title_map.get(&chat_live_field) {
            return Ok((discovery.config, token.clone(), true));
        }

        if !discovery.config.is_upcoming {
            let message = discovery
                .config
                .no_chat_error
                .unwrap_or_else(|| "Video does not have a chat replay.".to_string());
            return Err(Error::NoChatReplay(message));
        }

        if orig_scheduled_start_time.is_none() {
            orig_scheduled_start_time = discovery.config.scheduled_start_time;
        }

        let mut probe_state = AbortState::new();
        if let Some(t) = orig_scheduled_start_time {
            probe_state.set("orig_scheduled_start_time", serde_json::json!(t.to_rfc3339()));
        }
        if let Some(t) = discovery.config.scheduled_start_time {
            probe_state.set("scheduled_start_time", serde_json::json!(t.to_rfc3339()));
        }
        if let Some(err) = options
            .abort
            .check(&probe_state, options.clock, options.file_exists)
        {
            return Err(err);
        }

        let wait = jittered_phase1_wait();
        tracing::debug!(attempt, wait_secs = wait.as_secs(), "upcoming, retrying phase I");
        if cancellable_sleep(wait, &options.shutdown).await {
            return Err(cancelled());
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn update_abort_state(
    session: &HttpSession,
    video_id: &str,
    config: &mut EngineConfig,
    state: &mut AbortState,
    latched_orig_start: &mut bool,
    last_heartbeat: &mut Option<chrono::DateTime<chrono::Utc>>,
    clock: &dyn Clock,
) -> Result<(), Error> {
    if !*latched_orig_start {
        if let Some(t) = config.scheduled_start_time {
            set_state(state, "orig_scheduled_start_time", serde_json::json!(t.to_rfc3339()));
            set_state(state, "scheduled_start_time", serde_json::json!(t.to_rfc3339()));
        }
        *latched_orig_start = true;
        return Ok(());
    }

    if !config.is_upcoming {
        return Ok(());
    }

    let now = clock.now();
    let due = match last_heartbeat {
        Some(prev) => (now - *prev).num_seconds() as f64 >= config.heartbeat_interval_secs,
        None => true,
    };
    if !due {
        return Ok(());
    }
    *last_heartbeat = Some(now);

    let heartbeat = continuation::fetch_heartbeat(session, config, video_id).await?;
    continuation::apply_heartbeat(config, &heartbeat);
    if let Some(t) = config.scheduled_start_time {
        set_state(state, "scheduled_start_time", serde_json::json!(t.to_rfc3339()));
    }
    Ok(())
}

fn set_state(state: &mut AbortState, key: &str, value: Value) {
    if let Some(change) = state.set(key, value) {
        AbortState::log_change(&change);
    }
}

/// Processes one batch's `actions` array; returns `true` when a
/// replay record past `end_time` was seen and the whole polling loop
/// should terminate.
fn process_actions(
    info: &Value,
    is_live: bool,
    options: &RunOptions<'_>,
    buffer: &mut Vec<ChatRecord>,
    on_record: &mut impl FnMut(&ChatRecord),
) -> Result<bool, Error> {
    let Some(actions) = info.get("actions").and_then(Value::as_array) else {
        return Ok(false);
    };

    for action in actions {
        let mut video_offset_time_msec = None;
        let action_obj = if let Some(replay) = action.get("replayChatItemAction") {
            if let Some(offset) = replay
                .get("videoOffsetTimeMsec")
                .and_then(value_as_i64_lenient)
            {
                video_offset_time_msec = Some(offset);
            }
            match replay.get("actions").and_then(Value::as_array).and_then(|a| a.first()) {
                Some(inner) => inner,
                None => continue,
            }
        } else {
            action
        };

        let Some(action_name) = action_obj.as_object().and_then(|o| o.keys().next()) else {
            continue;
        };
        let Some(item_container) = action_obj.get(action_name) else {
            continue;
        };
        let Some(item) = item_container.get("item") else {
            // not a valid item to display (usually message deleted)
            continue;
        };

        let (mut record, category) = match chatdl_normalize::normalize_item(item) {
            NormalizeOutcome::Ignored => continue,
            NormalizeOutcome::Record(record, category) => (*record, category),
        };

        if !message_type_allows(options.message_type, category) {
            continue;
        }

        record.video_offset_time_msec = video_offset_time_msec;

        let time_in_seconds = record.time_in_seconds;
        if exceeds_end_time(options.end_time, time_in_seconds) {
            return Ok(true);
        }

        if should_include(is_live, options.start_time, time_in_seconds) {
            on_record(&record);
            buffer.push(record);
        }
    }
    Ok(false)
}

fn value_as_i64_lenient(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

/// §4.6 step 5's `message_type` filter. `ignore`-classed renderers
/// never reach here; they're filtered by `normalize_item` itself.
fn message_type_allows(message_type: MessageType, category: Category) -> bool {
    match message_type {
        MessageType::All => true,
        MessageType::Messages => category != Category::Superchat,
        MessageType::Superchat => category != Category::Message,
    }
}

fn exceeds_end_time(end_time: Option<i64>, time_in_seconds: Option<i64>) -> bool {
    match (end_time, time_in_seconds) {
        (Some(end), Some(t)) => t > end,
        _ => false,
    }
}

/// §4.6 step 5: live mode always includes; replay mode includes when
/// there's no start-time floor or the record has already reached it.
fn should_include(is_live: bool, start_time: i64, time_in_seconds: Option<i64>) -> bool {
    if is_live {
        return true;
    }
    if start_time <= 0 {
        return true;
    }
    matches!(time_in_seconds, Some(t) if t >= start_time)
}

/// §4.6 step 6: `continuations[0]` has exactly one sub-key; read its
/// `continuation` and optional `timeoutMs`. `None` means the replay
/// has ended.
fn parse_continuation_advance(info: &Value) -> Option<(String, Option<i64>)> {
    let entry = info.get("continuations").and_then(Value::as_array)?.first()?;
    let (_key, sub) = entry.as_object()?.iter().next()?;
    let continuation = sub.get("continuation").and_then(Value::as_str)?.to_string();
    let timeout_ms = sub.get("timeoutMs").and_then(value_as_i64_lenient);
    Some((continuation, timeout_ms))
}

fn jittered_phase1_wait() -> Duration {
    let secs = rand::rng().random_range(PHASE1_RETRY_MIN_SECS..=PHASE1_RETRY_MAX_SECS);
    Duration::from_secs(secs)
}

fn cancelled() -> Error {
    Error::AbortConditionsSatisfied("signal received".to_string())
}

/// Races a sleep against the shutdown notifier; returns `true` if
/// cancelled rather than timed out.
async fn cancellable_sleep(duration: Duration, shutdown: &ShutdownController) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown.finalized() => true,
    }
}

/// Races an in-flight future against the shutdown notifier (§5
/// "Cancellation": "implemented with `tokio::select!` wrapping the
/// in-flight `reqwest` future and a shutdown `Notify`").
async fn cancellable_future<T>(
    fut: impl std::future::Future<Output = Result<T, Error>>,
    shutdown: &ShutdownController,
) -> Result<T, Error> {
    tokio::select! {
        result = fut => result,
        _ = shutdown.finalized() => Err(cancelled()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn phase1_wait_stays_in_45_to_60_range() {
        for _ in 0..50 {
            let wait = jittered_phase1_wait();
            assert!(wait.as_secs() >= PHASE1_RETRY_MIN_SECS);
            assert!(wait.as_secs() <= PHASE1_RETRY_MAX_SECS);
        }
    }

    #[test]
    fn message_type_all_passes_everything() {
        assert!(message_type_allows(MessageType::All, Category::Message));
        assert!(message_type_allows(MessageType::All, Category::Superchat));
    }

    #[test]
    fn message_type_messages_skips_superchat() {
        assert!(message_type_allows(MessageType::Messages, Category::Message));
        assert!(!message_type_allows(MessageType::Messages, Category::Superchat));
    }

    #[test]
    fn message_type_superchat_skips_messages() {
        assert!(message_type_allows(MessageType::Superchat, Category::Superchat));
        assert!(!message_type_allows(MessageType::Superchat, Category::Message));
    }

    #[test]
    fn live_mode_always_includes() {
        assert!(should_include(true, 100, None));
    }

    #[test]
    fn replay_with_no_start_time_includes_everything() {
        assert!(should_include(false, 0, Some(5)));
    }

    #[test]
    fn replay_excludes_before_start_time() {
        assert!(!should_include(false, 100, Some(50)));
        assert!(should_include(false, 100, Some(100)));
    }

    #[test]
    fn end_time_boundary_excludes_first_record_past_it() {
        assert!(!exceeds_end_time(Some(100), Some(100)));
        assert!(exceeds_end_time(Some(100), Some(101)));
        assert!(!exceeds_end_time(None, Some(1_000_000)));
    }

    #[test]
    fn continuation_advance_reads_single_subkey() {
        let info = json!({
            "continuations": [
                {"invalidationContinuationData": {"continuation": "NEXT", "timeoutMs": 4000}}
            ]
        });
        let (next, timeout) = parse_continuation_advance(&info).unwrap();
        assert_eq!(next, "NEXT");
        assert_eq!(timeout, Some(4000));
    }

    #[test]
    fn continuation_advance_none_when_block_absent() {
        assert!(parse_continuation_advance(&json!({})).is_none());
    }

    #[test]
    fn continuation_advance_without_timeout() {
        let info = json!({
            "continuations": [{"reloadContinuationData": {"continuation": "NEXT"}}]
        });
        let (next, timeout) = parse_continuation_advance(&info).unwrap();
        assert_eq!(next, "NEXT");
        assert_eq!(timeout, None);
    }
}
