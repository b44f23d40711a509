//! Phase I (spec.md §4.6): fetch the watch page, build the initial
//! `EngineConfig` from four disjoint-key sub-extractors, and compute
//! the continuation-by-title map.
//!
//! Grounded on `__get_initial_youtube_info`
//! (`original_source/chat_replay_downloader.py:341-403`): the same
//! three blobs, the same `twoColumnWatchNextResults.conversationBar`
//! walk, the same `no_chat_error` fallback. The four sub-extractors
//! (video details / playability / microformat / heartbeat params) are
//! this engine's generalization of the source's single flat `config`
//! dict assembly.

use chatdl_core::state::EngineConfig;
use chatdl_core::Error;
use chatdl_http::HttpSession;
use chatdl_scraper::BlobName;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::collections::HashMap;

const WATCH_BASE: &str = "https://www.youtube.com/watch";

pub struct Discovery {
    pub config: EngineConfig,
    pub continuation_by_title_map: HashMap<String, String>,
}

pub async fn fetch(session: &HttpSession, video_id: &str) -> Result<Discovery, Error> {
    let url = format!("{WATCH_BASE}?v={video_id}");

    let ytcfg = chatdl_scraper::fetch_and_extract(session, &url, BlobName::Ytcfg).await?;
    let player_response =
        chatdl_scraper::fetch_and_extract(session, &url, BlobName::YtInitialPlayerResponse).await?;
    let yt_initial_data =
        chatdl_scraper::fetch_and_extract(session, &url, BlobName::YtInitialData).await?;

    let mut config = EngineConfig::new();
    apply_ytcfg(&mut config, &ytcfg)?;
    extract_video_details(&player_response, &mut config);
    extract_playability(&player_response, &mut config);
    extract_microformat(&player_response, &mut config);
    extract_heartbeat_params(&player_response, &mut config);

    let (continuation_by_title_map, no_chat_error) = build_continuation_map(&yt_initial_data)?;
    config.no_chat_error = no_chat_error;

    Ok(Discovery {
        config,
        continuation_by_title_map,
    })
}

pub fn apply_ytcfg(config: &mut EngineConfig, ytcfg: &Value) -> Result<(), Error> {
    config.api_version = ytcfg
        .get("INNERTUBE_API_VERSION")
        .and_then(Value::as_str)
        .map(String::from);
    config.api_key = ytcfg
        .get("INNERTUBE_API_KEY")
        .and_then(Value::as_str)
        .map(String::from);
    config.context = ytcfg.get("INNERTUBE_CONTEXT").cloned();

    if config.api_version.is_none() || config.api_key.is_none() {
        return Err(Error::Parsing {
            what: "ytcfg".to_string(),
            detail: "missing INNERTUBE_API_VERSION/INNERTUBE_API_KEY".to_string(),
        });
    }
    Ok(())
}

fn extract_video_details(player_response: &Value, config: &mut EngineConfig) {
    config.title = player_response
        .pointer("/videoDetails/title")
        .and_then(Value::as_str)
        .map(String::from);
    config.is_upcoming = player_response
        .pointer("/videoDetails/isUpcoming")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    config.is_live = player_response
        .pointer("/videoDetails/isLiveContent")
        .and_then(Value::as_bool)
        .unwrap_or(false);
}

fn extract_playability(player_response: &Value, config: &mut EngineConfig) {
    config.playability_status = player_response
        .pointer("/playabilityStatus/status")
        .and_then(Value::as_str)
        .map(String::from);
    config.scheduled_start_time = get_scheduled_start_time(player_response);
}

fn extract_microformat(player_response: &Value, config: &mut EngineConfig) {
    config.is_unlisted = player_response
        .pointer("/microformat/playerMicroformatRenderer/isUnlisted")
        .and_then(Value::as_bool)
        .unwrap_or(false);
}

fn extract_heartbeat_params(player_response: &Value, config: &mut EngineConfig) {
    let params = player_response.pointer("/heartbeatParams").cloned();
    if let Some(interval) = params.as_ref().and_then(|p| {
        p.get("intervalMs").and_then(|v| match v {
            Value::String(s) => s.parse::<f64>().ok(),
            Value::Number(n) => n.as_f64(),
            _ => None,
        })
    }) {
        config.heartbeat_interval_secs = interval / 1000.0;
    }
    config.heartbeat_params = params;
}

/// `__get_scheduled_start_time`: reads the offline-slate timestamp
/// present on both `ytInitialPlayerResponse` and a heartbeat response
/// (both put `playabilityStatus` at the same root level).
pub fn get_scheduled_start_time(info: &Value) -> Option<DateTime<Utc>> {
    let raw = info.pointer(
        "/playabilityStatus/liveStreamability/liveStreamabilityRenderer/offlineSlate/liveStreamOfflineSlateRenderer/scheduledStartTime",
    )?;
    let secs = match raw {
        Value::String(s) => s.parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    Utc.timestamp_opt(secs, 0).single()
}

/// `title -> continuation.reloadContinuationData.continuation` over
/// `conversationBar.liveChatRenderer.header...subMenuItems`, or a
/// `no_chat_error` message when there's no chat at all.
fn build_continuation_map(
    yt_initial_data: &Value,
) -> Result<(HashMap<String, String>, Option<String>), Error> {
    let contents = yt_initial_data
        .get("contents")
        .ok_or(Error::VideoUnavailable)?;
    let columns = contents.get("twoColumnWatchNextResults");
    let conversation_bar = columns.and_then(|c| c.get("conversationBar"));
    let live_chat_renderer = conversation_bar.and_then(|c| c.get("liveChatRenderer"));

    match live_chat_renderer {
        None => {
            let no_chat_error = conversation_bar
                .and_then(|c| {
                    c.pointer("/conversationBarRenderer/availabilityMessage/messageRenderer/text/runs")
                })
                .and_then(Value::as_array)
                .map(|runs| chatdl_normalize::runs::parse_runs(runs))
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "Video does not have a chat replay.".to_string());
            Ok((HashMap::new(), Some(no_chat_error)))
        }
        Some(live_chat) => {
            let sub_menu_items = live_chat
                .pointer(
                    "/header/liveChatHeaderRenderer/viewSelector/sortFilterSubMenuRenderer/subMenuItems",
                )
                .and_then(Value::as_array)
                .ok_or_else(|| Error::Parsing {
                    what: "liveChatRenderer".to_string(),
                    detail: "missing viewSelector subMenuItems".to_string(),
                })?;

            let mut map = HashMap::new();
            for item in sub_menu_items {
                let title = item.get("title").and_then(Value::as_str);
                let continuation = item
                    .pointer("/continuation/reloadContinuationData/continuation")
                    .and_then(Value::as_str);
                if let (Some(title), Some(continuation)) = (title, continuation) {
                    map.insert(title.to_string(), continuation.to_string());
                }
            }
            Ok((map, None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn applies_ytcfg_fields() {
        let mut config = EngineConfig::new();
        let ytcfg = json!({
            "INNERTUBE_API_VERSION": "v1",
            "INNERTUBE_API_KEY": "key123",
            "INNERTUBE_CONTEXT": {"client": {}}
        });
        apply_ytcfg(&mut config, &ytcfg).unwrap();
        assert_eq!(config.api_version.as_deref(), Some("v1"));
        assert_eq!(config.api_key.as_deref(), Some("key123"));
        assert!(config.context.is_some());
    }

    #[test]
    fn rejects_ytcfg_missing_key() {
        let mut config = EngineConfig::new();
        let err = apply_ytcfg(&mut config, &json!({"INNERTUBE_API_VERSION": "v1"})).unwrap_err();
        assert!(matches!(err, Error::Parsing { .. }));
    }

    #[test]
    fn scheduled_start_time_parses_unix_seconds() {
        let info = json!({
            "playabilityStatus": {
                "liveStreamability": {
                    "liveStreamabilityRenderer": {
                        "offlineSlate": {
                            "liveStreamOfflineSlateRenderer": {
                                "scheduledStartTime": "1700000000"
                            }
                        }
                    }
                }
            }
        });
        let t = get_scheduled_start_time(&info).unwrap();
        assert_eq!(t.timestamp(), 1_700_000_000);
    }

    #[test]
    fn scheduled_start_time_absent_is_none() {
        assert!(get_scheduled_start_time(&json!({})).is_none());
    }

    #[test]
    fn continuation_map_builds_title_to_token() {
        let yt_initial_data = json!({
            "contents": {
                "twoColumnWatchNextResults": {
                    "conversationBar": {
                        "liveChatRenderer": {
                            "header": {
                                "liveChatHeaderRenderer": {
                                    "viewSelector": {
                                        "sortFilterSubMenuRenderer": {
                                            "subMenuItems": [
                                                {"title": "Live chat", "continuation": {"reloadContinuationData": {"continuation": "TOKEN1"}}},
                                                {"title": "Top chat", "continuation": {"reloadContinuationData": {"continuation": "TOKEN2"}}}
                                            ]
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        });
        let (map, no_chat_error) = build_continuation_map(&yt_initial_data).unwrap();
        assert_eq!(map.get("Live chat").map(String::as_str), Some("TOKEN1"));
        assert_eq!(map.get("Top chat").map(String::as_str), Some("TOKEN2"));
        assert!(no_chat_error.is_none());
    }

    #[test]
    fn no_chat_replay_produces_error_message_from_runs() {
        let yt_initial_data = json!({
            "contents": {
                "twoColumnWatchNextResults": {
                    "conversationBar": {
                        "conversationBarRenderer": {
                            "availabilityMessage": {
                                "messageRenderer": {
                                    "text": {"runs": [{"text": "Chat is disabled for this live stream."}]}
                                }
                            }
                        }
                    }
                }
            }
        });
        let (map, no_chat_error) = build_continuation_map(&yt_initial_data).unwrap();
        assert!(map.is_empty());
        assert_eq!(
            no_chat_error.as_deref(),
            Some("Chat is disabled for this live stream.")
        );
    }

    #[test]
    fn missing_contents_is_video_unavailable() {
        let err = build_continuation_map(&json!({})).unwrap_err();
        assert!(matches!(err, Error::VideoUnavailable));
    }
}
