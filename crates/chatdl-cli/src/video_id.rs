//! Pulls a platform video id out of the operator's URL (spec.md §6
//! positional `url`).
//!
//! Grounded on `__YT_REGEX`/`__TWITCH_REGEX`
//! (`original_source/chat_replay_downloader.py:94-97`).

use chatdl_core::{Error, Platform};
use once_cell::sync::Lazy;
use regex::Regex;

static YT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:/|%3D|v=|vi=)([0-9A-Za-z_-]{11})(?:[%#?&]|$)").unwrap());
static TWITCH_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:/videos/|/v/)(\d+)").unwrap());

pub fn extract(url: &str, platform: Platform) -> Result<String, Error> {
    let regex = match platform {
        Platform::YouTube => &*YT_REGEX,
        Platform::Twitch => &*TWITCH_REGEX,
    };
    regex
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::InvalidUrl(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_youtube_watch_id() {
        let id = extract("https://www.youtube.com/watch?v=dQw4w9WgXcQ", Platform::YouTube).unwrap();
        assert_eq!(id, "dQw4w9WgXcQ");
    }

    #[test]
    fn extracts_youtube_short_link_id() {
        let id = extract("https://youtu.be/dQw4w9WgXcQ", Platform::YouTube).unwrap();
        assert_eq!(id, "dQw4w9WgXcQ");
    }

    #[test]
    fn extracts_twitch_video_id() {
        let id = extract("https://www.twitch.tv/videos/1234567890", Platform::Twitch).unwrap();
        assert_eq!(id, "1234567890");
    }

    #[test]
    fn rejects_url_with_no_match() {
        assert!(extract("https://www.youtube.com/watch", Platform::YouTube).is_err());
    }
}
