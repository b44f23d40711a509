//! Trivial URL -> platform demux (spec.md §1 "Out of scope" notes this
//! is external, but the two-variant enum itself is shared state that
//! both the engine crates and the CLI need, so it lives here).

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    YouTube,
    Twitch,
}

impl Platform {
    pub fn detect(url: &str) -> Result<Self, Error> {
        if url.contains("youtube.com") || url.contains("youtu.be") {
            Ok(Platform::YouTube)
        } else if url.contains("twitch.tv") {
            Ok(Platform::Twitch)
        } else {
            Err(Error::InvalidUrl(url.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_youtube() {
        assert_eq!(
            Platform::detect("https://www.youtube.com/watch?v=abc").unwrap(),
            Platform::YouTube
        );
        assert_eq!(
            Platform::detect("https://youtu.be/abc").unwrap(),
            Platform::YouTube
        );
    }

    #[test]
    fn detects_twitch() {
        assert_eq!(
            Platform::detect("https://www.twitch.tv/videos/123").unwrap(),
            Platform::Twitch
        );
    }

    #[test]
    fn rejects_unknown() {
        assert!(Platform::detect("https://example.com").is_err());
    }
}
