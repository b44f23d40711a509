//! Fetches HTML watch/continuation pages and extracts embedded
//! JSON blobs by name (spec.md §4.2).
//!
//! Grounded on the anchor-then-scan extraction style used for SSE
//! frame boundaries in `lunaroute-egress/src/anthropic.rs`. Rather than
//! trying to capture an entire JSON value in one regex, a small anchor
//! regex finds the start brace and a structural scanner consumes
//! exactly as much as forms one valid value, ignoring trailing script
//! content after it.

use chatdl_core::Error;
use chatdl_http::HttpSession;
use once_cell::sync::Lazy;
use regex::Regex;

const ERROR_PAGE_SENTINEL: &str = "window.ERROR_PAGE";

/// The three blobs the YT engine ever needs to pull out of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobName {
    Ytcfg,
    YtInitialPlayerResponse,
    YtInitialData,
}

impl BlobName {
    fn anchors(self) -> &'static [&'static Lazy<Regex>] {
        match self {
            BlobName::Ytcfg => &[&YTCFG_ANCHOR],
            BlobName::YtInitialPlayerResponse => &[&PLAYER_RESPONSE_ANCHOR],
            BlobName::YtInitialData => &[&INITIAL_DATA_ANCHOR_A, &INITIAL_DATA_ANCHOR_B],
        }
    }
}

static YTCFG_ANCHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"ytcfg\.set\(\s*\{").unwrap());
static PLAYER_RESPONSE_ANCHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"ytInitialPlayerResponse\s*=\s*\{").unwrap());
static INITIAL_DATA_ANCHOR_A: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"window\["ytInitialData"\]\s*=\s*\{"#).unwrap());
static INITIAL_DATA_ANCHOR_B: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"ytInitialData\s*=\s*\{").unwrap());

/// Fetches `url` and extracts `blob`, automatically re-fetching once
/// if the page is a transient error page (no match, or the
/// `window.ERROR_PAGE` sentinel is present).
pub async fn fetch_and_extract(
    session: &HttpSession,
    url: &str,
    blob: BlobName,
) -> Result<serde_json::Value, Error> {
    let html = fetch_html(session, url).await?;
    match extract_blob(&html, blob) {
        Ok(value) if !html.contains(ERROR_PAGE_SENTINEL) => Ok(value),
        _ => {
            tracing::debug!(url, "transient error page detected, re-fetching once");
            let html = fetch_html(session, url).await?;
            extract_blob(&html, blob)
        }
    }
}

async fn fetch_html(session: &HttpSession, url: &str) -> Result<String, Error> {
    let response = session.get(url).await?;
    response
        .text()
        .await
        .map_err(|e| Error::Http(format!("failed to read page body: {e}")))
}

/// Extracts a single named JSON blob from raw HTML.
pub fn extract_blob(html: &str, blob: BlobName) -> Result<serde_json::Value, Error> {
    for anchor in blob.anchors() {
        if let Some(m) = anchor.find(html) {
            // The anchor match ends one character past the opening
            // brace; step back to include it in the scan.
            let brace_start = m.end() - 1;
            if let Some(json_text) = scan_json_value(&html[brace_start..]) {
                return serde_json::from_str(json_text).map_err(|e| Error::Parsing {
                    what: format!("{:?}", blob),
                    detail: e.to_string(),
                });
            }
        }
    }
    Err(Error::Parsing {
        what: format!("{:?}", blob),
        detail: "no matching anchor found in page".to_string(),
    })
}

/// Scans forward from an opening `{` and returns the slice containing
/// exactly one balanced JSON object, honoring string/escape state so
/// braces inside string literals do not confuse the depth count.
/// Trailing script content (`;` and beyond) is ignored, matching the
/// "lenient" extraction spec.md §4.2 calls for.
fn scan_json_value(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    if bytes.first() != Some(&b'{') {
        return None;
    }
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return text.get(..=i);
                }
            }
            _ => {}
        }
    }
    None
}
