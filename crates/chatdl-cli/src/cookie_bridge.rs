//! Glue between [`chatdl_http::cookies`]'s Netscape file format and
//! `reqwest`'s in-memory cookie jar (spec.md §4.1).

use chatdl_core::{Error, Platform};
use chatdl_http::cookies::NetscapeCookie;
use chatdl_http::HttpSession;
use reqwest::cookie::CookieStore;
use reqwest::Url;
use std::path::Path;

fn platform_origin(platform: Platform) -> &'static str {
    match platform {
        Platform::YouTube => "https://www.youtube.com",
        Platform::Twitch => "https://www.twitch.tv",
    }
}

/// Loads `path` and seeds every cookie into `session`'s jar.
pub fn load(session: &HttpSession, path: &Path) -> Result<(), Error> {
    let cookies = chatdl_http::load_cookie_file(path)?;
    for cookie in &cookies {
        let origin_host = cookie.domain.trim_start_matches('.');
        let url = Url::parse(&format!("https://{origin_host}"))
            .map_err(|e| Error::CookieError(format!("invalid cookie domain {origin_host}: {e}")))?;
        session.set_cookie(&url, &cookie.as_set_cookie_header());
    }
    Ok(())
}

/// Reads back whatever cookies `reqwest`'s jar currently holds for
/// the run's platform origin and writes them to `path` in Netscape
/// format.
///
/// `reqwest::cookie::Jar` only exposes the final `Cookie:` header for
/// a given URL, not individual attributes (path/expiry/secure), so
/// round-tripped cookies lose those and are written with
/// conservative defaults (`path=/`, `secure=true`, session expiry).
pub fn save(session: &HttpSession, platform: Platform, path: &Path) -> Result<(), Error> {
    let origin = platform_origin(platform);
    let url = Url::parse(origin).expect("platform origin is a valid URL");
    let domain = url.host_str().unwrap_or_default();

    let header = session.cookie_jar().cookies(&url);
    let mut cookies = Vec::new();
    if let Some(value) = header {
        let text = value.to_str().unwrap_or_default();
        for pair in text.split(';') {
            let pair = pair.trim();
            if let Some((name, value)) = pair.split_once('=') {
                cookies.push(NetscapeCookie {
                    domain: format!(".{domain}"),
                    include_subdomains: true,
                    path: "/".to_string(),
                    secure: true,
                    expires: 0,
                    name: name.trim().to_string(),
                    value: value.trim().to_string(),
                });
            }
        }
    }
    chatdl_http::save_cookie_file(path, &cookies)
}
