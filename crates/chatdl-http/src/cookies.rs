//! Netscape-format cookie file load/save, and the `CookieSource`
//! capability boundary the engine consumes (spec.md §1, §4.1).
//!
//! Browser-profile extraction is deliberately left unimplemented: the
//! on-disk format differs per OS and browser and decrypting it is out
//! of this engine's scope (SPEC_FULL.md §9 Open Questions). The trait
//! exists so a future collaborator can add it without touching
//! `HttpSession`.

use chatdl_core::Error;
use std::io::Write;
use std::path::Path;

/// One row of a Netscape cookie file: seven tab-separated fields.
#[derive(Debug, Clone, PartialEq)]
pub struct NetscapeCookie {
    pub domain: String,
    pub include_subdomains: bool,
    pub path: String,
    pub secure: bool,
    pub expires: i64,
    pub name: String,
    pub value: String,
}

impl NetscapeCookie {
    fn parse_line(line: &str) -> Option<Self> {
        if line.trim().is_empty() || line.starts_with('#') {
            return None;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 7 {
            return None;
        }
        Some(Self {
            domain: fields[0].to_string(),
            include_subdomains: fields[1] == "TRUE",
            path: fields[2].to_string(),
            secure: fields[3] == "TRUE",
            expires: fields[4].parse().ok()?,
            name: fields[5].to_string(),
            value: fields[6].to_string(),
        })
    }

    fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.domain,
            bool_field(self.include_subdomains),
            self.path,
            bool_field(self.secure),
            self.expires,
            self.name,
            self.value
        )
    }

    /// Renders as a `Set-Cookie`-shaped string suitable for
    /// `reqwest::cookie::Jar::add_cookie_str`.
    pub fn as_set_cookie_header(&self) -> String {
        let mut parts = vec![format!("{}={}", self.name, self.value)];
        parts.push(format!("Domain={}", self.domain));
        parts.push(format!("Path={}", self.path));
        if self.secure {
            parts.push("Secure".to_string());
        }
        parts.join("; ")
    }
}

fn bool_field(b: bool) -> &'static str {
    if b { "TRUE" } else { "FALSE" }
}

const NETSCAPE_HEADER: &str = "# Netscape HTTP Cookie File\n";

/// Loads a Netscape-format cookie file. Malformed or comment lines are
/// skipped; an unreadable file is a `CookieError` (fatal at
/// construction per §7).
pub fn load_cookie_file(path: &Path) -> Result<Vec<NetscapeCookie>, Error> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::CookieError(format!("failed to read cookie file: {e}")))?;
    Ok(contents.lines().filter_map(NetscapeCookie::parse_line).collect())
}

/// Writes cookies back out in the same format (`--save_cookies`).
pub fn save_cookie_file(path: &Path, cookies: &[NetscapeCookie]) -> Result<(), Error> {
    let mut out = String::from(NETSCAPE_HEADER);
    for cookie in cookies {
        out.push_str(&cookie.to_line());
        out.push('\n');
    }
    let mut file = std::fs::File::create(path)
        .map_err(|e| Error::CookieError(format!("failed to create cookie file: {e}")))?;
    file.write_all(out.as_bytes())
        .map_err(|e| Error::CookieError(format!("failed to write cookie file: {e}")))?;
    Ok(())
}

/// Where session cookies come from for a given run.
pub enum CookieSource {
    /// Netscape-format cookie file on disk.
    File(std::path::PathBuf),
    /// Extraction from an installed browser's cookie store, keyed by
    /// browser name (e.g. `"chrome"`, `"firefox"`). Not implemented;
    /// see module docs.
    Browser(String),
    /// No cookies; public/unauthenticated access only.
    None,
}

impl CookieSource {
    pub fn load(&self) -> Result<Vec<NetscapeCookie>, Error> {
        match self {
            CookieSource::File(path) => load_cookie_file(path),
            CookieSource::Browser(name) => Err(Error::CookieError(format!(
                "browser cookie extraction unsupported for '{name}': decrypting a browser's \
                 cookie store is OS/browser-specific and out of scope for this engine"
            ))),
            CookieSource::None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn round_trips_netscape_file() {
        let cookies = vec![NetscapeCookie {
            domain: ".youtube.com".into(),
            include_subdomains: true,
            path: "/".into(),
            secure: true,
            expires: 1893456000,
            name: "SID".into(),
            value: "abc123".into(),
        }];
        let file = NamedTempFile::new().unwrap();
        save_cookie_file(file.path(), &cookies).unwrap();
        let loaded = load_cookie_file(file.path()).unwrap();
        assert_eq!(loaded, cookies);
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            "# Netscape HTTP Cookie File\n\n.youtube.com\tTRUE\t/\tTRUE\t0\tSID\tabc\n",
        )
        .unwrap();
        let loaded = load_cookie_file(file.path()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "SID");
    }

    #[test]
    fn browser_source_is_explicitly_unsupported() {
        let err = CookieSource::Browser("chrome".into()).load().unwrap_err();
        assert!(matches!(err, Error::CookieError(_)));
    }
}
