//! The four predicate kinds spec.md §4.4 defines, their parsing from
//! one grammar segment, and their runtime evaluation against the
//! abort-state map.

use chatdl_core::state::AbortState;
use chatdl_core::{Clock, Error};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

fn parsing_error(detail: impl Into<String>) -> Error {
    Error::Parsing {
        what: "abort-condition predicate".to_string(),
        detail: detail.into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Either,
    Later,
    Earlier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalPolicy {
    Default,
    Enable,
    Disable,
}

impl SignalPolicy {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "default" => Some(Self::Default),
            "enable" => Some(Self::Enable),
            "disable" => Some(Self::Disable),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Predicate {
    ChangedScheduledStartTime {
        format: String,
        direction: Direction,
    },
    MinTimeUntilScheduledStartTime {
        hours: i64,
        minutes: i64,
    },
    FileExists {
        path: PathBuf,
    },
    /// Not a runtime predicate; a directive routed to the Signal
    /// Router instead of evaluated on every tick (§4.4).
    SignalDirective {
        signal: String,
        policy: SignalPolicy,
    },
}

impl Predicate {
    /// Identity used to reject duplicate predicates within one group
    /// ("Predicate identity is unique within a group").
    pub fn identity(&self) -> String {
        match self {
            Predicate::ChangedScheduledStartTime { .. } => "changed_scheduled_start_time".into(),
            Predicate::MinTimeUntilScheduledStartTime { .. } => {
                "min_time_until_scheduled_start_time".into()
            }
            Predicate::FileExists { path } => format!("file_exists:{}", path.display()),
            Predicate::SignalDirective { signal, .. } => format!("signal:{signal}"),
        }
    }

    pub fn is_signal_directive(&self) -> bool {
        matches!(self, Predicate::SignalDirective { .. })
    }

    pub fn parse(text: &str) -> Result<Predicate, Error> {
        let (name, rest) = match text.find(':') {
            Some(idx) => (&text[..idx], &text[idx + 1..]),
            None => (text, ""),
        };
        if name.is_empty() {
            return Err(parsing_error("empty predicate name"));
        }
        match name {
            "changed_scheduled_start_time" => parse_changed_scheduled_start_time(rest),
            "min_time_until_scheduled_start_time" => parse_min_time_until(rest),
            "file_exists" => parse_file_exists(rest),
            signal_name => parse_signal_directive(signal_name, rest),
        }
    }

    /// Evaluates against the current state, returning a human message
    /// on true, `None` on false (including "state not yet observed").
    pub fn evaluate(
        &self,
        state: &AbortState,
        clock: &dyn Clock,
        file_exists: &dyn Fn(&Path) -> bool,
    ) -> Option<String> {
        match self {
            Predicate::ChangedScheduledStartTime { format, direction } => {
                evaluate_changed_scheduled_start_time(state, format, *direction)
            }
            Predicate::MinTimeUntilScheduledStartTime { hours, minutes } => {
                evaluate_min_time_until(state, clock, *hours, *minutes)
            }
            Predicate::FileExists { path } => evaluate_file_exists(path, file_exists),
            Predicate::SignalDirective { .. } => None,
        }
    }
}

fn parse_changed_scheduled_start_time(rest: &str) -> Result<Predicate, Error> {
    let (direction, format) = match rest.chars().next() {
        Some('+') => (Direction::Later, &rest[1..]),
        Some('-') => (Direction::Earlier, &rest[1..]),
        _ => (Direction::Either, rest),
    };
    if format.is_empty() {
        return Err(parsing_error(
            "changed_scheduled_start_time requires a strftime format",
        ));
    }
    validate_strftime_round_trip(format)?;
    Ok(Predicate::ChangedScheduledStartTime {
        format: format.to_string(),
        direction,
    })
}

/// "The format must round-trip `format -> parse` on an arbitrary
/// datetime; else rejected at parse time."
fn validate_strftime_round_trip(format: &str) -> Result<(), Error> {
    let reference = chrono::NaiveDate::from_ymd_opt(2001, 2, 3)
        .unwrap()
        .and_hms_opt(4, 5, 6)
        .unwrap();
    let formatted = reference.format(format).to_string();
    match chrono::NaiveDateTime::parse_from_str(&formatted, format) {
        Ok(parsed) if parsed == reference => Ok(()),
        _ => Err(parsing_error(format!(
            "format {format:?} does not round-trip through format/parse"
        ))),
    }
}

fn parse_min_time_until(rest: &str) -> Result<Predicate, Error> {
    let mut fields = rest.split(':');
    let hours = fields.next().and_then(|s| s.parse::<i64>().ok());
    let minutes = fields.next().and_then(|s| s.parse::<i64>().ok());
    match (hours, minutes, fields.next()) {
        (Some(hours), Some(minutes), None) => {
            Ok(Predicate::MinTimeUntilScheduledStartTime { hours, minutes })
        }
        _ => Err(parsing_error(
            "min_time_until_scheduled_start_time expects <HH>:<MM>",
        )),
    }
}

fn parse_file_exists(rest: &str) -> Result<Predicate, Error> {
    if rest.is_empty() {
        return Err(parsing_error("file_exists requires a path"));
    }
    Ok(Predicate::FileExists {
        path: PathBuf::from(rest),
    })
}

fn parse_signal_directive(signal_name: &str, rest: &str) -> Result<Predicate, Error> {
    match SignalPolicy::parse(rest) {
        Some(policy) => Ok(Predicate::SignalDirective {
            signal: signal_name.to_string(),
            policy,
        }),
        None => Err(parsing_error(format!(
            "unrecognized predicate or signal policy: {signal_name}:{rest}"
        ))),
    }
}

fn evaluate_changed_scheduled_start_time(
    state: &AbortState,
    format: &str,
    direction: Direction,
) -> Option<String> {
    let orig = state.get("orig_scheduled_start_time")?.as_str()?;
    let current = state.get("scheduled_start_time")?.as_str()?;
    let orig_dt = DateTime::parse_from_rfc3339(orig).ok()?;
    let current_dt = DateTime::parse_from_rfc3339(current).ok()?;

    let orig_fmt = orig_dt.format(format).to_string();
    let current_fmt = current_dt.format(format).to_string();
    if orig_fmt == current_fmt {
        return None;
    }
    let satisfies_direction = match direction {
        Direction::Either => true,
        Direction::Later => current_dt > orig_dt,
        Direction::Earlier => current_dt < orig_dt,
    };
    if !satisfies_direction {
        return None;
    }
    Some(format!(
        "scheduled start time changed from {orig_fmt} to {current_fmt}"
    ))
}

fn evaluate_min_time_until(
    state: &AbortState,
    clock: &dyn Clock,
    hours: i64,
    minutes: i64,
) -> Option<String> {
    let current = state.get("scheduled_start_time")?.as_str()?;
    let scheduled = DateTime::parse_from_rfc3339(current)
        .ok()?
        .with_timezone(&Utc);
    let now = clock.now();
    let threshold = chrono::Duration::hours(hours) + chrono::Duration::minutes(minutes);
    let remaining = scheduled - now;
    if remaining > threshold {
        Some(format!(
            "{} remains until scheduled start, exceeding {hours}:{minutes:02}",
            remaining
        ))
    } else {
        None
    }
}

fn evaluate_file_exists(path: &Path, file_exists: &dyn Fn(&Path) -> bool) -> Option<String> {
    if !file_exists(path) {
        return None;
    }
    let times = std::fs::metadata(path)
        .map(|meta| describe_times(&meta))
        .unwrap_or_default();
    Some(format!("{}{} exists", path.display(), times))
}

fn describe_times(meta: &std::fs::Metadata) -> String {
    let ctime = meta.created().ok().map(|t| DateTime::<Utc>::from(t).to_rfc3339());
    let mtime = meta.modified().ok().map(|t| DateTime::<Utc>::from(t).to_rfc3339());
    match (ctime, mtime) {
        (Some(c), Some(m)) => format!(" (ctime {c}, mtime {m})"),
        (None, Some(m)) => format!(" (mtime {m})"),
        (Some(c), None) => format!(" (ctime {c})"),
        (None, None) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatdl_core::RealClock;
    use serde_json::json;

    #[test]
    fn parses_file_exists() {
        let p = Predicate::parse("file_exists:/tmp/stop").unwrap();
        assert!(matches!(p, Predicate::FileExists { .. }));
    }

    #[test]
    fn parses_min_time_until() {
        let p = Predicate::parse("min_time_until_scheduled_start_time:01:30").unwrap();
        match p {
            Predicate::MinTimeUntilScheduledStartTime { hours, minutes } => {
                assert_eq!(hours, 1);
                assert_eq!(minutes, 30);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn rejects_min_time_until_bad_arity() {
        assert!(Predicate::parse("min_time_until_scheduled_start_time:01").is_err());
    }

    #[test]
    fn parses_changed_scheduled_start_time_with_direction() {
        let p = Predicate::parse("changed_scheduled_start_time:+%Y-%m-%d").unwrap();
        match p {
            Predicate::ChangedScheduledStartTime { format, direction } => {
                assert_eq!(format, "%Y-%m-%d");
                assert_eq!(direction, Direction::Later);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn rejects_non_round_tripping_format() {
        // %V (ISO week) alone cannot reconstruct a full date.
        assert!(Predicate::parse("changed_scheduled_start_time:%V").is_err());
    }

    #[test]
    fn parses_signal_directive() {
        let p = Predicate::parse("SIGINT:disable").unwrap();
        match p {
            Predicate::SignalDirective { signal, policy } => {
                assert_eq!(signal, "SIGINT");
                assert_eq!(policy, SignalPolicy::Disable);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn rejects_unknown_signal_policy() {
        assert!(Predicate::parse("SIGINT:maybe").is_err());
    }

    #[test]
    fn changed_scheduled_start_time_fires_on_difference() {
        let mut state = AbortState::new();
        state.set("orig_scheduled_start_time", json!("2024-01-01T00:00:00Z"));
        state.set("scheduled_start_time", json!("2024-01-02T00:00:00Z"));
        let predicate = Predicate::parse("changed_scheduled_start_time:%Y-%m-%d").unwrap();
        let msg = predicate.evaluate(&state, &RealClock, &|_| false);
        assert!(msg.is_some());
    }

    #[test]
    fn changed_scheduled_start_time_silent_without_state() {
        let state = AbortState::new();
        let predicate = Predicate::parse("changed_scheduled_start_time:%Y-%m-%d").unwrap();
        assert!(predicate.evaluate(&state, &RealClock, &|_| false).is_none());
    }

    #[test]
    fn file_exists_evaluates_via_injected_checker() {
        let predicate = Predicate::parse("file_exists:/tmp/whatever").unwrap();
        let state = AbortState::new();
        assert!(predicate.evaluate(&state, &RealClock, &|_| true).is_some());
        assert!(predicate.evaluate(&state, &RealClock, &|_| false).is_none());
    }
}
