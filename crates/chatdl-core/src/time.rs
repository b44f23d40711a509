//! `time_text` <-> `time_in_seconds` conversion (spec.md §4.3 step 7,
//! §8 testable properties).

/// Reverse-split on `:`, `60^i`-weighted sum, negated if the first
/// character of the original string is `-`.
///
/// `time_to_seconds("01:02:03") == 3723`, `time_to_seconds("-00:30") == -30`.
pub fn time_to_seconds(time_text: &str) -> Option<i64> {
    let negative = time_text.starts_with('-');
    let trimmed = if negative { &time_text[1..] } else { time_text };
    if trimmed.is_empty() {
        return None;
    }
    let mut total: i64 = 0;
    let mut weight: i64 = 1;
    for part in trimmed.rsplit(':') {
        let value: i64 = part.parse().ok()?;
        total += value * weight;
        weight *= 60;
    }
    Some(if negative { -total } else { total })
}

/// Inverse of [`time_to_seconds`] for non-negative inputs:
/// `seconds_to_time(3723) == "1:02:03"`.
pub fn seconds_to_time(mut seconds: i64) -> String {
    let negative = seconds < 0;
    if negative {
        seconds = -seconds;
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    let body = if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    };
    if negative {
        format!("-{}", body)
    } else {
        body
    }
}
