//! Freshness header helpers.

use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// Formats `at` as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Whole seconds of `remaining`, rounded to nearest and never negative.
pub fn max_age_secs(remaining: ChronoDuration) -> i64 {
    let ms = remaining.num_milliseconds().max(0);
    (ms + 500) / 1000
}
