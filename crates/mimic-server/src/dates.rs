//! Date-parameter parsing.
//!
//! Accepted forms: `YYYY-MM-DD`, full ISO-8601 (RFC 3339), the shortcuts
//! `7d`/`30d`/`90d`/… ("now minus N days"), `today` (UTC midnight), and
//! `now`. Anything else is a 400 naming the offending field. The default
//! window is the last 30 days.
//!
//! Date-only bounds are inclusive of the named day on the end side: the
//! store scans half-open ranges, so `end_date=2025-03-05` becomes an
//! exclusive bound of March 6 while the echoed label stays March 5.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

/// Resolved query window: half-open `[from, to)` plus the date labels the
/// response params echo back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub start_label: NaiveDate,
    pub end_label: NaiveDate,
}

/// Default window length when no bounds are given.
const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Resolve the `start_date`/`end_date` pair against "now".
pub fn resolve_window(
    start: Option<&str>,
    end: Option<&str>,
    now: DateTime<Utc>,
) -> Result<DateWindow, String> {
    let (from, _) = match start {
        Some(raw) => parse_bound(raw, now).map_err(|e| format!("invalid start_date: {e}"))?,
        None => (now - TimeDelta::days(DEFAULT_WINDOW_DAYS), false),
    };

    let (end_parsed, end_is_date) = match end {
        Some(raw) => parse_bound(raw, now).map_err(|e| format!("invalid end_date: {e}"))?,
        None => (now, false),
    };

    // A bare date on the end side means "through that whole day".
    let to = if end_is_date {
        end_parsed + TimeDelta::days(1)
    } else {
        end_parsed
    };

    if from > to {
        return Err(format!(
            "start_date {} is after end_date {}",
            from.format("%Y-%m-%d"),
            end_parsed.format("%Y-%m-%d")
        ));
    }

    Ok(DateWindow {
        from,
        to,
        start_label: from.date_naive(),
        end_label: end_parsed.date_naive(),
    })
}

/// Parse one bound. The bool is true when the input named a bare date
/// (which affects end-side inclusivity).
fn parse_bound(raw: &str, now: DateTime<Utc>) -> Result<(DateTime<Utc>, bool), String> {
    let trimmed = raw.trim();

    match trimmed {
        "now" => return Ok((now, false)),
        "today" => {
            let midnight = now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .map(|t| t.and_utc())
                .unwrap_or(now);
            return Ok((midnight, true));
        }
        _ => {}
    }

    if let Some(days) = trimmed.strip_suffix('d') {
        if let Ok(n) = days.parse::<u32>() {
            return Ok((now - TimeDelta::days(i64::from(n)), false));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc())
            .unwrap_or(now);
        return Ok((midnight, true));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok((dt.with_timezone(&Utc), false));
    }

    Err(format!(
        "{trimmed:?} is not a date (expected YYYY-MM-DD, ISO-8601, <N>d, today, or now)"
    ))
}

/// Validate pagination query values against the shared bounds.
pub fn pagination(
    page: Option<usize>,
    page_size: Option<usize>,
    default_page_size: usize,
) -> Result<(usize, usize), String> {
    let page = page.unwrap_or(1);
    if page < 1 {
        return Err("page must be >= 1".to_string());
    }
    let page_size = page_size.unwrap_or(default_page_size);
    if !(1..=1000).contains(&page_size) {
        return Err(format!("page_size must be in 1..=1000, got {page_size}"));
    }
    Ok((page, page_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 10, 30, 0).unwrap()
    }

    #[test]
    fn default_window_is_last_30_days() {
        let window = resolve_window(None, None, now()).expect("window");
        assert_eq!(window.to, now());
        assert_eq!(window.from, now() - TimeDelta::days(30));
        assert_eq!(window.start_label.to_string(), "2025-05-16");
        assert_eq!(window.end_label.to_string(), "2025-06-15");
    }

    #[test]
    fn day_shortcut_and_now() {
        let window = resolve_window(Some("7d"), Some("now"), now()).expect("window");
        assert_eq!(window.from, now() - TimeDelta::days(7));
        assert_eq!(window.to, now());
        assert_eq!(window.start_label, (now() - TimeDelta::days(7)).date_naive());
    }

    #[test]
    fn today_is_utc_midnight() {
        let window = resolve_window(Some("today"), None, now()).expect("window");
        assert_eq!(
            window.from,
            Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn bare_dates_include_the_end_day() {
        let window =
            resolve_window(Some("2025-06-01"), Some("2025-06-10"), now()).expect("window");
        assert_eq!(
            window.from,
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            window.to,
            Utc.with_ymd_and_hms(2025, 6, 11, 0, 0, 0).unwrap(),
            "end is exclusive of the day after"
        );
        assert_eq!(window.end_label.to_string(), "2025-06-10");
    }

    #[test]
    fn rfc3339_bounds_are_exact() {
        let window = resolve_window(
            Some("2025-06-01T08:00:00Z"),
            Some("2025-06-01T17:30:00+02:00"),
            now(),
        )
        .expect("window");
        assert_eq!(
            window.from,
            Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
        );
        assert_eq!(
            window.to,
            Utc.with_ymd_and_hms(2025, 6, 1, 15, 30, 0).unwrap()
        );
    }

    #[test]
    fn garbage_names_the_field() {
        let err = resolve_window(Some("tomorrow-ish"), None, now()).unwrap_err();
        assert!(err.starts_with("invalid start_date:"), "{err}");
        let err = resolve_window(None, Some("06/15/2025"), now()).unwrap_err();
        assert!(err.starts_with("invalid end_date:"), "{err}");
    }

    #[test]
    fn inverted_window_is_rejected() {
        let err = resolve_window(Some("now"), Some("30d"), now()).unwrap_err();
        assert!(err.contains("after end_date"), "{err}");
    }

    #[test]
    fn day_shortcut_requires_digits() {
        assert!(resolve_window(Some("sevend"), None, now()).is_err());
        assert!(resolve_window(Some("-3d"), None, now()).is_err());
        assert!(resolve_window(Some("0d"), None, now()).is_ok());
    }

    #[test]
    fn pagination_defaults_and_bounds() {
        assert_eq!(pagination(None, None, 100).unwrap(), (1, 100));
        assert_eq!(pagination(Some(3), Some(50), 100).unwrap(), (3, 50));
        assert_eq!(pagination(None, Some(1000), 100).unwrap(), (1, 1000));
        assert!(pagination(None, Some(1001), 100).is_err());
        assert!(pagination(None, Some(0), 100).is_err());
        assert!(pagination(Some(0), None, 100).is_err());
    }
}
