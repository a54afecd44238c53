use chrono::{DateTime, NaiveDate, TimeZone as _, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// Date pattern used for update times when none is configured.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Uses the `iana-time-zone` crate directly – no subprocess calls.
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Resolve a configured timezone name into a [`Tz`].
///
/// `"auto"` (any case) means the system timezone. Unknown names fall back to
/// UTC with a warning.
pub fn resolve_timezone(name: &str) -> Tz {
    let name = if name.eq_ignore_ascii_case("auto") {
        get_system_timezone()
    } else {
        name.to_string()
    };

    name.parse::<Tz>().unwrap_or_else(|_| {
        warn!("unrecognised timezone \"{}\", falling back to UTC", name);
        Tz::UTC
    })
}

// ── UpdateTimeFormat ──────────────────────────────────────────────────────────

/// Renders upstream epoch timestamps as the date string shown in notifications.
#[derive(Debug, Clone)]
pub struct UpdateTimeFormat {
    tz: Tz,
    pattern: String,
}

impl UpdateTimeFormat {
    /// Create a formatter for `tz` using a `strftime` `pattern`.
    pub fn new(tz: Tz, pattern: impl Into<String>) -> Self {
        Self {
            tz,
            pattern: pattern.into(),
        }
    }

    /// Format `secs` (Unix epoch seconds) in the configured timezone.
    ///
    /// Out-of-range timestamps render as an empty string rather than failing
    /// the notification.
    pub fn format_epoch(&self, secs: i64) -> String {
        match DateTime::<Utc>::from_timestamp(secs, 0) {
            Some(dt) => dt.with_timezone(&self.tz).format(&self.pattern).to_string(),
            None => String::new(),
        }
    }

    /// The timezone this formatter renders into.
    pub fn timezone(&self) -> Tz {
        self.tz
    }
}

impl Default for UpdateTimeFormat {
    fn default() -> Self {
        Self::new(Tz::UTC, DEFAULT_DATE_FORMAT)
    }
}

// ── Upstream date parsing ─────────────────────────────────────────────────────

/// Convert a `MM/DD` date (no year) into epoch seconds at UTC midnight of
/// that day in `year`.
///
/// Returns `None` for anything that is not a valid calendar date.
pub fn month_day_to_epoch(date: &str, year: i32) -> Option<i64> {
    let full = format!("{}/{}", year, date.trim());
    let day = NaiveDate::parse_from_str(&full, "%Y/%m/%d").ok()?;
    let midnight = day.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight).timestamp())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── resolve_timezone ─────────────────────────────────────────────────────

    #[test]
    fn test_resolve_timezone_valid() {
        assert_eq!(resolve_timezone("Europe/Berlin"), Tz::Europe__Berlin);
        assert_eq!(resolve_timezone("UTC"), Tz::UTC);
    }

    #[test]
    fn test_resolve_timezone_invalid_falls_back_to_utc() {
        assert_eq!(resolve_timezone("Mars/Olympus"), Tz::UTC);
        assert_eq!(resolve_timezone(""), Tz::UTC);
    }

    #[test]
    fn test_resolve_timezone_auto_does_not_panic() {
        // Whatever the host reports, the result must be a usable zone.
        let tz = resolve_timezone("AUTO");
        let _ = Utc::now().with_timezone(&tz);
    }

    // ── UpdateTimeFormat ─────────────────────────────────────────────────────

    #[test]
    fn test_format_epoch_utc() {
        let fmt = UpdateTimeFormat::new(Tz::UTC, DEFAULT_DATE_FORMAT);
        // 2024-03-01T00:00:00Z
        assert_eq!(fmt.format_epoch(1_709_251_200), "2024-03-01");
    }

    #[test]
    fn test_format_epoch_respects_timezone() {
        // 2024-03-01T02:00:00Z is still Feb 29 in New York.
        let fmt = UpdateTimeFormat::new(Tz::America__New_York, DEFAULT_DATE_FORMAT);
        assert_eq!(fmt.format_epoch(1_709_258_400), "2024-02-29");
    }

    #[test]
    fn test_format_epoch_custom_pattern() {
        let fmt = UpdateTimeFormat::new(Tz::UTC, "%d.%m.%Y %H:%M");
        assert_eq!(fmt.format_epoch(1_709_258_400), "01.03.2024 02:00");
    }

    #[test]
    fn test_format_epoch_out_of_range_is_empty() {
        let fmt = UpdateTimeFormat::default();
        assert_eq!(fmt.format_epoch(i64::MAX), "");
    }

    #[test]
    fn test_default_format_is_utc_date() {
        let fmt = UpdateTimeFormat::default();
        assert_eq!(fmt.timezone(), Tz::UTC);
        assert_eq!(fmt.format_epoch(0), "1970-01-01");
    }

    // ── month_day_to_epoch ───────────────────────────────────────────────────

    #[test]
    fn test_month_day_to_epoch_valid() {
        assert_eq!(month_day_to_epoch("03/01", 2024), Some(1_709_251_200));
        assert_eq!(month_day_to_epoch(" 03/01 ", 2024), Some(1_709_251_200));
    }

    #[test]
    fn test_month_day_to_epoch_leap_day() {
        assert!(month_day_to_epoch("02/29", 2024).is_some());
        assert!(month_day_to_epoch("02/29", 2023).is_none());
    }

    #[test]
    fn test_month_day_to_epoch_garbage() {
        assert!(month_day_to_epoch("", 2024).is_none());
        assert!(month_day_to_epoch("13/40", 2024).is_none());
        assert!(month_day_to_epoch("yesterday", 2024).is_none());
    }

    // ── get_system_timezone ──────────────────────────────────────────────────

    #[test]
    fn test_get_system_timezone_returns_nonempty_string() {
        let tz = get_system_timezone();
        assert!(!tz.is_empty(), "system timezone should not be empty");
    }
}
