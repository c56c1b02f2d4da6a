// Forecast date resolution

use crate::coordination::errors::EnrichmentError;
use chrono::{NaiveDate, TimeDelta};

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

/// Resolve a trigger's date hint against `today`.
///
/// Accepts nothing (today), a signed day offset within `max_days`, or a
/// calendar date in `YYYY-MM-DD` / `YYYY/MM/DD` form.
pub fn resolve_date(hint: Option<&str>, today: NaiveDate, max_days: i64) -> Result<NaiveDate, EnrichmentError> {
    let hint = match hint.map(str::trim) {
        None | Some("") => return Ok(today),
        Some(hint) => hint,
    };

    if let Ok(offset) = hint.parse::<i64>() {
        if offset.unsigned_abs() > max_days.unsigned_abs() {
            return Err(invalid(hint, format!("day offset must be within ±{}", max_days.unsigned_abs())));
        }
        return TimeDelta::try_days(offset)
            .and_then(|delta| today.checked_add_signed(delta))
            .ok_or_else(|| invalid(hint, "day offset out of range".to_string()));
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(hint, format).ok())
        .ok_or_else(|| invalid(hint, "expected a day offset, YYYY-MM-DD or YYYY/MM/DD".to_string()))
}

fn invalid(input: &str, reason: String) -> EnrichmentError {
    EnrichmentError::InvalidDate {
        input: input.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[test]
    fn empty_hint_means_today() {
        assert_eq!(resolve_date(None, today(), 15).unwrap(), today());
        assert_eq!(resolve_date(Some("  "), today(), 15).unwrap(), today());
    }

    #[test]
    fn offsets_are_relative_to_today() {
        assert_eq!(
            resolve_date(Some("1"), today(), 15).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
        );
        assert_eq!(
            resolve_date(Some("-2"), today(), 15).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 14).unwrap()
        );
    }

    #[test]
    fn offsets_beyond_the_forecast_window_are_rejected() {
        let err = resolve_date(Some("16"), today(), 15).unwrap_err();
        assert!(matches!(err, EnrichmentError::InvalidDate { .. }));
    }

    #[test]
    fn extreme_offsets_are_rejected_not_panicking() {
        for hint in ["-9223372036854775808", "9223372036854775807"] {
            let err = resolve_date(Some(hint), today(), 15).unwrap_err();
            assert!(matches!(err, EnrichmentError::InvalidDate { .. }), "{hint}");
        }
    }

    #[test]
    fn oversized_window_still_fails_cleanly() {
        for hint in ["-9223372036854775808", "9223372036854775807", "4000000000000"] {
            let err = resolve_date(Some(hint), today(), i64::MAX).unwrap_err();
            assert!(matches!(err, EnrichmentError::InvalidDate { .. }), "{hint}");
        }
    }

    #[test]
    fn both_calendar_formats_parse() {
        let expected = NaiveDate::from_ymd_opt(2026, 12, 24).unwrap();
        assert_eq!(resolve_date(Some("2026-12-24"), today(), 15).unwrap(), expected);
        assert_eq!(resolve_date(Some("2026/12/24"), today(), 15).unwrap(), expected);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(resolve_date(Some("next tuesday"), today(), 15).is_err());
        assert!(resolve_date(Some("2026-13-01"), today(), 15).is_err());
    }

    proptest! {
        #[test]
        fn offsets_inside_window_always_resolve(offset in -15i64..=15) {
            let resolved = resolve_date(Some(&offset.to_string()), today(), 15).unwrap();
            prop_assert_eq!((resolved - today()).num_days(), offset);
        }
    }
}
