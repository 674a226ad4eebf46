// ⏰ Temporal Model - validity windows for register entries
//
// The register carries inclusive dates (YYYYMMDD). Internally every entry
// is valid over a half-open window [valid_from, valid_to), so that
// "valid at t" is always `valid_from <= t && t < valid_to`.

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// DATE PARSING
// ============================================================================

/// Width of a register date field (`YYYYMMDD`)
pub const REGISTER_DATE_LEN: usize = 8;

/// Parse a strict 8-digit `YYYYMMDD` calendar date
///
/// Signs, whitespace and impossible dates (20070231) are rejected.
pub fn parse_register_date(raw: &str) -> Result<NaiveDate, String> {
    if raw.len() != REGISTER_DATE_LEN || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("expected 8-digit date YYYYMMDD, got '{}'", raw));
    }

    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .map_err(|e| format!("invalid calendar date '{}': {}", raw, e))
}

/// Midnight UTC at the start of `date`
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Last year a stored timestamp can carry (four digits)
pub const MAX_STORABLE_YEAR: i32 = 9999;

/// Convert an inclusive end date into the exclusive upper bound
///
/// Calendar arithmetic: the day after `inclusive_end`, at midnight.
/// An end of 9999-12-31 has no storable next midnight, so the bound is
/// clamped to 9999-12-31T23:59:59.999999Z.
/// Returns None only past chrono's maximum representable date.
pub fn to_exclusive_end(inclusive_end: NaiveDate) -> Option<DateTime<Utc>> {
    let next_day = start_of_day(inclusive_end.checked_add_days(Days::new(1))?);
    if next_day.year() > MAX_STORABLE_YEAR {
        return Some(next_day - Duration::microseconds(1));
    }
    Some(next_day)
}

// ============================================================================
// VALIDITY WINDOW
// ============================================================================

/// Half-open validity interval `[valid_from, valid_to)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidityWindow {
    valid_from: DateTime<Utc>,
    valid_to: DateTime<Utc>,
}

impl ValidityWindow {
    /// Build a window from the register's inclusive start/end dates
    ///
    /// An end date before the start date is rejected, which keeps
    /// `valid_from < valid_to` for every window.
    pub fn from_inclusive_dates(from: NaiveDate, to_inclusive: NaiveDate) -> Result<Self, String> {
        if to_inclusive < from {
            return Err(format!(
                "valid-to {} is before valid-from {}",
                to_inclusive, from
            ));
        }

        let valid_to = to_exclusive_end(to_inclusive)
            .ok_or_else(|| format!("valid-to {} is out of range", to_inclusive))?;

        Ok(ValidityWindow {
            valid_from: start_of_day(from),
            valid_to,
        })
    }

    pub fn valid_from(&self) -> DateTime<Utc> {
        self.valid_from
    }

    pub fn valid_to(&self) -> DateTime<Utc> {
        self.valid_to
    }

    /// Check if the window covers a specific instant
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.valid_from <= time && time < self.valid_to
    }

    /// An entry is expired (invalidated) once its exclusive end has passed
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_to <= now
    }

    pub fn overlaps(&self, other: &ValidityWindow) -> bool {
        self.valid_from < other.valid_to && other.valid_from < self.valid_to
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(raw: &str) -> NaiveDate {
        parse_register_date(raw).unwrap()
    }

    #[test]
    fn test_parse_register_date() {
        assert_eq!(date("19760401"), NaiveDate::from_ymd_opt(1976, 4, 1).unwrap());
        assert_eq!(date("25000101"), NaiveDate::from_ymd_opt(2500, 1, 1).unwrap());
    }

    #[test]
    fn test_parse_register_date_rejects_garbage() {
        assert!(parse_register_date("2007023").is_err());
        assert!(parse_register_date("20070231").is_err());
        assert!(parse_register_date("2007-2-1").is_err());
        assert!(parse_register_date("        ").is_err());
        assert!(parse_register_date("+2007021").is_err());
    }

    #[test]
    fn test_exclusive_end_is_next_midnight() {
        let end = to_exclusive_end(date("25000101")).unwrap();
        assert_eq!(end, Utc.with_ymd_and_hms(2500, 1, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_exclusive_end_crosses_month_and_leap_day() {
        assert_eq!(
            to_exclusive_end(date("20040228")).unwrap(),
            Utc.with_ymd_and_hms(2004, 2, 29, 0, 0, 0).unwrap()
        );
        assert_eq!(
            to_exclusive_end(date("20031231")).unwrap(),
            Utc.with_ymd_and_hms(2004, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_window_bounds() {
        let window = ValidityWindow::from_inclusive_dates(date("19760401"), date("25000101")).unwrap();

        let last_invalid = Utc.with_ymd_and_hms(1976, 3, 31, 23, 59, 59).unwrap();
        let first_second = Utc.with_ymd_and_hms(1976, 4, 1, 0, 0, 1).unwrap();
        assert!(window.valid_from() > last_invalid);
        assert!(window.valid_from() < first_second);

        let last_valid = Utc.with_ymd_and_hms(2500, 1, 1, 23, 59, 59).unwrap();
        let first_invalid = Utc.with_ymd_and_hms(2500, 1, 2, 0, 0, 1).unwrap();
        assert!(window.valid_to() > last_valid);
        assert!(window.valid_to() < first_invalid);
    }

    #[test]
    fn test_exclusive_end_at_the_last_storable_day() {
        assert_eq!(
            to_exclusive_end(date("99991230")).unwrap(),
            Utc.with_ymd_and_hms(9999, 12, 31, 0, 0, 0).unwrap()
        );

        let clamped = to_exclusive_end(date("99991231")).unwrap();
        assert_eq!(clamped.year(), MAX_STORABLE_YEAR);
        assert_eq!(clamped, Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap() - Duration::microseconds(1));

        let window = ValidityWindow::from_inclusive_dates(date("19760401"), date("99991231")).unwrap();
        assert!(window.contains(Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap()));
        assert!(!window.is_expired_at(Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_single_day_window() {
        let window = ValidityWindow::from_inclusive_dates(date("20000101"), date("20000101")).unwrap();

        assert!(window.valid_from() < window.valid_to());
        assert!(window.contains(Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap()));
        assert!(!window.contains(Utc.with_ymd_and_hms(2000, 1, 2, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_end_before_start_rejected() {
        assert!(ValidityWindow::from_inclusive_dates(date("20000102"), date("20000101")).is_err());
    }

    #[test]
    fn test_expiry_and_overlap() {
        let old = ValidityWindow::from_inclusive_dates(date("20000101"), date("20031231")).unwrap();
        let new = ValidityWindow::from_inclusive_dates(date("20040101"), date("25000101")).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap();

        assert!(old.is_expired_at(now));
        assert!(!new.is_expired_at(now));
        assert!(!old.overlaps(&new));
        assert!(old.overlaps(&old));
        assert!(old.is_expired_at(old.valid_to()));
    }
}
