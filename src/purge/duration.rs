use chrono::{DateTime, Duration, Months, Utc};
use regex::Regex;

use crate::common::errors::{PurgeError, PurgeResult};

/// Compute the absolute cutoff for `expr` relative to `now`.
///
/// `expr` is one or more `<integer><unit>` tokens, unit in y/mo/d/h/m/s,
/// e.g. "6mo", "1y6mo", "90d". Years and months subtract calendar units;
/// days and smaller subtract fixed durations. Tokens apply in the order
/// they appear, which matters around month and day boundaries and is
/// deliberately not normalized.
///
/// Every non-whitespace character must belong to a token, and the result
/// must land strictly before `now`; anything else is `InvalidDuration`.
pub fn cutoff_before(expr: &str, now: DateTime<Utc>) -> PurgeResult<DateTime<Utc>> {
    let token = Regex::new(r"(\d+)(y|mo|d|h|m|s)").expect("token pattern is valid");
    let invalid = || PurgeError::InvalidDuration(expr.to_string());

    let mut cutoff = now;
    let mut consumed = 0usize;
    for caps in token.captures_iter(expr) {
        let whole = caps.get(0).expect("capture 0 is the whole match");
        consumed += whole.as_str().len();

        let count: u32 = caps[1].parse().map_err(|_| invalid())?;
        cutoff = match &caps[2] {
            "y" => cutoff.checked_sub_months(Months::new(count.saturating_mul(12))),
            "mo" => cutoff.checked_sub_months(Months::new(count)),
            "d" => cutoff.checked_sub_signed(Duration::days(count as i64)),
            "h" => cutoff.checked_sub_signed(Duration::hours(count as i64)),
            "m" => cutoff.checked_sub_signed(Duration::minutes(count as i64)),
            "s" => cutoff.checked_sub_signed(Duration::seconds(count as i64)),
            _ => None,
        }
        .ok_or_else(invalid)?;
    }

    let expected = expr.bytes().filter(|b| !b.is_ascii_whitespace()).count();
    if consumed == 0 || consumed != expected {
        return Err(invalid());
    }
    if cutoff >= now {
        return Err(invalid());
    }
    Ok(cutoff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_calendar_units() {
        let now = at(2024, 6, 15);
        assert_eq!(cutoff_before("1y6mo", now).unwrap(), at(2022, 12, 15));
        assert_eq!(cutoff_before("1y", now).unwrap(), at(2023, 6, 15));
        assert_eq!(cutoff_before("6mo", now).unwrap(), at(2023, 12, 15));
    }

    #[test]
    fn test_fixed_units() {
        let now = at(2024, 6, 15);
        assert_eq!(cutoff_before("90d", now).unwrap(), at(2024, 3, 17));
        assert_eq!(
            cutoff_before("36h", now).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 13, 12, 0, 0).unwrap()
        );
        assert_eq!(
            cutoff_before("45m30s", now).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 14, 23, 14, 30).unwrap()
        );
    }

    #[test]
    fn test_tokens_apply_in_input_order() {
        // Month subtraction clamps at short months, so order is visible
        // around the end of March.
        let now = at(2024, 3, 31);
        assert_eq!(cutoff_before("1mo1d", now).unwrap(), at(2024, 2, 28));
        assert_eq!(cutoff_before("1d1mo", now).unwrap(), at(2024, 2, 29));
    }

    #[test]
    fn test_deterministic_for_fixed_now() {
        let now = at(2024, 6, 15);
        assert_eq!(
            cutoff_before("2y3mo10d", now).unwrap(),
            cutoff_before("2y3mo10d", now).unwrap()
        );
    }

    #[test]
    fn test_cutoff_strictly_before_now() {
        let now = at(2024, 6, 15);
        for expr in ["1y6mo", "90d", "1h", "30s", "1y1d"] {
            assert!(cutoff_before(expr, now).unwrap() < now, "expr {}", expr);
        }
    }

    #[test]
    fn test_invalid_expressions() {
        let now = at(2024, 6, 15);
        for expr in ["", "soon", "1w", "mo", "1y3x", "6 months"] {
            let err = cutoff_before(expr, now).unwrap_err();
            assert!(matches!(err, PurgeError::InvalidDuration(_)), "expr {}", expr);
        }
    }

    #[test]
    fn test_zero_magnitude_rejected() {
        let now = at(2024, 6, 15);
        assert!(cutoff_before("0d", now).is_err());
        assert!(cutoff_before("0y0s", now).is_err());
    }
}
