// src/utils/dates.rs
use chrono::{Datelike, Duration, NaiveDate, Weekday};

pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses a `YYYY-MM-DD` date.
pub fn parse_iso_date(value: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(value.trim(), ISO_DATE_FORMAT)
}

/// First weekday strictly after `date`.
pub fn next_trading_day(date: NaiveDate) -> NaiveDate {
    step_trading_day(date, 1)
}

/// First weekday strictly before `date`.
pub fn previous_trading_day(date: NaiveDate) -> NaiveDate {
    step_trading_day(date, -1)
}

/// Steps one calendar day in the direction of `day_delta` (only its sign matters),
/// then keeps stepping the same way while the day falls on a weekend.
/// No public holiday calendar is consulted.
pub fn step_trading_day(date: NaiveDate, day_delta: i64) -> NaiveDate {
    let step = Duration::days(if day_delta >= 0 { 1 } else { -1 });
    let mut day = date + step;
    while is_weekend(day) {
        day += step;
    }
    day
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        parse_iso_date(s).unwrap()
    }

    #[test]
    fn friday_steps_over_weekend() {
        assert_eq!(next_trading_day(d("2024-01-05")), d("2024-01-08"));
        assert_eq!(previous_trading_day(d("2024-01-08")), d("2024-01-05"));
    }

    #[test]
    fn midweek_moves_a_single_day() {
        assert_eq!(next_trading_day(d("2024-01-09")), d("2024-01-10"));
        assert_eq!(previous_trading_day(d("2024-01-09")), d("2024-01-08"));
    }

    #[test]
    fn weekend_dates_land_on_nearest_weekday() {
        // Saturday
        assert_eq!(next_trading_day(d("2024-01-06")), d("2024-01-08"));
        assert_eq!(previous_trading_day(d("2024-01-06")), d("2024-01-05"));
        // Sunday
        assert_eq!(previous_trading_day(d("2024-01-07")), d("2024-01-05"));
    }

    #[test]
    fn only_sign_of_delta_matters() {
        assert_eq!(step_trading_day(d("2024-01-05"), 7), d("2024-01-08"));
        assert_eq!(step_trading_day(d("2024-01-05"), 0), d("2024-01-08"));
        assert_eq!(step_trading_day(d("2024-01-08"), -30), d("2024-01-05"));
    }

    #[test]
    fn holidays_are_not_skipped() {
        // 2024-01-01 is a public holiday but still a Monday.
        assert_eq!(next_trading_day(d("2023-12-29")), d("2024-01-01"));
    }

    #[test]
    fn rejects_non_iso_dates() {
        assert!(parse_iso_date("05.01.2024").is_err());
        assert_eq!(parse_iso_date(" 2024-01-05 ").unwrap(), d("2024-01-05"));
    }
}
