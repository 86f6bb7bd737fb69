//! Usage statistic computation
//!
//! Counts appointment/callback/feedback/user records over a period and, for
//! the canned periods, the percentage change versus the immediately
//! preceding period of identical length. The previous period is the literal
//! fixed offset (one more delta back), not a calendar-aligned one.

use chrono::{Duration, Months, NaiveDateTime};

use crate::core::error::AppResult;
use crate::storage::directory::{ConsultationType, DateRange, Directory, StatTable};

/// Canned statistic periods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Period {
    /// Callback-data argument for the period
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::Quarter => "quarter",
            Period::Year => "year",
        }
    }

    pub fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "day" => Some(Period::Day),
            "week" => Some(Period::Week),
            "month" => Some(Period::Month),
            "quarter" => Some(Period::Quarter),
            "year" => Some(Period::Year),
            _ => None,
        }
    }

    /// Subtracts one period length from `point`.
    ///
    /// Month-based periods clamp the day like `relativedelta` does
    /// (Mar 31 − 1 month = Feb 28/29).
    pub fn subtract_from(&self, point: NaiveDateTime) -> NaiveDateTime {
        match self {
            Period::Day => point - Duration::hours(24),
            Period::Week => point - Duration::days(7),
            Period::Month => point.checked_sub_months(Months::new(1)).unwrap_or(point),
            Period::Quarter => point.checked_sub_months(Months::new(3)).unwrap_or(point),
            Period::Year => point.checked_sub_months(Months::new(12)).unwrap_or(point),
        }
    }
}

/// Aggregated counts for one period, with optional change vs. the previous
/// equal-length period. Feedback never carries a change figure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatReport {
    pub online: i64,
    pub offline: i64,
    pub callbacks: i64,
    pub feedbacks: i64,
    pub new_users: i64,
    pub online_change: Option<f64>,
    pub offline_change: Option<f64>,
    pub callback_change: Option<f64>,
    pub new_users_change: Option<f64>,
}

/// Percentage change of `current` versus `previous`: `(cur / prev) * 100 - 100`.
///
/// A zero previous period is special-cased: no growth when both are zero,
/// otherwise clamped to 100 ("infinite growth"). Values under 100 in
/// magnitude keep one decimal place, larger ones are truncated to a whole
/// number.
pub fn percent_change(current: i64, previous: i64) -> f64 {
    if previous == 0 {
        return if current == 0 { 0.0 } else { 100.0 };
    }
    let raw = current as f64 / previous as f64 * 100.0 - 100.0;
    if raw.abs() < 100.0 {
        (raw * 10.0).round() / 10.0
    } else {
        raw.trunc()
    }
}

/// Collects counts for `[start, end)`; when `with_change` is set also counts
/// `[prev_start, start)` and fills the change fields.
pub async fn collect(
    directory: &dyn Directory,
    start: NaiveDateTime,
    end: NaiveDateTime,
    prev_start: Option<NaiveDateTime>,
) -> AppResult<StatReport> {
    let range = DateRange { start, end };
    let mut report = StatReport {
        online: count(directory, StatTable::Appointments, &range, Some(ConsultationType::Online)).await?,
        offline: count(directory, StatTable::Appointments, &range, Some(ConsultationType::Offline)).await?,
        callbacks: count(directory, StatTable::Callbacks, &range, None).await?,
        feedbacks: count(directory, StatTable::Feedbacks, &range, None).await?,
        new_users: count(directory, StatTable::Users, &range, None).await?,
        ..StatReport::default()
    };

    if let Some(prev_start) = prev_start {
        let prev = DateRange { start: prev_start, end: start };
        report.online_change = Some(percent_change(
            report.online,
            count(directory, StatTable::Appointments, &prev, Some(ConsultationType::Online)).await?,
        ));
        report.offline_change = Some(percent_change(
            report.offline,
            count(directory, StatTable::Appointments, &prev, Some(ConsultationType::Offline)).await?,
        ));
        report.callback_change = Some(percent_change(
            report.callbacks,
            count(directory, StatTable::Callbacks, &prev, None).await?,
        ));
        report.new_users_change = Some(percent_change(
            report.new_users,
            count(directory, StatTable::Users, &prev, None).await?,
        ));
    }

    Ok(report)
}

async fn count(
    directory: &dyn Directory,
    table: StatTable,
    range: &DateRange,
    consultation: Option<ConsultationType>,
) -> AppResult<i64> {
    directory.count_records(table, range, consultation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    #[test]
    fn change_clamps_division_by_zero() {
        assert_eq!(percent_change(10, 0), 100.0);
        assert_eq!(percent_change(0, 0), 0.0);
    }

    #[test]
    fn change_keeps_one_decimal_under_hundred() {
        assert_eq!(percent_change(15, 10), 50.0);
        assert_eq!(percent_change(5, 500), -99.0);
        assert_eq!(percent_change(1, 3), -66.7);
    }

    #[test]
    fn change_truncates_at_hundred_and_beyond() {
        assert_eq!(percent_change(30, 10), 200.0);
        assert_eq!(percent_change(25, 10), 150.0);
        assert_eq!(percent_change(7, 2), 250.0);
    }

    #[test]
    fn month_subtraction_clamps_day() {
        let point = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap().and_hms_opt(12, 0, 0).unwrap();
        let prev = Period::Month.subtract_from(point);
        assert_eq!(prev.date(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn day_and_week_are_fixed_offsets() {
        let point = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap().and_hms_opt(8, 30, 0).unwrap();
        assert_eq!(Period::Day.subtract_from(point), point - Duration::hours(24));
        assert_eq!(Period::Week.subtract_from(point), point - Duration::days(7));
    }
}
