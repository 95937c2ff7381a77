//! Calendar bucketing for daily and monthly series.

use chrono::{Datelike, Duration, Months, NaiveDate};

use crate::models::enums::Granularity;
use crate::models::DateRange;

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// The bucket a date falls into: the date itself for daily series,
/// the first of its month for monthly series.
pub fn bucket_start(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Daily => date,
        Granularity::Monthly => month_start(date),
    }
}

/// The bucket `steps` periods after `bucket`. Saturates at the calendar limit.
pub fn step_bucket(bucket: NaiveDate, granularity: Granularity, steps: u32) -> NaiveDate {
    match granularity {
        Granularity::Daily => bucket
            .checked_add_signed(Duration::days(i64::from(steps)))
            .unwrap_or(NaiveDate::MAX),
        Granularity::Monthly => month_start(bucket)
            .checked_add_months(Months::new(steps))
            .unwrap_or(NaiveDate::MAX),
    }
}

/// The bucket `steps` periods before `bucket`. Saturates at the calendar limit.
pub fn step_bucket_back(bucket: NaiveDate, granularity: Granularity, steps: u32) -> NaiveDate {
    match granularity {
        Granularity::Daily => bucket
            .checked_sub_signed(Duration::days(i64::from(steps)))
            .unwrap_or(NaiveDate::MIN),
        Granularity::Monthly => month_start(bucket)
            .checked_sub_months(Months::new(steps))
            .unwrap_or(NaiveDate::MIN),
    }
}

/// Every bucket start touching `range`, ascending and without gaps.
pub fn buckets_in_range(range: &DateRange, granularity: Granularity) -> Vec<NaiveDate> {
    let mut buckets = Vec::new();
    let mut current = bucket_start(range.start, granularity);
    while current <= range.end {
        buckets.push(current);
        let next = step_bucket(current, granularity, 1);
        if next == current {
            break;
        }
        current = next;
    }
    buckets
}

/// Date range covering the `periods` buckets that end with the bucket
/// containing `as_of`. For monthly series the range runs through the last
/// day of `as_of`'s month.
pub fn window_ending_at(as_of: NaiveDate, periods: u32, granularity: Granularity) -> DateRange {
    let last_bucket = bucket_start(as_of, granularity);
    let first_bucket = step_bucket_back(last_bucket, granularity, periods.saturating_sub(1));
    let end = match granularity {
        Granularity::Daily => last_bucket,
        Granularity::Monthly => step_bucket(last_bucket, granularity, 1)
            .pred_opt()
            .unwrap_or(last_bucket),
    };
    DateRange { start: first_bucket, end }
}

/// Date range covering the `periods` buckets after `last_bucket`.
/// Returns `None` when `periods` is zero.
pub fn range_after(last_bucket: NaiveDate, periods: u32, granularity: Granularity) -> Option<DateRange> {
    if periods == 0 {
        return None;
    }
    let start = step_bucket(last_bucket, granularity, 1);
    let end = step_bucket(last_bucket, granularity, periods);
    DateRange::new(start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn monthly_step_crosses_year_boundary() {
        assert_eq!(step_bucket(d(2023, 11, 17), Granularity::Monthly, 3), d(2024, 2, 1));
        assert_eq!(step_bucket_back(d(2024, 2, 1), Granularity::Monthly, 3), d(2023, 11, 1));
    }

    #[test]
    fn daily_buckets_cover_every_date() {
        let range = DateRange::new(d(2024, 2, 27), d(2024, 3, 2)).unwrap();
        let buckets = buckets_in_range(&range, Granularity::Daily);
        assert_eq!(
            buckets,
            vec![d(2024, 2, 27), d(2024, 2, 28), d(2024, 2, 29), d(2024, 3, 1), d(2024, 3, 2)]
        );
    }

    #[test]
    fn monthly_buckets_truncate_to_first_of_month() {
        let range = DateRange::new(d(2024, 1, 15), d(2024, 3, 2)).unwrap();
        let buckets = buckets_in_range(&range, Granularity::Monthly);
        assert_eq!(buckets, vec![d(2024, 1, 1), d(2024, 2, 1), d(2024, 3, 1)]);
    }

    #[test]
    fn daily_window_ends_on_as_of() {
        let window = window_ending_at(d(2024, 3, 10), 10, Granularity::Daily);
        assert_eq!(window.start, d(2024, 3, 1));
        assert_eq!(window.end, d(2024, 3, 10));
        assert_eq!(buckets_in_range(&window, Granularity::Daily).len(), 10);
    }

    #[test]
    fn monthly_window_runs_to_month_end() {
        let window = window_ending_at(d(2024, 2, 10), 3, Granularity::Monthly);
        assert_eq!(window.start, d(2023, 12, 1));
        assert_eq!(window.end, d(2024, 2, 29));
        assert_eq!(buckets_in_range(&window, Granularity::Monthly).len(), 3);
    }

    #[test]
    fn range_after_last_bucket() {
        let range = range_after(d(2024, 1, 31), 2, Granularity::Daily).unwrap();
        assert_eq!(range.start, d(2024, 2, 1));
        assert_eq!(range.end, d(2024, 2, 2));
        assert!(range_after(d(2024, 1, 31), 0, Granularity::Daily).is_none());
    }
}
