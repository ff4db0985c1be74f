//! Weekly occurrence generation.
//!
//! Given a weekday and a reference date, produces the dates on which a weekly
//! recurring event falls, starting with the soonest one on or after the
//! reference date. The reference date is always passed in; only the outermost
//! caller should reach for the clock (see [`today`]).

use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};

use crate::error::{CongregationError, CongregationResult};

/// Convert a stored weekday index (0 = Sunday .. 6 = Saturday) to a `Weekday`.
pub fn weekday_from_index(index: i64) -> CongregationResult<Weekday> {
    match index {
        0 => Ok(Weekday::Sun),
        1 => Ok(Weekday::Mon),
        2 => Ok(Weekday::Tue),
        3 => Ok(Weekday::Wed),
        4 => Ok(Weekday::Thu),
        5 => Ok(Weekday::Fri),
        6 => Ok(Weekday::Sat),
        other => Err(CongregationError::InvalidWeekday(other)),
    }
}

/// The current calendar date in the server's local time zone.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Unbounded iterator over the weekly occurrences of a weekday.
#[derive(Debug, Clone)]
pub struct Occurrences {
    target: Weekday,
    current: NaiveDate,
}

impl Occurrences {
    pub fn new(target: Weekday, from: NaiveDate) -> Self {
        Occurrences {
            target,
            current: from,
        }
    }
}

impl Iterator for Occurrences {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = i64::from(self.current.weekday().num_days_from_sunday());
        let target = i64::from(self.target.num_days_from_sunday());

        // Zero when the working date already falls on the target weekday
        let offset = if current > target {
            7 - current + target
        } else {
            target - current
        };

        let occurrence = self.current.checked_add_signed(Duration::days(offset))?;
        self.current = occurrence.checked_add_signed(Duration::days(7))?;
        Some(occurrence)
    }
}

/// The next `count` dates falling on `day_of_week`, on or after `today`.
///
/// If `today` is itself on `day_of_week` it is the first date returned.
pub fn next_occurrences(
    day_of_week: i64,
    count: usize,
    today: NaiveDate,
) -> CongregationResult<Vec<NaiveDate>> {
    let target = weekday_from_index(day_of_week)?;
    if count == 0 {
        return Err(CongregationError::InvalidFanOut);
    }

    Ok(Occurrences::new(target, today).take(count).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn returns_exactly_count_dates_a_week_apart_on_the_weekday() {
        // 2024-05-15 is a Wednesday
        let today = date("2024-05-15");
        for dow in 0..7 {
            let dates = next_occurrences(dow, 6, today).unwrap();
            assert_eq!(dates.len(), 6);
            for d in &dates {
                assert_eq!(i64::from(d.weekday().num_days_from_sunday()), dow);
                assert!(*d >= today);
            }
            for pair in dates.windows(2) {
                assert_eq!(pair[1] - pair[0], Duration::days(7));
            }
        }
    }

    #[test]
    fn includes_today_when_today_is_the_weekday() {
        let sunday = date("2024-05-19");
        let dates = next_occurrences(0, 4, sunday).unwrap();
        assert_eq!(dates[0], sunday);
        assert_eq!(dates[3], date("2024-06-09"));
    }

    #[test]
    fn first_date_is_the_soonest_matching_day() {
        let today = date("2024-05-15"); // Wednesday
        assert_eq!(next_occurrences(0, 1, today).unwrap(), vec![date("2024-05-19")]);
        assert_eq!(next_occurrences(2, 1, today).unwrap(), vec![date("2024-05-21")]);
        assert_eq!(next_occurrences(3, 1, today).unwrap(), vec![date("2024-05-15")]);
        assert_eq!(next_occurrences(6, 1, today).unwrap(), vec![date("2024-05-18")]);

        for dow in 0..7 {
            let first = next_occurrences(dow, 1, today).unwrap()[0];
            assert!((first - today).num_days() < 7);
        }
    }

    #[test]
    fn crosses_month_and_year_boundaries() {
        let today = date("2024-12-30"); // Monday
        let dates = next_occurrences(5, 3, today).unwrap();
        assert_eq!(
            dates,
            vec![date("2025-01-03"), date("2025-01-10"), date("2025-01-17")]
        );
    }

    #[test]
    fn rejects_weekday_out_of_range() {
        let today = date("2024-05-15");
        assert!(matches!(
            next_occurrences(7, 4, today),
            Err(CongregationError::InvalidWeekday(7))
        ));
        assert!(matches!(
            next_occurrences(-1, 4, today),
            Err(CongregationError::InvalidWeekday(-1))
        ));
    }

    #[test]
    fn rejects_zero_count() {
        assert!(matches!(
            next_occurrences(0, 0, date("2024-05-15")),
            Err(CongregationError::InvalidFanOut)
        ));
    }

    #[test]
    fn iterator_is_unbounded() {
        let mut occurrences = Occurrences::new(Weekday::Wed, date("2024-05-16"));
        assert_eq!(occurrences.next(), Some(date("2024-05-22")));
        assert_eq!(occurrences.nth(51), Some(date("2025-05-21")));
    }
}
