//! Month grid for the personal calendar.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;

use crate::error::CongregationError;
use crate::event::EventInstance;

/// A calendar month, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearMonth {
    first_day: NaiveDate,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|first_day| YearMonth { first_day })
    }

    pub fn containing(date: NaiveDate) -> Self {
        YearMonth {
            first_day: date.with_day(1).unwrap_or(date),
        }
    }

    pub fn first_day(self) -> NaiveDate {
        self.first_day
    }

    pub fn last_day(self) -> NaiveDate {
        self.first_day
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(self.first_day)
    }

    pub fn days(self) -> impl Iterator<Item = NaiveDate> {
        let last = self.last_day();
        self.first_day.iter_days().take_while(move |d| *d <= last)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first_day.format("%Y-%m"))
    }
}

impl FromStr for YearMonth {
    type Err = CongregationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CongregationError::Validation(format!("Invalid month '{s}', expected YYYY-MM"));
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;
        YearMonth::new(year, month).ok_or_else(invalid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub is_today: bool,
    pub events: Vec<EventInstance>,
}

/// Every day of a month with the events falling on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthView {
    pub month: String,
    pub days: Vec<CalendarDay>,
}

impl MonthView {
    /// Undated events have no day and are left out.
    pub fn build(month: YearMonth, today: NaiveDate, events: &[EventInstance]) -> Self {
        let days = month
            .days()
            .map(|date| CalendarDay {
                date,
                is_today: date == today,
                events: events
                    .iter()
                    .filter(|e| e.date == Some(date))
                    .cloned()
                    .collect(),
            })
            .collect();

        MonthView {
            month: month.to_string(),
            days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn instance(id: &str, on: Option<NaiveDate>) -> EventInstance {
        EventInstance {
            id: id.into(),
            source_key: id.into(),
            title: id.into(),
            time: "10:00".into(),
            date: on,
            description: String::new(),
            image_url: String::new(),
            kind: EventType::Special,
            recurrence: None,
            is_permanent: false,
        }
    }

    #[test]
    fn parses_and_displays_months() {
        let month: YearMonth = "2024-02".parse().unwrap();
        assert_eq!(month.first_day(), date(2024, 2, 1));
        assert_eq!(month.last_day(), date(2024, 2, 29));
        assert_eq!(month.to_string(), "2024-02");

        assert!("2024-13".parse::<YearMonth>().is_err());
        assert!("2024-2".parse::<YearMonth>().is_err());
        assert!("February".parse::<YearMonth>().is_err());
    }

    #[test]
    fn month_view_covers_every_day() {
        let view = MonthView::build(YearMonth::new(2024, 4).unwrap(), date(2024, 4, 10), &[]);
        assert_eq!(view.days.len(), 30);
        assert_eq!(view.days[0].date, date(2024, 4, 1));
        assert_eq!(view.days.iter().filter(|d| d.is_today).count(), 1);
        assert!(view.days[9].is_today);
    }

    #[test]
    fn events_land_on_their_day() {
        let events = [
            instance("a", Some(date(2024, 4, 7))),
            instance("b", Some(date(2024, 4, 7))),
            instance("c", Some(date(2024, 5, 1))),
            instance("d", None),
        ];
        let view = MonthView::build(YearMonth::new(2024, 4).unwrap(), date(2024, 4, 1), &events);

        let ids: Vec<_> = view.days[6].events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        let total: usize = view.days.iter().map(|d| d.events.len()).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn containing_finds_the_first_day() {
        assert_eq!(
            YearMonth::containing(date(2024, 12, 31)).first_day(),
            date(2024, 12, 1)
        );
    }
}
