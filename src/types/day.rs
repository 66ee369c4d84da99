use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// What kind of school day a date is for one school.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayType {
    Normal,
    /// Past the school's last teaching day of the week.
    Weekend,
    /// Listed as a free day by a stored plan.
    Holiday,
    /// A teaching day for which no plan has been stored.
    NoData,
}

impl DayType {
    /// Weekend wins over holiday; a stored plan makes any other day normal.
    #[must_use]
    pub fn classify(day: NaiveDate, days_per_week: i32, is_free_day: bool, has_plan: bool) -> Self {
        let weekday = i64::from(day.weekday().number_from_monday());
        if weekday > i64::from(days_per_week) {
            DayType::Weekend
        } else if is_free_day {
            DayType::Holiday
        } else if has_plan {
            DayType::Normal
        } else {
            DayType::NoData
        }
    }
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DayType::Normal => "NORMAL",
            DayType::Weekend => "WEEKEND",
            DayType::Holiday => "HOLIDAY",
            DayType::NoData => "NO_DATA",
        };
        f.write_str(s)
    }
}
