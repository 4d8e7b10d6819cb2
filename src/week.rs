use anyhow::{Result, bail};
use chrono::{Datelike, Duration, NaiveDate, Weekday};

pub const DAYS_PER_WEEK: usize = 7;

pub const DAY_LABELS: [&str; DAYS_PER_WEEK] = [
    "MONDAY",
    "TUESDAY",
    "WEDNESDAY",
    "THURSDAY",
    "FRIDAY",
    "SATURDAY",
    "SUNDAY",
];

/// One challenge week: a numbered Monday..Sunday range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Week {
    pub number: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Week {
    /// Build a week from an explicit range. Range mistakes are a caller
    /// error, not a runtime condition to recover from.
    pub fn from_range(number: u32, start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start.weekday() != Weekday::Mon {
            bail!("week {number} start {start} is not a Monday");
        }
        if end.weekday() != Weekday::Sun {
            bail!("week {number} end {end} is not a Sunday");
        }
        if end - start != Duration::days(6) {
            bail!("week {number} range {start}..{end} does not span seven days");
        }

        Ok(Self { number, start, end })
    }

    /// The ISO week containing `day`, numbered by the ISO week number.
    pub fn containing(day: NaiveDate) -> Self {
        let start = day - Duration::days(i64::from(day.weekday().num_days_from_monday()));

        Self {
            number: day.iso_week().week(),
            start,
            end: start + Duration::days(6),
        }
    }

    /// Slot index (0 = Monday) of `day` within this week, if it falls inside.
    pub fn day_index(&self, day: NaiveDate) -> Option<usize> {
        let offset = (day - self.start).num_days();
        (0..DAYS_PER_WEEK as i64)
            .contains(&offset)
            .then_some(offset as usize)
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..DAYS_PER_WEEK as i64).map(|offset| self.start + Duration::days(offset))
    }
}
