use crate::athletes::AthleteDirectory;
use crate::matcher::ResolvedActivity;
use crate::week::{DAY_LABELS, DAYS_PER_WEEK, Week};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Minimum accumulated daily duration for a day to count as met: 27 minutes,
/// three under the 30-minute nominal target to tolerate timer rounding in
/// the source feed.
pub const DAILY_THRESHOLD_SECS: i64 = 27 * 60;

/// One persisted row of the weekly table. Day columns are met flags,
/// Monday first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyReportRow {
    pub athlete: String,
    pub days: [u8; DAYS_PER_WEEK],
    pub total_days: u8,
}

impl WeeklyReportRow {
    pub fn template(athlete: impl Into<String>) -> Self {
        Self {
            athlete: athlete.into(),
            days: [0; DAYS_PER_WEEK],
            total_days: 0,
        }
    }
}

/// Per-athlete accumulation of this run's activity, by day slot. Built fresh
/// each run and discarded; only the derived row is persisted.
#[derive(Debug, Default)]
struct DailyCounter {
    seconds: [i64; DAYS_PER_WEEK],
    touched: [bool; DAYS_PER_WEEK],
}

impl DailyCounter {
    fn add(&mut self, slot: usize, seconds: i64) {
        self.seconds[slot] += seconds.max(0);
        self.touched[slot] = true;
    }
}

/// Fold this run's resolved activities into the weekly table.
///
/// Every active directory athlete gets a row, loaded from `existing` or
/// started from a zeroed template. Only day columns touched by this run's
/// activities are overwritten; untouched columns keep their stored value,
/// and the total is recomputed from the seven flags on every touch. Running
/// this twice with the same inputs produces identical rows.
pub fn update_weekly_rows(
    week: &Week,
    directory: &AthleteDirectory,
    activities: &[ResolvedActivity],
    existing: &HashMap<String, WeeklyReportRow>,
) -> Vec<WeeklyReportRow> {
    let mut counters: HashMap<&str, DailyCounter> = HashMap::new();

    for activity in activities {
        let Some(athlete) = activity.athlete.as_deref() else {
            debug!(
                activity = %activity.raw.name,
                "unassigned activity excluded from aggregation"
            );
            continue;
        };

        let Some(slot) = week.day_index(activity.date) else {
            warn!(
                athlete,
                date = %activity.date,
                week = week.number,
                "activity date outside the week, skipped"
            );
            continue;
        };

        counters
            .entry(athlete)
            .or_default()
            .add(slot, activity.raw.elapsed_time);
    }

    directory
        .active()
        .map(|athlete| {
            let mut row = existing
                .get(&athlete.name)
                .cloned()
                .unwrap_or_else(|| WeeklyReportRow::template(&athlete.name));

            if let Some(counter) = counters.get(athlete.name.as_str()) {
                for slot in 0..DAYS_PER_WEEK {
                    if !counter.touched[slot] {
                        continue;
                    }

                    let met = counter.seconds[slot] >= DAILY_THRESHOLD_SECS;
                    if !met {
                        info!(
                            athlete = %athlete.name,
                            day = DAY_LABELS[slot],
                            seconds = counter.seconds[slot],
                            "activity below the daily threshold"
                        );
                    }
                    row.days[slot] = u8::from(met);
                }
            }

            row.total_days = row.days.iter().sum();
            row
        })
        .collect()
}

pub fn render_csv(rows: &[WeeklyReportRow]) -> String {
    let header = format!("ATHLETE,{},TOTAL_DAYS", DAY_LABELS.join(","));

    let lines = rows
        .iter()
        .map(|row| {
            let days = row
                .days
                .iter()
                .map(|flag| flag.to_string())
                .collect::<Vec<_>>()
                .join(",");
            format!("{},{},{}", row.athlete, days, row.total_days)
        })
        .collect::<Vec<_>>();

    let mut table = header;
    for line in lines {
        table.push('\n');
        table.push_str(&line);
    }
    table.push('\n');
    table
}

/// Full overwrite of the week's CSV export.
pub fn save_week_csv(rows: &[WeeklyReportRow], week_number: u32, report_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(report_dir).with_context(|| {
        format!(
            "Failed to create report directory: {}",
            report_dir.display()
        )
    })?;

    let path = report_dir.join(format!("week_{week_number:02}.csv"));
    fs::write(&path, render_csv(rows))
        .with_context(|| format!("Failed to write weekly CSV: {}", path.display()))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::{DAILY_THRESHOLD_SECS, WeeklyReportRow, render_csv, update_weekly_rows};
    use crate::athletes::{Athlete, AthleteDirectory};
    use crate::matcher::ResolvedActivity;
    use crate::matcher::fingerprint::fingerprint;
    use crate::strava::{FeedAthlete, RawActivity};
    use crate::week::Week;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn directory() -> AthleteDirectory {
        AthleteDirectory::from_entries(vec![Athlete {
            name: "Jane Doe".to_string(),
            strava_name: "Jane D.".to_string(),
            active: true,
        }])
    }

    fn week() -> Week {
        Week::from_range(
            32,
            NaiveDate::from_ymd_opt(2026, 8, 3).expect("valid date"),
            NaiveDate::from_ymd_opt(2026, 8, 9).expect("valid date"),
        )
        .expect("valid week")
    }

    fn resolved(title: &str, elapsed_time: i64, date: NaiveDate) -> ResolvedActivity {
        let raw = RawActivity {
            athlete: FeedAthlete {
                firstname: "Jane".to_string(),
                lastname: "D.".to_string(),
            },
            name: title.to_string(),
            distance: 1000.0,
            sport_type: "Run".to_string(),
            elapsed_time,
        };

        ResolvedActivity {
            fingerprint: fingerprint(&raw, date),
            athlete: Some("Jane Doe".to_string()),
            date,
            raw,
        }
    }

    fn tuesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 4).expect("valid date")
    }

    #[test]
    fn day_at_exactly_the_threshold_is_met() {
        let activities = vec![resolved("Run", DAILY_THRESHOLD_SECS, tuesday())];
        let rows = update_weekly_rows(&week(), &directory(), &activities, &HashMap::new());

        assert_eq!(rows[0].days[1], 1);
        assert_eq!(rows[0].total_days, 1);
    }

    #[test]
    fn day_one_second_below_the_threshold_is_not_met() {
        let activities = vec![resolved("Run", DAILY_THRESHOLD_SECS - 1, tuesday())];
        let rows = update_weekly_rows(&week(), &directory(), &activities, &HashMap::new());

        assert_eq!(rows[0].days[1], 0);
        assert_eq!(rows[0].total_days, 0);
    }

    #[test]
    fn durations_accumulate_across_activities_on_the_same_day() {
        // 10 + 20 + 5 minutes on Tuesday clears the 27-minute threshold.
        let activities = vec![
            resolved("A", 10 * 60, tuesday()),
            resolved("B", 20 * 60, tuesday()),
            resolved("C", 5 * 60, tuesday()),
        ];

        let mut existing = HashMap::new();
        let mut prior = WeeklyReportRow::template("Jane Doe");
        prior.days[0] = 1;
        prior.total_days = 1;
        existing.insert("Jane Doe".to_string(), prior);

        let rows = update_weekly_rows(&week(), &directory(), &activities, &existing);

        assert_eq!(rows[0].days[1], 1, "Tuesday met");
        assert_eq!(rows[0].days[0], 1, "Monday unchanged");
        assert_eq!(rows[0].total_days, 2);
    }

    #[test]
    fn untouched_days_keep_their_stored_value() {
        let mut existing = HashMap::new();
        let mut prior = WeeklyReportRow::template("Jane Doe");
        prior.days = [1, 0, 1, 0, 0, 0, 1];
        prior.total_days = 3;
        existing.insert("Jane Doe".to_string(), prior.clone());

        let rows = update_weekly_rows(&week(), &directory(), &[], &existing);

        assert_eq!(rows[0], prior);
    }

    #[test]
    fn aggregation_is_idempotent_for_a_fixed_resolved_set() {
        let activities = vec![
            resolved("A", 30 * 60, tuesday()),
            resolved("B", 5 * 60, week().start),
        ];
        let mut existing = HashMap::new();
        existing.insert(
            "Jane Doe".to_string(),
            WeeklyReportRow {
                athlete: "Jane Doe".to_string(),
                days: [0, 0, 0, 1, 0, 0, 0],
                total_days: 1,
            },
        );

        let first = update_weekly_rows(&week(), &directory(), &activities, &existing);
        let again = first
            .iter()
            .map(|row| (row.athlete.clone(), row.clone()))
            .collect::<HashMap<_, _>>();
        let second = update_weekly_rows(&week(), &directory(), &activities, &again);

        assert_eq!(first, second);
    }

    #[test]
    fn totals_always_equal_the_count_of_met_days() {
        let activities = vec![
            resolved("A", 40 * 60, week().start),
            resolved("B", 40 * 60, tuesday()),
            resolved("C", 10 * 60, week().end),
        ];
        let rows = update_weekly_rows(&week(), &directory(), &activities, &HashMap::new());

        for row in &rows {
            let met = row.days.iter().filter(|flag| **flag == 1).count() as u8;
            assert_eq!(row.total_days, met);
        }
    }

    #[test]
    fn unassigned_activities_are_dropped() {
        let mut stray = resolved("Run", 40 * 60, tuesday());
        stray.athlete = None;

        let rows = update_weekly_rows(&week(), &directory(), &[stray], &HashMap::new());

        assert_eq!(rows[0].total_days, 0);
    }

    #[test]
    fn activity_outside_the_week_is_skipped() {
        let outside = NaiveDate::from_ymd_opt(2026, 8, 10).expect("valid date");
        let rows = update_weekly_rows(
            &week(),
            &directory(),
            &[resolved("Run", 40 * 60, outside)],
            &HashMap::new(),
        );

        assert_eq!(rows[0].total_days, 0);
    }

    #[test]
    fn csv_table_has_the_expected_shape() {
        let mut row = WeeklyReportRow::template("Jane Doe");
        row.days[1] = 1;
        row.total_days = 1;

        let table = render_csv(&[row]);
        let mut lines = table.lines();

        assert_eq!(
            lines.next(),
            Some("ATHLETE,MONDAY,TUESDAY,WEDNESDAY,THURSDAY,FRIDAY,SATURDAY,SUNDAY,TOTAL_DAYS")
        );
        assert_eq!(lines.next(), Some("Jane Doe,0,1,0,0,0,0,0,1"));
    }
}
