pub mod queries;

use crate::matcher::ResolvedActivity;
use crate::matcher::fingerprint::Fingerprint;
use crate::report::WeeklyReportRow;
use crate::week::Week;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, params};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }

    /// The fingerprint window recorded at the end of the previous run,
    /// oldest persisted position first.
    pub fn last_seen_window(&self) -> Result<Vec<Fingerprint>> {
        let mut statement = self
            .conn
            .prepare("SELECT fingerprint FROM last_seen ORDER BY position ASC")?;

        let window = statement
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read last-seen window")?
            .into_iter()
            .map(Fingerprint::from_stored)
            .collect::<Vec<_>>();

        Ok(window)
    }

    /// The seeded challenge week covering `day`, if any. Stored ranges are
    /// re-validated on read; a corrupted range is fatal.
    pub fn week_for_date(&self, day: NaiveDate) -> Result<Option<Week>> {
        let row = self
            .conn
            .query_row(
                "SELECT week_number, week_start, week_end FROM weeks
                 WHERE week_start <= ?1 AND week_end >= ?1",
                params![day],
                |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        row.get::<_, NaiveDate>(1)?,
                        row.get::<_, NaiveDate>(2)?,
                    ))
                },
            )
            .ok();

        row.map(|(number, start, end)| Week::from_range(number, start, end))
            .transpose()
    }

    pub fn seed_weeks(&mut self, weeks: &[Week]) -> Result<usize> {
        let transaction = self
            .conn
            .transaction()
            .context("Failed to start week seeding transaction")?;

        weeks.iter().try_for_each(|week| {
            transaction
                .execute(
                    "INSERT OR REPLACE INTO weeks (week_number, week_start, week_end) VALUES (?1, ?2, ?3)",
                    params![week.number, week.start, week.end],
                )
                .with_context(|| format!("Failed to seed week {}", week.number))
                .map(|_| ())
        })?;

        transaction.commit().context("Failed to commit week seeds")?;
        Ok(weeks.len())
    }

    pub fn weekly_rows(&self, week_number: u32) -> Result<HashMap<String, WeeklyReportRow>> {
        let mut statement = self.conn.prepare(
            "SELECT athlete, monday, tuesday, wednesday, thursday, friday, saturday, sunday, total_days
             FROM weekly_reports
             WHERE week_number = ?1
             ORDER BY athlete ASC",
        )?;

        let rows = statement
            .query_map(params![week_number], |row| {
                let athlete: String = row.get(0)?;
                let mut days = [0_u8; 7];
                for (slot, day) in days.iter_mut().enumerate() {
                    *day = row.get::<_, i64>(slot + 1)? as u8;
                }

                Ok(WeeklyReportRow {
                    athlete,
                    days,
                    total_days: row.get::<_, i64>(8)? as u8,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query weekly report rows")?;

        Ok(rows
            .into_iter()
            .map(|row| (row.athlete.clone(), row))
            .collect())
    }

    /// Persist one full run as a single transaction: weekly rows, the
    /// activity audit log, and the replacement window commit together or
    /// not at all. An empty replacement window (empty feed) leaves the
    /// stored window untouched.
    pub fn persist_run(
        &mut self,
        week: &Week,
        rows: &[WeeklyReportRow],
        window: &[Fingerprint],
        new_activities: &[ResolvedActivity],
    ) -> Result<()> {
        let transaction = self
            .conn
            .transaction()
            .context("Failed to start run transaction")?;

        for row in rows {
            transaction
                .execute(
                    "INSERT INTO weekly_reports
                       (week_number, athlete, monday, tuesday, wednesday, thursday, friday, saturday, sunday, total_days)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                     ON CONFLICT(week_number, athlete)
                     DO UPDATE SET monday=excluded.monday, tuesday=excluded.tuesday,
                                   wednesday=excluded.wednesday, thursday=excluded.thursday,
                                   friday=excluded.friday, saturday=excluded.saturday,
                                   sunday=excluded.sunday, total_days=excluded.total_days",
                    params![
                        week.number,
                        row.athlete,
                        i64::from(row.days[0]),
                        i64::from(row.days[1]),
                        i64::from(row.days[2]),
                        i64::from(row.days[3]),
                        i64::from(row.days[4]),
                        i64::from(row.days[5]),
                        i64::from(row.days[6]),
                        i64::from(row.total_days),
                    ],
                )
                .with_context(|| format!("Failed to upsert weekly row for {}", row.athlete))?;
        }

        for activity in new_activities {
            let athlete = activity
                .athlete
                .clone()
                .unwrap_or_else(|| activity.raw.athlete_display_name());

            transaction
                .execute(
                    "INSERT OR IGNORE INTO activities
                       (fingerprint, week_number, name, athlete, duration_sec, date)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        activity.fingerprint.as_str(),
                        week.number,
                        activity.raw.name,
                        athlete,
                        activity.raw.elapsed_time,
                        activity.date,
                    ],
                )
                .context("Failed to append activity record")?;
        }

        if !window.is_empty() {
            transaction
                .execute("DELETE FROM last_seen", [])
                .context("Failed to clear last-seen window")?;

            for (position, fingerprint) in window.iter().enumerate() {
                transaction
                    .execute(
                        "INSERT INTO last_seen (position, fingerprint) VALUES (?1, ?2)",
                        params![position as i64, fingerprint.as_str()],
                    )
                    .context("Failed to write last-seen window")?;
            }
        }

        transaction.commit().context("Failed to commit run")
    }

    pub fn latest_week_number(&self) -> Result<Option<u32>> {
        let number = self
            .conn
            .query_row(
                "SELECT week_number FROM weekly_reports ORDER BY week_number DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .ok();

        Ok(number)
    }

    pub fn activity_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM activities", [], |row| row.get(0))
            .context("Failed to count activity records")
    }
}
