pub const CREATE_WEEKS: &str = r#"
CREATE TABLE IF NOT EXISTS weeks (
  week_number INTEGER PRIMARY KEY,
  week_start  TEXT NOT NULL,
  week_end    TEXT NOT NULL
);
"#;

pub const CREATE_LAST_SEEN: &str = r#"
CREATE TABLE IF NOT EXISTS last_seen (
  position    INTEGER PRIMARY KEY,
  fingerprint TEXT NOT NULL
);
"#;

pub const CREATE_ACTIVITIES: &str = r#"
CREATE TABLE IF NOT EXISTS activities (
  fingerprint  TEXT PRIMARY KEY,
  week_number  INTEGER NOT NULL,
  name         TEXT NOT NULL,
  athlete      TEXT NOT NULL,
  duration_sec INTEGER NOT NULL DEFAULT 0,
  date         TEXT NOT NULL
);
"#;

pub const CREATE_WEEKLY_REPORTS: &str = r#"
CREATE TABLE IF NOT EXISTS weekly_reports (
  week_number INTEGER NOT NULL,
  athlete     TEXT NOT NULL,
  monday      INTEGER NOT NULL DEFAULT 0,
  tuesday     INTEGER NOT NULL DEFAULT 0,
  wednesday   INTEGER NOT NULL DEFAULT 0,
  thursday    INTEGER NOT NULL DEFAULT 0,
  friday      INTEGER NOT NULL DEFAULT 0,
  saturday    INTEGER NOT NULL DEFAULT 0,
  sunday      INTEGER NOT NULL DEFAULT 0,
  total_days  INTEGER NOT NULL DEFAULT 0,
  PRIMARY KEY (week_number, athlete)
);
"#;

pub const INDEX_ACTIVITIES_WEEK: &str =
    "CREATE INDEX IF NOT EXISTS idx_activities_week ON activities(week_number);";

pub const INDEX_ACTIVITIES_DATE: &str =
    "CREATE INDEX IF NOT EXISTS idx_activities_date ON activities(date);";

pub fn schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_WEEKS,
        CREATE_LAST_SEEN,
        CREATE_ACTIVITIES,
        CREATE_WEEKLY_REPORTS,
        INDEX_ACTIVITIES_WEEK,
        INDEX_ACTIVITIES_DATE,
    ]
}
