use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Local, LocalResult, NaiveDate, NaiveTime, TimeZone};
use std::future::Future;
use tokio::time::{Duration, sleep};
use tracing::{error, info};

const RESCHEDULE_POLL_SECONDS: u64 = 30;

/// Fire `task` once per day at the report time, re-reading the schedule
/// between polls so config edits take effect without a restart. The task
/// receives the logical day the run is recorded under.
pub async fn run_report_scheduler<S, F, Fut>(mut schedule_provider: S, mut task: F) -> Result<()>
where
    S: FnMut() -> Result<NaiveTime>,
    F: FnMut(NaiveDate) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut last_logged_time = None;

    loop {
        let report_time = match schedule_provider() {
            Ok(value) => value,
            Err(error) => {
                error!(error = %error, "failed to load report schedule");
                sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
                continue;
            }
        };

        let delay = match seconds_until_next_run(report_time) {
            Ok(value) => value,
            Err(error) => {
                error!(error = %error, "failed to compute next report delay");
                sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
                continue;
            }
        };

        if last_logged_time != Some(report_time) {
            info!(
                seconds = delay.as_secs(),
                report_time = %report_time.format("%H:%M"),
                "next report schedule set"
            );
            last_logged_time = Some(report_time);
        }

        if delay > Duration::from_secs(RESCHEDULE_POLL_SECONDS) {
            sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
            continue;
        }

        sleep(delay).await;

        let date = Local::now().date_naive();
        if let Err(error) = task(date).await {
            error!(error = %error, date = %date, "scheduled report run failed");
        }

        sleep(Duration::from_secs(1)).await;
    }
}

fn seconds_until_next_run(target_time: NaiveTime) -> Result<Duration> {
    let now = Local::now();
    let today = now.date_naive();

    let candidate_today = match Local.from_local_datetime(&today.and_time(target_time)) {
        LocalResult::Single(datetime) => datetime,
        _ => {
            let fallback_day = today + ChronoDuration::days(1);
            Local
                .from_local_datetime(&fallback_day.and_time(target_time))
                .single()
                .context("Failed to convert schedule time")?
        }
    };

    let next_run = if candidate_today > now {
        candidate_today
    } else {
        let tomorrow = today + ChronoDuration::days(1);
        Local
            .from_local_datetime(&tomorrow.and_time(target_time))
            .single()
            .context("Failed to convert next execution time")?
    };

    (next_run - now)
        .to_std()
        .context("Failed to compute next execution delay")
}
