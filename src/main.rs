mod athletes;
mod cli;
mod config;
mod db;
mod matcher;
mod report;
mod scheduler;
mod strava;
mod week;

use crate::athletes::AthleteDirectory;
use crate::cli::{Cli, Commands, ConfigCommands};
use crate::config::Config;
use crate::db::Database;
use crate::matcher::MatchOptions;
use crate::strava::StravaClient;
use crate::week::Week;
use anyhow::{Context, Result, anyhow, bail};
use chrono::{Datelike, Duration, Local, NaiveDate};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            limit,
            skip,
            stop_after,
            date,
        } => handle_run(limit, skip, stop_after, date),
        Commands::Report { week } => handle_report(week),
        Commands::SeedWeeks {
            start,
            count,
            first_week,
        } => handle_seed_weeks(&start, count, first_week),
        Commands::Athletes => handle_athletes(),
        Commands::Status => handle_status(),
        Commands::Doctor => handle_doctor(),
        Commands::Config { command } => handle_config_command(command),
        Commands::Service => {
            let config = load_config()?;
            run_service(config).await
        }
    }
}

fn handle_run(
    limit: Option<usize>,
    skip: usize,
    stop_after: Option<usize>,
    date: Option<String>,
) -> Result<()> {
    let mut config = load_config()?;
    let day = parse_optional_date(date)?;
    let limit = limit.unwrap_or(config.fetch_limit);
    let options = MatchOptions { skip, stop_after };

    run_weekly_pipeline(&mut config, day, &options, limit)
}

/// One full pass: fetch → match → aggregate → persist → export. The window
/// replacement and the weekly rows commit in a single transaction, after
/// aggregation has succeeded; any failure before that leaves prior state
/// untouched.
fn run_weekly_pipeline(
    config: &mut Config,
    day: NaiveDate,
    options: &MatchOptions,
    limit: usize,
) -> Result<()> {
    if config.club_id == 0 {
        bail!("club_id is not configured. Run `club-reporter config set club_id <ID>` first.");
    }

    let directory = AthleteDirectory::load(&config.athletes_path)?;
    let client = StravaClient::new(config)?;

    if strava::refresh_if_expired(config, &client)? {
        config.save()?;
    }
    let access_token = strava::resolve_access_token(config).context(
        "No access token configured. Set strava.access_token or CLUB_REPORTER_ACCESS_TOKEN.",
    )?;

    let feed = client.club_activities(&access_token, config.club_id, limit)?;
    info!(entries = feed.len(), day = %day, "club feed fetched");

    let mut database = Database::open(&config.db_path)?;
    let window = database.last_seen_window()?;
    let outcome = matcher::match_feed(&feed, &window, day, &directory, options);

    let week = match database.week_for_date(day)? {
        Some(seeded) => seeded,
        None => Week::containing(day),
    };
    let existing = database.weekly_rows(week.number)?;
    let rows = report::update_weekly_rows(&week, &directory, &outcome.new_activities, &existing);

    database.persist_run(&week, &rows, &outcome.window, &outcome.new_activities)?;

    // The export carries the whole stored table, not only the rows this run
    // rebuilt, so rows of since-deactivated members survive in the CSV.
    let mut table_rows = database
        .weekly_rows(week.number)?
        .into_values()
        .collect::<Vec<_>>();
    table_rows.sort_by(|left, right| left.athlete.cmp(&right.athlete));
    let csv_path = report::save_week_csv(&table_rows, week.number, &config.report_dir)?;

    info!(
        week = week.number,
        new = outcome.new_activities.len(),
        "weekly table updated"
    );
    println!(
        "Week {} updated: {} new activities",
        week.number,
        outcome.new_activities.len()
    );
    println!("- CSV: {}", csv_path.display());

    Ok(())
}

fn handle_report(week: Option<u32>) -> Result<()> {
    let config = load_config()?;
    let database = Database::open(&config.db_path)?;

    let today = Local::now().date_naive();
    let week_number = match week {
        Some(number) => number,
        None => match database.week_for_date(today)? {
            Some(seeded) => seeded.number,
            None => Week::containing(today).number,
        },
    };

    let mut rows = database
        .weekly_rows(week_number)?
        .into_values()
        .collect::<Vec<_>>();

    if rows.is_empty() {
        println!("No report data stored for week {week_number}");
        return Ok(());
    }

    rows.sort_by(|left, right| left.athlete.cmp(&right.athlete));
    print!("{}", report::render_csv(&rows));

    let csv_path = report::save_week_csv(&rows, week_number, &config.report_dir)?;
    println!("- CSV: {}", csv_path.display());

    Ok(())
}

fn handle_seed_weeks(start: &str, count: u32, first_week: Option<u32>) -> Result<()> {
    let config = load_config()?;
    let start_date = NaiveDate::parse_from_str(start, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format: {start}. Example: 2026-08-03"))?;
    let first_number = first_week.unwrap_or_else(|| start_date.iso_week().week());

    let weeks = (0..count)
        .map(|offset| {
            let week_start = start_date + Duration::days(7 * i64::from(offset));
            Week::from_range(
                first_number + offset,
                week_start,
                week_start + Duration::days(6),
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let mut database = Database::open(&config.db_path)?;
    let seeded = database.seed_weeks(&weeks)?;
    println!("Seeded {seeded} week(s) starting {start_date}");

    Ok(())
}

fn handle_athletes() -> Result<()> {
    let config = load_config()?;
    let directory = AthleteDirectory::load(&config.athletes_path)?;

    for athlete in directory.all() {
        let state = if athlete.active { "active" } else { "inactive" };
        println!("{} ({}) [{}]", athlete.name, athlete.strava_name, state);
    }
    println!("{} registered, {} active", directory.len(), directory.active().count());

    Ok(())
}

fn handle_status() -> Result<()> {
    let config = load_config()?;
    let database = Database::open(&config.db_path)?;

    println!("club-reporter status");
    println!("- club_id: {}", config.club_id);
    println!("- report_time: {}", config.report_time);
    println!(
        "- last_seen_window: {} fingerprint(s)",
        database.last_seen_window()?.len()
    );
    println!(
        "- latest_report_week: {}",
        database
            .latest_week_number()?
            .map(|number| number.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    println!("- recorded_activities: {}", database.activity_count()?);
    println!(
        "- athletes: {}",
        AthleteDirectory::load(&config.athletes_path)
            .map(|directory| directory.len().to_string())
            .unwrap_or_else(|_| "unreadable".to_string())
    );

    Ok(())
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing");
    }

    let config = load_or_default_config()?;

    match Database::open(&config.db_path) {
        Ok(_) => println!("[OK] SQLite reachable: {}", config.db_path.display()),
        Err(error) => {
            println!("[WARN] SQLite check failed: {error}");
            issues.push("db unreachable");
        }
    }

    match AthleteDirectory::load(&config.athletes_path) {
        Ok(directory) => println!(
            "[OK] athletes file loads: {} entries",
            directory.len()
        ),
        Err(error) => {
            println!("[WARN] athletes file check failed: {error}");
            issues.push("athletes file unreadable");
        }
    }

    if let Err(error) = config.parse_report_time() {
        println!("[WARN] invalid report_time setting: {error}");
        issues.push("invalid report_time");
    } else {
        println!("[OK] report_time format valid: {}", config.report_time);
    }

    if config.club_id == 0 {
        println!("[WARN] club_id is not set");
        issues.push("club_id missing");
    } else {
        println!("[OK] club_id set: {}", config.club_id);
    }

    if strava::resolve_access_token(&config).is_some() {
        println!("[OK] access token is configured");
    } else {
        println!("[WARN] access token is missing");
        issues.push("access token missing");
    }

    if config.report_dir.exists() {
        println!("[OK] report dir exists: {}", config.report_dir.display());
    } else {
        println!("[WARN] report dir missing: {}", config.report_dir.display());
        issues.push("report dir missing");
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            let masked = if key.contains("token") || key.contains("secret") {
                "***hidden***".to_string()
            } else {
                value
            };
            println!("Config saved: {key} = {masked}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

async fn run_service(config: Config) -> Result<()> {
    config.ensure_bootstrap_files()?;
    let _ = Database::open(&config.db_path)?;

    let fallback_report_time = config.report_time.clone();

    info!("club-reporter service started");

    tokio::select! {
        scheduler_result = scheduler::run_report_scheduler(move || {
            let report_time = Config::load()
                .map(|runtime| runtime.report_time)
                .unwrap_or_else(|_| fallback_report_time.clone());

            config::parse_hhmm(&report_time)
        }, |date| async move {
            // The feed client is blocking; keep it off the async runtime.
            let worker = std::thread::spawn(move || {
                let mut runtime_config = Config::load()?;
                let limit = runtime_config.fetch_limit;
                run_weekly_pipeline(&mut runtime_config, date, &MatchOptions::default(), limit)
            });

            worker
                .join()
                .map_err(|_| anyhow!("report worker thread panicked"))?
        }) => {
            scheduler_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn parse_optional_date(input: Option<String>) -> Result<NaiveDate> {
    input
        .as_deref()
        .map(|date| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .with_context(|| format!("Invalid date format: {date}. Example: 2026-08-06"))
        })
        .transpose()?
        .map_or_else(|| Ok(Local::now().date_naive()), Ok)
}

fn load_or_default_config() -> Result<Config> {
    Config::load().or_else(|_| {
        let config = Config::default();
        config.ensure_bootstrap_files()?;
        config.save()?;
        Ok(config)
    })
}

fn load_config() -> Result<Config> {
    Config::load().with_context(|| {
        "Config file not found. Run `club-reporter config set club_id <ID>` first.".to_string()
    })
}
