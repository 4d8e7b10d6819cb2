use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveTime;
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const APP_DIR: &str = ".club-reporter";
const CONFIG_FILE: &str = "config.json";
const ATHLETES_FILE: &str = "athletes.json";
const DEFAULT_REPORT_TIME: &str = "23:45";
const DEFAULT_API_BASE_URL: &str = "https://www.strava.com/api/v3";

pub const DEFAULT_FETCH_LIMIT: usize = 60;

const ATHLETES_TEMPLATE: &str = r#"[
  {"name": "Jane Doe", "strava_name": "Jane D.", "active": true}
]
"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub report_time: String,
    pub report_dir: PathBuf,
    pub athletes_path: PathBuf,
    pub db_path: PathBuf,
    pub club_id: u64,
    pub fetch_limit: usize,
    pub api_base_url: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub token_expires_at: i64,
    pub http_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_root_dir();

        Self {
            report_time: DEFAULT_REPORT_TIME.to_string(),
            report_dir: default_report_dir(),
            athletes_path: root.join(ATHLETES_FILE),
            db_path: root.join("db").join("club.db"),
            club_id: 0,
            fetch_limit: DEFAULT_FETCH_LIMIT,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            access_token: None,
            refresh_token: None,
            client_id: None,
            client_secret: None,
            token_expires_at: 0,
            http_timeout_seconds: 20,
        }
    }
}

impl Config {
    pub fn root_dir() -> Result<PathBuf> {
        Ok(default_root_dir())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(&config_path)?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        let root = Self::root_dir()?;
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create root directory: {}", root.display()))?;

        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        fs::create_dir_all(&self.report_dir).with_context(|| {
            format!(
                "Failed to create report directory: {}",
                self.report_dir.as_path().display()
            )
        })?;

        if !self.athletes_path.exists() {
            fs::write(&self.athletes_path, ATHLETES_TEMPLATE).with_context(|| {
                format!(
                    "Failed to create athletes template: {}",
                    self.athletes_path.display()
                )
            })?;
            set_mode_600(&self.athletes_path)?;
        }

        Ok(())
    }

    pub fn parse_report_time(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.report_time)
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let normalized = normalize_config_key(key);

        match normalized {
            "report_time" => {
                parse_hhmm(value)?;
                self.report_time = value.to_string();
            }
            "report_dir" => {
                self.report_dir = expand_home(value);
            }
            "athletes_path" => {
                self.athletes_path = expand_home(value);
            }
            "club_id" => {
                self.club_id = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("club_id must be a number"))?;
            }
            "fetch_limit" => {
                let parsed = value
                    .parse::<usize>()
                    .map_err(|_| anyhow!("fetch_limit must be a number"))?;
                if parsed == 0 {
                    bail!("fetch_limit must be at least 1");
                }
                self.fetch_limit = parsed;
            }
            "api_base_url" => {
                self.api_base_url = value.trim().trim_end_matches('/').to_string();
            }
            "access_token" => {
                self.access_token = (!value.trim().is_empty()).then_some(value.to_string());
            }
            "refresh_token" => {
                self.refresh_token = (!value.trim().is_empty()).then_some(value.to_string());
            }
            "client_id" => {
                self.client_id = (!value.trim().is_empty()).then_some(value.to_string());
            }
            "client_secret" => {
                self.client_secret = (!value.trim().is_empty()).then_some(value.to_string());
            }
            "token_expires_at" => {
                self.token_expires_at = value
                    .parse::<i64>()
                    .map_err(|_| anyhow!("token_expires_at must be a unix timestamp"))?;
            }
            "http_timeout_seconds" => {
                self.http_timeout_seconds = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("http_timeout_seconds must be a number"))?
                    .max(5);
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: report_time|report.time, report_dir|report.dir, athletes_path|athletes.path, club_id|strava.club_id, fetch_limit|strava.fetch_limit, api_base_url|strava.base_url, access_token|strava.access_token, refresh_token|strava.refresh_token, client_id|strava.client_id, client_secret|strava.client_secret, token_expires_at, http_timeout_seconds"
                );
            }
        }

        if normalized == "report_dir" {
            fs::create_dir_all(&self.report_dir).with_context(|| {
                format!(
                    "Failed to create report directory: {}",
                    self.report_dir.display()
                )
            })?;
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "report_time" => Some(self.report_time.clone()),
            "report_dir" => Some(self.report_dir.display().to_string()),
            "athletes_path" => Some(self.athletes_path.display().to_string()),
            "db_path" => Some(self.db_path.display().to_string()),
            "club_id" => Some(self.club_id.to_string()),
            "fetch_limit" => Some(self.fetch_limit.to_string()),
            "api_base_url" => Some(self.api_base_url.clone()),
            "access_token" => Some(masked(self.access_token.as_deref())),
            "refresh_token" => Some(masked(self.refresh_token.as_deref())),
            "client_id" => Some(
                self.client_id
                    .clone()
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "client_secret" => Some(masked(self.client_secret.as_deref())),
            "token_expires_at" => Some(self.token_expires_at.to_string()),
            "http_timeout_seconds" => Some(self.http_timeout_seconds.to_string()),
            _ => None,
        }
    }
}

fn masked(value: Option<&str>) -> String {
    value
        .filter(|raw| !raw.trim().is_empty())
        .map(|_| "***set***".to_string())
        .unwrap_or_else(|| "not_set".to_string())
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "report_time" | "report.time" => "report_time",
        "report_dir" | "report.dir" => "report_dir",
        "athletes_path" | "athletes.path" => "athletes_path",
        "db_path" | "db.path" => "db_path",
        "club_id" | "strava.club_id" => "club_id",
        "fetch_limit" | "strava.fetch_limit" => "fetch_limit",
        "api_base_url" | "strava.base_url" => "api_base_url",
        "access_token" | "strava.access_token" => "access_token",
        "refresh_token" | "strava.refresh_token" => "refresh_token",
        "client_id" | "strava.client_id" => "client_id",
        "client_secret" | "strava.client_secret" => "client_secret",
        _ => key,
    }
}

pub fn parse_hhmm(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .with_context(|| format!("Invalid time format: {value}. Example: 23:45 (24-hour format)",))
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

pub fn default_report_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("reports")
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Config, normalize_config_key, parse_hhmm};

    #[test]
    fn parses_valid_report_time() {
        let time = parse_hhmm("23:45").expect("valid time");
        assert_eq!(time.format("%H:%M").to_string(), "23:45");
    }

    #[test]
    fn rejects_invalid_report_time() {
        assert!(parse_hhmm("24:99").is_err());
        assert!(parse_hhmm("half past nine").is_err());
    }

    #[test]
    fn dotted_keys_normalize_to_flat_keys() {
        assert_eq!(normalize_config_key("strava.club_id"), "club_id");
        assert_eq!(normalize_config_key("report.time"), "report_time");
        assert_eq!(normalize_config_key("unknown.key"), "unknown.key");
    }

    #[test]
    fn set_value_round_trips_through_get_value() {
        let mut config = Config::default();
        config.set_value("club_id", "1099692").expect("club id set");
        config.set_value("fetch_limit", "45").expect("limit set");

        assert_eq!(config.get_value("club_id").as_deref(), Some("1099692"));
        assert_eq!(config.get_value("fetch_limit").as_deref(), Some("45"));
    }

    #[test]
    fn rejects_zero_fetch_limit() {
        let mut config = Config::default();
        assert!(config.set_value("fetch_limit", "0").is_err());
    }

    #[test]
    fn secrets_are_masked_on_get() {
        let mut config = Config::default();
        assert_eq!(config.get_value("access_token").as_deref(), Some("not_set"));

        config
            .set_value("access_token", "abc123")
            .expect("token set");
        assert_eq!(
            config.get_value("access_token").as_deref(),
            Some("***set***")
        );
    }
}
