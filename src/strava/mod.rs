use crate::config::Config;
use anyhow::{Context, Result, bail};
use chrono::Utc;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Upstream cap on entries per club-activities call.
pub const FEED_PAGE_SIZE: usize = 30;

const OAUTH_TOKEN_URL: &str = "https://www.strava.com/oauth/token";

#[derive(Debug, Clone, Deserialize)]
pub struct FeedAthlete {
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
}

/// One as-fetched feed entry. The feed is newest first and carries no stable
/// activity id, which is why deduplication works on content fingerprints.
#[derive(Debug, Clone, Deserialize)]
pub struct RawActivity {
    pub athlete: FeedAthlete,
    pub name: String,
    #[serde(default)]
    pub distance: f64,
    #[serde(rename = "type")]
    pub sport_type: String,
    pub elapsed_time: i64,
}

impl RawActivity {
    pub fn athlete_display_name(&self) -> String {
        format!(
            "{} {}",
            self.athlete.firstname.trim(),
            self.athlete.lastname.trim()
        )
        .trim()
        .to_string()
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

pub struct StravaClient {
    http: Client,
    base_url: String,
}

impl StravaClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_seconds.max(5)))
            .build()
            .context("Failed to create Strava HTTP client")?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the club feed, newest first, paging past the upstream per-call
    /// cap until `limit` entries are collected or a short page signals the
    /// end of the feed.
    pub fn club_activities(
        &self,
        access_token: &str,
        club_id: u64,
        limit: usize,
    ) -> Result<Vec<RawActivity>> {
        let endpoint = format!("{}/clubs/{}/activities", self.base_url, club_id);
        let mut feed: Vec<RawActivity> = Vec::new();
        let mut page = 1_u32;

        while feed.len() < limit {
            let per_page = FEED_PAGE_SIZE.min(limit - feed.len());
            let response = self
                .http
                .get(&endpoint)
                .bearer_auth(access_token)
                .query(&[
                    ("page", page.to_string()),
                    ("per_page", per_page.to_string()),
                ])
                .send()
                .with_context(|| format!("Club activities request failed: {endpoint}"))?;

            let status = response.status();
            let body = response
                .text()
                .context("Failed to read club activities response body")?;

            if !status.is_success() {
                bail!("Strava API error {}: {}", status, body);
            }

            let batch: Vec<RawActivity> = serde_json::from_str(&body)
                .with_context(|| format!("Failed to parse club activities page {page}"))?;
            let received = batch.len();

            debug!(page, received, "club activities page fetched");
            feed.extend(batch);

            if received < per_page {
                break;
            }
            page += 1;
        }

        feed.truncate(limit);
        Ok(feed)
    }

    pub fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<TokenResponse> {
        let response = self
            .http
            .post(OAUTH_TOKEN_URL)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .context("Token refresh request failed")?;

        let status = response.status();
        let body = response
            .text()
            .context("Failed to read token refresh response body")?;

        if !status.is_success() {
            bail!("Strava token refresh error {}: {}", status, body);
        }

        serde_json::from_str(&body).context("Failed to parse token refresh response")
    }
}

pub fn resolve_access_token(config: &Config) -> Option<String> {
    std::env::var("CLUB_REPORTER_ACCESS_TOKEN")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| {
            config
                .access_token
                .clone()
                .filter(|value| !value.trim().is_empty())
        })
}

/// Rotate the stored tokens when the access token has expired. Returns true
/// when the config was updated and should be saved before fetching.
pub fn refresh_if_expired(config: &mut Config, client: &StravaClient) -> Result<bool> {
    if config.token_expires_at == 0 || Utc::now().timestamp() < config.token_expires_at {
        return Ok(false);
    }

    let (Some(client_id), Some(client_secret), Some(refresh_token)) = (
        config.client_id.clone(),
        config.client_secret.clone(),
        config.refresh_token.clone(),
    ) else {
        bail!(
            "Access token expired and refresh credentials are missing. Set strava.client_id, strava.client_secret and strava.refresh_token."
        );
    };

    let rotated = client.refresh_token(&client_id, &client_secret, &refresh_token)?;
    info!(expires_at = rotated.expires_at, "access token refreshed");

    config.access_token = Some(rotated.access_token);
    config.refresh_token = Some(rotated.refresh_token);
    config.token_expires_at = rotated.expires_at;

    Ok(true)
}
