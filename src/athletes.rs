use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// One registered club member, as configured in athletes.json.
///
/// `strava_name` is the display name the club feed reports for the member,
/// which is not necessarily their full name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Athlete {
    pub name: String,
    pub strava_name: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Static lookup from feed display name to registered athlete, loaded once
/// per run.
#[derive(Debug)]
pub struct AthleteDirectory {
    roster: Vec<Athlete>,
    by_strava_name: HashMap<String, usize>,
}

impl AthleteDirectory {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read athletes file: {}", path.display()))?;
        let roster: Vec<Athlete> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse athletes file: {}", path.display()))?;

        Ok(Self::from_entries(roster))
    }

    pub fn from_entries(roster: Vec<Athlete>) -> Self {
        let by_strava_name = roster
            .iter()
            .enumerate()
            .map(|(index, athlete)| (athlete.strava_name.trim().to_string(), index))
            .collect::<HashMap<_, _>>();

        Self {
            roster,
            by_strava_name,
        }
    }

    /// Look up an active athlete by feed display name. A miss is not an
    /// error: the activity is simply not assigned to anyone.
    pub fn resolve(&self, display_name: &str) -> Option<&Athlete> {
        let athlete = self
            .by_strava_name
            .get(display_name.trim())
            .map(|index| &self.roster[*index]);

        match athlete {
            Some(found) if found.active => Some(found),
            Some(found) => {
                info!(athlete = %found.name, "athlete is inactive, activity skipped");
                None
            }
            None => {
                info!(strava_name = %display_name, "athlete was not found");
                None
            }
        }
    }

    pub fn active(&self) -> impl Iterator<Item = &Athlete> {
        self.roster.iter().filter(|athlete| athlete.active)
    }

    pub fn all(&self) -> &[Athlete] {
        &self.roster
    }

    pub fn len(&self) -> usize {
        self.roster.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }
}
