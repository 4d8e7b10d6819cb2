use crate::strava::RawActivity;
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

const FINGERPRINT_LEN: usize = 16;

/// Content digest identifying an activity for a given logical day. The feed
/// carries no stable activity id, so this is the sole identity used for
/// deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn day_tag(day: NaiveDate) -> String {
    day.format("%d%m%Y").to_string()
}

/// Fingerprint a feed entry under a logical day. The same physical activity
/// fingerprinted on two different logical days yields two fingerprints,
/// which is what lets the matcher tell "recorded yesterday" apart from
/// "being recorded today".
pub fn fingerprint(activity: &RawActivity, day: NaiveDate) -> Fingerprint {
    digest_fields([
        ("athlete", activity.athlete_display_name()),
        ("day", day_tag(day)),
        ("distance", format!("{:.1}", activity.distance)),
        ("elapsed_time", activity.elapsed_time.to_string()),
        ("name", activity.name.clone()),
        ("sport_type", activity.sport_type.clone()),
    ])
}

/// Digest a field projection. Keys are sorted before serializing because the
/// upstream feed does not guarantee a stable field order across fetches.
pub fn digest_fields<'a>(fields: impl IntoIterator<Item = (&'a str, String)>) -> Fingerprint {
    let canonical = fields
        .into_iter()
        .collect::<BTreeMap<_, _>>()
        .into_iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("\n");

    let digest = Sha256::digest(canonical.as_bytes());
    Fingerprint(hex::encode(digest)[..FINGERPRINT_LEN].to_string())
}

#[cfg(test)]
mod tests {
    use super::{digest_fields, fingerprint};
    use crate::strava::{FeedAthlete, RawActivity};
    use chrono::NaiveDate;

    fn activity() -> RawActivity {
        RawActivity {
            athlete: FeedAthlete {
                firstname: "Jane".to_string(),
                lastname: "D.".to_string(),
            },
            name: "Evening Ride".to_string(),
            distance: 15203.7,
            sport_type: "Ride".to_string(),
            elapsed_time: 2400,
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 4).expect("valid date")
    }

    #[test]
    fn field_insertion_order_does_not_change_digest() {
        let forward = digest_fields([
            ("athlete", "Jane D.".to_string()),
            ("name", "Evening Ride".to_string()),
            ("sport_type", "Ride".to_string()),
        ]);
        let reversed = digest_fields([
            ("sport_type", "Ride".to_string()),
            ("name", "Evening Ride".to_string()),
            ("athlete", "Jane D.".to_string()),
        ]);

        assert_eq!(forward, reversed);
    }

    #[test]
    fn identical_entries_share_a_fingerprint() {
        assert_eq!(fingerprint(&activity(), day()), fingerprint(&activity(), day()));
    }

    #[test]
    fn any_single_field_changes_the_fingerprint() {
        let base = fingerprint(&activity(), day());

        let mut renamed = activity();
        renamed.name = "Morning Ride".to_string();
        assert_ne!(fingerprint(&renamed, day()), base);

        let mut longer = activity();
        longer.elapsed_time += 1;
        assert_ne!(fingerprint(&longer, day()), base);

        let mut farther = activity();
        farther.distance += 100.0;
        assert_ne!(fingerprint(&farther, day()), base);
    }

    #[test]
    fn logical_day_is_part_of_the_identity() {
        let tomorrow = day().succ_opt().expect("valid date");
        assert_ne!(fingerprint(&activity(), day()), fingerprint(&activity(), tomorrow));
    }
}
