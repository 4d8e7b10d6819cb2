pub mod fingerprint;

use crate::athletes::AthleteDirectory;
use crate::matcher::fingerprint::{Fingerprint, fingerprint};
use crate::strava::RawActivity;
use chrono::NaiveDate;
use tracing::{debug, warn};

/// Number of trailing fingerprints persisted between runs.
pub const WINDOW_LEN: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct MatchOptions {
    /// Leading feed entries to pass over, used to compensate for delayed runs.
    pub skip: usize,
    /// Cap on how many new activities are collected, independent of where
    /// the duplicate boundary lands.
    pub stop_after: Option<usize>,
}

/// A feed entry the matcher classified as new, carrying everything the
/// aggregator needs. Discarded after the run.
#[derive(Debug, Clone)]
pub struct ResolvedActivity {
    pub raw: RawActivity,
    pub fingerprint: Fingerprint,
    pub date: NaiveDate,
    /// Registered full name, or None when the feed name matches no active
    /// directory entry.
    pub athlete: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// A full positional window match located the new/old boundary.
    Confirmed,
    /// The feed ran out before a full match; everything scanned was treated
    /// as new.
    Exhausted,
}

#[derive(Debug)]
pub struct MatchOutcome {
    pub new_activities: Vec<ResolvedActivity>,
    /// Replacement window to persist: the first fingerprints of this feed,
    /// taken before any skip.
    pub window: Vec<Fingerprint>,
    pub boundary: Boundary,
}

/// Walk the feed (newest first) and split it at the boundary between
/// activities new since the previous run and activities that run already
/// recorded.
///
/// Candidates must match the previous window in order, positionally: the
/// streak length is the machine state, an entry extends the streak iff its
/// fingerprint equals `window[streak_len]`, and a full-length streak
/// confirms the boundary. Synchronous and side-effect-free.
pub fn match_feed(
    feed: &[RawActivity],
    window: &[Fingerprint],
    day: NaiveDate,
    directory: &AthleteDirectory,
    options: &MatchOptions,
) -> MatchOutcome {
    let next_window = feed
        .iter()
        .take(WINDOW_LEN)
        .map(|entry| fingerprint(entry, day))
        .collect::<Vec<_>>();

    let mut new_activities: Vec<ResolvedActivity> = Vec::new();
    let mut streak: Vec<ResolvedActivity> = Vec::new();
    let mut boundary = Boundary::Exhausted;

    'scan: for entry in feed.iter().skip(options.skip) {
        let resolved = resolve(entry, day, directory);

        if streak.len() < window.len() && resolved.fingerprint == window[streak.len()] {
            streak.push(resolved);
            if streak.len() == window.len() {
                boundary = Boundary::Confirmed;
                break 'scan;
            }
            continue;
        }

        // A broken streak was a false positive: the held entries are new
        // after all and go back to the output in their original order.
        for held in streak.drain(..) {
            if collect(&mut new_activities, held, options.stop_after) {
                break 'scan;
            }
        }

        // The entry that broke the streak may itself start a fresh one.
        if !window.is_empty() && resolved.fingerprint == window[0] {
            streak.push(resolved);
            if streak.len() == window.len() {
                boundary = Boundary::Confirmed;
                break 'scan;
            }
            continue;
        }

        if collect(&mut new_activities, resolved, options.stop_after) {
            break 'scan;
        }
    }

    if boundary == Boundary::Exhausted {
        for held in streak {
            if collect(&mut new_activities, held, options.stop_after) {
                break;
            }
        }

        let capped = options
            .stop_after
            .is_some_and(|cap| new_activities.len() >= cap);
        if !window.is_empty() && !capped {
            warn!(
                feed_len = feed.len(),
                window_len = window.len(),
                "window never matched in the feed, treating every scanned entry as new"
            );
        }
    } else {
        debug!(new = new_activities.len(), "duplicate boundary confirmed");
    }

    MatchOutcome {
        new_activities,
        window: next_window,
        boundary,
    }
}

/// Push unless the cap is already reached; returns true once the cap is hit.
fn collect(
    output: &mut Vec<ResolvedActivity>,
    resolved: ResolvedActivity,
    stop_after: Option<usize>,
) -> bool {
    if stop_after.is_some_and(|cap| output.len() >= cap) {
        return true;
    }
    output.push(resolved);
    stop_after.is_some_and(|cap| output.len() >= cap)
}

fn resolve(entry: &RawActivity, day: NaiveDate, directory: &AthleteDirectory) -> ResolvedActivity {
    ResolvedActivity {
        fingerprint: fingerprint(entry, day),
        athlete: directory
            .resolve(&entry.athlete_display_name())
            .map(|athlete| athlete.name.clone()),
        date: day,
        raw: entry.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::{Boundary, MatchOptions, match_feed};
    use crate::athletes::{Athlete, AthleteDirectory};
    use crate::matcher::fingerprint::{Fingerprint, fingerprint};
    use crate::strava::{FeedAthlete, RawActivity};
    use chrono::NaiveDate;

    fn entry(name: &str, elapsed_time: i64) -> RawActivity {
        RawActivity {
            athlete: FeedAthlete {
                firstname: "Jane".to_string(),
                lastname: "D.".to_string(),
            },
            name: name.to_string(),
            distance: 1000.0,
            sport_type: "Run".to_string(),
            elapsed_time,
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 4).expect("valid date")
    }

    fn directory() -> AthleteDirectory {
        AthleteDirectory::from_entries(vec![Athlete {
            name: "Jane Doe".to_string(),
            strava_name: "Jane D.".to_string(),
            active: true,
        }])
    }

    fn window_of(entries: &[RawActivity]) -> Vec<Fingerprint> {
        entries
            .iter()
            .map(|entry| fingerprint(entry, day()))
            .collect()
    }

    fn names(outcome: &super::MatchOutcome) -> Vec<String> {
        outcome
            .new_activities
            .iter()
            .map(|activity| activity.raw.name.clone())
            .collect()
    }

    #[test]
    fn confirmed_boundary_returns_exactly_the_new_entries() {
        let olds = vec![entry("Old 1", 600), entry("Old 2", 700), entry("Old 3", 800)];
        let window = window_of(&olds);

        let mut feed = vec![entry("New 1", 900), entry("New 2", 950)];
        feed.extend(olds);
        feed.push(entry("Ancient", 100));

        let outcome = match_feed(&feed, &window, day(), &directory(), &MatchOptions::default());

        assert_eq!(names(&outcome), vec!["New 1", "New 2"]);
        assert_eq!(outcome.boundary, Boundary::Confirmed);
        assert_eq!(outcome.window, window_of(&feed[..3]));
    }

    #[test]
    fn broken_streak_reclassifies_held_entries_as_new_in_order() {
        let olds = vec![entry("Old 1", 600), entry("Old 2", 700), entry("Old 3", 800)];
        let window = window_of(&olds);

        // A partial [Old 1, Old 2] run breaks on Breaker before the third
        // window slot, so those two are false positives.
        let feed = vec![
            entry("New 1", 900),
            entry("Old 1", 600),
            entry("Old 2", 700),
            entry("Breaker", 111),
            entry("Old 1", 600),
            entry("Old 2", 700),
            entry("Old 3", 800),
            entry("Ancient", 100),
        ];

        let outcome = match_feed(&feed, &window, day(), &directory(), &MatchOptions::default());

        assert_eq!(names(&outcome), vec!["New 1", "Old 1", "Old 2", "Breaker"]);
        assert_eq!(outcome.boundary, Boundary::Confirmed);
    }

    #[test]
    fn empty_window_treats_the_whole_feed_as_new() {
        let feed = vec![entry("A", 1), entry("B", 2), entry("C", 3)];

        let outcome = match_feed(&feed, &[], day(), &directory(), &MatchOptions::default());

        assert_eq!(names(&outcome), vec!["A", "B", "C"]);
        assert_eq!(outcome.boundary, Boundary::Exhausted);
    }

    #[test]
    fn unmatched_window_falls_back_to_everything_new() {
        let window = window_of(&[entry("Gone 1", 11), entry("Gone 2", 22), entry("Gone 3", 33)]);
        let feed = vec![entry("A", 1), entry("B", 2), entry("C", 3), entry("D", 4)];

        let outcome = match_feed(&feed, &window, day(), &directory(), &MatchOptions::default());

        assert_eq!(names(&outcome), vec!["A", "B", "C", "D"]);
        assert_eq!(outcome.boundary, Boundary::Exhausted);
    }

    #[test]
    fn feed_shorter_than_window_is_all_new_with_a_short_replacement_window() {
        let window = window_of(&[entry("Old 1", 600), entry("Old 2", 700), entry("Old 3", 800)]);
        let feed = vec![entry("A", 1), entry("B", 2)];

        let outcome = match_feed(&feed, &window, day(), &directory(), &MatchOptions::default());

        assert_eq!(names(&outcome), vec!["A", "B"]);
        assert_eq!(outcome.window.len(), 2);
        assert_eq!(outcome.boundary, Boundary::Exhausted);
    }

    #[test]
    fn partial_streak_at_feed_end_is_flushed_as_new() {
        let olds = vec![entry("Old 1", 600), entry("Old 2", 700), entry("Old 3", 800)];
        let window = window_of(&olds);
        let feed = vec![entry("A", 1), entry("Old 1", 600), entry("Old 2", 700)];

        let outcome = match_feed(&feed, &window, day(), &directory(), &MatchOptions::default());

        assert_eq!(names(&outcome), vec!["A", "Old 1", "Old 2"]);
        assert_eq!(outcome.boundary, Boundary::Exhausted);
    }

    #[test]
    fn skipped_entries_stay_out_of_the_output_but_seed_the_window() {
        let olds = vec![entry("Old 1", 600), entry("Old 2", 700), entry("Old 3", 800)];
        let window = window_of(&olds);

        let mut feed = vec![entry("Late", 500), entry("New 1", 900)];
        feed.extend(olds);

        let options = MatchOptions {
            skip: 1,
            ..MatchOptions::default()
        };
        let outcome = match_feed(&feed, &window, day(), &directory(), &options);

        assert_eq!(names(&outcome), vec!["New 1"]);
        assert_eq!(outcome.window, window_of(&feed[..3]));
    }

    #[test]
    fn stop_after_caps_the_collected_new_activities() {
        let feed = vec![
            entry("A", 1),
            entry("B", 2),
            entry("C", 3),
            entry("D", 4),
            entry("E", 5),
        ];

        let options = MatchOptions {
            stop_after: Some(2),
            ..MatchOptions::default()
        };
        let outcome = match_feed(&feed, &[], day(), &directory(), &options);

        assert_eq!(names(&outcome), vec!["A", "B"]);
    }

    #[test]
    fn unknown_athlete_is_still_deduplicated_but_left_unassigned() {
        let mut stranger = entry("Mystery Run", 1200);
        stranger.athlete.firstname = "Stranger".to_string();
        stranger.athlete.lastname = "S.".to_string();

        let outcome = match_feed(
            &[stranger],
            &[],
            day(),
            &directory(),
            &MatchOptions::default(),
        );

        assert_eq!(outcome.new_activities.len(), 1);
        assert!(outcome.new_activities[0].athlete.is_none());
        assert_eq!(outcome.window.len(), 1);
    }
}
