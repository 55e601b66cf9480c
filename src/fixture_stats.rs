use std::collections::BTreeMap;

use anyhow::Result;
use tracing::warn;

use crate::extraction::{Extraction, SkipReason};
use crate::fetch::{Fetch, response_items};
use crate::stats::{TeamStatistics, fetch_statistics_payload, parse_statistics};

#[derive(Debug, Clone, PartialEq)]
pub struct FixtureStats {
    pub fixture_id: u64,
    pub home_corners: f64,
    pub away_corners: f64,
    /// Every reported stat, keyed `<team name>_<stat type>`.
    pub raw: BTreeMap<String, f64>,
}

pub fn raw_stat_key(team_name: &str, kind: &str) -> String {
    format!("{team_name}_{kind}")
}

/// Post-match statistics for one fixture. Only fixtures whose payload covers
/// both teams and carries both corner counts are usable as training rows.
/// The team count is taken from the payload as reported, before malformed
/// entries are dropped by parsing.
pub fn extract_fixture_stats(
    fetch: &dyn Fetch,
    fixture_id: u64,
    home_id: u32,
    away_id: u32,
) -> Result<Extraction<FixtureStats>> {
    let payload = fetch_statistics_payload(fetch, fixture_id)?;
    let reported = response_items(&payload).len();
    let out = if reported != 2 {
        Extraction::Skipped(SkipReason::TeamCount(reported))
    } else {
        extract_from_teams(fixture_id, home_id, away_id, &parse_statistics(&payload))
    };
    if let Extraction::Skipped(reason) = &out {
        warn!(fixture_id, "skipping fixture: {reason}");
    }
    Ok(out)
}

pub fn extract_from_teams(
    fixture_id: u64,
    home_id: u32,
    away_id: u32,
    teams: &[TeamStatistics],
) -> Extraction<FixtureStats> {
    if teams.len() != 2 {
        return Extraction::Skipped(SkipReason::TeamCount(teams.len()));
    }

    let mut raw = BTreeMap::new();
    let mut home_corners = None;
    let mut away_corners = None;
    for team in teams {
        for entry in &team.entries {
            // Null values are left out, so a stat that is null in every
            // fixture never becomes a column.
            if let Some(value) = entry.value {
                raw.insert(raw_stat_key(&team.team.name, &entry.kind), value);
            }
        }
        let corners = team.corners();
        if team.team.id == home_id {
            home_corners = corners;
        } else if team.team.id == away_id {
            away_corners = corners;
        }
    }

    match (home_corners, away_corners) {
        (Some(home_corners), Some(away_corners)) => Extraction::Ready(FixtureStats {
            fixture_id,
            home_corners,
            away_corners,
            raw,
        }),
        (home, away) => Extraction::Skipped(SkipReason::MissingCorners {
            home: home.is_none(),
            away: away.is_none(),
        }),
    }
}
