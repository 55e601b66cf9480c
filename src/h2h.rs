use anyhow::Result;
use serde::Serialize;
use tracing::warn;

use crate::fetch::Fetch;
use crate::fixtures::{Fixture, Outcome, fetch_h2h_fixtures, most_recent};
use crate::stats::{TeamStatistics, fetch_fixture_statistics};

/// Meetings between `home_id` and `away_id`, always seen from `home_id`'s side
/// whatever venue each meeting was played at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HeadToHead {
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub avg_home_corners: f64,
    pub avg_away_corners: f64,
    pub avg_home_xg: f64,
    pub avg_away_xg: f64,
}

impl HeadToHead {
    pub fn fields(&self) -> [(&'static str, f64); 7] {
        [
            ("h2h_wins", self.wins as f64),
            ("h2h_draws", self.draws as f64),
            ("h2h_losses", self.losses as f64),
            ("h2h_avg_home_corners", self.avg_home_corners),
            ("h2h_avg_away_corners", self.avg_away_corners),
            ("h2h_avg_home_xg", self.avg_home_xg),
            ("h2h_avg_away_xg", self.avg_away_xg),
        ]
    }
}

#[derive(Debug)]
struct H2hTotals {
    home_id: u32,
    away_id: u32,
    counted: usize,
    wins: u32,
    draws: u32,
    losses: u32,
    home_corners: f64,
    away_corners: f64,
    home_xg: f64,
    away_xg: f64,
}

impl H2hTotals {
    fn new(home_id: u32, away_id: u32) -> Self {
        Self {
            home_id,
            away_id,
            counted: 0,
            wins: 0,
            draws: 0,
            losses: 0,
            home_corners: 0.0,
            away_corners: 0.0,
            home_xg: 0.0,
            away_xg: 0.0,
        }
    }

    fn add_meeting(&mut self, fixture: &Fixture, stats: &[TeamStatistics]) {
        self.counted += 1;
        match fixture.outcome_for(self.home_id) {
            Outcome::Win => self.wins += 1,
            Outcome::Draw => self.draws += 1,
            Outcome::Loss => self.losses += 1,
        }
        for team in stats {
            let xg = team.expected_goals().unwrap_or(0.0);
            let corners = team.corners().unwrap_or(0.0);
            if team.team.id == self.home_id {
                self.home_xg += xg;
                self.home_corners += corners;
            } else if team.team.id == self.away_id {
                self.away_xg += xg;
                self.away_corners += corners;
            }
        }
    }

    fn finish(self) -> HeadToHead {
        let mut out = HeadToHead {
            wins: self.wins,
            draws: self.draws,
            losses: self.losses,
            ..HeadToHead::default()
        };
        if self.counted == 0 {
            return out;
        }
        let n = self.counted as f64;
        out.avg_home_corners = self.home_corners / n;
        out.avg_away_corners = self.away_corners / n;
        out.avg_home_xg = self.home_xg / n;
        out.avg_away_xg = self.away_xg / n;
        out
    }
}

/// Pure fold. Meetings without statistics do not count toward anything, so the
/// averages divide by the meetings that had statistics, not by the window.
pub fn aggregate_h2h<'a, I>(home_id: u32, away_id: u32, meetings: I) -> HeadToHead
where
    I: IntoIterator<Item = (&'a Fixture, &'a [TeamStatistics])>,
{
    let mut totals = H2hTotals::new(home_id, away_id);
    for (fixture, stats) in meetings {
        if stats.is_empty() {
            continue;
        }
        totals.add_meeting(fixture, stats);
    }
    totals.finish()
}

/// Last `window` finished meetings in `season`. A meeting whose statistics
/// cannot be fetched is logged and left out; it never fails the aggregate.
pub fn h2h_features(
    fetch: &dyn Fetch,
    home_id: u32,
    away_id: u32,
    season: u16,
    window: usize,
) -> Result<HeadToHead> {
    let meetings = most_recent(fetch_h2h_fixtures(fetch, home_id, away_id, season)?, window);
    let mut totals = H2hTotals::new(home_id, away_id);
    for fixture in &meetings {
        let stats = match fetch_fixture_statistics(fetch, fixture.id) {
            Ok(stats) => stats,
            Err(err) => {
                warn!(fixture_id = fixture.id, "h2h meeting skipped: {err:#}");
                continue;
            }
        };
        if stats.is_empty() {
            continue;
        }
        totals.add_meeting(fixture, &stats);
    }
    Ok(totals.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_fetch::{FakeFetch, fixture_item, statistics_params, team_stats_item};
    use crate::fetch::Endpoint;
    use crate::fixtures::{h2h_finished_params, parse_fixture};
    use crate::stats::parse_team_statistics;
    use serde_json::json;

    const HOME: (u32, &str) = (50, "City");
    const AWAY: (u32, &str) = (40, "Rovers");

    fn corners(team: (u32, &str), n: u32, xg: &str) -> serde_json::Value {
        team_stats_item(team, &[("Corner Kicks", json!(n)), ("Expected Goals", json!(xg))])
    }

    #[test]
    fn away_win_counts_for_home_id() {
        // home_id played as the listed away side and won 3-1.
        let f = parse_fixture(&fixture_item(1, "2024-03-01T15:00:00+00:00", 2024, AWAY, HOME, (Some(1), Some(3)))).unwrap();
        let stats = vec![
            parse_team_statistics(&corners(AWAY, 2, "0.7")).unwrap(),
            parse_team_statistics(&corners(HOME, 8, "2.1")).unwrap(),
        ];
        let h2h = aggregate_h2h(HOME.0, AWAY.0, [(&f, stats.as_slice())]);
        assert_eq!((h2h.wins, h2h.draws, h2h.losses), (1, 0, 0));
        assert_eq!(h2h.avg_home_corners, 8.0);
        assert_eq!(h2h.avg_away_corners, 2.0);
        assert_eq!(h2h.avg_home_xg, 2.1);
    }

    #[test]
    fn averages_divide_by_meetings_with_statistics() {
        let fake = FakeFetch::new();
        let items = (1..=5u64)
            .map(|id| {
                let date = format!("2024-0{id}-01T15:00:00+00:00");
                fixture_item(id, &date, 2024, HOME, AWAY, (Some(1), Some(0)))
            })
            .collect::<Vec<_>>();
        fake.insert_items(Endpoint::Fixtures, &h2h_finished_params(HOME.0, AWAY.0, 2024), items);
        for id in [1u64, 3, 5] {
            fake.insert_items(
                Endpoint::FixtureStatistics,
                &statistics_params(id),
                vec![corners(HOME, 6, "1.5"), corners(AWAY, 3, "0.5")],
            );
        }
        // 2 fails outright, 4 has no statistics at all.
        fake.fail(Endpoint::FixtureStatistics, &statistics_params(2), 503);

        let h2h = h2h_features(&fake, HOME.0, AWAY.0, 2024, 5).unwrap();
        assert_eq!(h2h.wins, 3);
        assert_eq!(h2h.avg_home_corners, 6.0);
        assert_eq!(h2h.avg_away_corners, 3.0);
        assert_eq!(h2h.avg_home_xg, 1.5);
        assert_eq!(h2h.avg_away_xg, 0.5);
    }

    #[test]
    fn window_keeps_newest_meetings() {
        let fake = FakeFetch::new();
        fake.insert_items(
            Endpoint::Fixtures,
            &h2h_finished_params(HOME.0, AWAY.0, 2024),
            vec![
                fixture_item(1, "2024-01-01T15:00:00+00:00", 2024, HOME, AWAY, (Some(0), Some(2))),
                fixture_item(2, "2024-05-01T15:00:00+00:00", 2024, AWAY, HOME, (Some(0), Some(0))),
            ],
        );
        for id in [1u64, 2] {
            fake.insert_items(
                Endpoint::FixtureStatistics,
                &statistics_params(id),
                vec![corners(HOME, 4, "1.0"), corners(AWAY, 4, "1.0")],
            );
        }
        let h2h = h2h_features(&fake, HOME.0, AWAY.0, 2024, 1).unwrap();
        assert_eq!((h2h.wins, h2h.draws, h2h.losses), (0, 1, 0));
        assert_eq!(fake.calls(Endpoint::FixtureStatistics, &statistics_params(1)), 0);
    }

    #[test]
    fn no_meetings_is_all_zero() {
        let fake = FakeFetch::new();
        let h2h = h2h_features(&fake, HOME.0, AWAY.0, 2024, 5).unwrap();
        assert_eq!(h2h, HeadToHead::default());
        assert!(h2h.fields().iter().all(|(_, v)| *v == 0.0));
    }
}
