use anyhow::Result;
use serde::Serialize;

use crate::fetch::Fetch;
use crate::fixtures::{Fixture, Outcome, fetch_team_fixtures, most_recent};
use crate::stats::{TeamStatistics, fetch_fixture_statistics};

pub const FORM_FIELDS: [&str; 6] = [
    "avg_goals",
    "avg_corners",
    "avg_xg",
    "win_rate",
    "draw_rate",
    "loss_rate",
];

/// Recent-match summary for one team. All zeros when the window is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TeamForm {
    pub avg_goals: f64,
    pub avg_corners: f64,
    pub avg_xg: f64,
    pub win_rate: f64,
    pub draw_rate: f64,
    pub loss_rate: f64,
}

impl TeamForm {
    /// Named values in [`FORM_FIELDS`] order.
    pub fn fields(&self) -> [(&'static str, f64); 6] {
        [
            (FORM_FIELDS[0], self.avg_goals),
            (FORM_FIELDS[1], self.avg_corners),
            (FORM_FIELDS[2], self.avg_xg),
            (FORM_FIELDS[3], self.win_rate),
            (FORM_FIELDS[4], self.draw_rate),
            (FORM_FIELDS[5], self.loss_rate),
        ]
    }
}

#[derive(Debug, Default)]
struct FormTotals {
    matches: usize,
    goals: f64,
    corners: f64,
    xg: f64,
    wins: usize,
    draws: usize,
    losses: usize,
}

impl FormTotals {
    fn add_match(&mut self, team_id: u32, fixture: &Fixture, stats: &[TeamStatistics]) {
        self.matches += 1;
        let (goals_for, _) = fixture.goals_from(team_id);
        self.goals += goals_for as f64;
        match fixture.outcome_for(team_id) {
            Outcome::Win => self.wins += 1,
            Outcome::Draw => self.draws += 1,
            Outcome::Loss => self.losses += 1,
        }
        for team in stats.iter().filter(|t| t.team.id == team_id) {
            self.xg += team.expected_goals().unwrap_or(0.0);
            self.corners += team.corners().unwrap_or(0.0);
        }
    }

    fn finish(self) -> TeamForm {
        if self.matches == 0 {
            return TeamForm::default();
        }
        let n = self.matches as f64;
        TeamForm {
            avg_goals: self.goals / n,
            avg_corners: self.corners / n,
            avg_xg: self.xg / n,
            win_rate: self.wins as f64 / n,
            draw_rate: self.draws as f64 / n,
            loss_rate: self.losses as f64 / n,
        }
    }
}

/// Pure fold over already-fetched matches and their statistics.
pub fn aggregate_form<'a, I>(team_id: u32, matches: I) -> TeamForm
where
    I: IntoIterator<Item = (&'a Fixture, &'a [TeamStatistics])>,
{
    let mut totals = FormTotals::default();
    for (fixture, stats) in matches {
        totals.add_match(team_id, fixture, stats);
    }
    totals.finish()
}

/// Form over the team's last `window` finished matches of `season`. One
/// statistics request per match; a failed request fails the whole call.
pub fn team_form(fetch: &dyn Fetch, team_id: u32, season: u16, window: usize) -> Result<TeamForm> {
    let matches = most_recent(fetch_team_fixtures(fetch, team_id, season)?, window);
    let mut totals = FormTotals::default();
    for fixture in &matches {
        let stats = fetch_fixture_statistics(fetch, fixture.id)?;
        totals.add_match(team_id, fixture, &stats);
    }
    Ok(totals.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_fetch::{FakeFetch, fixture_item, statistics_params, team_stats_item};
    use crate::fetch::Endpoint;
    use crate::fixtures::{parse_fixture, team_finished_params};
    use crate::stats::parse_team_statistics;
    use serde_json::json;

    #[test]
    fn empty_window_is_all_zero() {
        let fake = FakeFetch::new();
        let form = team_form(&fake, 1, 2024, 5).unwrap();
        assert_eq!(form, TeamForm::default());
        assert_eq!(aggregate_form(1, std::iter::empty()), TeamForm::default());
    }

    #[test]
    fn zero_window_is_all_zero() {
        let fake = FakeFetch::new();
        fake.insert_items(
            Endpoint::Fixtures,
            &team_finished_params(1, 2024),
            vec![fixture_item(1, "2024-09-01T15:00:00+00:00", 2024, (1, "A"), (2, "B"), (Some(2), Some(0)))],
        );
        assert_eq!(team_form(&fake, 1, 2024, 0).unwrap(), TeamForm::default());
    }

    #[test]
    fn aggregates_by_side_and_window() {
        let fake = FakeFetch::new();
        fake.insert_items(
            Endpoint::Fixtures,
            &team_finished_params(1, 2024),
            vec![
                // Oldest: outside a window of 2.
                fixture_item(10, "2024-08-01T15:00:00+00:00", 2024, (1, "A"), (3, "C"), (Some(9), Some(0))),
                fixture_item(11, "2024-08-20T15:00:00+00:00", 2024, (2, "B"), (1, "A"), (Some(1), Some(1))),
                fixture_item(12, "2024-08-10T15:00:00+00:00", 2024, (1, "A"), (4, "D"), (Some(3), Some(1))),
            ],
        );
        fake.insert_items(
            Endpoint::FixtureStatistics,
            &statistics_params(11),
            vec![
                team_stats_item((2, "B"), &[("Corner Kicks", json!(9)), ("Expected Goals", json!("2.0"))]),
                team_stats_item((1, "A"), &[("Corner Kicks", json!(4)), ("Expected Goals", json!("0.5"))]),
            ],
        );
        fake.insert_items(
            Endpoint::FixtureStatistics,
            &statistics_params(12),
            vec![team_stats_item((1, "A"), &[("Corner Kicks", json!(null)), ("Expected Goals", json!("1.5"))])],
        );

        let form = team_form(&fake, 1, 2024, 2).unwrap();
        assert_eq!(form.avg_goals, 2.0);
        assert_eq!(form.avg_corners, 2.0);
        assert_eq!(form.avg_xg, 1.0);
        assert_eq!(form.win_rate, 0.5);
        assert_eq!(form.draw_rate, 0.5);
        assert_eq!(form.loss_rate, 0.0);
        assert_eq!(fake.calls(Endpoint::FixtureStatistics, &statistics_params(10)), 0);
    }

    #[test]
    fn statistics_failure_propagates() {
        let fake = FakeFetch::new();
        fake.insert_items(
            Endpoint::Fixtures,
            &team_finished_params(1, 2024),
            vec![fixture_item(1, "2024-09-01T15:00:00+00:00", 2024, (1, "A"), (2, "B"), (Some(2), Some(0)))],
        );
        fake.fail(Endpoint::FixtureStatistics, &statistics_params(1), 500);
        assert!(team_form(&fake, 1, 2024, 5).is_err());
    }

    #[test]
    fn pure_fold_matches_fields_order() {
        let f = parse_fixture(&fixture_item(1, "2024-09-01T15:00:00+00:00", 2024, (2, "B"), (1, "A"), (Some(0), Some(2)))).unwrap();
        let stats = vec![parse_team_statistics(&team_stats_item((1, "A"), &[("Corner Kicks", json!(5))])).unwrap()];
        let form = aggregate_form(1, [(&f, stats.as_slice())]);
        let fields = form.fields();
        assert_eq!(fields[0], ("avg_goals", 2.0));
        assert_eq!(fields[1], ("avg_corners", 5.0));
        assert_eq!(fields[3], ("win_rate", 1.0));
    }
}
