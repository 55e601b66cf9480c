use std::cmp::Ordering;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::fetch::{Endpoint, Fetch, Params, response_items};

pub const FINISHED_STATUS: &str = "FT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamRef {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fixture {
    pub id: u64,
    pub date: String,
    pub kickoff: Option<DateTime<Utc>>,
    pub status: String,
    pub league_id: u32,
    pub season: u16,
    pub home: TeamRef,
    pub away: TeamRef,
    pub home_goals: Option<u32>,
    pub away_goals: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Draw,
    Loss,
}

impl Outcome {
    pub fn from_goals(goals_for: u32, goals_against: u32) -> Self {
        match goals_for.cmp(&goals_against) {
            Ordering::Greater => Outcome::Win,
            Ordering::Equal => Outcome::Draw,
            Ordering::Less => Outcome::Loss,
        }
    }
}

impl Fixture {
    pub fn is_finished(&self) -> bool {
        self.status == FINISHED_STATUS
    }

    /// Goals as (for, against) from `team_id`'s point of view. The match's own
    /// home/away labels only decide which side of the score to read: a team
    /// that is not the listed home side is read as the away side.
    pub fn goals_from(&self, team_id: u32) -> (u32, u32) {
        let home = self.home_goals.unwrap_or(0);
        let away = self.away_goals.unwrap_or(0);
        if self.home.id == team_id {
            (home, away)
        } else {
            (away, home)
        }
    }

    pub fn outcome_for(&self, team_id: u32) -> Outcome {
        let (goals_for, goals_against) = self.goals_from(team_id);
        Outcome::from_goals(goals_for, goals_against)
    }
}

pub fn parse_fixture(v: &Value) -> Option<Fixture> {
    let fixture = v.get("fixture")?;
    let id = fixture.get("id")?.as_u64()?;
    let date = fixture
        .get("date")
        .and_then(|x| x.as_str())
        .unwrap_or_default()
        .to_string();
    let kickoff = DateTime::parse_from_rfc3339(&date)
        .ok()
        .map(|d| d.with_timezone(&Utc));
    let status = fixture
        .get("status")
        .and_then(|s| s.get("short"))
        .and_then(|x| x.as_str())
        .unwrap_or_default()
        .to_string();

    let league = v.get("league");
    let league_id = league
        .and_then(|l| l.get("id"))
        .and_then(|x| x.as_u64())
        .unwrap_or(0) as u32;
    let season = league
        .and_then(|l| l.get("season"))
        .and_then(|x| x.as_u64())
        .unwrap_or(0) as u16;

    let teams = v.get("teams")?;
    let home = parse_team(teams.get("home")?)?;
    let away = parse_team(teams.get("away")?)?;

    let goals = v.get("goals");
    let home_goals = goals
        .and_then(|g| g.get("home"))
        .and_then(|x| x.as_u64())
        .map(|x| x as u32);
    let away_goals = goals
        .and_then(|g| g.get("away"))
        .and_then(|x| x.as_u64())
        .map(|x| x as u32);

    Some(Fixture {
        id,
        date,
        kickoff,
        status,
        league_id,
        season,
        home,
        away,
        home_goals,
        away_goals,
    })
}

pub fn parse_team(v: &Value) -> Option<TeamRef> {
    let id = v.get("id")?.as_u64()? as u32;
    let name = v
        .get("name")
        .and_then(|x| x.as_str())
        .unwrap_or_default()
        .to_string();
    Some(TeamRef { id, name })
}

pub fn parse_fixtures(v: &Value) -> Vec<Fixture> {
    response_items(v).iter().filter_map(parse_fixture).collect()
}

/// Newest first. Unparseable dates sort after parseable ones; ties fall back to
/// the raw string and then the fixture id so the order is total.
pub fn sort_newest_first(fixtures: &mut [Fixture]) {
    fixtures.sort_by(|a, b| {
        match (a.kickoff, b.kickoff) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| b.date.cmp(&a.date))
        .then_with(|| b.id.cmp(&a.id))
    });
}

pub fn most_recent(mut fixtures: Vec<Fixture>, n: usize) -> Vec<Fixture> {
    sort_newest_first(&mut fixtures);
    fixtures.truncate(n);
    fixtures
}

pub fn league_finished_params(league_id: u32, season: u16) -> Params {
    Params::new()
        .with("league", league_id)
        .with("season", season)
        .with("status", FINISHED_STATUS)
}

pub fn league_upcoming_params(league_id: u32, season: u16, next: usize) -> Params {
    Params::new()
        .with("league", league_id)
        .with("season", season)
        .with("next", next)
}

pub fn team_finished_params(team_id: u32, season: u16) -> Params {
    Params::new()
        .with("team", team_id)
        .with("season", season)
        .with("status", FINISHED_STATUS)
}

pub fn h2h_finished_params(home_id: u32, away_id: u32, season: u16) -> Params {
    Params::new()
        .with("h2h", format!("{home_id}-{away_id}"))
        .with("season", season)
        .with("status", FINISHED_STATUS)
}

pub fn fetch_finished_league_fixtures(
    fetch: &dyn Fetch,
    league_id: u32,
    season: u16,
) -> Result<Vec<Fixture>> {
    let v = fetch
        .fetch(Endpoint::Fixtures, &league_finished_params(league_id, season))
        .with_context(|| format!("finished fixtures request failed (league={league_id})"))?;
    Ok(parse_fixtures(&v))
}

pub fn fetch_upcoming_league_fixtures(
    fetch: &dyn Fetch,
    league_id: u32,
    season: u16,
    next: usize,
) -> Result<Vec<Fixture>> {
    let v = fetch
        .fetch(
            Endpoint::Fixtures,
            &league_upcoming_params(league_id, season, next),
        )
        .with_context(|| format!("upcoming fixtures request failed (league={league_id})"))?;
    Ok(parse_fixtures(&v))
}

pub fn fetch_team_fixtures(fetch: &dyn Fetch, team_id: u32, season: u16) -> Result<Vec<Fixture>> {
    let v = fetch
        .fetch(Endpoint::Fixtures, &team_finished_params(team_id, season))
        .with_context(|| format!("team fixtures request failed (team={team_id})"))?;
    Ok(parse_fixtures(&v))
}

pub fn fetch_h2h_fixtures(
    fetch: &dyn Fetch,
    home_id: u32,
    away_id: u32,
    season: u16,
) -> Result<Vec<Fixture>> {
    let v = fetch
        .fetch(
            Endpoint::Fixtures,
            &h2h_finished_params(home_id, away_id, season),
        )
        .with_context(|| format!("h2h fixtures request failed ({home_id}-{away_id})"))?;
    Ok(parse_fixtures(&v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_fetch::fixture_item;

    fn fx(id: u64, date: &str) -> Fixture {
        parse_fixture(&fixture_item(
            id,
            date,
            2024,
            (1, "A"),
            (2, "B"),
            (Some(1), Some(0)),
        ))
        .unwrap()
    }

    #[test]
    fn parses_provider_item() {
        let f = fx(10, "2024-08-16T19:00:00+00:00");
        assert_eq!(f.id, 10);
        assert_eq!(f.season, 2024);
        assert_eq!(f.league_id, 39);
        assert!(f.is_finished());
        assert!(f.kickoff.is_some());
        assert_eq!(f.home.name, "A");
        assert_eq!(f.home_goals, Some(1));
    }

    #[test]
    fn null_goals_parse_as_none() {
        let v = fixture_item(1, "2025-01-01T15:00:00+00:00", 2024, (1, "A"), (2, "B"), (None, None));
        let f = parse_fixture(&v).unwrap();
        assert_eq!(f.home_goals, None);
        assert_eq!(f.goals_from(1), (0, 0));
    }

    #[test]
    fn goals_are_read_from_the_teams_side() {
        let f = fx(1, "2024-08-16T19:00:00+00:00");
        assert_eq!(f.goals_from(1), (1, 0));
        assert_eq!(f.goals_from(2), (0, 1));
        assert_eq!(f.outcome_for(1), Outcome::Win);
        assert_eq!(f.outcome_for(2), Outcome::Loss);
    }

    #[test]
    fn newest_first_uses_parsed_time_not_offset_text() {
        // 01:00+02:00 is earlier than 00:30+00:00 despite sorting later as text.
        let early = fx(1, "2024-08-17T01:00:00+02:00");
        let late = fx(2, "2024-08-17T00:30:00+00:00");
        let undated = fx(3, "");
        let out = most_recent(vec![undated, early, late], 2);
        assert_eq!(out.iter().map(|f| f.id).collect::<Vec<_>>(), vec![2, 1]);
    }

    #[test]
    fn window_larger_than_input_keeps_everything() {
        let out = most_recent(vec![fx(1, "2024-08-16T19:00:00+00:00")], 5);
        assert_eq!(out.len(), 1);
    }
}
