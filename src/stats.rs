use anyhow::{Context, Result};
use serde_json::Value;

use crate::fetch::{Endpoint, Fetch, Params, response_items};
use crate::fixtures::{TeamRef, parse_team};

pub const CORNER_KICKS: &str = "Corner Kicks";
pub const EXPECTED_GOALS: &str = "Expected Goals";

#[derive(Debug, Clone, PartialEq)]
pub struct StatEntry {
    pub kind: String,
    pub value: Option<f64>,
}

/// One team's block of a fixture statistics payload. The stat vocabulary is
/// whatever the provider sends; nothing here assumes a fixed set.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamStatistics {
    pub team: TeamRef,
    pub entries: Vec<StatEntry>,
}

impl TeamStatistics {
    pub fn value(&self, kind: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.kind == kind)
            .and_then(|e| e.value)
    }

    pub fn corners(&self) -> Option<f64> {
        self.value(CORNER_KICKS)
    }

    // Case-insensitive: the provider has not been consistent about casing here.
    pub fn expected_goals(&self) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.kind.eq_ignore_ascii_case(EXPECTED_GOALS))
            .and_then(|e| e.value)
    }
}

/// Numbers pass through, `"55%"` and `"1.23"` are parsed, anything else is absent.
pub fn parse_stat_value(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
            trimmed.parse::<f64>().ok().filter(|x| x.is_finite())
        }
        _ => None,
    }
}

pub fn parse_team_statistics(v: &Value) -> Option<TeamStatistics> {
    let team = parse_team(v.get("team")?)?;
    let entries = v
        .get("statistics")
        .and_then(|x| x.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|s| {
                    let kind = s.get("type")?.as_str()?.to_string();
                    let value = s.get("value").and_then(parse_stat_value);
                    Some(StatEntry { kind, value })
                })
                .collect()
        })
        .unwrap_or_default();
    Some(TeamStatistics { team, entries })
}

pub fn parse_statistics(v: &Value) -> Vec<TeamStatistics> {
    response_items(v)
        .iter()
        .filter_map(parse_team_statistics)
        .collect()
}

/// The raw statistics envelope, for callers that need the reported entry count.
pub fn fetch_statistics_payload(fetch: &dyn Fetch, fixture_id: u64) -> Result<Value> {
    fetch
        .fetch(
            Endpoint::FixtureStatistics,
            &Params::new().with("fixture", fixture_id),
        )
        .with_context(|| format!("statistics request failed (fixture={fixture_id})"))
}

pub fn fetch_fixture_statistics(fetch: &dyn Fetch, fixture_id: u64) -> Result<Vec<TeamStatistics>> {
    Ok(parse_statistics(&fetch_statistics_payload(fetch, fixture_id)?))
}
