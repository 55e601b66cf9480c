use anyhow::{Context, Result};
use rayon::ThreadPool;
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, warn};

use crate::fetch::{Endpoint, Fetch, Params, response_items};

pub const DEFAULT_RATING: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSeason {
    pub player_id: u32,
    pub injured: bool,
    pub rating: Option<f64>,
    pub goals: Option<f64>,
    pub assists: Option<f64>,
}

impl PlayerSeason {
    /// Rating plus goal contributions for an injured player, nothing otherwise.
    pub fn impact(&self) -> f64 {
        if !self.injured {
            return 0.0;
        }
        self.rating.unwrap_or(DEFAULT_RATING) + self.goals.unwrap_or(0.0) + self.assists.unwrap_or(0.0)
    }
}

pub fn parse_squad_ids(v: &Value) -> Vec<u32> {
    let Some(squad) = response_items(v).first() else {
        return Vec::new();
    };
    squad
        .get("players")
        .and_then(|x| x.as_array())
        .map(|players| {
            players
                .iter()
                .filter_map(|p| p.get("id").and_then(|x| x.as_u64()).map(|id| id as u32))
                .collect()
        })
        .unwrap_or_default()
}

/// First entry of a `players` lookup, reading its first statistics block.
pub fn parse_player_season(v: &Value) -> Option<PlayerSeason> {
    let item = response_items(v).first()?;
    let player = item.get("player");
    let player_id = player
        .and_then(|p| p.get("id"))
        .and_then(|x| x.as_u64())
        .unwrap_or(0) as u32;
    let block = item
        .get("statistics")
        .and_then(|x| x.as_array())
        .and_then(|arr| arr.first());

    let games = block.and_then(|b| b.get("games"));
    let goals = block.and_then(|b| b.get("goals"));
    let injured = games
        .and_then(|g| g.get("injured"))
        .or_else(|| player.and_then(|p| p.get("injured")))
        .and_then(|x| x.as_bool())
        .unwrap_or(false);

    Some(PlayerSeason {
        player_id,
        injured,
        rating: games.and_then(|g| g.get("rating")).and_then(number_like),
        goals: goals.and_then(|g| g.get("total")).and_then(number_like),
        assists: goals.and_then(|g| g.get("assists")).and_then(number_like),
    })
}

fn number_like(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub fn squad_params(team_id: u32) -> Params {
    Params::new().with("team", team_id)
}

pub fn player_params(player_id: u32, season: u16) -> Params {
    Params::new().with("id", player_id).with("season", season)
}

pub fn fetch_squad_ids(fetch: &dyn Fetch, team_id: u32) -> Result<Vec<u32>> {
    let v = fetch
        .fetch(Endpoint::Squads, &squad_params(team_id))
        .with_context(|| format!("squad request failed (team={team_id})"))?;
    Ok(parse_squad_ids(&v))
}

fn fetch_player_season(fetch: &dyn Fetch, player_id: u32, season: u16) -> Option<PlayerSeason> {
    match fetch.fetch(Endpoint::Players, &player_params(player_id, season)) {
        Ok(v) => parse_player_season(&v),
        Err(err) => {
            warn!(player_id, season, "player lookup skipped: {err}");
            None
        }
    }
}

/// Sum of [`PlayerSeason::impact`] over the team's current squad. One request
/// per player; with a pool the lookups run concurrently but are summed in squad
/// order, so the result does not depend on scheduling. A failed player lookup
/// is logged and contributes nothing.
pub fn missing_players_impact(
    fetch: &dyn Fetch,
    team_id: u32,
    season: u16,
    pool: Option<&ThreadPool>,
) -> Result<f64> {
    let ids = fetch_squad_ids(fetch, team_id)?;
    if ids.is_empty() {
        debug!(team_id, "empty squad");
        return Ok(0.0);
    }

    let seasons: Vec<Option<PlayerSeason>> = match pool {
        Some(pool) if ids.len() > 1 => pool.install(|| {
            ids.par_iter()
                .map(|id| fetch_player_season(fetch, *id, season))
                .collect()
        }),
        _ => ids
            .iter()
            .map(|id| fetch_player_season(fetch, *id, season))
            .collect(),
    };

    let injured = seasons.iter().flatten().filter(|p| p.injured).count();
    let score: f64 = seasons.iter().flatten().map(PlayerSeason::impact).sum();
    debug!(team_id, squad = ids.len(), injured, score, "missing players impact");
    Ok(score)
}
