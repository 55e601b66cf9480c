use std::collections::HashSet;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use crate::fetch::{Endpoint, Fetch, Params, response_items};

pub const DEFAULT_SEASON: u16 = 2024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct League {
    pub id: u32,
    pub name: String,
    pub season: u16,
}

impl League {
    fn new(id: u32, name: &str, season: u16) -> Self {
        Self {
            id,
            name: name.to_string(),
            season,
        }
    }
}

// A small curated set keeps request volume bounded.
const CURATED: &[(u32, &str)] = &[
    (39, "Premier League"),
    (140, "La Liga"),
    (135, "Serie A"),
    (78, "Bundesliga"),
    (61, "Ligue 1"),
];

pub fn curated_leagues() -> Vec<League> {
    CURATED
        .iter()
        .map(|(id, name)| League::new(*id, name, DEFAULT_SEASON))
        .collect()
}

/// Empty `ids` selects the curated list. Ids outside the list get a generic name.
pub fn select_leagues(ids: &[u32], season: Option<u16>) -> Vec<League> {
    let season = season.unwrap_or(DEFAULT_SEASON);
    if ids.is_empty() {
        return curated_leagues()
            .into_iter()
            .map(|mut l| {
                l.season = season;
                l
            })
            .collect();
    }
    ids.iter()
        .map(|id| {
            let name = CURATED
                .iter()
                .find(|(known, _)| known == id)
                .map(|(_, name)| name.to_string())
                .unwrap_or_else(|| format!("League {id}"));
            League {
                id: *id,
                name,
                season,
            }
        })
        .collect()
}

pub fn parse_ids(raw: &str) -> Vec<u32> {
    let ids = raw
        .split([',', ';', ' '])
        .filter_map(|part| part.trim().parse::<u32>().ok())
        .filter(|id| *id != 0)
        .collect::<Vec<_>>();
    dedup_ids(ids)
}

fn dedup_ids(ids: Vec<u32>) -> Vec<u32> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for id in ids {
        if seen.insert(id) {
            out.push(id);
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderLeague {
    pub id: u32,
    pub name: String,
    pub country: String,
    pub current_season: Option<u16>,
}

pub fn parse_provider_leagues(v: &Value) -> Vec<ProviderLeague> {
    response_items(v)
        .iter()
        .filter_map(|item| {
            let league = item.get("league")?;
            let id = league.get("id")?.as_u64()? as u32;
            let name = league.get("name")?.as_str()?.to_string();
            let country = item
                .get("country")
                .and_then(|c| c.get("name"))
                .and_then(|x| x.as_str())
                .unwrap_or_default()
                .to_string();
            let current_season = item
                .get("seasons")
                .and_then(|s| s.as_array())
                .and_then(|seasons| {
                    seasons.iter().find(|s| {
                        s.get("current")
                            .and_then(|x| x.as_bool())
                            .unwrap_or(false)
                    })
                })
                .and_then(|s| s.get("year"))
                .and_then(|x| x.as_u64())
                .map(|y| y as u16);
            Some(ProviderLeague {
                id,
                name,
                country,
                current_season,
            })
        })
        .collect()
}

/// Case-insensitive match on country, plus an optional name fragment.
pub fn search_leagues(
    leagues: &[ProviderLeague],
    country: &str,
    name_fragment: Option<&str>,
) -> Vec<ProviderLeague> {
    let fragment = name_fragment.map(|f| f.to_ascii_lowercase());
    leagues
        .iter()
        .filter(|l| l.country.eq_ignore_ascii_case(country.trim()))
        .filter(|l| {
            fragment
                .as_deref()
                .is_none_or(|f| l.name.to_ascii_lowercase().contains(f))
        })
        .cloned()
        .collect()
}

pub fn fetch_provider_leagues(fetch: &dyn Fetch) -> Result<Vec<ProviderLeague>> {
    let v = fetch
        .fetch(Endpoint::Leagues, &Params::new())
        .context("leagues request failed")?;
    Ok(parse_provider_leagues(&v))
}
