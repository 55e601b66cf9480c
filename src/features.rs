use std::collections::BTreeMap;

use anyhow::{Context, Result};
use rayon::ThreadPool;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::FeatureConfig;
use crate::extraction::Extraction;
use crate::fetch::Fetch;
use crate::fixture_stats::extract_fixture_stats;
use crate::fixtures::{Fixture, TeamRef};
use crate::h2h::h2h_features;
use crate::player_impact::missing_players_impact;
use crate::team_form::team_form;

pub const HOME_CORNERS: &str = "home_corners";
pub const AWAY_CORNERS: &str = "away_corners";
pub const HOME_MISSING_IMPACT: &str = "home_missing_impact";
pub const AWAY_MISSING_IMPACT: &str = "away_missing_impact";

/// One flat row. `features` is ordered so names and serialisation are stable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRecord {
    pub fixture_id: Option<u64>,
    pub home_team: String,
    pub away_team: String,
    pub features: BTreeMap<String, f64>,
}

impl FeatureRecord {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.features.get(name).copied()
    }

    pub fn ground_truth(&self) -> Option<(f64, f64)> {
        Some((self.get(HOME_CORNERS)?, self.get(AWAY_CORNERS)?))
    }
}

/// A prospective (or played) pairing. Prediction mode only needs this much.
#[derive(Debug, Clone, PartialEq)]
pub struct Matchup {
    pub fixture_id: Option<u64>,
    pub home: TeamRef,
    pub away: TeamRef,
    pub season: u16,
}

impl From<&Fixture> for Matchup {
    fn from(f: &Fixture) -> Self {
        Self {
            fixture_id: Some(f.id),
            home: f.home.clone(),
            away: f.away.clone(),
            season: f.season,
        }
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub records: Vec<FeatureRecord>,
    pub processed: usize,
    /// Fixtures with no usable data (not errors).
    pub skipped: usize,
    pub failed: Vec<String>,
}

impl BatchReport {
    pub fn summary_line(&self) -> String {
        format!(
            "{} processed: {} rows, {} skipped, {} failed",
            self.processed,
            self.records.len(),
            self.skipped,
            self.failed.len()
        )
    }
}

pub struct FeatureAssembler<'a> {
    fetch: &'a dyn Fetch,
    cfg: FeatureConfig,
    pool: Option<ThreadPool>,
}

impl<'a> FeatureAssembler<'a> {
    pub fn new(fetch: &'a dyn Fetch, cfg: FeatureConfig) -> Self {
        let pool = build_fetch_pool(cfg.parallelism);
        Self { fetch, cfg, pool }
    }

    /// Post-match statistics gate the row: no corners, no record.
    pub fn training_record(&self, fixture: &Fixture) -> Result<Extraction<FeatureRecord>> {
        let stats = extract_fixture_stats(self.fetch, fixture.id, fixture.home.id, fixture.away.id)
            .context("fixture statistics")?;
        let stats = match stats {
            Extraction::Ready(stats) => stats,
            Extraction::Skipped(reason) => return Ok(Extraction::Skipped(reason)),
        };

        let mut features = stats.raw;
        features.insert(HOME_CORNERS.to_string(), stats.home_corners);
        features.insert(AWAY_CORNERS.to_string(), stats.away_corners);
        self.add_pre_match(&Matchup::from(fixture), &mut features)?;

        Ok(Extraction::Ready(FeatureRecord {
            fixture_id: Some(fixture.id),
            home_team: fixture.home.name.clone(),
            away_team: fixture.away.name.clone(),
            features,
        }))
    }

    pub fn prediction_record(&self, matchup: &Matchup) -> Result<FeatureRecord> {
        let mut features = BTreeMap::new();
        self.add_pre_match(matchup, &mut features)?;
        Ok(FeatureRecord {
            fixture_id: matchup.fixture_id,
            home_team: matchup.home.name.clone(),
            away_team: matchup.away.name.clone(),
            features,
        })
    }

    fn add_pre_match(&self, m: &Matchup, features: &mut BTreeMap<String, f64>) -> Result<()> {
        let window = self.cfg.form_window;
        let home_form = team_form(self.fetch, m.home.id, m.season, window).context("home form")?;
        let away_form = team_form(self.fetch, m.away.id, m.season, window).context("away form")?;
        for (name, value) in home_form.fields() {
            features.insert(format!("home_{name}"), value);
        }
        for (name, value) in away_form.fields() {
            features.insert(format!("away_{name}"), value);
        }

        let h2h = h2h_features(self.fetch, m.home.id, m.away.id, m.season, self.cfg.h2h_window)
            .context("head-to-head")?;
        for (name, value) in h2h.fields() {
            features.insert(name.to_string(), value);
        }

        let season = self.cfg.player_season.unwrap_or(m.season);
        let pool = self.pool.as_ref();
        let home_impact = missing_players_impact(self.fetch, m.home.id, season, pool)
            .context("home player availability")?;
        let away_impact = missing_players_impact(self.fetch, m.away.id, season, pool)
            .context("away player availability")?;
        features.insert(HOME_MISSING_IMPACT.to_string(), home_impact);
        features.insert(AWAY_MISSING_IMPACT.to_string(), away_impact);
        Ok(())
    }

    /// Sequential pass; a fixture that errors is logged and left out.
    pub fn build_training_set(&self, fixtures: &[Fixture]) -> BatchReport {
        let mut report = BatchReport::default();
        let total = fixtures.len();
        for (idx, fixture) in fixtures.iter().enumerate() {
            report.processed += 1;
            match self.training_record(fixture) {
                Ok(Extraction::Ready(record)) => report.records.push(record),
                Ok(Extraction::Skipped(_)) => report.skipped += 1,
                Err(err) => {
                    warn!(fixture_id = fixture.id, "skipping fixture: {err:#}");
                    report.failed.push(format!("fixture {}: {err:#}", fixture.id));
                }
            }
            if (idx + 1) % 25 == 0 {
                info!("extracted {}/{} fixtures", idx + 1, total);
            }
        }
        report
    }

    pub fn build_prediction_set(&self, fixtures: &[Fixture]) -> BatchReport {
        let mut report = BatchReport::default();
        for fixture in fixtures {
            report.processed += 1;
            match self.prediction_record(&Matchup::from(fixture)) {
                Ok(record) => report.records.push(record),
                Err(err) => {
                    warn!(fixture_id = fixture.id, "skipping fixture: {err:#}");
                    report.failed.push(format!("fixture {}: {err:#}", fixture.id));
                }
            }
        }
        report
    }
}

fn build_fetch_pool(threads: usize) -> Option<ThreadPool> {
    if threads <= 1 {
        return None;
    }
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => Some(pool),
        Err(err) => {
            warn!("fetch pool unavailable, fetching sequentially: {err}");
            None
        }
    }
}
