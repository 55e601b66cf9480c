use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{info, warn};

use crate::config::FeatureConfig;
use crate::export::{self, ExportReport};
use crate::features::{BatchReport, FeatureAssembler};
use crate::fetch::Fetch;
use crate::fixtures::{fetch_finished_league_fixtures, fetch_upcoming_league_fixtures};
use crate::leagues::League;
use crate::table::{self, FeatureTable};

pub const TRAINING_WORKBOOK: &str = "training_data.xlsx";
pub const UPCOMING_WORKBOOK: &str = "upcoming_features.xlsx";
pub const TRAINING_COLUMNS: &str = "training_columns.json";
pub const COMBINED_SHEET: &str = "training_data";

#[derive(Debug)]
pub struct LeagueRun {
    pub league: League,
    pub report: BatchReport,
    pub table: FeatureTable,
    /// Set when the league's fixture list itself could not be fetched.
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct PipelineRun {
    pub leagues: Vec<LeagueRun>,
    pub combined: FeatureTable,
}

impl PipelineRun {
    pub fn rows(&self) -> usize {
        self.combined.len()
    }

    pub fn processed(&self) -> usize {
        self.leagues.iter().map(|l| l.report.processed).sum()
    }

    pub fn skipped(&self) -> usize {
        self.leagues.iter().map(|l| l.report.skipped).sum()
    }

    pub fn failed(&self) -> usize {
        self.leagues.iter().map(|l| l.report.failed.len()).sum()
    }

    fn push(&mut self, run: LeagueRun) {
        self.combined.append(&run.table);
        self.leagues.push(run);
    }
}

/// Every finished fixture of every league through the training assembler.
/// A league whose fixture list fails is recorded and the run moves on.
pub fn extract_training_data(
    fetch: &dyn Fetch,
    leagues: &[League],
    cfg: &FeatureConfig,
) -> PipelineRun {
    let assembler = FeatureAssembler::new(fetch, cfg.clone());
    let mut run = PipelineRun::default();
    for league in leagues {
        info!(league = %league.name, season = league.season, "processing league");
        let fixtures = match fetch_finished_league_fixtures(fetch, league.id, league.season) {
            Ok(fixtures) => fixtures,
            Err(err) => {
                warn!(league = %league.name, "failed to fetch fixtures: {err:#}");
                run.push(failed_league(league, format!("{err:#}")));
                continue;
            }
        };
        let fixtures = fixtures
            .into_iter()
            .filter(|f| f.is_finished())
            .collect::<Vec<_>>();
        info!(league = %league.name, fixtures = fixtures.len(), "fixtures retrieved");

        let report = assembler.build_training_set(&fixtures);
        info!(league = %league.name, "{}", report.summary_line());
        let table = FeatureTable::from_records(&report.records);
        run.push(LeagueRun {
            league: league.clone(),
            report,
            table,
            error: None,
        });
    }
    run
}

/// Next `next` fixtures per league through the prediction assembler. With a
/// saved training column list, every table is aligned to it.
pub fn extract_upcoming_features(
    fetch: &dyn Fetch,
    leagues: &[League],
    cfg: &FeatureConfig,
    next: usize,
    training_columns: Option<&[String]>,
) -> PipelineRun {
    let assembler = FeatureAssembler::new(fetch, cfg.clone());
    let mut run = PipelineRun::default();
    for league in leagues {
        let fixtures = match fetch_upcoming_league_fixtures(fetch, league.id, league.season, next) {
            Ok(fixtures) => fixtures,
            Err(err) => {
                warn!(league = %league.name, "failed to fetch upcoming fixtures: {err:#}");
                run.push(failed_league(league, format!("{err:#}")));
                continue;
            }
        };
        let report = assembler.build_prediction_set(&fixtures);
        info!(league = %league.name, "{}", report.summary_line());
        let mut table = FeatureTable::from_records(&report.records);
        if let Some(columns) = training_columns {
            table = table.reindex(columns);
        }
        run.push(LeagueRun {
            league: league.clone(),
            report,
            table,
            error: None,
        });
    }
    run
}

fn failed_league(league: &League, error: String) -> LeagueRun {
    LeagueRun {
        league: league.clone(),
        report: BatchReport::default(),
        table: FeatureTable::default(),
        error: Some(error),
    }
}

/// Per-league sheets (leagues with rows only) plus the combined sheet.
pub fn write_run(run: &PipelineRun, path: &Path, combined_sheet: &str) -> Result<ExportReport> {
    let mut sheets = run
        .leagues
        .iter()
        .filter(|l| !l.table.is_empty())
        .map(|l| (l.league.name.clone(), l.table.clone()))
        .collect::<Vec<_>>();
    sheets.push((combined_sheet.to_string(), run.combined.clone()));
    export::write_workbook(path, &sheets)
}

pub fn write_training_outputs(run: &PipelineRun, out_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let workbook = out_dir.join(TRAINING_WORKBOOK);
    write_run(run, &workbook, COMBINED_SHEET)?;
    let columns = out_dir.join(TRAINING_COLUMNS);
    table::save_columns(&columns, &run.combined.feature_columns())?;
    Ok((workbook, columns))
}
