use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use tracing::{error, info};

use fixture_lab::config::Config;
use fixture_lab::fetch::Fetch;
use fixture_lab::http_cache::MemoFetch;
use fixture_lab::http_client::ApiFootballClient;
use fixture_lab::leagues;
use fixture_lab::logging::init_logging;
use fixture_lab::pipeline::{self, PipelineRun};
use fixture_lab::table;

const VALUE_FLAGS: [&str; 3] = ["season", "league-ids", "out"];

const USAGE: &str = "usage: fixture_lab <train|upcoming|leagues <country> [name]> \
[--league-ids=39,140] [--season=2024] [--out=data/training]";

fn main() -> ExitCode {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_logging();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let positional = positional_args(&args);
    let command = positional.first().copied().unwrap_or("train");

    match command {
        "train" | "upcoming" | "leagues" => {}
        "help" | "-h" => {
            println!("{USAGE}");
            return Ok(());
        }
        other => return Err(anyhow!("unknown command `{other}`\n{USAGE}")),
    }

    let mut cfg = Config::from_env()?;
    cfg.apply_args(&args);
    let fetch = build_fetch(&cfg)?;

    match command {
        "train" => train(&cfg, fetch.as_ref()),
        "upcoming" => upcoming(&cfg, fetch.as_ref()),
        _ => find_leagues(&positional[1..], fetch.as_ref()),
    }
}

/// Arguments that are neither flags nor the value of a space-separated flag.
fn positional_args(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut skip_value = false;
    for arg in args {
        if skip_value {
            skip_value = false;
            continue;
        }
        if arg == "-h" {
            out.push(arg.as_str());
        } else if let Some(flag) = arg.strip_prefix("--") {
            skip_value = !flag.contains('=') && VALUE_FLAGS.contains(&flag);
        } else {
            out.push(arg.as_str());
        }
    }
    out
}

fn build_fetch(cfg: &Config) -> Result<Box<dyn Fetch>> {
    let client = ApiFootballClient::new(&cfg.fetch)?;
    if cfg.fetch.memoize {
        Ok(Box::new(MemoFetch::new(client)))
    } else {
        Ok(Box::new(client))
    }
}

fn train(cfg: &Config, fetch: &dyn Fetch) -> Result<()> {
    let run = pipeline::extract_training_data(fetch, &cfg.leagues, &cfg.features);
    print_run("Training extraction", &run);
    if run.rows() == 0 {
        println!("No valid rows; nothing written.");
        return Ok(());
    }
    let (workbook, columns) = pipeline::write_training_outputs(&run, &cfg.output_dir)?;
    info!(rows = run.rows(), "training data written");
    println!("Workbook: {}", workbook.display());
    println!("Columns:  {}", columns.display());
    Ok(())
}

fn upcoming(cfg: &Config, fetch: &dyn Fetch) -> Result<()> {
    let columns_path = cfg.output_dir.join(pipeline::TRAINING_COLUMNS);
    let columns = table::load_columns(&columns_path)?;
    if columns.is_none() {
        println!(
            "No training columns at {}; tables keep their own columns.",
            columns_path.display()
        );
    }
    let run = pipeline::extract_upcoming_features(
        fetch,
        &cfg.leagues,
        &cfg.features,
        cfg.upcoming,
        columns.as_deref(),
    );
    print_run("Upcoming features", &run);
    if run.rows() == 0 {
        return Ok(());
    }
    let path = cfg.output_dir.join(pipeline::UPCOMING_WORKBOOK);
    pipeline::write_run(&run, &path, "upcoming")
        .with_context(|| format!("write {}", path.display()))?;
    for league in &run.leagues {
        for row in league.table.rows() {
            println!("  {} vs {}", row.home_team, row.away_team);
        }
    }
    println!("Workbook: {}", path.display());
    Ok(())
}

fn find_leagues(positional: &[&str], fetch: &dyn Fetch) -> Result<()> {
    let country = positional
        .first()
        .ok_or_else(|| anyhow!("leagues needs a country\n{USAGE}"))?;
    let fragment = positional.get(1).copied();

    let all = leagues::fetch_provider_leagues(fetch)?;
    let hits = leagues::search_leagues(&all, country, fragment);
    if hits.is_empty() {
        println!("No leagues found for {country}.");
    }
    for league in hits {
        println!(
            "{:>5}  {}  ({}, current season {})",
            league.id,
            league.name,
            league.country,
            league
                .current_season
                .map(|s| s.to_string())
                .unwrap_or_else(|| "n/a".to_string())
        );
    }
    Ok(())
}

fn print_run(title: &str, run: &PipelineRun) {
    println!("{title} complete");
    for league in &run.leagues {
        match &league.error {
            Some(err) => println!("  {}: fixtures unavailable ({err})", league.league.name),
            None => println!(
                "  {} {}: {}",
                league.league.name,
                league.league.season,
                league.report.summary_line()
            ),
        }
        for err in league.report.failed.iter().take(6) {
            println!("     - {err}");
        }
    }
    println!(
        "Total: {} processed, {} rows, {} skipped, {} failed",
        run.processed(),
        run.rows(),
        run.skipped(),
        run.failed()
    );
}
