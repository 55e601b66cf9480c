use std::fs;
use std::path::PathBuf;

use serde_json::{Value, json};

use fixture_lab::config::FeatureConfig;
use fixture_lab::fake_fetch::{FakeFetch, fixture_item, statistics_params, team_stats_item};
use fixture_lab::features::{FeatureAssembler, Matchup};
use fixture_lab::fetch::Endpoint;
use fixture_lab::fixtures::{
    h2h_finished_params, league_finished_params, league_upcoming_params, parse_fixtures,
};
use fixture_lab::h2h::h2h_features;
use fixture_lab::http_cache::MemoFetch;
use fixture_lab::leagues::League;
use fixture_lab::pipeline::{
    extract_training_data, extract_upcoming_features, write_training_outputs,
};
use fixture_lab::player_impact::{player_params, squad_params};
use fixture_lab::table::load_columns;

fn read_fixture(name: &str) -> Value {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    let raw = fs::read_to_string(path).expect("fixture file should be readable");
    serde_json::from_str(&raw).expect("fixture file should be json")
}

fn premier_league() -> League {
    League {
        id: 39,
        name: "Premier League".to_string(),
        season: 2024,
    }
}

/// Two finished fixtures: one with full statistics, one with a single team's.
fn synthetic_league() -> FakeFetch {
    let fake = FakeFetch::new();
    fake.insert(
        Endpoint::Fixtures,
        &league_finished_params(39, 2024),
        read_fixture("league_fixtures.json"),
    );
    fake.insert(
        Endpoint::FixtureStatistics,
        &statistics_params(1208021),
        read_fixture("statistics_full.json"),
    );
    fake.insert(
        Endpoint::FixtureStatistics,
        &statistics_params(1208022),
        read_fixture("statistics_single_team.json"),
    );
    fake.insert(Endpoint::Squads, &squad_params(33), read_fixture("squad.json"));
    fake.insert(
        Endpoint::Players,
        &player_params(19220, 2024),
        read_fixture("player_injured.json"),
    );
    fake.insert(
        Endpoint::Players,
        &player_params(909, 2024),
        read_fixture("player_fit.json"),
    );
    fake
}

#[test]
fn training_table_keeps_only_fixtures_with_two_team_stats() {
    let fake = synthetic_league();
    let run = extract_training_data(&fake, &[premier_league()], &FeatureConfig::default());

    assert_eq!(run.processed(), 2);
    assert_eq!(run.rows(), 1);
    assert_eq!(run.skipped(), 1);
    assert_eq!(run.failed(), 0);

    let table = &run.combined;
    assert_eq!(table.rows()[0].fixture_id, Some(1208021));
    assert_eq!(table.rows()[0].home_team, "Manchester United");
    assert_eq!(table.value(0, "home_corners"), Some(7.0));
    assert_eq!(table.value(0, "away_corners"), Some(8.0));
    assert_eq!(table.value(0, "Manchester_United_Ball_Possession"), Some(53.0));
    assert_eq!(table.value(0, "Fulham_Passes_%"), Some(81.0));
    assert!(table.value(0, "Manchester_United_Red_Cards").is_none());

    let impact = table.value(0, "home_missing_impact").unwrap();
    assert!((impact - 7.866666).abs() < 1e-9, "impact was {impact}");
    assert_eq!(table.value(0, "away_missing_impact"), Some(0.0));
    assert!(!table.feature_columns().iter().any(|c| c == "home_corners"));
}

#[test]
fn skipped_fixture_issues_no_further_requests() {
    let fake = synthetic_league();
    extract_training_data(&fake, &[premier_league()], &FeatureConfig::default());
    // Newcastle's squad is only needed if its fixture passes the statistics gate.
    assert_eq!(fake.calls(Endpoint::Squads, &squad_params(34)), 0);
    assert_eq!(fake.calls(Endpoint::Squads, &squad_params(33)), 1);
}

#[test]
fn assembly_is_idempotent_and_schedule_independent() {
    let fake = synthetic_league();
    let fixtures = parse_fixtures(&read_fixture("league_fixtures.json"));
    let fixture = &fixtures[0];

    let sequential = FeatureAssembler::new(&fake, FeatureConfig::default());
    let first = sequential.training_record(fixture).unwrap().ready().unwrap();
    let second = sequential.training_record(fixture).unwrap().ready().unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );

    let memo = MemoFetch::new(synthetic_league());
    let pooled = FeatureAssembler::new(
        &memo,
        FeatureConfig {
            parallelism: 4,
            ..FeatureConfig::default()
        },
    );
    let third = pooled.training_record(fixture).unwrap().ready().unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&third).unwrap()
    );
}

#[test]
fn prediction_columns_match_training_columns() {
    let fake = synthetic_league();
    let trained = extract_training_data(&fake, &[premier_league()], &FeatureConfig::default());
    let columns = trained.combined.feature_columns();

    fake.insert_items(
        Endpoint::Fixtures,
        &league_upcoming_params(39, 2024, 10),
        vec![fixture_item(
            1208100,
            "2024-12-01T16:30:00+00:00",
            2024,
            (33, "Manchester United"),
            (34, "Newcastle"),
            (None, None),
        )],
    );
    let upcoming = extract_upcoming_features(
        &fake,
        &[premier_league()],
        &FeatureConfig::default(),
        10,
        Some(&columns),
    );
    assert_eq!(upcoming.rows(), 1);
    assert_eq!(upcoming.combined.columns(), columns.as_slice());
    // Post-match stat columns exist in training only and are zero-filled here.
    assert_eq!(
        upcoming.combined.value(0, "Manchester_United_Ball_Possession"),
        Some(0.0)
    );
    assert!(upcoming.combined.value(0, "home_missing_impact").unwrap() > 7.0);
}

#[test]
fn league_fetch_failure_is_reported_not_fatal() {
    let fake = synthetic_league();
    fake.fail(Endpoint::Fixtures, &league_finished_params(140, 2024), 500);
    let la_liga = League {
        id: 140,
        name: "La Liga".to_string(),
        season: 2024,
    };
    let run = extract_training_data(&fake, &[la_liga, premier_league()], &FeatureConfig::default());
    assert!(run.leagues[0].error.is_some());
    assert_eq!(run.rows(), 1);
}

#[test]
fn head_to_head_reads_goals_from_home_id_side() {
    let fake = FakeFetch::new();
    // Team 33 visited team 36 and won 3-1.
    fake.insert_items(
        Endpoint::Fixtures,
        &h2h_finished_params(33, 36, 2024),
        vec![fixture_item(
            500,
            "2024-02-03T15:00:00+00:00",
            2024,
            (36, "Fulham"),
            (33, "Manchester United"),
            (Some(1), Some(3)),
        )],
    );
    fake.insert_items(
        Endpoint::FixtureStatistics,
        &statistics_params(500),
        vec![
            team_stats_item((36, "Fulham"), &[("Corner Kicks", json!(9))]),
            team_stats_item((33, "Manchester United"), &[("Corner Kicks", json!(3))]),
        ],
    );
    let h2h = h2h_features(&fake, 33, 36, 2024, 5).unwrap();
    assert_eq!((h2h.wins, h2h.draws, h2h.losses), (1, 0, 0));
    assert_eq!(h2h.avg_home_corners, 3.0);
    assert_eq!(h2h.avg_away_corners, 9.0);

    let asm = FeatureAssembler::new(&fake, FeatureConfig::default());
    let record = asm
        .prediction_record(&Matchup {
            fixture_id: None,
            home: fixture_lab::fixtures::TeamRef {
                id: 33,
                name: "Manchester United".to_string(),
            },
            away: fixture_lab::fixtures::TeamRef {
                id: 36,
                name: "Fulham".to_string(),
            },
            season: 2024,
        })
        .unwrap();
    assert_eq!(record.get("h2h_wins"), Some(1.0));
    assert_eq!(record.get("h2h_losses"), Some(0.0));
}

#[test]
fn training_outputs_land_in_output_dir() {
    let fake = synthetic_league();
    let run = extract_training_data(&fake, &[premier_league()], &FeatureConfig::default());
    let dir = std::env::temp_dir().join(format!("fixture_lab_out_{}", std::process::id()));

    let (workbook, columns) = write_training_outputs(&run, &dir).expect("outputs written");
    assert!(workbook.exists());
    let saved = load_columns(&columns).unwrap().expect("columns saved");
    assert_eq!(saved, run.combined.feature_columns());
    let _ = fs::remove_dir_all(&dir);
}
