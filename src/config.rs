use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::leagues::{self, League};

pub const DEFAULT_BASE_URL: &str = "https://v3.football.api-sports.io";
pub const DEFAULT_WINDOW: usize = 5;
pub const DEFAULT_UPCOMING: usize = 10;
pub const DEFAULT_OUTPUT_DIR: &str = "data/training";

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: String,
    pub api_key: String,
    pub max_retries: u32,
    pub retry_base: Duration,
    pub min_interval: Duration,
    pub max_pages: u32,
    pub memoize: bool,
}

#[derive(Debug, Clone)]
pub struct FeatureConfig {
    pub form_window: usize,
    pub h2h_window: usize,
    // None: use the season of the fixture being assembled.
    pub player_season: Option<u16>,
    pub parallelism: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            form_window: DEFAULT_WINDOW,
            h2h_window: DEFAULT_WINDOW,
            player_season: None,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub fetch: FetchConfig,
    pub features: FeatureConfig,
    pub leagues: Vec<League>,
    pub season_override: Option<u16>,
    pub upcoming: usize,
    pub output_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let num = |key: &str, default: u64| {
            get(key)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(default)
        };

        let api_key = get("API_FOOTBALL_KEY")
            .ok_or_else(|| anyhow!("API_FOOTBALL_KEY is not set (env, .env or .env.local)"))?;
        let base_url = get("API_FOOTBALL_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let fetch = FetchConfig {
            base_url,
            api_key,
            max_retries: num("FETCH_MAX_RETRIES", 3).min(10) as u32,
            retry_base: Duration::from_millis(num("FETCH_RETRY_BASE_MS", 500)),
            min_interval: Duration::from_millis(num("FETCH_MIN_INTERVAL_MS", 250)),
            max_pages: num("FETCH_MAX_PAGES", 10).clamp(1, 100) as u32,
            memoize: get("FETCH_MEMOIZE").is_none_or(|v| is_truthy(&v)),
        };

        let season_override = get("APP_SEASON").and_then(|v| v.parse::<u16>().ok());
        let features = FeatureConfig {
            form_window: num("FORM_WINDOW", DEFAULT_WINDOW as u64) as usize,
            h2h_window: num("H2H_WINDOW", DEFAULT_WINDOW as u64) as usize,
            player_season: get("PLAYER_STATS_SEASON").and_then(|v| v.parse::<u16>().ok()),
            parallelism: num("FETCH_PARALLELISM", 4).clamp(1, 16) as usize,
        };

        let ids = get("APP_LEAGUE_IDS")
            .map(|raw| leagues::parse_ids(&raw))
            .unwrap_or_default();
        let leagues = leagues::select_leagues(&ids, season_override);

        Ok(Self {
            fetch,
            features,
            leagues,
            season_override,
            upcoming: num("UPCOMING_FIXTURES", DEFAULT_UPCOMING as u64).clamp(1, 100) as usize,
            output_dir: get("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
        })
    }

    /// `--league-ids=`, `--season=` and `--out=` win over the environment.
    pub fn apply_args(&mut self, args: &[String]) {
        if let Some(season) = arg_value(args, "--season").and_then(|v| v.parse::<u16>().ok()) {
            self.season_override = Some(season);
        }
        if let Some(raw) = arg_value(args, "--league-ids") {
            let ids = leagues::parse_ids(&raw);
            if !ids.is_empty() {
                self.leagues = leagues::select_leagues(&ids, self.season_override);
            }
        }
        if let Some(season) = self.season_override {
            for league in &mut self.leagues {
                league.season = season;
            }
        }
        if let Some(out) = arg_value(args, "--out") {
            self.output_dir = PathBuf::from(out);
        }
    }
}

pub fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag {
            if let Some(next) = args.get(idx + 1).filter(|n| !n.trim().is_empty()) {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}

fn is_truthy(raw: &str) -> bool {
    !matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "off" | "no"
    )
}
