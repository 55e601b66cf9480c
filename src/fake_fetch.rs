//! In-memory provider used by tests, benchmarks and offline dry runs.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::{Value, json};

use crate::fetch::{Endpoint, Fetch, FetchError, Params};

enum Canned {
    Body(Value),
    Status(u16),
}

#[derive(Default)]
pub struct FakeFetch {
    canned: Mutex<HashMap<String, Canned>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakeFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, endpoint: Endpoint, params: &Params, body: Value) {
        self.canned
            .lock()
            .expect("fake fetch lock poisoned")
            .insert(params.request_key(endpoint), Canned::Body(body));
    }

    /// Wraps `items` in the provider envelope.
    pub fn insert_items(&self, endpoint: Endpoint, params: &Params, items: Vec<Value>) {
        let results = items.len();
        self.insert(
            endpoint,
            params,
            json!({
                "get": endpoint.path(),
                "errors": [],
                "results": results,
                "paging": {"current": 1, "total": 1},
                "response": items,
            }),
        );
    }

    pub fn fail(&self, endpoint: Endpoint, params: &Params, status: u16) {
        self.canned
            .lock()
            .expect("fake fetch lock poisoned")
            .insert(params.request_key(endpoint), Canned::Status(status));
    }

    pub fn calls(&self, endpoint: Endpoint, params: &Params) -> usize {
        self.calls
            .lock()
            .expect("fake fetch lock poisoned")
            .get(&params.request_key(endpoint))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .expect("fake fetch lock poisoned")
            .values()
            .sum()
    }
}

impl Fetch for FakeFetch {
    fn fetch(&self, endpoint: Endpoint, params: &Params) -> Result<Value, FetchError> {
        let key = params.request_key(endpoint);
        *self
            .calls
            .lock()
            .expect("fake fetch lock poisoned")
            .entry(key.clone())
            .or_insert(0) += 1;

        let canned = self.canned.lock().expect("fake fetch lock poisoned");
        match canned.get(&key) {
            Some(Canned::Body(v)) => Ok(v.clone()),
            Some(Canned::Status(status)) => Err(FetchError::Status {
                endpoint,
                status: *status,
                body: String::new(),
            }),
            // Unknown requests behave like the provider: an empty result set.
            None => Ok(json!({"errors": [], "results": 0, "response": []})),
        }
    }
}

pub fn fixture_item(
    id: u64,
    date: &str,
    season: u16,
    home: (u32, &str),
    away: (u32, &str),
    goals: (Option<u32>, Option<u32>),
) -> Value {
    json!({
        "fixture": {"id": id, "date": date, "status": {"short": "FT"}},
        "league": {"id": 39, "season": season},
        "teams": {
            "home": {"id": home.0, "name": home.1},
            "away": {"id": away.0, "name": away.1}
        },
        "goals": {"home": goals.0, "away": goals.1}
    })
}

pub fn team_stats_item(team: (u32, &str), stats: &[(&str, Value)]) -> Value {
    let statistics = stats
        .iter()
        .map(|(kind, value)| json!({"type": kind, "value": value}))
        .collect::<Vec<_>>();
    json!({
        "team": {"id": team.0, "name": team.1},
        "statistics": statistics
    })
}

pub fn statistics_params(fixture_id: u64) -> Params {
    Params::new().with("fixture", fixture_id)
}
