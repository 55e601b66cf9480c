use std::fmt;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Fixtures,
    FixtureStatistics,
    Squads,
    Players,
    Leagues,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Fixtures => "fixtures",
            Endpoint::FixtureStatistics => "fixtures/statistics",
            Endpoint::Squads => "players/squads",
            Endpoint::Players => "players",
            Endpoint::Leagues => "leagues",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Query parameters in insertion order. Request identity (see [`Params::request_key`])
/// ignores that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl ToString) -> Self {
        let value = value.to_string();
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| k == name) {
            slot.1 = value;
        } else {
            self.0.push((name.to_string(), value));
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn request_key(&self, endpoint: Endpoint) -> String {
        let mut pairs = self
            .0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>();
        pairs.sort_unstable();
        format!("{}?{}", endpoint.path(), pairs.join("&"))
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.0 {
            if !first {
                f.write_str("&")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error on {endpoint}: {message}")]
    Transport { endpoint: Endpoint, message: String },

    #[error("http {status} on {endpoint}: {body}")]
    Status {
        endpoint: Endpoint,
        status: u16,
        body: String,
    },

    #[error("provider rejected {endpoint}: {message}")]
    Api { endpoint: Endpoint, message: String },

    #[error("invalid json from {endpoint}: {message}")]
    Decode { endpoint: Endpoint, message: String },
}

impl FetchError {
    /// Transport failures, throttling and server errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Api { .. } | FetchError::Decode { .. } => false,
        }
    }
}

/// The pipeline's only view of the data provider. Implementations own retries,
/// pagination and throttling; callers issue one call per logical lookup.
pub trait Fetch: Send + Sync {
    fn fetch(&self, endpoint: Endpoint, params: &Params) -> Result<Value, FetchError>;
}

impl<F: Fetch + ?Sized> Fetch for &F {
    fn fetch(&self, endpoint: Endpoint, params: &Params) -> Result<Value, FetchError> {
        (**self).fetch(endpoint, params)
    }
}

impl<F: Fetch + ?Sized> Fetch for Box<F> {
    fn fetch(&self, endpoint: Endpoint, params: &Params) -> Result<Value, FetchError> {
        (**self).fetch(endpoint, params)
    }
}

pub fn response_items(v: &Value) -> &[Value] {
    v.get("response")
        .and_then(|x| x.as_array())
        .map(|arr| arr.as_slice())
        .unwrap_or(&[])
}

/// The provider answers 200 with a populated `errors` field for bad keys and
/// exhausted quotas. It is `[]` when clean, otherwise an array or an object.
pub fn provider_error(v: &Value) -> Option<String> {
    let errors = v.get("errors")?;
    let parts = match errors {
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{k}: {}", value_text(v)))
            .collect::<Vec<_>>(),
        Value::Null => Vec::new(),
        other => vec![value_text(other)],
    };
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_key_ignores_param_order() {
        let a = Params::new().with("team", 33).with("season", 2024);
        let b = Params::new().with("season", 2024).with("team", 33);
        assert_eq!(
            a.request_key(Endpoint::Fixtures),
            b.request_key(Endpoint::Fixtures)
        );
        assert_eq!(
            a.request_key(Endpoint::Fixtures),
            "fixtures?season=2024&team=33"
        );
    }

    #[test]
    fn with_replaces_existing_param() {
        let p = Params::new().with("page", 1).with("page", 2);
        assert_eq!(p.get("page"), Some("2"));
        assert_eq!(p.pairs().len(), 1);
    }

    #[test]
    fn provider_error_handles_both_shapes() {
        assert!(provider_error(&json!({"errors": [], "response": []})).is_none());
        assert!(provider_error(&json!({"errors": {}, "response": []})).is_none());
        let msg = provider_error(&json!({"errors": {"token": "Error/Missing application key"}}))
            .unwrap();
        assert!(msg.contains("token"));
        assert!(provider_error(&json!({"errors": ["quota"]})).is_some());
    }

    #[test]
    fn throttling_is_retryable_but_auth_is_not() {
        let throttled = FetchError::Status {
            endpoint: Endpoint::Fixtures,
            status: 429,
            body: String::new(),
        };
        let forbidden = FetchError::Status {
            endpoint: Endpoint::Fixtures,
            status: 403,
            body: String::new(),
        };
        assert!(throttled.is_retryable());
        assert!(!forbidden.is_retryable());
    }
}
