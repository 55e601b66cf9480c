use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tracing::trace;

use crate::fetch::{Endpoint, Fetch, FetchError, Params};

/// Run-scoped memo over any [`Fetch`]. The same fixture's statistics are asked
/// for by the extractor, both form windows and the head-to-head window; only
/// the first lookup reaches the provider. Failures are never stored.
pub struct MemoFetch<F> {
    inner: F,
    entries: Mutex<HashMap<String, Value>>,
}

impl<F: Fetch> MemoFetch<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .expect("memo cache lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_inner(self) -> F {
        self.inner
    }
}

impl<F: Fetch> Fetch for MemoFetch<F> {
    fn fetch(&self, endpoint: Endpoint, params: &Params) -> Result<Value, FetchError> {
        let key = params.request_key(endpoint);
        let cached = {
            let guard = self.entries.lock().expect("memo cache lock poisoned");
            guard.get(&key).cloned()
        };
        if let Some(v) = cached {
            trace!(%key, "memo hit");
            return Ok(v);
        }

        // Lock is not held across the request so parallel lookups proceed.
        let v = self.inner.fetch(endpoint, params)?;
        let mut guard = self.entries.lock().expect("memo cache lock poisoned");
        guard.entry(key).or_insert_with(|| v.clone());
        Ok(v)
    }
}
