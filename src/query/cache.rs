use crate::model::CountryDetail;
use std::collections::{HashMap, HashSet};

/// Result of asking the cache for a country.
#[derive(Clone, Debug, PartialEq)]
pub enum Lookup {
    /// Already fetched; never fetched again
    Hit(CountryDetail),
    /// A request for this key is already on its way
    Pending,
    /// Not cached and not in flight. The key is now marked in flight and
    /// the caller owns the single fetch for it.
    Miss,
}

/// Forever-cache of country details with at most one request in flight per key.
#[derive(Debug, Default)]
pub struct DetailCache {
    entries: HashMap<String, CountryDetail>,
    in_flight: HashSet<String>,
}

impl DetailCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&mut self, code: &str) -> Lookup {
        if let Some(detail) = self.entries.get(code) {
            return Lookup::Hit(detail.clone());
        }
        if self.in_flight.contains(code) {
            return Lookup::Pending;
        }
        self.in_flight.insert(code.to_string());
        Lookup::Miss
    }

    /// Record a successful response. The first success wins.
    pub fn fulfill(&mut self, code: &str, detail: CountryDetail) -> &CountryDetail {
        self.in_flight.remove(code);
        self.entries.entry(code.to_string()).or_insert(detail)
    }

    /// Forget an in-flight request after failure or cancellation so the
    /// next lookup fetches again.
    pub fn abandon(&mut self, code: &str) {
        self.in_flight.remove(code);
    }
}
