//! Grouping of an adapter's rules into per-path endpoints.
//!
//! Rules are grouped purely by `from.path`; the declared `http-method` plays
//! no part in dispatch, so a `GET` rule and a `POST` rule on the same path end
//! up in one chain. Existing configurations rely on this.
use std::collections::HashMap;

use crate::config::models::Rule;

/// The rule chain bound to one incoming path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    path: String,
    rules: Vec<Rule>,
}

impl Endpoint {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Rules in declaration order; the last one produces the response.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

/// Group `rules` by path, keeping the declaration order within each chain.
pub fn build_endpoints(rules: &[Rule]) -> HashMap<String, Endpoint> {
    let mut endpoints: HashMap<String, Endpoint> = HashMap::new();
    for rule in rules {
        endpoints
            .entry(rule.from.path.clone())
            .or_insert_with(|| Endpoint {
                path: rule.from.path.clone(),
                rules: Vec::new(),
            })
            .rules
            .push(rule.clone());
    }
    endpoints
}

/// Immutable path table of one adapter.
#[derive(Debug, Clone, Default)]
pub struct EndpointTable {
    endpoints: HashMap<String, Endpoint>,
}

impl EndpointTable {
    pub fn new(rules: &[Rule]) -> Self {
        Self {
            endpoints: build_endpoints(rules),
        }
    }

    /// Resolve a request path.
    ///
    /// An exact match wins. Otherwise the longest configured path that ends in
    /// `/` and prefixes the request path is used, so `/api/` serves
    /// `/api/users/1` while `/api` serves only `/api`.
    pub fn find(&self, path: &str) -> Option<&Endpoint> {
        if let Some(endpoint) = self.endpoints.get(path) {
            return Some(endpoint);
        }
        self.endpoints
            .iter()
            .filter(|(pattern, _)| pattern.ends_with('/') && path.starts_with(pattern.as_str()))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(_, endpoint)| endpoint)
    }

    pub fn get(&self, path: &str) -> Option<&Endpoint> {
        self.endpoints.get(path)
    }

    /// Configured paths, sorted for stable log output.
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.endpoints.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
