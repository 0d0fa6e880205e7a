//! Aggregated view of one token across clusters

use crate::token::{Service, Token};
use serde::Serialize;
use std::collections::BTreeMap;

/// What one cluster holds for the queried token
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClusterEntry {
    pub token: Token,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    pub services: Vec<Service>,
}

/// A failed call attributed to the cluster it was made against
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClusterFailure {
    pub cluster: String,
    pub reason: String,
}

impl std::fmt::Display for ClusterFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.cluster, self.reason)
    }
}

/// Result of a federated token query.
///
/// Only clusters holding the token appear as keys, and `count` always equals
/// the number of keys. Entries can only be added through [`insert`].
///
/// [`insert`]: FederatedQueryResult::insert
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct FederatedQueryResult {
    clusters: BTreeMap<String, ClusterEntry>,
    count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    service_failures: Vec<ClusterFailure>,
}

impl FederatedQueryResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, cluster: &str, entry: ClusterEntry) {
        self.clusters.insert(cluster.to_string(), entry);
        self.count = self.clusters.len();
    }

    pub fn record_service_failure(&mut self, failure: ClusterFailure) {
        self.service_failures.push(failure);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn contains(&self, cluster: &str) -> bool {
        self.clusters.contains_key(cluster)
    }

    pub fn get(&self, cluster: &str) -> Option<&ClusterEntry> {
        self.clusters.get(cluster)
    }

    pub fn cluster_names(&self) -> impl Iterator<Item = &String> {
        self.clusters.keys()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &ClusterEntry)> {
        self.clusters.iter()
    }

    pub fn service_failures(&self) -> &[ClusterFailure] {
        &self.service_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> ClusterEntry {
        ClusterEntry {
            token: Token::default(),
            etag: Some("e1".to_string()),
            services: vec![],
        }
    }

    #[test]
    fn test_count_tracks_keys() {
        let mut result = FederatedQueryResult::new();
        assert_eq!(result.count(), 0);

        result.insert("waiter1", entry());
        result.insert("waiter2", entry());
        result.insert("waiter1", entry());

        assert_eq!(result.count(), 2);
        assert_eq!(result.cluster_names().count(), result.count());
        assert!(result.contains("waiter2"));
        assert!(!result.contains("waiter3"));
    }

    #[test]
    fn test_json_shape() {
        let mut result = FederatedQueryResult::new();
        result.insert("waiter1", entry());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["count"], 1);
        assert_eq!(json["clusters"]["waiter1"]["etag"], "e1");
        assert!(json.get("service_failures").is_none());
    }
}
