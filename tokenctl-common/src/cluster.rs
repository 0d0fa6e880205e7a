//! Cluster descriptors and the validated, ordered cluster set

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A configured cluster endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct Cluster {
    pub name: String,
    #[serde(alias = "address")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_group: Option<String>,
    #[serde(default)]
    pub default_for_create: bool,
    /// Name the remote service reports for itself in a token's `cluster` field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_name: Option<String>,
}

impl Cluster {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            sync_group: None,
            default_for_create: false,
            remote_name: None,
        }
    }

    pub fn with_sync_group(mut self, group: &str) -> Self {
        self.sync_group = Some(group.to_string());
        self
    }

    pub fn with_default_for_create(mut self) -> Self {
        self.default_for_create = true;
        self
    }

    pub fn with_remote_name(mut self, remote_name: &str) -> Self {
        self.remote_name = Some(remote_name.to_string());
        self
    }

    /// Grouping key: the sync group label, or the cluster's own name
    pub fn effective_group(&self) -> &str {
        self.sync_group.as_deref().unwrap_or(&self.name)
    }

    /// Whether a token's `cluster` affinity hint designates this cluster
    pub fn answers_to(&self, hint: &str) -> bool {
        self.name == hint || self.remote_name.as_deref() == Some(hint)
    }
}

/// Ordered collection of clusters, in configuration order
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ClusterSet {
    clusters: Vec<Cluster>,
}

impl ClusterSet {
    /// Validate and build a cluster set.
    ///
    /// Names must be unique and at most one cluster may be the default for
    /// creation. An empty set is allowed here; commands reject it with
    /// [`ClusterSet::ensure_not_empty`].
    pub fn new(clusters: Vec<Cluster>) -> Result<Self> {
        let mut seen = HashSet::new();
        for cluster in &clusters {
            if !seen.insert(cluster.name.as_str()) {
                return Err(Error::DuplicateCluster(cluster.name.clone()));
            }
        }

        let defaults: Vec<String> = clusters
            .iter()
            .filter(|c| c.default_for_create)
            .map(|c| c.name.clone())
            .collect();
        if defaults.len() > 1 {
            return Err(Error::MultipleDefaults(defaults));
        }

        Ok(Self { clusters })
    }

    pub fn ensure_not_empty(&self) -> Result<()> {
        if self.clusters.is_empty() {
            return Err(Error::NoClusters);
        }
        Ok(())
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter()
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.clusters.iter().map(|c| c.name.clone()).collect()
    }

    pub fn default_for_create(&self) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.default_for_create)
    }

    /// Clusters labelled with the given sync group, in configuration order
    pub fn in_sync_group(&self, group: &str) -> Vec<&Cluster> {
        self.clusters
            .iter()
            .filter(|c| c.sync_group.as_deref() == Some(group))
            .collect()
    }
}

impl<'a> IntoIterator for &'a ClusterSet {
    type Item = &'a Cluster;
    type IntoIter = std::slice::Iter<'a, Cluster>;

    fn into_iter(self) -> Self::IntoIter {
        self.clusters.iter()
    }
}

/// All clusters sharing one effective group, in configuration order
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SyncGroup {
    pub name: String,
    pub clusters: Vec<Cluster>,
}

impl SyncGroup {
    pub fn cluster_names(&self) -> Vec<String> {
        self.clusters.iter().map(|c| c.name.clone()).collect()
    }

    pub fn member_answering_to(&self, hint: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.answers_to(hint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_group_falls_back_to_name() {
        let plain = Cluster::new("waiter1", "http://localhost:9091");
        let grouped = Cluster::new("waiter2", "http://localhost:9191").with_sync_group("prod");

        assert_eq!(plain.effective_group(), "waiter1");
        assert_eq!(grouped.effective_group(), "prod");
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = ClusterSet::new(vec![
            Cluster::new("waiter1", "http://a"),
            Cluster::new("waiter1", "http://b"),
        ]);

        assert!(matches!(result, Err(Error::DuplicateCluster(name)) if name == "waiter1"));
    }

    #[test]
    fn test_multiple_defaults_rejected() {
        let result = ClusterSet::new(vec![
            Cluster::new("waiter1", "http://a").with_default_for_create(),
            Cluster::new("waiter2", "http://b").with_default_for_create(),
        ]);

        match result {
            Err(Error::MultipleDefaults(names)) => assert_eq!(names, vec!["waiter1", "waiter2"]),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_empty_set_is_rejected_on_use() {
        let set = ClusterSet::new(vec![]).unwrap();
        assert!(matches!(set.ensure_not_empty(), Err(Error::NoClusters)));
    }

    #[test]
    fn test_answers_to_remote_name() {
        let cluster = Cluster::new("waiter1", "http://a").with_remote_name("waiter-east");

        assert!(cluster.answers_to("waiter1"));
        assert!(cluster.answers_to("waiter-east"));
        assert!(!cluster.answers_to("waiter-west"));
    }

    #[test]
    fn test_config_style_deserialization() {
        let json = r#"{"name": "waiter1", "address": "http://a", "sync-group": "prod", "default-for-create": true}"#;
        let cluster: Cluster = serde_json::from_str(json).unwrap();

        assert_eq!(cluster.url, "http://a");
        assert_eq!(cluster.sync_group.as_deref(), Some("prod"));
        assert!(cluster.default_for_create);
        assert!(cluster.remote_name.is_none());
    }
}
