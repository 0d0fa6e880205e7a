//! Federation engine: fan-out queries, sync groups, target resolution

pub mod groups;
pub mod query;
pub mod resolver;

pub use query::{FederatedQueryEngine, ListedToken, DEFAULT_MAX_CONCURRENCY};
pub use resolver::{GroupTarget, OperationKind, TargetDecision, TargetResolver};

use std::collections::HashMap;
use std::sync::Arc;
use tokenctl_common::{
    Cluster, ClusterSet, FederatedQueryResult, RemoteTokenGateway, Result, SyncGroup,
};

/// Gateway per configured cluster, keyed by cluster name
#[derive(Clone, Default)]
pub struct Gateways {
    by_cluster: HashMap<String, Arc<dyn RemoteTokenGateway>>,
}

impl Gateways {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one gateway per cluster of `clusters`
    pub fn for_clusters<F>(clusters: &ClusterSet, build: F) -> Self
    where
        F: Fn(&Cluster) -> Arc<dyn RemoteTokenGateway>,
    {
        let by_cluster = clusters
            .iter()
            .map(|cluster| (cluster.name.clone(), build(cluster)))
            .collect();
        Self { by_cluster }
    }

    pub fn insert(&mut self, cluster: &str, gateway: Arc<dyn RemoteTokenGateway>) {
        self.by_cluster.insert(cluster.to_string(), gateway);
    }

    pub fn get(&self, cluster: &str) -> Option<Arc<dyn RemoteTokenGateway>> {
        self.by_cluster.get(cluster).cloned()
    }
}

/// Targets chosen for a write, with the query the choice was based on
#[derive(Debug, Clone)]
pub struct WritePlan {
    pub decision: TargetDecision,
    pub query: FederatedQueryResult,
}

/// Query `token_name` across every configured cluster
pub async fn query_federated(
    engine: &FederatedQueryEngine,
    clusters: &ClusterSet,
    token_name: &str,
    include_services: bool,
) -> Result<FederatedQueryResult> {
    clusters.ensure_not_empty()?;
    engine
        .query(clusters.clusters(), token_name, include_services)
        .await
}

/// Decide which cluster(s) an operation on `token_name` acts on.
///
/// With an explicit override only the overriding cluster (or sync group) is
/// queried. Create without an override needs no query at all.
pub async fn resolve_for_write(
    engine: &FederatedQueryEngine,
    clusters: &ClusterSet,
    token_name: &str,
    operation: OperationKind,
    explicit: Option<&str>,
    force: bool,
) -> Result<WritePlan> {
    clusters.ensure_not_empty()?;
    let resolver = TargetResolver::new(clusters);

    let scope = match explicit {
        Some(name) => resolver.override_scope(name)?,
        None if operation == OperationKind::Create => Vec::new(),
        None => clusters.clusters().to_vec(),
    };

    let query = if scope.is_empty() {
        FederatedQueryResult::new()
    } else {
        engine.query(&scope, token_name, false).await?
    };

    let decision = resolver.resolve(token_name, operation, &query, explicit, force)?;
    Ok(WritePlan { decision, query })
}

pub fn group_clusters(clusters: &ClusterSet) -> Vec<SyncGroup> {
    groups::group(clusters.clusters())
}
