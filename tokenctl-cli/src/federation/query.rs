//! Federated token queries
//!
//! Issues the same read against every selected cluster concurrently and
//! folds the answers into a single [`FederatedQueryResult`]:
//! - not-found answers drop the cluster from the result
//! - any other failure fails the whole query, naming every failing cluster
//! - service listing failures are reported next to the token results

use super::Gateways;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokenctl_common::{
    Cluster, ClusterEntry, ClusterFailure, Error, FederatedQueryResult, GatewayError,
    GatewayResult, RemoteTokenGateway, Result, TokenSummary,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Default cap on in-flight requests per fan-out
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// A token listed by one cluster
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ListedToken {
    pub cluster: String,
    #[serde(flatten)]
    pub summary: TokenSummary,
}

/// Concurrent fan-out/fan-in over per-cluster gateways
#[derive(Clone)]
pub struct FederatedQueryEngine {
    gateways: Gateways,
    max_concurrency: usize,
}

impl FederatedQueryEngine {
    pub fn new(gateways: Gateways) -> Self {
        Self {
            gateways,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn gateways(&self) -> &Gateways {
        &self.gateways
    }

    /// Run `op` once per cluster, concurrently, bounded by the worker pool.
    ///
    /// Results come back in the order of `clusters`. A failing or aborted
    /// call only affects its own slot.
    pub async fn fan_out<T, F, Fut>(
        &self,
        clusters: &[Cluster],
        op: F,
    ) -> Vec<(Cluster, GatewayResult<T>)>
    where
        T: Send + 'static,
        F: Fn(&Cluster, Arc<dyn RemoteTokenGateway>) -> Fut,
        Fut: Future<Output = GatewayResult<T>> + Send + 'static,
    {
        let workers = clusters.len().min(self.max_concurrency).max(1);
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut join_set = JoinSet::new();
        let mut slots: Vec<Option<GatewayResult<T>>> = Vec::with_capacity(clusters.len());

        for (index, cluster) in clusters.iter().enumerate() {
            slots.push(None);
            let gateway = match self.gateways.get(&cluster.name) {
                Some(gateway) => gateway,
                None => {
                    slots[index] = Some(Err(GatewayError::Transport(
                        "no gateway configured for cluster".to_string(),
                    )));
                    continue;
                }
            };

            debug!("Dispatching request to cluster {}", cluster.name);
            let call = op(cluster, gateway);
            let sem = semaphore.clone();
            join_set.spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                (index, call.await)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => warn!("Cluster request task failed: {}", e),
            }
        }

        clusters
            .iter()
            .cloned()
            .zip(slots)
            .map(|(cluster, slot)| {
                let result = slot.unwrap_or_else(|| {
                    Err(GatewayError::Transport("request task aborted".to_string()))
                });
                (cluster, result)
            })
            .collect()
    }

    /// Fetch `token_name` from every cluster in `clusters`
    pub async fn query(
        &self,
        clusters: &[Cluster],
        token_name: &str,
        include_services: bool,
    ) -> Result<FederatedQueryResult> {
        let name = token_name.to_string();
        let answers = self
            .fan_out(clusters, move |_, gateway| {
                let name = name.clone();
                async move {
                    let fetched = gateway.get_token(&name).await?;
                    let services = if include_services {
                        Some(gateway.list_services_for_token(&name).await)
                    } else {
                        None
                    };
                    Ok::<_, GatewayError>((fetched, services))
                }
            })
            .await;

        let mut result = FederatedQueryResult::new();
        let mut failures = Vec::new();

        for (cluster, answer) in answers {
            match answer {
                Ok((fetched, services)) => {
                    let services = match services {
                        Some(Ok(services)) => services,
                        Some(Err(e)) => {
                            warn!(
                                "Failed to list services for {} in {}: {}",
                                token_name, cluster.name, e
                            );
                            result.record_service_failure(ClusterFailure {
                                cluster: cluster.name.clone(),
                                reason: e.to_string(),
                            });
                            Vec::new()
                        }
                        None => Vec::new(),
                    };
                    result.insert(
                        &cluster.name,
                        ClusterEntry {
                            token: fetched.token,
                            etag: fetched.etag,
                            services,
                        },
                    );
                }
                Err(GatewayError::NotFound) => {
                    debug!("Token {} not present in {}", token_name, cluster.name);
                }
                Err(e) => {
                    warn!("Failed to fetch {} from {}: {}", token_name, cluster.name, e);
                    failures.push(ClusterFailure {
                        cluster: cluster.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if !failures.is_empty() {
            return Err(Error::Transport { failures });
        }

        debug!("Token {} found in {} cluster(s)", token_name, result.count());
        Ok(result)
    }

    /// List tokens on every cluster, sorted by token name then cluster name
    pub async fn query_tokens(&self, clusters: &[Cluster]) -> Result<Vec<ListedToken>> {
        let answers = self
            .fan_out(clusters, |_, gateway| async move { gateway.list_tokens().await })
            .await;

        let mut listed = Vec::new();
        let mut failures = Vec::new();

        for (cluster, answer) in answers {
            match answer {
                Ok(summaries) => listed.extend(summaries.into_iter().map(|summary| ListedToken {
                    cluster: cluster.name.clone(),
                    summary,
                })),
                Err(e) => {
                    warn!("Failed to list tokens in {}: {}", cluster.name, e);
                    failures.push(ClusterFailure {
                        cluster: cluster.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if !failures.is_empty() {
            return Err(Error::Transport { failures });
        }

        listed.sort_by(|a, b| {
            a.summary
                .token
                .cmp(&b.summary.token)
                .then_with(|| a.cluster.cmp(&b.cluster))
        });
        Ok(listed)
    }
}
