//! Target selection for operations against the federation
//!
//! Policy, evaluated in order:
//! 1. An explicit `--cluster` override (a cluster or sync group name) wins.
//! 2. Create goes to the default-for-create cluster.
//! 3. Show and list get one target per sync group holding the token.
//! 4. Forced deletes and kills hit every cluster holding the token. So does
//!    a delete when any copy opted out of syncing.
//! 5. Ping hits the primary of every group holding the token.
//! 6. Everything else needs exactly one group holding the token and goes to
//!    that group's primary.

use super::groups;
use serde::Serialize;
use tokenctl_common::{
    Cluster, ClusterSet, Error, FederatedQueryResult, GroupCandidates, Result, SyncGroup,
};
use tracing::debug;

/// Operations the resolver knows how to target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    Show,
    List,
    Update,
    Delete,
    Ping,
    Kill,
    Maintenance,
}

impl OperationKind {
    pub fn is_read_like(self) -> bool {
        matches!(self, OperationKind::Show | OperationKind::List)
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Show => "show",
            Self::List => "list",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Ping => "ping",
            Self::Kill => "kill",
            Self::Maintenance => "maintenance",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of target resolution
#[derive(Debug, Clone, PartialEq)]
pub enum TargetDecision {
    /// Exactly one cluster receives the operation
    Resolved(Cluster),
    /// Each cluster receives the operation independently
    Fanout(Vec<Cluster>),
    /// Several sync groups hold the token and nothing chose between them
    Ambiguous(Vec<GroupCandidates>),
}

impl TargetDecision {
    /// Clusters to act on, turning an ambiguity into an error
    pub fn into_targets(self, token_name: &str) -> Result<Vec<Cluster>> {
        match self {
            TargetDecision::Resolved(cluster) => Ok(vec![cluster]),
            TargetDecision::Fanout(clusters) => Ok(clusters),
            TargetDecision::Ambiguous(candidates) => Err(Error::Ambiguous {
                token: token_name.to_string(),
                candidates,
            }),
        }
    }
}

/// Display target of one sync group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTarget {
    pub group: String,
    pub cluster: Cluster,
    /// Members holding the token, in configuration order
    pub members: Vec<Cluster>,
}

pub struct TargetResolver<'a> {
    clusters: &'a ClusterSet,
}

impl<'a> TargetResolver<'a> {
    pub fn new(clusters: &'a ClusterSet) -> Self {
        Self { clusters }
    }

    /// Clusters to query before honouring an explicit override
    pub fn override_scope(&self, name: &str) -> Result<Vec<Cluster>> {
        if let Some(cluster) = self.clusters.get(name) {
            return Ok(vec![cluster.clone()]);
        }

        let members = self.clusters.in_sync_group(name);
        if members.is_empty() {
            return Err(self.unknown_cluster(name));
        }
        Ok(members.into_iter().cloned().collect())
    }

    /// Resolve an explicit override naming a cluster or a sync group.
    ///
    /// A group resolves to its first member holding the token, or to its
    /// first member when none does; update times are not consulted.
    pub fn resolve_override(
        &self,
        name: &str,
        result: Option<&FederatedQueryResult>,
    ) -> Result<Cluster> {
        if let Some(cluster) = self.clusters.get(name) {
            return Ok(cluster.clone());
        }

        let members = self.clusters.in_sync_group(name);
        let holding = result.and_then(|r| members.iter().find(|c| r.contains(&c.name)).copied());
        holding
            .or_else(|| members.first().copied())
            .cloned()
            .ok_or_else(|| self.unknown_cluster(name))
    }

    pub fn resolve_create(&self) -> Result<Cluster> {
        self.clusters
            .default_for_create()
            .cloned()
            .ok_or_else(|| Error::NoDefaultCluster {
                configured: self.clusters.names(),
            })
    }

    /// One display target per sync group holding the token
    pub fn resolve_per_group(&self, result: &FederatedQueryResult) -> Vec<GroupTarget> {
        groups::group(self.clusters.clusters())
            .into_iter()
            .filter_map(|group| {
                let cluster = groups::latest_member(&group, result)?.clone();
                let members = groups::members_with_token(&group, result)
                    .into_iter()
                    .cloned()
                    .collect();
                Some(GroupTarget {
                    group: group.name,
                    cluster,
                    members,
                })
            })
            .collect()
    }

    pub fn resolve(
        &self,
        token_name: &str,
        operation: OperationKind,
        result: &FederatedQueryResult,
        explicit: Option<&str>,
        force: bool,
    ) -> Result<TargetDecision> {
        if let Some(name) = explicit {
            let cluster = self.resolve_override(name, Some(result))?;
            debug!("Explicit target {} resolved to {}", name, cluster.name);
            return Ok(TargetDecision::Resolved(cluster));
        }

        match operation {
            OperationKind::Create => self.resolve_create().map(TargetDecision::Resolved),
            OperationKind::Show | OperationKind::List => Ok(TargetDecision::Fanout(
                self.resolve_per_group(result)
                    .into_iter()
                    .map(|target| target.cluster)
                    .collect(),
            )),
            OperationKind::Delete | OperationKind::Kill if force => {
                self.resolve_everywhere(token_name, result)
            }
            OperationKind::Delete if any_sync_opt_out(result) => {
                debug!("Token {} opted out of syncing; deleting every copy", token_name);
                self.resolve_everywhere(token_name, result)
            }
            OperationKind::Ping => self.resolve_group_primaries(token_name, result),
            OperationKind::Update
            | OperationKind::Delete
            | OperationKind::Kill
            | OperationKind::Maintenance => self.resolve_single(token_name, result),
        }
    }

    fn resolve_everywhere(
        &self,
        token_name: &str,
        result: &FederatedQueryResult,
    ) -> Result<TargetDecision> {
        let holding: Vec<Cluster> = self
            .clusters
            .iter()
            .filter(|c| result.contains(&c.name))
            .cloned()
            .collect();

        if holding.is_empty() {
            return Err(self.not_found(token_name));
        }
        Ok(TargetDecision::Fanout(holding))
    }

    fn resolve_single(
        &self,
        token_name: &str,
        result: &FederatedQueryResult,
    ) -> Result<TargetDecision> {
        let all_groups = groups::group(self.clusters.clusters());
        let holding: Vec<&SyncGroup> = all_groups
            .iter()
            .filter(|g| groups::has_token(g, result))
            .collect();

        match holding.as_slice() {
            [] => Err(self.not_found(token_name)),
            [group] => match groups::primary_cluster(group, result, token_name, true)? {
                Some(primary) if result.contains(&primary.name) => {
                    debug!(
                        "Token {} resolved to {} in group {}",
                        token_name, primary.name, group.name
                    );
                    Ok(TargetDecision::Resolved(primary.clone()))
                }
                _ => Err(Error::NoOp {
                    token: token_name.to_string(),
                    checked: group.cluster_names(),
                }),
            },
            competing => Ok(TargetDecision::Ambiguous(
                competing
                    .iter()
                    .map(|group| groups::candidates(group, result))
                    .collect(),
            )),
        }
    }

    /// Primaries of every group holding the token.
    ///
    /// Groups deferring to a cluster configured outside the group, or whose
    /// primary no longer holds the token, are skipped.
    fn resolve_group_primaries(
        &self,
        token_name: &str,
        result: &FederatedQueryResult,
    ) -> Result<TargetDecision> {
        let mut targets = Vec::new();

        for group in groups::group(self.clusters.clusters()) {
            match groups::primary_cluster(&group, result, token_name, true) {
                Ok(Some(primary)) if result.contains(&primary.name) => {
                    targets.push(primary.clone())
                }
                Ok(Some(primary)) => {
                    debug!(
                        "Skipping group {}: primary {} no longer holds {}",
                        group.name, primary.name, token_name
                    );
                }
                Ok(None) => {}
                Err(Error::UnlistedCluster { hinted, .. })
                    if self.clusters.iter().any(|c| c.answers_to(&hinted)) =>
                {
                    debug!("Skipping group {}: {} is served by {}", group.name, token_name, hinted);
                }
                Err(Error::UnlistedCluster { .. }) => {
                    if let Some(latest) = groups::latest_member(&group, result) {
                        targets.push(latest.clone());
                    }
                }
                Err(e) => return Err(e),
            }
        }

        if targets.is_empty() {
            return Err(self.not_found(token_name));
        }
        Ok(TargetDecision::Fanout(targets))
    }

    fn not_found(&self, token_name: &str) -> Error {
        Error::NotFound {
            token: token_name.to_string(),
            checked: self.clusters.names(),
        }
    }

    fn unknown_cluster(&self, name: &str) -> Error {
        Error::UnknownCluster {
            name: name.to_string(),
            configured: self.clusters.names(),
        }
    }
}

/// Whether any copy of the token is excluded from cross-cluster syncing
fn any_sync_opt_out(result: &FederatedQueryResult) -> bool {
    result.entries().any(|(_, entry)| entry.token.sync_opt_out())
}
