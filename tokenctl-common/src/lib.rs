//! Common types shared between the tokenctl engine and its command-line front end

pub mod cluster;
pub mod federated;
pub mod gateway;
pub mod token;

pub use cluster::{Cluster, ClusterSet, SyncGroup};
pub use federated::{ClusterEntry, ClusterFailure, FederatedQueryResult};
pub use gateway::{GatewayError, GatewayResult, RemoteTokenGateway};
pub use token::{FetchedToken, Service, Token, TokenSummary, SYNC_OPT_OUT_KEY};

use serde::Serialize;

/// One sync group competing for a write, with its clusters holding the token
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GroupCandidates {
    pub group: String,
    pub clusters: Vec<String>,
}

impl std::fmt::Display for GroupCandidates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.group, self.clusters.join(", "))
    }
}

/// Engine error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No matching data found in {} for token {token}", .checked.join(", "))]
    NotFound { token: String, checked: Vec<String> },

    #[error(
        "Could not infer the target cluster for this operation. Token {token} exists in multiple sync groups: {}. Use --cluster to choose one.",
        join_display(.candidates)
    )]
    Ambiguous {
        token: String,
        candidates: Vec<GroupCandidates>,
    },

    #[error(
        "Unknown cluster or sync group '{name}'; configured clusters: {}",
        .configured.join(", ")
    )]
    UnknownCluster { name: String, configured: Vec<String> },

    #[error(
        "No cluster is marked default-for-create; use --cluster to choose one of: {}",
        .configured.join(", ")
    )]
    NoDefaultCluster { configured: Vec<String> },

    #[error(
        "The token is configured in cluster {hinted}, which is not a member of sync group {group}: {}",
        describe_members(.clusters, .remote_names)
    )]
    UnlistedCluster {
        token: String,
        hinted: String,
        group: String,
        clusters: Vec<String>,
        /// Names the group's members report for themselves
        remote_names: Vec<String>,
    },

    #[error("Request failed in {} cluster(s): {}", .failures.len(), join_failures(.failures))]
    Transport { failures: Vec<ClusterFailure> },

    #[error("Conflicting update of {token} in {cluster}: {reason}")]
    Conflict {
        token: String,
        cluster: String,
        reason: String,
    },

    #[error(
        "Services for token {token} in {} cannot be killed because they are already Inactive",
        .clusters.join(", ")
    )]
    AlreadyInactive { token: String, clusters: Vec<String> },

    #[error(
        "No matching data found in {} (token {token} is no longer present in its primary cluster)",
        .checked.join(", ")
    )]
    NoOp { token: String, checked: Vec<String> },

    #[error("No matching data found in {} for service {service_id}", .checked.join(", "))]
    ServiceNotFound {
        service_id: String,
        checked: Vec<String>,
    },

    #[error(
        "Service {service_id} in {} cannot be killed because it is already Inactive",
        .clusters.join(", ")
    )]
    ServiceInactive {
        service_id: String,
        clusters: Vec<String>,
    },

    #[error("{token} is not in maintenance mode in {cluster}")]
    NotInMaintenance { token: String, cluster: String },

    #[error("Duplicate cluster name in configuration: {0}")]
    DuplicateCluster(String),

    #[error("More than one cluster is marked default-for-create: {}", .0.join(", "))]
    MultipleDefaults(Vec<String>),

    #[error("No clusters are configured")]
    NoClusters,
}

impl Error {
    /// Expected outcomes reported as narration on stdout rather than as errors
    pub fn is_informational(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. }
                | Error::AlreadyInactive { .. }
                | Error::NoOp { .. }
                | Error::NotInMaintenance { .. }
                | Error::ServiceNotFound { .. }
                | Error::ServiceInactive { .. }
        )
    }

    /// Process exit status for a command that ended with this error.
    ///
    /// Nothing left to kill is a success. Every other outcome exits 1,
    /// including the informational ones (nothing found, no-op, not in
    /// maintenance): scripts written against the existing client rely on
    /// that status, so those are told apart from failures only by being
    /// printed on stdout instead of stderr.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::AlreadyInactive { .. } | Error::ServiceInactive { .. } => 0,
            _ => 1,
        }
    }

    /// Transport error for a single cluster
    pub fn transport(cluster: &str, reason: impl Into<String>) -> Self {
        Error::Transport {
            failures: vec![ClusterFailure {
                cluster: cluster.to_string(),
                reason: reason.into(),
            }],
        }
    }
}

fn join_display<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_members(clusters: &[String], remote_names: &[String]) -> String {
    if remote_names.is_empty() {
        return clusters.join(", ");
    }
    format!("{} (remote names: {})", clusters.join(", "), remote_names.join(", "))
}

fn join_failures(failures: &[ClusterFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_message_names_every_group() {
        let err = Error::Ambiguous {
            token: "T".to_string(),
            candidates: vec![
                GroupCandidates {
                    group: "g1".to_string(),
                    clusters: vec!["waiter1".to_string()],
                },
                GroupCandidates {
                    group: "g2".to_string(),
                    clusters: vec!["waiter2".to_string(), "waiter3".to_string()],
                },
            ],
        };

        let message = err.to_string();
        assert!(message.starts_with("Could not infer the target cluster for this operation"));
        assert!(message.contains("g1 (waiter1), g2 (waiter2, waiter3)"));
    }

    #[test]
    fn test_transport_message_attributes_clusters() {
        let err = Error::Transport {
            failures: vec![
                ClusterFailure {
                    cluster: "waiter1".to_string(),
                    reason: "HTTP 503".to_string(),
                },
                ClusterFailure {
                    cluster: "waiter2".to_string(),
                    reason: "timed out".to_string(),
                },
            ],
        };

        assert_eq!(
            err.to_string(),
            "Request failed in 2 cluster(s): waiter1: HTTP 503; waiter2: timed out"
        );
    }

    #[test]
    fn test_informational_classification() {
        let noop = Error::NoOp {
            token: "T".to_string(),
            checked: vec!["waiter1".to_string(), "waiter2".to_string()],
        };
        let inactive = Error::AlreadyInactive {
            token: "T".to_string(),
            clusters: vec!["waiter1".to_string()],
        };
        let not_found = Error::NotFound {
            token: "T".to_string(),
            checked: vec!["waiter1".to_string()],
        };

        assert!(noop.is_informational());
        assert!(inactive.is_informational());
        assert!(not_found.is_informational());
        assert!(!Error::NoClusters.is_informational());
        assert!(noop.to_string().starts_with("No matching data found in waiter1, waiter2"));
        assert!(not_found.to_string().starts_with("No matching data found in waiter1"));

        assert_eq!(inactive.exit_code(), 0);
        assert_eq!(noop.exit_code(), 1);
        assert_eq!(not_found.exit_code(), 1);
        assert_eq!(Error::NoClusters.exit_code(), 1);
    }

    #[test]
    fn test_unlisted_cluster_names_remote_names() {
        let err = Error::UnlistedCluster {
            token: "T".to_string(),
            hinted: "unlisted".to_string(),
            group: "g1".to_string(),
            clusters: vec!["waiter1".to_string(), "waiter2".to_string()],
            remote_names: vec!["east".to_string(), "west".to_string()],
        };

        let message = err.to_string();
        assert!(message.starts_with("The token is configured in cluster unlisted"));
        assert!(message.contains("waiter1, waiter2 (remote names: east, west)"));
    }

    #[test]
    fn test_inactive_service_exits_cleanly() {
        let err = Error::ServiceInactive {
            service_id: "s-1".to_string(),
            clusters: vec!["waiter1".to_string()],
        };
        assert!(err.is_informational());
        assert_eq!(err.exit_code(), 0);
        assert_eq!(
            err.to_string(),
            "Service s-1 in waiter1 cannot be killed because it is already Inactive"
        );
    }
}
