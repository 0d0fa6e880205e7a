///! Command handlers
///!
///! Reads go through the federated query engine; writes resolve their
///! target cluster(s) first and narrate one line per cluster acted upon.

pub mod create;
pub mod delete;
pub mod kill;
pub mod maintenance;
pub mod ping;
pub mod show;
pub mod tokens;
pub mod update;

pub use maintenance::MaintenanceCommands;

use crate::federation::{resolve_for_write, FederatedQueryEngine, OperationKind, WritePlan};
use crate::output::{self, OutputFormat};
use anyhow::{bail, Result};
use serde_json::Value;
use std::io::Write;
use std::sync::Arc;
use tokenctl_common::{
    Cluster, ClusterFailure, ClusterSet, Error, GatewayError, GatewayResult, RemoteTokenGateway,
    Token,
};
use tracing::{info, warn};

/// Everything a handler needs for one invocation
pub struct CommandContext {
    pub clusters: ClusterSet,
    pub engine: FederatedQueryEngine,
    /// `--cluster` override: a cluster or sync group name
    pub explicit_cluster: Option<String>,
    pub output: OutputFormat,
}

impl CommandContext {
    pub fn new(clusters: ClusterSet, engine: FederatedQueryEngine) -> Self {
        Self {
            clusters,
            engine,
            explicit_cluster: None,
            output: OutputFormat::Table,
        }
    }

    pub fn with_explicit_cluster(mut self, cluster: Option<String>) -> Self {
        self.explicit_cluster = cluster;
        self
    }

    pub fn with_output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    pub fn explicit(&self) -> Option<&str> {
        self.explicit_cluster.as_deref()
    }

    pub async fn plan(
        &self,
        token_name: &str,
        operation: OperationKind,
        force: bool,
    ) -> Result<WritePlan> {
        let plan = resolve_for_write(
            &self.engine,
            &self.clusters,
            token_name,
            operation,
            self.explicit(),
            force,
        )
        .await?;
        Ok(plan)
    }

    /// Resolve the single cluster `operation` acts on
    pub async fn single_target(
        &self,
        token_name: &str,
        operation: OperationKind,
    ) -> Result<(Cluster, WritePlan)> {
        let plan = self.plan(token_name, operation, false).await?;
        let targets = plan.decision.clone().into_targets(token_name)?;
        match targets.as_slice() {
            [cluster] => Ok((cluster.clone(), plan)),
            _ => bail!("Expected a single target cluster for {} of {}", operation, token_name),
        }
    }

    pub fn gateway(&self, cluster: &Cluster) -> Result<Arc<dyn RemoteTokenGateway>> {
        self.engine
            .gateways()
            .get(&cluster.name)
            .ok_or_else(|| {
                Error::transport(&cluster.name, "no gateway configured for cluster").into()
            })
    }
}

/// Translate a failed remote call into an engine error attributed to `cluster`
pub fn gateway_failure(token_name: &str, cluster: &Cluster, err: GatewayError) -> Error {
    match err {
        GatewayError::NotFound => Error::NotFound {
            token: token_name.to_string(),
            checked: vec![cluster.name.clone()],
        },
        GatewayError::Conflict(reason) => Error::Conflict {
            token: token_name.to_string(),
            cluster: cluster.name.clone(),
            reason,
        },
        GatewayError::AlreadyInactive => Error::AlreadyInactive {
            token: token_name.to_string(),
            clusters: vec![cluster.name.clone()],
        },
        GatewayError::Transport(reason) => Error::transport(&cluster.name, reason),
    }
}

/// Narrate the per-cluster outcome of a fan-out write.
///
/// Every cluster gets its own line. A lone target's failure is returned as
/// is; several failures fold into one transport error naming each cluster.
pub fn report_fanout(
    out: &mut dyn Write,
    token_name: &str,
    action: &str,
    results: Vec<(Cluster, GatewayResult<()>)>,
) -> Result<()> {
    let total = results.len();
    let mut failed = Vec::new();

    for (cluster, result) in results {
        match result {
            Ok(()) => output::success(
                out,
                &format!("Successfully {} {} in {}.", action, token_name, cluster.name),
            )?,
            Err(e) => {
                warn!("Failed to act on {} in {}: {}", token_name, cluster.name, e);
                if total > 1 {
                    output::warning(
                        out,
                        &format!("{} was not {} in {}: {}", token_name, action, cluster.name, e),
                    )?;
                }
                failed.push((cluster, e));
            }
        }
    }

    if failed.is_empty() {
        return Ok(());
    }
    if total == 1 {
        if let Some((cluster, e)) = failed.pop() {
            return Err(gateway_failure(token_name, &cluster, e).into());
        }
    }

    let failures = failed
        .into_iter()
        .map(|(cluster, e)| ClusterFailure {
            cluster: cluster.name,
            reason: e.to_string(),
        })
        .collect();
    Err(Error::Transport { failures }.into())
}

/// Parse `key=value` arguments; values that are valid JSON keep their type
pub fn parse_fields(pairs: &[String]) -> Result<Vec<(String, Value)>> {
    pairs
        .iter()
        .map(|pair| {
            let Some((key, raw)) = pair.split_once('=') else {
                bail!("Invalid field '{}', expected key=value", pair);
            };
            if key.is_empty() {
                bail!("Invalid field '{}', the key is empty", pair);
            }
            let value =
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            Ok((key.to_string(), value))
        })
        .collect()
}

/// Read-modify-write of the token on its resolved primary cluster.
///
/// The target must already hold the token, which matters when `--cluster`
/// names a cluster without a copy. The write is conditional on the etag the
/// token was read with. Returns the cluster written to.
pub async fn write_resolved<F>(
    ctx: &CommandContext,
    token_name: &str,
    operation: OperationKind,
    mutate: F,
) -> Result<Cluster>
where
    F: FnOnce(&Cluster, &mut Token) -> Result<()>,
{
    let (target, plan) = ctx.single_target(token_name, operation).await?;
    let Some(entry) = plan.query.get(&target.name) else {
        return Err(Error::NotFound {
            token: token_name.to_string(),
            checked: vec![target.name],
        }
        .into());
    };

    let mut token = entry.token.clone();
    let etag = entry.etag.clone();
    token.last_update_time = None;
    token.last_update_user = None;
    mutate(&target, &mut token)?;

    info!("Writing {} to {} for {}", token_name, target.name, operation);
    ctx.gateway(&target)?
        .put_token(token_name, &token, etag.as_deref())
        .await
        .map_err(|e| gateway_failure(token_name, &target, e))?;

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fields_keeps_json_types() {
        let fields = parse_fields(&[
            "cpus=1.5".to_string(),
            "name=web".to_string(),
            "env={\"A\": \"b\"}".to_string(),
            "cmd=echo a=b".to_string(),
        ])
        .unwrap();

        assert_eq!(fields[0], ("cpus".to_string(), serde_json::json!(1.5)));
        assert_eq!(fields[1], ("name".to_string(), serde_json::json!("web")));
        assert_eq!(fields[2].1["A"], "b");
        assert_eq!(fields[3], ("cmd".to_string(), serde_json::json!("echo a=b")));
    }

    #[test]
    fn test_parse_fields_rejects_missing_separator() {
        assert!(parse_fields(&["cpus".to_string()]).is_err());
        assert!(parse_fields(&["=1".to_string()]).is_err());
    }
}
