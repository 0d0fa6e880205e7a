///! Killing services, by token or by service id

use super::CommandContext;
use crate::federation::{OperationKind, TargetResolver};
use crate::output;
use anyhow::Result;
use std::io::Write;
use tokenctl_common::{Cluster, ClusterFailure, Error, GatewayError, RemoteTokenGateway, Service};
use tracing::{debug, info, warn};

/// What happened to one service
#[derive(Debug)]
enum KillOutcome {
    Killed,
    AlreadyInactive,
    Failed(GatewayError),
}

async fn kill_one(
    gateway: &dyn RemoteTokenGateway,
    service: &Service,
    cluster_name: &str,
) -> KillOutcome {
    if service.is_inactive() {
        return KillOutcome::AlreadyInactive;
    }

    info!("Killing service {} in {}", service.service_id, cluster_name);
    match gateway.kill_service(&service.service_id).await {
        Ok(()) => KillOutcome::Killed,
        Err(GatewayError::AlreadyInactive) => KillOutcome::AlreadyInactive,
        Err(e) => KillOutcome::Failed(e),
    }
}

/// Per-invocation totals, fed one cluster at a time in configuration order
#[derive(Default)]
struct KillTally {
    killed: usize,
    inactive: Vec<String>,
    failures: Vec<ClusterFailure>,
}

impl KillTally {
    fn narrate(
        &mut self,
        out: &mut dyn Write,
        cluster: &Cluster,
        service_id: &str,
        outcome: KillOutcome,
    ) -> std::io::Result<()> {
        match outcome {
            KillOutcome::Killed => {
                output::info(
                    out,
                    &format!("Killing service {} in {}...", service_id, cluster.name),
                )?;
                output::success(
                    out,
                    &format!("Successfully killed {} in {}.", service_id, cluster.name),
                )?;
                self.killed += 1;
            }
            KillOutcome::AlreadyInactive => {
                output::warning(
                    out,
                    &format!(
                        "Service {} in {} cannot be killed because it is already Inactive.",
                        service_id, cluster.name
                    ),
                )?;
                if !self.inactive.contains(&cluster.name) {
                    self.inactive.push(cluster.name.clone());
                }
            }
            KillOutcome::Failed(e) => {
                output::info(
                    out,
                    &format!("Killing service {} in {}...", service_id, cluster.name),
                )?;
                output::warning(
                    out,
                    &format!("Service {} in {} was not killed: {}", service_id, cluster.name, e),
                )?;
                self.failures.push(ClusterFailure {
                    cluster: cluster.name.clone(),
                    reason: format!("{}: {}", service_id, e),
                });
            }
        }
        Ok(())
    }

    fn cluster_failed(&mut self, cluster: &Cluster, what: &str, e: GatewayError) {
        warn!("Failed to {} in {}: {}", what, cluster.name, e);
        self.failures.push(ClusterFailure {
            cluster: cluster.name.clone(),
            reason: e.to_string(),
        });
    }

    /// Any failure fails the command; otherwise finding nothing but
    /// inactive services is reported through `inactive`
    fn finish(self, inactive: impl FnOnce(Vec<String>) -> Error) -> Result<()> {
        if !self.failures.is_empty() {
            return Err(Error::Transport {
                failures: self.failures,
            }
            .into());
        }
        if self.killed == 0 && !self.inactive.is_empty() {
            return Err(inactive(self.inactive).into());
        }
        Ok(())
    }
}

/// Kill the active services of `token_name` on its primary cluster, or with
/// `force` on every cluster holding it
pub async fn handle_kill_command(
    ctx: &CommandContext,
    token_name: &str,
    force: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let plan = ctx.plan(token_name, OperationKind::Kill, force).await?;
    let targets = plan.decision.clone().into_targets(token_name)?;

    let name = token_name.to_string();
    let results = ctx
        .engine
        .fan_out(&targets, move |cluster, gateway| {
            let name = name.clone();
            let cluster_name = cluster.name.clone();
            async move {
                let services = gateway.list_services_for_token(&name).await?;
                let mut outcomes = Vec::with_capacity(services.len());
                for service in services {
                    let outcome = kill_one(gateway.as_ref(), &service, &cluster_name).await;
                    outcomes.push((service.service_id, outcome));
                }
                Ok::<_, GatewayError>(outcomes)
            }
        })
        .await;

    let mut tally = KillTally::default();
    for (cluster, result) in results {
        match result {
            Err(e) => {
                let what = format!("list services for {}", token_name);
                tally.cluster_failed(&cluster, &what, e);
            }
            Ok(outcomes) if outcomes.is_empty() => output::info(
                out,
                &format!("There are no services using token {} in {}.", token_name, cluster.name),
            )?,
            Ok(outcomes) => {
                for (service_id, outcome) in outcomes {
                    tally.narrate(out, &cluster, &service_id, outcome)?;
                }
            }
        }
    }

    tally.finish(|clusters| Error::AlreadyInactive {
        token: token_name.to_string(),
        clusters,
    })
}

/// Kill `service_id` in every cluster that runs it.
///
/// Service ids are derived from the service description, so synced copies
/// of a token share them across clusters.
pub async fn handle_kill_service_command(
    ctx: &CommandContext,
    service_id: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let scope = match ctx.explicit() {
        Some(name) => TargetResolver::new(&ctx.clusters).override_scope(name)?,
        None => {
            ctx.clusters.ensure_not_empty()?;
            ctx.clusters.clusters().to_vec()
        }
    };

    let id = service_id.to_string();
    let results = ctx
        .engine
        .fan_out(&scope, move |cluster, gateway| {
            let id = id.clone();
            let cluster_name = cluster.name.clone();
            async move {
                let service = match gateway.get_service(&id).await {
                    Ok(service) => service,
                    Err(GatewayError::NotFound) => return Ok(None),
                    Err(e) => return Err(e),
                };
                let outcome = kill_one(gateway.as_ref(), &service, &cluster_name).await;
                Ok::<_, GatewayError>(Some(outcome))
            }
        })
        .await;

    let mut tally = KillTally::default();
    let mut found = false;
    for (cluster, result) in results {
        match result {
            Ok(None) => debug!("Service {} not present in {}", service_id, cluster.name),
            Ok(Some(outcome)) => {
                found = true;
                output::info(
                    out,
                    &format!(
                        "{} / {}: {}/apps/{}",
                        cluster.name,
                        service_id,
                        cluster.url.trim_end_matches('/'),
                        service_id
                    ),
                )?;
                tally.narrate(out, &cluster, service_id, outcome)?;
            }
            Err(e) => {
                let what = format!("look up service {}", service_id);
                tally.cluster_failed(&cluster, &what, e);
            }
        }
    }

    if !found && tally.failures.is_empty() {
        return Err(Error::ServiceNotFound {
            service_id: service_id.to_string(),
            checked: scope.into_iter().map(|c| c.name).collect(),
        }
        .into());
    }

    tally.finish(|clusters| Error::ServiceInactive {
        service_id: service_id.to_string(),
        clusters,
    })
}
