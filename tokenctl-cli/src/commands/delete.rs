///! Token deletion

use super::{report_fanout, CommandContext};
use crate::federation::OperationKind;
use crate::output;
use anyhow::Result;
use std::collections::HashMap;
use std::io::Write;
use tokenctl_common::Cluster;
use tracing::info;

/// Delete `token_name` from its primary cluster, or from every cluster
/// holding it with `force` or when a copy opted out of syncing
pub async fn handle_delete_command(
    ctx: &CommandContext,
    token_name: &str,
    force: bool,
    assume_yes: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let plan = ctx.plan(token_name, OperationKind::Delete, force).await?;
    let targets = plan.decision.clone().into_targets(token_name)?;

    if force || targets.len() > 1 {
        output::info(
            out,
            &format!(
                "{} exists in {} cluster(s): {}.",
                token_name,
                targets.len(),
                cluster_names(&targets)
            ),
        )?;
    }

    if !assume_yes && !confirm_delete(token_name, &targets)? {
        output::info(out, "Deletion cancelled")?;
        return Ok(());
    }

    let etags: HashMap<String, Option<String>> = plan
        .query
        .entries()
        .map(|(cluster, entry)| (cluster.clone(), entry.etag.clone()))
        .collect();

    info!("Deleting {} in {}", token_name, cluster_names(&targets));
    let name = token_name.to_string();
    let results = ctx
        .engine
        .fan_out(&targets, move |cluster, gateway| {
            let name = name.clone();
            let etag = etags.get(&cluster.name).cloned().flatten();
            async move { gateway.delete_token(&name, etag.as_deref()).await }
        })
        .await;

    report_fanout(out, token_name, "deleted", results)
}

fn cluster_names(clusters: &[Cluster]) -> String {
    clusters
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn confirm_delete(token_name: &str, targets: &[Cluster]) -> Result<bool> {
    use dialoguer::Confirm;

    let confirm = Confirm::new()
        .with_prompt(format!(
            "Are you sure you want to delete {} in {}?",
            token_name,
            cluster_names(targets)
        ))
        .default(false)
        .interact()?;

    Ok(confirm)
}
