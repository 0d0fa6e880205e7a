///! Token ping

use super::{report_fanout, CommandContext};
use crate::federation::OperationKind;
use crate::output;
use anyhow::Result;
use std::io::Write;

/// Ping the token's primary in every sync group holding it.
///
/// Clusters holding the token that are not pinged are named too.
pub async fn handle_ping_command(
    ctx: &CommandContext,
    token_name: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let plan = ctx.plan(token_name, OperationKind::Ping, false).await?;
    let targets = plan.decision.clone().into_targets(token_name)?;

    for cluster in ctx.clusters.iter() {
        let targeted = targets.iter().any(|t| t.name == cluster.name);
        if targeted {
            output::info(out, &format!("Pinging token {} in {}.", token_name, cluster.name))?;
        } else if plan.query.contains(&cluster.name) {
            output::info(
                out,
                &format!(
                    "Not pinging token {} in {}: another cluster serves it.",
                    token_name, cluster.name
                ),
            )?;
        }
    }

    let name = token_name.to_string();
    let results = ctx
        .engine
        .fan_out(&targets, move |_, gateway| {
            let name = name.clone();
            async move { gateway.ping_token(&name).await }
        })
        .await;

    report_fanout(out, token_name, "pinged", results)
}
