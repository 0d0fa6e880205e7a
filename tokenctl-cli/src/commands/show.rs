///! Token display

use super::CommandContext;
use crate::federation::{query_federated, TargetResolver};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use std::io::Write;
use tokenctl_common::Error;

/// Show `token_name` once per sync group holding it, or once per cluster
/// when `--cluster` narrows the query
pub async fn handle_show_command(
    ctx: &CommandContext,
    token_name: &str,
    include_services: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let resolver = TargetResolver::new(&ctx.clusters);

    let (scope, result) = match ctx.explicit() {
        Some(name) => {
            let scope = resolver.override_scope(name)?;
            let result = ctx.engine.query(&scope, token_name, include_services).await?;
            (scope, result)
        }
        None => {
            let result =
                query_federated(&ctx.engine, &ctx.clusters, token_name, include_services).await?;
            (ctx.clusters.clusters().to_vec(), result)
        }
    };

    if result.is_empty() {
        return Err(Error::NotFound {
            token: token_name.to_string(),
            checked: scope.into_iter().map(|c| c.name).collect(),
        }
        .into());
    }

    match ctx.output {
        OutputFormat::Table => {
            let sections = if ctx.explicit().is_some() {
                output::cluster_sections(&scope, &result)
            } else {
                output::group_sections(&resolver.resolve_per_group(&result), &result)
            };
            output::write_token_sections(out, token_name, &sections, include_services)?;
        }
        format => output::write_structured(out, &result, format)?,
    }

    for failure in result.service_failures() {
        output::warning(out, &format!("Unable to list services in {}", failure))?;
    }

    Ok(())
}
