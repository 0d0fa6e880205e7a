///! Federated token listing

use super::CommandContext;
use crate::federation::TargetResolver;
use crate::output;
use anyhow::Result;
use std::io::Write;

pub async fn handle_tokens_command(ctx: &CommandContext, out: &mut dyn Write) -> Result<()> {
    let scope = match ctx.explicit() {
        Some(name) => TargetResolver::new(&ctx.clusters).override_scope(name)?,
        None => {
            ctx.clusters.ensure_not_empty()?;
            ctx.clusters.clusters().to_vec()
        }
    };

    let tokens = ctx.engine.query_tokens(&scope).await?;
    output::write_tokens(out, &tokens, ctx.output)
}
