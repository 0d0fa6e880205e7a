///! Token creation

use super::{gateway_failure, parse_fields, CommandContext};
use crate::federation::OperationKind;
use crate::output;
use anyhow::Result;
use std::io::Write;
use tokenctl_common::Token;
use tracing::info;

/// Create `token_name` on the default-for-create cluster (or the override)
pub async fn handle_create_command(
    ctx: &CommandContext,
    token_name: &str,
    fields: &[String],
    out: &mut dyn Write,
) -> Result<()> {
    let (target, _) = ctx.single_target(token_name, OperationKind::Create).await?;

    let mut token = Token::default();
    for (key, value) in parse_fields(fields)? {
        token.set_field(&key, value);
    }

    info!("Creating {} in {}", token_name, target.name);
    ctx.gateway(&target)?
        .put_token(token_name, &token, None)
        .await
        .map_err(|e| gateway_failure(token_name, &target, e))?;

    output::success(
        out,
        &format!("Successfully created {} in {}.", token_name, target.name),
    )?;
    Ok(())
}
