///! Token update

use super::{parse_fields, write_resolved, CommandContext};
use crate::federation::OperationKind;
use crate::output;
use anyhow::Result;
use std::io::Write;

/// Apply `key=value` fields to the token on its primary cluster
pub async fn handle_update_command(
    ctx: &CommandContext,
    token_name: &str,
    fields: &[String],
    out: &mut dyn Write,
) -> Result<()> {
    let fields = parse_fields(fields)?;

    let target = write_resolved(ctx, token_name, OperationKind::Update, |_, token| {
        for (key, value) in fields {
            token.set_field(&key, value);
        }
        Ok(())
    })
    .await?;

    output::success(
        out,
        &format!("Successfully updated {} in {}.", token_name, target.name),
    )?;
    Ok(())
}
