///! Maintenance mode commands

use super::{write_resolved, CommandContext};
use crate::federation::OperationKind;
use crate::output;
use anyhow::Result;
use clap::Subcommand;
use serde_json::json;
use std::io::Write;
use tokenctl_common::Error;

const MAINTENANCE_FIELD: &str = "maintenance";

#[derive(Subcommand)]
pub enum MaintenanceCommands {
    /// Put a token into maintenance mode
    Start {
        /// Token name
        token: String,
        /// Message returned to clients while in maintenance
        message: String,
    },
    /// Take a token out of maintenance mode
    Stop {
        /// Token name
        token: String,
    },
    /// Report whether a token is in maintenance mode
    Check {
        /// Token name
        token: String,
    },
}

pub async fn handle_maintenance_command(
    command: MaintenanceCommands,
    ctx: &CommandContext,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        MaintenanceCommands::Start { token, message } => {
            let target = write_resolved(ctx, &token, OperationKind::Maintenance, |_, t| {
                t.set_field(MAINTENANCE_FIELD, json!({ "message": message }));
                Ok(())
            })
            .await?;
            output::success(
                out,
                &format!("Maintenance mode started for {} in {}.", token, target.name),
            )?;
        }

        MaintenanceCommands::Stop { token } => {
            let target = write_resolved(ctx, &token, OperationKind::Maintenance, |cluster, t| {
                if t.remove_field(MAINTENANCE_FIELD).is_none() {
                    return Err(Error::NotInMaintenance {
                        token: token.clone(),
                        cluster: cluster.name.clone(),
                    }
                    .into());
                }
                Ok(())
            })
            .await?;
            output::success(
                out,
                &format!("Maintenance mode stopped for {} in {}.", token, target.name),
            )?;
        }

        MaintenanceCommands::Check { token } => {
            let (target, plan) = ctx.single_target(&token, OperationKind::Maintenance).await?;
            let Some(entry) = plan.query.get(&target.name) else {
                return Err(Error::NotFound {
                    token,
                    checked: vec![target.name],
                }
                .into());
            };

            match entry.token.maintenance_message() {
                Some(message) => output::info(
                    out,
                    &format!("{} is in maintenance mode in {}: {}", token, target.name, message),
                )?,
                None => {
                    return Err(Error::NotInMaintenance {
                        token,
                        cluster: target.name,
                    }
                    .into())
                }
            }
        }
    }

    Ok(())
}
