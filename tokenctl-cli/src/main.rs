///! tokenctl
///!
///! Command-line client for tokens spread across a federation of clusters

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokenctl_cli::api::HttpGateway;
use tokenctl_cli::commands::{self, CommandContext, MaintenanceCommands};
use tokenctl_cli::config::Config;
use tokenctl_cli::federation::{FederatedQueryEngine, Gateways};
use tokenctl_cli::output::{self, OutputFormat};
use tokenctl_common::RemoteTokenGateway;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (TOML, JSON or YAML)
    #[arg(long, global = true, env = "TOKENCTL_CONFIG")]
    config: Option<PathBuf>,

    /// Cluster or sync group to act on instead of inferring one
    #[arg(short, long, global = true)]
    cluster: Option<String>,

    /// Output format (table, json, yaml)
    #[arg(short, long, global = true)]
    output: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a token once per sync group holding it
    Show {
        /// Token name
        token: String,
        /// Skip listing the token's services
        #[arg(long)]
        no_services: bool,
    },
    /// List tokens across all clusters
    Tokens,
    /// Create a token on the default cluster
    Create {
        /// Token name
        token: String,
        /// Fields as key=value; values are parsed as JSON when possible
        fields: Vec<String>,
    },
    /// Update a token on its primary cluster
    Update {
        /// Token name
        token: String,
        /// Fields as key=value; values are parsed as JSON when possible
        #[arg(required = true)]
        fields: Vec<String>,
    },
    /// Delete a token
    Delete {
        /// Token name
        token: String,
        /// Delete from every cluster holding the token
        #[arg(short, long)]
        force: bool,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Kill the services of a token, or one service by id
    Kill {
        /// Token name, or a service id with --service-id
        token: String,
        /// Kill in every cluster holding the token
        #[arg(short, long)]
        force: bool,
        /// Treat the argument as a service id and kill it in every cluster running it
        #[arg(long)]
        service_id: bool,
    },
    /// Ping a token in every sync group holding it
    Ping {
        /// Token name
        token: String,
    },
    /// Manage maintenance mode
    Maintenance {
        #[command(subcommand)]
        command: MaintenanceCommands,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        generate_completions(shell);
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;
    let clusters = config.cluster_set()?;

    let client = reqwest::Client::builder()
        .timeout(config.timeout())
        .build()?;
    let gateways = Gateways::for_clusters(&clusters, |cluster| {
        let gateway: Arc<dyn RemoteTokenGateway> =
            Arc::new(HttpGateway::new(&cluster.url, client.clone()));
        gateway
    });
    let engine =
        FederatedQueryEngine::new(gateways).with_max_concurrency(config.http.max_concurrency);

    let format = OutputFormat::from_str(cli.output.as_deref().unwrap_or(&config.default_output));
    let ctx = CommandContext::new(clusters, engine)
        .with_explicit_cluster(cli.cluster)
        .with_output(format);

    let mut out = io::stdout();

    // Execute command
    match cli.command {
        Commands::Show { token, no_services } => {
            commands::show::handle_show_command(&ctx, &token, !no_services, &mut out).await?
        }
        Commands::Tokens => commands::tokens::handle_tokens_command(&ctx, &mut out).await?,
        Commands::Create { token, fields } => {
            commands::create::handle_create_command(&ctx, &token, &fields, &mut out).await?
        }
        Commands::Update { token, fields } => {
            commands::update::handle_update_command(&ctx, &token, &fields, &mut out).await?
        }
        Commands::Delete { token, force, yes } => {
            commands::delete::handle_delete_command(&ctx, &token, force, yes, &mut out).await?
        }
        Commands::Kill {
            token,
            service_id: true,
            ..
        } => commands::kill::handle_kill_service_command(&ctx, &token, &mut out).await?,
        Commands::Kill { token, force, .. } => {
            commands::kill::handle_kill_command(&ctx, &token, force, &mut out).await?
        }
        Commands::Ping { token } => {
            commands::ping::handle_ping_command(&ctx, &token, &mut out).await?
        }
        Commands::Maintenance { command } => {
            commands::maintenance::handle_maintenance_command(command, &ctx, &mut out).await?
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Print the error and pick the exit status.
///
/// Expected outcomes (nothing to do, already inactive) go to stdout as
/// warnings; everything else goes to stderr. See
/// [`tokenctl_common::Error::exit_code`] for the status.
fn report(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<tokenctl_common::Error>() {
        Some(e) if e.is_informational() => {
            if let Err(write_err) = output::warning(&mut io::stdout(), &e.to_string()) {
                output::print_error(&write_err.to_string());
            }
            ExitCode::from(e.exit_code())
        }
        _ => {
            output::print_error(&format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}

/// Generate shell completions
fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;

    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();

    generate(shell, &mut cmd, name, &mut io::stdout());
}
