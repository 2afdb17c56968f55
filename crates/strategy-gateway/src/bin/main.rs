//! Strategy gateway entry point
//!
//! Serves the decision pipeline over HTTP and exposes one-shot CLI commands
//! for running a message and inspecting the audit trail.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use strategy_gateway::{create_router, AppState, ANONYMOUS_ACTOR, DEFAULT_HISTORY_LIMIT};
use strategy_pipeline::{PipelineConfig, PIPELINE_VERSION};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "strategy-gateway")]
#[command(about = "Strategic decision pipeline with a signed audit trail")]
#[command(version)]
struct Cli {
    /// Optional TOML configuration file; environment variables apply otherwise
    #[arg(short, long, global = true, env = "STRATEGY_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080", env = "PORT")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },

    /// Run one message through the pipeline
    Decide {
        /// Message to evaluate
        message: String,

        /// Actor recorded in the audit trail
        #[arg(short, long, default_value = ANONYMOUS_ACTOR)]
        actor: String,

        /// Output format (json or text)
        #[arg(short, long, default_value = "text")]
        output: String,
    },

    /// Inspect the audit trail
    Audit {
        #[command(subcommand)]
        command: AuditCommands,
    },
}

#[derive(Subcommand)]
enum AuditCommands {
    /// Show the record for a correlation id
    Show { correlation_id: String },

    /// List the most recent records for an actor
    History {
        actor: String,

        #[arg(short, long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },

    /// Recompute checksum and signature of a stored record
    Verify { correlation_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port, host } => {
            let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
            let state = Arc::new(AppState::from_config(&config)?);
            let router = create_router(state);

            tracing::info!("Starting strategy gateway on {}", addr);
            tracing::info!(
                version = PIPELINE_VERSION,
                policy_mode = %config.policy_mode_version,
                domain_pack = %config.domain_pack_version,
                audit_db = %config.audit_db_path.display(),
                "Pipeline configured"
            );

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router).await?;
        }

        Commands::Decide {
            message,
            actor,
            output,
        } => {
            let state = AppState::from_config(&config)?;
            let result = state.orchestrator.process(&message, &actor).await;

            match output.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&result)?),
                _ => {
                    println!("Correlation: {}", result.correlation_id);
                    println!("Audit entry: {}", result.audit_id);
                    println!("Status:      {}", result.status.as_str());
                    if let Some(error) = &result.error {
                        println!("Error:       {}", error);
                    }
                    for warning in &result.warnings {
                        println!("Warning:     {}", warning);
                    }
                    if let Some(document) = &result.document {
                        println!();
                        println!("{}", document.answer);
                    }
                }
            }
        }

        Commands::Audit { command } => {
            let state = AppState::from_config(&config)?;
            let sink = state.sink();

            match command {
                AuditCommands::Show { correlation_id } => {
                    match sink.get_by_correlation_id(&correlation_id)? {
                        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                        None => anyhow::bail!("no audit record for {}", correlation_id),
                    }
                }
                AuditCommands::History { actor, limit } => {
                    let summaries = sink.get_recent_by_actor(&actor, limit)?;
                    println!("{}", serde_json::to_string_pretty(&summaries)?);
                }
                AuditCommands::Verify { correlation_id } => {
                    let record = sink
                        .get_by_correlation_id(&correlation_id)?
                        .ok_or_else(|| anyhow::anyhow!("no audit record for {}", correlation_id))?;
                    let verification = sink.verify(&record);
                    if verification.is_intact() {
                        println!("Record {} is intact", record.entry_id);
                    } else {
                        println!("Record {} FAILED verification:", record.entry_id);
                        println!("  checksum valid:  {}", verification.checksum_valid);
                        println!("  signature valid: {}", verification.signature_valid);
                        std::process::exit(1);
                    }
                }
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&str>) -> anyhow::Result<PipelineConfig> {
    let config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            PipelineConfig::from_toml_str(&content)?
        }
        None => PipelineConfig::from_env(),
    };
    config.validate()?;
    Ok(config)
}
