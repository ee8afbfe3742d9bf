//! secretfetch - Secrets Manager retrieval for AWS Lambda
//!
//! Runs the secret retrieval function inside Lambda, invokes it once from the
//! command line, or serves a local Secrets Manager endpoint to run it against.

mod config;

use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use secretfetch_lambda::{InvocationContext, InvocationEvent, SecretRetriever, Variant};
use secretfetch_secretsmanager::SecretsManagerState;

#[derive(Parser, Debug)]
#[command(name = "secretfetch")]
#[command(about = "Fetch a Secrets Manager secret from AWS Lambda", long_about = None)]
struct Args {
    /// Function variant: plain or audited
    #[arg(long, global = true, default_value = "plain", env = "SECRETFETCH_VARIANT")]
    variant: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "SECRETFETCH_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve invocations from the Lambda Runtime API
    Run,

    /// Run a single invocation locally and print the response
    Invoke {
        /// Event JSON; read from stdin when omitted
        #[arg(long)]
        event: Option<String>,
    },

    /// Serve a local Secrets Manager endpoint
    Emulate {
        /// Host to bind to
        #[arg(long, env = "SECRETFETCH_HOST")]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long, env = "SECRETFETCH_PORT")]
        port: Option<u16>,

        /// Configuration file with secrets to create at startup
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing(log_level: &str, ansi: bool) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "secretfetch={level},secretfetch_lambda={level},\
                     secretfetch_secretsmanager={level},tower_http=debug",
                    level = log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_ansi(ansi))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let command = args.command.unwrap_or(Command::Run);

    // CloudWatch shows escape codes verbatim
    init_tracing(&args.log_level, !matches!(command, Command::Run));

    let variant = args.variant.parse::<Variant>().unwrap_or_else(|_| {
        tracing::warn!("Unknown variant '{}', defaulting to plain", args.variant);
        Variant::Plain
    });

    match command {
        Command::Run => {
            secretfetch_lambda::runtime::run(SecretRetriever::new(variant))
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
        }
        Command::Invoke { event } => invoke(variant, event).await?,
        Command::Emulate { host, port, config } => {
            emulate(host, port, config.as_deref()).await?;
        }
    }

    Ok(())
}

async fn invoke(variant: Variant, event: Option<String>) -> anyhow::Result<()> {
    let raw = match event {
        Some(raw) => raw,
        None => {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw)?;
            raw
        }
    };

    let payload: Value = if raw.trim().is_empty() {
        Value::Object(serde_json::Map::new())
    } else {
        serde_json::from_str(&raw)?
    };

    let context = InvocationContext::local();
    info!(request_id = %context.request_id, %variant, "Invoking locally");

    let response = SecretRetriever::new(variant)
        .handle(&InvocationEvent::from_value(&payload), &context)
        .await;

    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

async fn emulate(
    host: Option<String>,
    port: Option<u16>,
    path: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    let config = config::Config::load(path)?;

    let state = Arc::new(SecretsManagerState::new());
    let seeded = config.seed(&state.storage)?;
    info!("Created {} secret(s) from configuration", seeded);

    let app = secretfetch_secretsmanager::router(state);

    let host = host.unwrap_or(config.server.host);
    let port = port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Local Secrets Manager listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
