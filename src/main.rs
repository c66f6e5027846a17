//! Managed Certs CLI
//!
//! Operator front end for Google-managed SSL certificates: SslCertificate
//! CRUD against Compute Engine, ManagedCertificate CRUD against the cluster,
//! and CRD manifest generation.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use managed_certs::compute::DEFAULT_ENDPOINT;
use managed_certs::domain::ports::{ComputeApiRef, ManagedCertificateStoreRef};
use managed_certs::{
    CancelSignal, ClusterConfig, ComputeClient, ComputeConfig, Error, InMemoryCompute,
    InMemoryComputeConfig, InMemoryManagedCertificateStore, KubeManagedCertificateStore,
    ManagedCertificates, Result, SchemaVersion, SslCertificateClient,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Managed Certs - Google-managed SSL certificates for Kubernetes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Project that owns the SslCertificates
    #[arg(long, env = "GCP_PROJECT")]
    project: Option<String>,

    /// Compute Engine API endpoint
    #[arg(long, env = "COMPUTE_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// OAuth2 access token for the Compute Engine API
    #[arg(long, env = "COMPUTE_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Interval between operation status polls, in seconds
    #[arg(long, env = "POLL_INTERVAL", default_value = "10")]
    poll_interval_secs: u64,

    /// Give up waiting on an operation after this many seconds
    #[arg(long, env = "OPERATION_TIMEOUT")]
    timeout_secs: Option<u64>,

    /// Namespace of ManagedCertificate resources
    #[arg(long, env = "NAMESPACE", default_value = "default")]
    namespace: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Run against in-memory providers (no Compute Engine, no Kubernetes).
    /// State lives for a single invocation; earlier runs are not visible
    #[arg(long, env = "STANDALONE")]
    standalone: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a managed SslCertificate and wait for the operation
    Create {
        name: String,
        #[arg(required = true)]
        domains: Vec<String>,
    },
    /// Delete an SslCertificate; an absent one is not an error
    Delete { name: String },
    /// Print whether an SslCertificate exists
    Exists { name: String },
    /// Print an SslCertificate as JSON
    Get { name: String },
    /// Print all SslCertificates of the project as JSON
    List,
    /// Print the ManagedCertificate CRD as YAML
    Crds,
    /// Manage ManagedCertificate resources
    #[command(subcommand)]
    Mcrt(McrtCommand),
}

#[derive(Subcommand, Debug)]
enum McrtCommand {
    /// Create a ManagedCertificate
    Create {
        name: String,
        #[arg(required = true)]
        domains: Vec<String>,
        /// Schema version to create through (v1beta1, v1beta2, v1)
        #[arg(long, default_value = "v1")]
        version: SchemaVersion,
    },
    /// Delete a ManagedCertificate
    Delete { name: String },
    /// Delete every ManagedCertificate in the namespace
    DeleteAll,
    /// Print a ManagedCertificate as JSON
    Get { name: String },
    /// Print all ManagedCertificates as JSON
    List,
    /// Copy the state of the backing SslCertificate into the status
    Sync { name: String },
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    info!("Managed Certs {}", managed_certs::VERSION);
    info!("  Standalone mode: {}", args.standalone);

    match &args.command {
        Command::Crds => {
            print!("{}", managed_certs::crd::crd_yaml()?);
            Ok(())
        }
        Command::Mcrt(command) => run_mcrt(&args, command).await,
        command => run_compute(&args, command).await,
    }
}

async fn run_compute(args: &Args, command: &Command) -> Result<()> {
    let certificates = ssl_client(args)?;

    match command {
        Command::Create { name, domains } => {
            certificates.create(name, domains, &cancel_signal(args)).await?;
            info!("SslCertificate {} created", name);
        }
        Command::Delete { name } => {
            certificates.delete(name, &cancel_signal(args)).await?;
            info!("SslCertificate {} deleted", name);
        }
        Command::Exists { name } => println!("{}", certificates.exists(name).await?),
        Command::Get { name } => print_json(&certificates.get(name).await?)?,
        Command::List => print_json(&certificates.list().await?)?,
        Command::Crds | Command::Mcrt(_) => {}
    }
    Ok(())
}

async fn run_mcrt(args: &Args, command: &McrtCommand) -> Result<()> {
    if args.standalone && matches!(command, McrtCommand::Sync { .. }) {
        return Err(Error::Configuration(
            "mcrt sync needs state from earlier runs and is not available with --standalone"
                .into(),
        ));
    }

    let store: ManagedCertificateStoreRef = if args.standalone {
        Arc::new(InMemoryManagedCertificateStore::new())
    } else {
        let client = kube::Client::try_default().await?;
        let config = ClusterConfig {
            namespace: args.namespace.clone(),
        };
        info!("  Namespace: {}", config.namespace);
        Arc::new(KubeManagedCertificateStore::new(client, &config))
    };
    let mcrts = ManagedCertificates::new(store);

    match command {
        McrtCommand::Create {
            name,
            domains,
            version,
        } => mcrts.create_version(*version, name, domains.clone()).await?,
        McrtCommand::Delete { name } => mcrts.delete(name).await?,
        McrtCommand::DeleteAll => mcrts.delete_all().await?,
        McrtCommand::Get { name } => print_json(&mcrts.get(name).await?)?,
        McrtCommand::List => print_json(&mcrts.list().await?)?,
        McrtCommand::Sync { name } => {
            let record = mcrts.get(name).await?;
            let certificate_name = record
                .status
                .as_ref()
                .and_then(|s| s.certificate_name.clone())
                .unwrap_or_else(|| record.name.clone());

            let certificate = ssl_client(args)?.get(&certificate_name).await?;
            print_json(&mcrts.sync_status(name, &certificate).await?)?;
        }
    }
    Ok(())
}

// =============================================================================
// Wiring
// =============================================================================

fn ssl_client(args: &Args) -> Result<SslCertificateClient> {
    let (api, project): (ComputeApiRef, String) = if args.standalone {
        let project = args.project.clone().unwrap_or_else(|| "standalone".to_string());
        (Arc::new(InMemoryCompute::new(InMemoryComputeConfig::default())), project)
    } else {
        let project = args.project.clone().ok_or_else(|| {
            Error::Configuration("--project (GCP_PROJECT) is required".into())
        })?;
        if args.token.is_none() {
            warn!("No access token configured, requests are sent unauthenticated");
        }
        let config = ComputeConfig {
            endpoint: args.endpoint.clone(),
            project_id: project.clone(),
            access_token: args.token.clone(),
            ..Default::default()
        };
        (Arc::new(ComputeClient::new(&config)?), project)
    };

    info!("  Project: {}", project);
    Ok(SslCertificateClient::new(api, project)
        .with_poll_interval(Duration::from_secs(args.poll_interval_secs)))
}

/// Cancel signal honoring `--timeout-secs` and Ctrl-C
fn cancel_signal(args: &Args) -> CancelSignal {
    let cancel = match args.timeout_secs {
        Some(secs) => CancelSignal::with_timeout(Duration::from_secs(secs)),
        None => CancelSignal::new(),
    };

    let token = cancel.token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, no longer waiting on the operation");
            token.cancel();
        }
    });

    cancel
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "kube=info", "reqwest=info"] {
        filter = filter.add_directive(directive.parse().map_err(|e| {
            Error::Configuration(format!("Invalid log directive {}: {}", directive, e))
        })?);
    }

    // Logs go to stderr so command output stays parseable
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_standalone_help_is_single_shot() {
        let command = Args::command();
        let standalone = command
            .get_arguments()
            .find(|a| a.get_id() == "standalone")
            .unwrap();
        let help = standalone.get_help().unwrap().to_string();
        assert!(help.contains("single invocation"));
    }

    #[tokio::test]
    async fn test_standalone_rejects_sync() {
        let args = Args::try_parse_from([
            "managed-certs",
            "--standalone",
            "mcrt",
            "sync",
            "example-cert",
        ])
        .unwrap();
        let Command::Mcrt(command) = &args.command else {
            panic!("expected an mcrt command");
        };

        let err = run_mcrt(&args, command).await.unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_standalone_create_parses() {
        let args = Args::try_parse_from([
            "managed-certs",
            "--standalone",
            "create",
            "example-cert",
            "a.example.com",
        ])
        .unwrap();
        assert!(args.standalone);
        assert!(matches!(args.command, Command::Create { .. }));
    }
}
