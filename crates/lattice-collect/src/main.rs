//! lattice-collect
//!
//! Collects the migratable objects of one or more namespaces and prints them,
//! sanitized, as a YAML stream or a JSON array.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use kube::api::Api;
use kube::Client;
use thiserror::Error;
use tracing::{error, info};

use lattice_collect::config::DEFAULT_NAMESPACE_CONCURRENCY;
use lattice_collect::selector::SelectorPair;
use lattice_collect::{
    prepare_resources, CollectError, CollectorConfig, LabelSelector, ProvisionerOwnership,
    ResourceCollector, ResourceObject,
};
use lattice_common::crd::ApplicationClone;
use lattice_common::kube_utils::create_client;
use lattice_common::telemetry::{init_telemetry, LogFormat, TelemetryConfig, TelemetryError};

/// Collect namespaced workloads for migration, clone or backup
#[derive(Parser, Debug)]
#[command(name = "lattice-collect")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to kubeconfig (defaults to in-cluster config, then ~/.kube/config)
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Namespace to collect from (repeatable)
    #[arg(long = "namespace", short = 'n', required_unless_present = "clone")]
    namespaces: Vec<String>,

    /// Collect the source namespaces and selectors of this ApplicationClone
    #[arg(long, conflicts_with = "namespaces", requires = "clone_namespace")]
    clone: Option<String>,

    /// Namespace of the ApplicationClone
    #[arg(long)]
    clone_namespace: Option<String>,

    /// Label selector as key=value (repeatable, all must match)
    #[arg(long = "selector", short = 'l')]
    selectors: Vec<SelectorPair>,

    /// Storage provisioner whose claims are collected (repeatable)
    #[arg(long = "provisioner", required = true)]
    provisioners: Vec<String>,

    /// Namespaces evaluated concurrently per kind
    #[arg(long, default_value_t = DEFAULT_NAMESPACE_CONCURRENCY)]
    concurrency: usize,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
    output: OutputFormat,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormatArg::Compact)]
    log_format: LogFormatArg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormatArg {
    Json,
    Compact,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Json => LogFormat::Json,
            LogFormatArg::Compact => LogFormat::Compact,
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Collect(#[from] CollectError),

    #[error(transparent)]
    Common(#[from] lattice_common::Error),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error("failed to render output: {0}")]
    Output(String),
}

/// Exit status for failures a later retry may clear (EX_TEMPFAIL)
const EXIT_RETRYABLE: u8 = 75;

impl CliError {
    fn is_retryable(&self) -> bool {
        match self {
            CliError::Collect(e) => e.is_retryable(),
            CliError::Common(e) => e.is_retryable(),
            CliError::Telemetry(_) | CliError::Output(_) => false,
        }
    }

    fn exit_code(&self) -> ExitCode {
        if self.is_retryable() {
            ExitCode::from(EXIT_RETRYABLE)
        } else {
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) =
        init_telemetry(TelemetryConfig::new("lattice-collect").with_format(cli.log_format.into()))
    {
        eprintln!("{}", CliError::from(e));
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, retryable = e.is_retryable(), "Collection failed");
            e.exit_code()
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let client = create_client(cli.kubeconfig.as_deref())
        .await
        .map_err(|e| CollectError::Configuration(e.to_string()))?;

    let mut selector = LabelSelector::everything();
    let namespaces = match (&cli.clone, &cli.clone_namespace) {
        (Some(name), Some(namespace)) => {
            let (namespaces, clone_selector) = clone_request(&client, name, namespace).await?;
            selector = clone_selector;
            namespaces
        }
        _ => cli.namespaces.clone(),
    };
    for pair in &cli.selectors {
        selector.insert(pair.key.clone(), pair.value.clone());
    }

    let ownership = Arc::new(ProvisionerOwnership::new(
        client.clone(),
        cli.provisioners.clone(),
    ));
    let config = CollectorConfig::default().with_namespace_concurrency(cli.concurrency);
    let collector = ResourceCollector::from_client(client, ownership, config).await?;

    let mut objects = collector.get_resources(&namespaces, &selector).await?;
    prepare_resources(&mut objects)?;
    sort_for_output(&mut objects);

    info!(count = objects.len(), "Writing collected resources");
    print!("{}", render(&objects, cli.output)?);
    Ok(())
}

/// Namespaces and selector named by an ApplicationClone
async fn clone_request(
    client: &Client,
    name: &str,
    namespace: &str,
) -> Result<(Vec<String>, LabelSelector), CliError> {
    let api: Api<ApplicationClone> = Api::namespaced(client.clone(), namespace);
    let clone = api.get(name).await.map_err(lattice_common::Error::from)?;

    let namespaces = clone.spec.source_namespaces();
    info!(
        clone = %name,
        namespace = %namespace,
        sources = ?namespaces,
        "Resolved clone request"
    );
    Ok((namespaces, LabelSelector::from(clone.spec.selectors)))
}

fn sort_for_output(objects: &mut [ResourceObject]) {
    objects.sort_by(|a, b| {
        (a.kind(), a.namespace(), a.name()).cmp(&(b.kind(), b.namespace(), b.name()))
    });
}

fn render(objects: &[ResourceObject], format: OutputFormat) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => {
            let mut out =
                serde_json::to_string_pretty(objects).map_err(|e| CliError::Output(e.to_string()))?;
            out.push('\n');
            Ok(out)
        }
        OutputFormat::Yaml => {
            let mut out = String::new();
            for object in objects {
                out.push_str("---\n");
                out.push_str(
                    &serde_yaml::to_string(object).map_err(|e| CliError::Output(e.to_string()))?,
                );
            }
            Ok(out)
        }
    }
}
