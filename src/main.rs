use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use clap::{Parser, Subcommand};
use devfile_registry_operator::controller::{self, ClusterPlatform, ControllerState};
use devfile_registry_operator::crd::{
    ClusterDevfileRegistriesList, DevfileRegistriesList, DevfileRegistry,
};
use devfile_registry_operator::telemetry::{self, LogFormat};
use devfile_registry_operator::{Error, OperatorConfig};
use k8s_openapi::api::coordination::v1::Lease;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::MicroTime;
use kube::api::{Api, ObjectMeta, Patch, PatchParams, PostParams};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the operator
    Run(RunArgs),
    /// Show version and build information
    Version,
    /// Show the objects managed in the cluster
    Info(InfoArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Seconds between periodic re-checks of a reconciled object
    #[arg(long, env = "REQUEUE_INTERVAL_SECS", default_value_t = 3600)]
    requeue_interval_secs: u64,

    /// Timeout in seconds for each registry index request
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 20)]
    http_timeout_secs: u64,

    /// Port for /healthz, /readyz and /metrics
    #[arg(long, env = "METRICS_PORT", default_value_t = 8080)]
    metrics_port: u16,

    /// Port for the admission webhook
    #[arg(long, env = "WEBHOOK_PORT", default_value_t = 9443)]
    webhook_port: u16,

    /// PEM certificate served by the admission webhook
    #[arg(
        long,
        env = "WEBHOOK_CERT",
        default_value = "/tmp/k8s-webhook-server/serving-certs/tls.crt"
    )]
    webhook_cert: String,

    /// PEM private key for the webhook certificate
    #[arg(
        long,
        env = "WEBHOOK_KEY",
        default_value = "/tmp/k8s-webhook-server/serving-certs/tls.key"
    )]
    webhook_key: String,

    /// Serve the admission webhook
    #[arg(long, env = "ENABLE_WEBHOOKS")]
    enable_webhook: bool,

    /// Log line format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Only reconcile while holding the leader lease
    #[arg(long, env = "LEADER_ELECTION")]
    leader_election: bool,

    /// Namespace holding the leader lease
    #[arg(long, env = "OPERATOR_NAMESPACE", default_value = "devfile-registry-operator")]
    namespace: String,
}

impl RunArgs {
    fn operator_config(&self) -> OperatorConfig {
        OperatorConfig {
            enable_webhook: self.enable_webhook,
            ..OperatorConfig::default()
        }
        .with_requeue_interval(Duration::from_secs(self.requeue_interval_secs))
        .with_http_timeout(Duration::from_secs(self.http_timeout_secs))
    }
}

#[derive(Parser, Debug)]
struct InfoArgs {
    /// Limit namespaced kinds to this namespace
    #[arg(long, env = "WATCH_NAMESPACE")]
    namespace: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    match args.command {
        Commands::Version => {
            println!("Devfile Registry Operator v{}", env!("CARGO_PKG_VERSION"));
            println!("Build Date: {}", env!("BUILD_DATE"));
            println!("Git SHA: {}", env!("GIT_SHA"));
            Ok(())
        }
        Commands::Info(info_args) => run_info(info_args).await,
        Commands::Run(run_args) => run_operator(run_args).await,
    }
}

async fn run_info(args: InfoArgs) -> Result<(), Error> {
    let client = kube::Client::try_default()
        .await
        .map_err(Error::KubeError)?;

    let (registries, lists): (Api<DevfileRegistry>, Api<DevfileRegistriesList>) =
        match args.namespace.as_deref() {
            Some(ns) => (
                Api::namespaced(client.clone(), ns),
                Api::namespaced(client.clone(), ns),
            ),
            None => (Api::all(client.clone()), Api::all(client.clone())),
        };
    let cluster_lists: Api<ClusterDevfileRegistriesList> = Api::all(client.clone());

    let registries = registries
        .list(&Default::default())
        .await
        .map_err(Error::KubeError)?;
    let lists = lists
        .list(&Default::default())
        .await
        .map_err(Error::KubeError)?;
    let cluster_lists = cluster_lists
        .list(&Default::default())
        .await
        .map_err(Error::KubeError)?;

    println!("Platform: {:?}", ClusterPlatform::detect(&client).await?);
    println!("Managed DevfileRegistries: {}", registries.items.len());
    println!("DevfileRegistriesLists: {}", lists.items.len());
    println!("ClusterDevfileRegistriesLists: {}", cluster_lists.items.len());
    Ok(())
}

async fn run_operator(args: RunArgs) -> Result<(), Error> {
    telemetry::init_telemetry(args.log_format)?;

    info!(
        "Starting Devfile Registry Operator v{}",
        env!("CARGO_PKG_VERSION")
    );

    let client = kube::Client::try_default()
        .await
        .map_err(Error::KubeError)?;

    info!("Connected to Kubernetes cluster");

    let platform = ClusterPlatform::detect(&client).await?;
    info!("Detected cluster platform: {:?}", platform);

    let config = args.operator_config();
    let is_leader = Arc::new(AtomicBool::new(!args.leader_election));

    if args.leader_election {
        let leader_namespace =
            std::env::var("POD_NAMESPACE").unwrap_or_else(|_| args.namespace.clone());
        let holder_identity = std::env::var("HOSTNAME").unwrap_or_else(|_| {
            hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown-host".to_string())
        });

        info!("Leader election using holder ID: {}", holder_identity);

        let lease_client = client.clone();
        let is_leader_bg = Arc::clone(&is_leader);
        tokio::spawn(async move {
            run_leader_election(lease_client, &leader_namespace, &holder_identity, is_leader_bg)
                .await;
        });
    }

    let state = Arc::new(ControllerState::new(
        client.clone(),
        config.clone(),
        platform,
        Arc::clone(&is_leader),
    )?);

    // Probes answer before leadership so a standby replica stays alive
    #[cfg(feature = "rest-api")]
    {
        let api_state = state.clone();
        let port = args.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = devfile_registry_operator::rest_api::run_server(api_state, port).await {
                tracing::error!("REST API server error: {:?}", e);
            }
        });
    }

    #[cfg(feature = "admission-webhook")]
    if config.enable_webhook {
        use devfile_registry_operator::webhook::{TlsConfig, WebhookServer};

        let server = WebhookServer::new(state.store.clone(), state.validator.clone());
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], args.webhook_port));
        let tls = TlsConfig {
            cert_path: args.webhook_cert.clone(),
            key_path: args.webhook_key.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = server.start(addr, tls).await {
                tracing::error!("Webhook server error: {:?}", e);
            }
        });
    }

    while !is_leader.load(Ordering::Relaxed) {
        info!("Waiting for leadership of lease {}", LEASE_NAME);
        tokio::time::sleep(RETRY_INTERVAL).await;
    }

    let result = controller::run_controller(state).await;

    // Flush any remaining traces
    telemetry::shutdown_telemetry();

    result
}

const LEASE_NAME: &str = "devfile-registry-operator-leader";
const LEASE_DURATION_SECS: i32 = 15;
const LEASE_DURATION: Duration = Duration::from_secs(LEASE_DURATION_SECS as u64);
const RENEW_INTERVAL: Duration = Duration::from_secs(10);
const RETRY_INTERVAL: Duration = Duration::from_secs(5);

async fn run_leader_election(
    client: kube::Client,
    namespace: &str,
    identity: &str,
    is_leader: Arc<AtomicBool>,
) {
    let leases: Api<Lease> = Api::namespaced(client, namespace);
    let mut last_renewed: Option<Instant> = None;

    loop {
        match try_acquire_or_renew(&leases, namespace, identity).await {
            Ok(true) => {
                if !is_leader.load(Ordering::Relaxed) {
                    info!("Acquired leadership for lease {}", LEASE_NAME);
                }
                is_leader.store(true, Ordering::Relaxed);
                last_renewed = Some(Instant::now());
                tokio::time::sleep(RENEW_INTERVAL).await;
            }
            Ok(false) => {
                if is_leader.load(Ordering::Relaxed) {
                    // Another replica now reconciles; restart to drop the watches
                    warn!("Lost leadership for lease {}, exiting", LEASE_NAME);
                    std::process::exit(1);
                }
                tokio::time::sleep(RETRY_INTERVAL).await;
            }
            Err(e) => {
                warn!("Leader election error: {:?}", e);
                if is_leader.load(Ordering::Relaxed) && lease_expired(last_renewed, Instant::now()) {
                    // The lease may already belong to another replica
                    is_leader.store(false, Ordering::Relaxed);
                    warn!("Could not renew lease {} before it expired, exiting", LEASE_NAME);
                    std::process::exit(1);
                }
                tokio::time::sleep(RETRY_INTERVAL).await;
            }
        }
    }
}

/// Whether a lease last renewed at `last_renewed` may have been taken over by `now`
fn lease_expired(last_renewed: Option<Instant>, now: Instant) -> bool {
    match last_renewed {
        Some(renewed) => now.saturating_duration_since(renewed) >= LEASE_DURATION,
        None => true,
    }
}

async fn try_acquire_or_renew(
    leases: &Api<Lease>,
    namespace: &str,
    identity: &str,
) -> Result<bool, kube::Error> {
    let now = Utc::now();

    match leases.get(LEASE_NAME).await {
        Ok(existing) => {
            let spec = existing.spec.as_ref();
            let current_holder = spec.and_then(|s| s.holder_identity.as_deref());

            if current_holder == Some(identity) {
                let patch = serde_json::json!({
                    "spec": {
                        "renewTime": MicroTime(now),
                        "leaseDurationSeconds": LEASE_DURATION_SECS,
                    }
                });
                leases
                    .patch(LEASE_NAME, &PatchParams::default(), &Patch::Merge(&patch))
                    .await?;
                return Ok(true);
            }

            let expired = spec
                .and_then(|s| s.renew_time.as_ref())
                .map(|renew| {
                    let duration = spec
                        .and_then(|s| s.lease_duration_seconds)
                        .unwrap_or(LEASE_DURATION_SECS);
                    let expiry = renew.0 + chrono::Duration::seconds(duration as i64);
                    now > expiry
                })
                .unwrap_or(true);

            if !expired {
                return Ok(false);
            }

            info!(
                "Lease held by {:?} has expired, taking over",
                current_holder
            );
            // A competing takeover sees a stale resourceVersion and gets 409
            let patch = serde_json::json!({
                "metadata": { "resourceVersion": existing.metadata.resource_version },
                "spec": {
                    "holderIdentity": identity,
                    "acquireTime": MicroTime(now),
                    "renewTime": MicroTime(now),
                    "leaseDurationSeconds": LEASE_DURATION_SECS,
                }
            });
            match leases
                .patch(LEASE_NAME, &PatchParams::default(), &Patch::Merge(&patch))
                .await
            {
                Ok(_) => Ok(true),
                Err(kube::Error::Api(err)) if err.code == 409 => Ok(false),
                Err(e) => Err(e),
            }
        }
        Err(kube::Error::Api(err)) if err.code == 404 => {
            let lease = Lease {
                metadata: ObjectMeta {
                    name: Some(LEASE_NAME.to_string()),
                    namespace: Some(namespace.to_string()),
                    ..Default::default()
                },
                spec: Some(k8s_openapi::api::coordination::v1::LeaseSpec {
                    holder_identity: Some(identity.to_string()),
                    acquire_time: Some(MicroTime(now)),
                    renew_time: Some(MicroTime(now)),
                    lease_duration_seconds: Some(LEASE_DURATION_SECS),
                    ..Default::default()
                }),
            };
            match leases.create(&PostParams::default(), &lease).await {
                Ok(_) => {
                    info!("Created lease {} with holder {}", LEASE_NAME, identity);
                    Ok(true)
                }
                Err(kube::Error::Api(err)) if err.code == 409 => Ok(false),
                Err(e) => Err(e),
            }
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_kept_within_duration() {
        let renewed = Instant::now();
        assert!(!lease_expired(Some(renewed), renewed));
        assert!(!lease_expired(Some(renewed), renewed + RENEW_INTERVAL));
    }

    #[test]
    fn test_lease_expires_after_failed_renewals() {
        let renewed = Instant::now();
        assert!(lease_expired(Some(renewed), renewed + LEASE_DURATION));
        assert!(lease_expired(
            Some(renewed),
            renewed + RENEW_INTERVAL + RETRY_INTERVAL
        ));
    }

    #[test]
    fn test_lease_never_renewed_counts_as_expired() {
        assert!(lease_expired(None, Instant::now()));
    }

    #[test]
    fn test_cli_defaults() {
        let args = Args::parse_from(["devfile-registry-operator", "run"]);
        let Commands::Run(run) = args.command else {
            panic!("expected run subcommand");
        };
        let config = run.operator_config();
        assert_eq!(config.requeue_interval, Duration::from_secs(3600));
        assert_eq!(config.http_timeout, Duration::from_secs(20));
        assert_eq!(run.webhook_port, 9443);
    }
}
