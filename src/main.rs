use axum::http::StatusCode;
use axum::{Json, Router, extract::Extension, routing::get};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use swim::dissemination::types::DisseminationConfig;
use swim::failure::types::FailureDetectorConfig;
use swim::membership::types::MemberView;
use swim::{Config, SwimNode};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "swim-node")]
#[command(about = "SWIM failure detection and membership node")]
struct Args {
    /// Host to bind the gossip socket to
    #[arg(short = 'a', long, default_value = "127.0.0.1")]
    host: String,

    /// UDP port to bind
    #[arg(short, long, default_value_t = 10000)]
    port: u16,

    /// Dissemination buffer lambda
    #[arg(long, default_value_t = 20.0)]
    lambda: f64,

    /// Probe period in milliseconds
    #[arg(long, default_value_t = 100)]
    period: u64,

    /// Number of members asked to probe indirectly
    #[arg(long, default_value_t = 4)]
    group: usize,

    /// Probe timeout in milliseconds
    #[arg(long, default_value_t = 50)]
    timeout: u64,

    /// Seconds a dead member is remembered before being forgotten
    #[arg(long, default_value_t = 30)]
    dead_ttl: u64,

    /// Bootstrap peers, comma separated (e.g. 127.0.0.1:10001,127.0.0.1:10002)
    #[arg(long, value_delimiter = ',')]
    bootstrap: Vec<SocketAddr>,

    /// Serve the membership view as JSON on this address
    #[arg(long)]
    http: Option<SocketAddr>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

impl Args {
    fn config(&self) -> Config {
        Config {
            bind_host: self.host.clone(),
            bind_port: self.port,
            failure_detector: FailureDetectorConfig {
                period: Duration::from_millis(self.period),
                group_size: self.group,
                timeout: Duration::from_millis(self.timeout),
            },
            dissemination: DisseminationConfig {
                lambda: self.lambda,
                ..DisseminationConfig::default()
            },
            bootstrap_peers: self.bootstrap.clone(),
            dead_member_ttl: Duration::from_secs(self.dead_ttl),
            ..Config::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.config();
    tracing::info!("Starting node on {}", config.bind_address());
    if config.bootstrap_peers.is_empty() {
        tracing::info!("No bootstrap peers, waiting to be contacted");
    } else {
        tracing::info!("Bootstrap peers: {:?}", config.bootstrap_peers);
    }

    let node = SwimNode::new(config).await?;
    tracing::info!("Node ID: {}", node.local_id);

    // 1. Receive loop first, so replies to our first probes are not lost:
    let listener = node.clone();
    tokio::spawn(async move {
        listener.start().await;
    });

    // 2. Probe loop:
    let prober = node.clone();
    tokio::spawn(async move {
        prober.probe_loop().await;
    });

    // 3. Stats reporter:
    let stats_node = node.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));

        loop {
            interval.tick().await;
            let members = stats_node.members();
            tracing::info!(
                "Cluster stats: {} members, {} alive",
                members.len(),
                stats_node.alive_members().len()
            );
            for member in members {
                tracing::info!(
                    "  - {} addr={} state={:?} last_ack={}ms ago",
                    member.id,
                    member.address,
                    member.state,
                    member.since_last_ack_ms
                );
            }
        }
    });

    // 4. Optional status endpoint:
    if let Some(http_addr) = args.http {
        let app = Router::new()
            .route("/members", get(handle_members))
            .layer(Extension(node.clone()));

        tracing::info!("HTTP status endpoint listening on {}", http_addr);
        let listener = tokio::net::TcpListener::bind(http_addr).await?;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("HTTP server failed: {}", e);
            }
        });
    }

    tracing::info!("Press Ctrl+C to leave the cluster");
    tokio::signal::ctrl_c().await?;

    node.leave().await;
    // Give the leave announcement a moment to go out.
    tokio::time::sleep(node.config().failure_detector.period).await;

    Ok(())
}

async fn handle_members(
    Extension(node): Extension<Arc<SwimNode>>,
) -> (StatusCode, Json<Vec<MemberView>>) {
    (StatusCode::OK, Json(node.members()))
}
