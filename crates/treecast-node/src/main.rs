//! treecast node — flood-fill file distribution over framed TCP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};

use treecast_core::message::constants::DEFAULT_PORT;
use treecast_core::peer::Peer;
use treecast_net::client::TcpDialer;
use treecast_net::contract::{Contract, Dial};
use treecast_net::server;
use treecast_node::store::FileStore;
use treecast_node::{console, state::Node, worker};

/// Node configuration.
#[derive(Debug, Clone)]
struct NodeConfig {
    /// Address to listen on; also the identity advertised to peers.
    listen: String,
    /// Peer to register with at startup.
    join: Option<String>,
    /// Directory for received files.
    store_dir: PathBuf,
    /// Run without the operator console.
    headless: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen: format!("127.0.0.1:{DEFAULT_PORT}"),
            join: None,
            store_dir: PathBuf::from("tmp"),
            headless: false,
        }
    }
}

fn parse_args() -> NodeConfig {
    let mut config = NodeConfig::default();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--listen" | "-l" => {
                if let Some(addr) = args.next() {
                    config.listen = addr;
                }
            }
            "--join" | "-j" => {
                if let Some(addr) = args.next() {
                    config.join = Some(addr);
                }
            }
            "--store" | "-s" => {
                if let Some(dir) = args.next() {
                    config.store_dir = PathBuf::from(dir);
                }
            }
            "--headless" => {
                config.headless = true;
            }
            "--help" | "-h" => {
                eprintln!("treecast node");
                eprintln!();
                eprintln!("USAGE:");
                eprintln!("  treecast-node [OPTIONS]");
                eprintln!();
                eprintln!("OPTIONS:");
                eprintln!("  -l, --listen <ADDR>   Listen address (default: 127.0.0.1:{DEFAULT_PORT})");
                eprintln!("  -j, --join <ADDR>     Peer to register with at startup");
                eprintln!("  -s, --store <DIR>     Directory for received files (default: tmp)");
                eprintln!("  --headless            Run without the operator console");
                eprintln!("  -h, --help            Show this help");
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {arg}");
                std::process::exit(1);
            }
        }
    }

    config
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,treecast=debug".into()),
        )
        .init();

    let config = parse_args();
    let listen: SocketAddr = config
        .listen
        .parse()
        .with_context(|| format!("invalid --listen address {:?}", config.listen))?;
    let this_node = Peer::new(listen.ip().to_string(), listen.port());

    let node = Arc::new(Node::new(
        this_node.clone(),
        FileStore::new(config.store_dir.clone()),
    ));

    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind {listen}"))?;
    info!(addr = %listen, store = %config.store_dir.display(), "node listening");

    let server = tokio::spawn(server::serve(listener, Arc::clone(&node)));
    let worker = tokio::spawn(worker::run(Arc::clone(&node), TcpDialer));

    if let Some(join) = &config.join {
        let join: SocketAddr = join
            .parse()
            .with_context(|| format!("invalid --join address {join:?}"))?;
        let bootstrap = Peer::new(join.ip().to_string(), join.port());
        match TcpDialer.dial(&bootstrap).register(&this_node).await {
            Ok(true) => info!(peer = %bootstrap, "registered with bootstrap peer"),
            Ok(false) => info!(peer = %bootstrap, "bootstrap peer already knew this node"),
            Err(e) => warn!(peer = %bootstrap, error = %e, "failed to register with bootstrap peer"),
        }
        node.register_peer(bootstrap);
    }

    if config.headless {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for ctrl-c")?;
    } else {
        console::run(Arc::clone(&node)).await?;
    }

    info!("shutting down");
    node.shutdown();
    worker.await.context("propagation worker panicked")?;
    server.abort();
    Ok(())
}
