//! Command line and cluster file configuration.
//!
//! The cluster is described by an optional JSON file; flags given on the
//! command line override the file.
//!
//! ```json
//! {
//!   "replicas": 3,
//!   "hash": "xxh3",
//!   "nodes": [
//!     { "hostname": "10.0.0.1", "port": 6379, "kind": "redis" },
//!     { "id": "6f1c1d7e-4f0a-4a43-9d8e-0c1b2a3d4e5f", "hostname": "10.0.0.2", "port": 11211, "kind": "memcache" }
//!   ]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cluster::{MemoryBackendFactory, NodeManager};
use corelib::{HashAlgorithm, Node, NodeId, NodeKind};
use serde::Deserialize;
use tracing::info;

use crate::commands::Command;

/// Top-level CLI configuration.
#[derive(Parser, Debug)]
#[command(name = "ringcache", version, about = "Consistent-hash distributed cache front-end")]
pub struct CliConfig {
    /// Path to a JSON cluster file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Virtual replicas per node (overrides the file).
    #[arg(short, long, global = true, allow_negative_numbers = true)]
    pub replicas: Option<i64>,

    /// Hash function: xxh3, blake3 or sip (overrides the file).
    #[arg(long, global = true)]
    pub hash: Option<HashAlgorithm>,

    /// Cluster node as `host:port:kind`. Can be given several times and
    /// replaces the file's node list.
    #[arg(short, long = "node", global = true)]
    pub nodes: Vec<NodeSpec>,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

impl CliConfig {
    /// Parse arguments and run the selected command.
    pub fn run(self) -> Result<()> {
        setup_tracing(&self.log_level);
        let spec = self.cluster_spec()?;
        let result = self.command.execute(&spec)?;
        println!("{}", result);
        Ok(())
    }

    /// Cluster file merged with command line overrides.
    pub fn cluster_spec(&self) -> Result<ClusterSpec> {
        let mut spec = match &self.config {
            Some(path) => ClusterSpec::load(path)?,
            None => ClusterSpec::default(),
        };
        if let Some(replicas) = self.replicas {
            spec.replicas = replicas;
        }
        if let Some(hash) = self.hash {
            spec.hash = hash;
        }
        if !self.nodes.is_empty() {
            spec.nodes = self.nodes.clone();
        }
        Ok(spec)
    }
}

/// Initialize the `tracing` subscriber.
///
/// Respects `RUST_LOG` if set, otherwise uses `level`.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Cluster description, as read from the JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClusterSpec {
    pub replicas: i64,
    pub hash: HashAlgorithm,
    pub nodes: Vec<NodeSpec>,
}

impl ClusterSpec {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read cluster file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid cluster file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Build the coordinator with an in-memory backend on every node.
    pub fn build(&self) -> Result<(Arc<NodeManager>, Vec<Arc<Node>>)> {
        let manager = Arc::new(NodeManager::with_algorithm(self.hash));
        let nodes = self
            .nodes
            .iter()
            .map(|spec| spec.connect().map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        manager
            .init(nodes.clone(), self.replicas)
            .context("failed to initialize cluster")?;
        info!(nodes = nodes.len(), replicas = self.replicas, hash = %self.hash, "cluster ready");
        Ok((manager, nodes))
    }
}

/// One node entry of the cluster file or of a `--node` flag.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NodeSpec {
    /// Fixed id; a random one is generated when absent.
    #[serde(default)]
    pub id: Option<NodeId>,
    pub hostname: String,
    pub port: u16,
    pub kind: NodeKind,
}

impl NodeSpec {
    pub fn connect(&self) -> Result<Node> {
        let node = match self.id {
            Some(id) => Node::with_id(id, self.hostname.clone(), self.port, self.kind),
            None => Node::new(self.hostname.clone(), self.port, self.kind),
        };
        Ok(node.connect(&MemoryBackendFactory)?)
    }
}

impl FromStr for NodeSpec {
    type Err = anyhow::Error;

    /// Parses `host:port:kind`.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.rsplitn(3, ':');
        let (kind, port, hostname) = match (parts.next(), parts.next(), parts.next()) {
            (Some(kind), Some(port), Some(hostname)) if !hostname.is_empty() => (kind, port, hostname),
            _ => bail!("expected host:port:kind, got {:?}", s),
        };
        Ok(NodeSpec {
            id: None,
            hostname: hostname.to_string(),
            port: port.parse().with_context(|| format!("invalid port in {:?}", s))?,
            kind: kind.parse()?,
        })
    }
}
