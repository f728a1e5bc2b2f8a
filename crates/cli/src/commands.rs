//! CLI commands and their printable results.

use std::fmt;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Subcommand;
use cluster::{DistributedCache, NodeManager};
use corelib::{CacheBackend, Key, Node, NodeId, NodeKind, Value};
use tracing::info;

use crate::config::{ClusterSpec, NodeSpec};

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print ring entries and the distinct members.
    Members,

    /// Print the node owning each key.
    Locate {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Load keys into an in-memory cluster, then add, shut down and crash
    /// nodes in that order.
    Simulate {
        /// Number of keys to load.
        #[arg(short = 'k', long, default_value_t = 10_000)]
        keys: u32,

        /// Nodes to add.
        #[arg(long, default_value_t = 0)]
        add: usize,

        /// Members to shut down gracefully.
        #[arg(long, default_value_t = 0)]
        shutdown: usize,

        /// Members to crash.
        #[arg(long, default_value_t = 0)]
        crash: usize,
    },
}

impl Command {
    pub fn execute(&self, spec: &ClusterSpec) -> Result<CommandResult> {
        let (manager, _) = spec.build()?;
        match self {
            Command::Members => Ok(members(&manager)),
            Command::Locate { keys } => {
                let located = keys
                    .iter()
                    .map(|key| {
                        let owner = manager.locate(&Key::from(key.as_str()))?;
                        Ok((key.clone(), owner.to_string()))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(CommandResult::Located(located))
            }
            Command::Simulate {
                keys,
                add,
                shutdown,
                crash,
            } => simulate(manager, *keys, *add, *shutdown, *crash),
        }
    }
}

fn members(manager: &NodeManager) -> CommandResult {
    let ring = manager.ring();
    let entries = ring
        .entries()
        .iter()
        .map(|entry| (entry.position.as_f64(), entry.node_id))
        .collect();
    let members = ring.nodes().map(|node| node.to_string()).collect();
    CommandResult::Members { entries, members }
}

fn simulate(
    manager: Arc<NodeManager>,
    keys: u32,
    add: usize,
    shutdown: usize,
    crash: usize,
) -> Result<CommandResult> {
    if shutdown + crash >= manager.members().len() + add {
        bail!("simulation would remove every node");
    }

    let cache = DistributedCache::new(Arc::clone(&manager));
    for i in 0..keys {
        cache.put(Key::from(format!("key-{}", i)), Value::from(format!("value-{}", i)))?;
    }
    let mut steps = vec![Step::capture("load", &manager, 0)?];

    for i in 0..add {
        let node = NodeSpec {
            id: None,
            hostname: format!("sim-{}", i),
            port: 6379,
            kind: if i % 2 == 0 { NodeKind::Redis } else { NodeKind::Memcache },
        }
        .connect()?;
        let report = manager.add(Arc::new(node))?;
        steps.push(Step::capture("add", &manager, report.relocated)?);
    }

    for _ in 0..shutdown {
        let id = first_member(&manager)?;
        let report = manager.shutdown(id)?;
        steps.push(Step::capture("shutdown", &manager, report.relocated)?);
    }

    for _ in 0..crash {
        let id = first_member(&manager)?;
        manager.crash_remove(id)?;
        steps.push(Step::capture("crash", &manager, 0)?);
    }

    info!(steps = steps.len(), "simulation finished");
    Ok(CommandResult::Simulated(steps))
}

fn first_member(manager: &NodeManager) -> Result<NodeId> {
    match manager.members().first() {
        Some(node) => Ok(node.id()),
        None => bail!("no members left"),
    }
}

/// Cluster state after one simulation step.
#[derive(Debug, Clone)]
pub struct Step {
    pub action: &'static str,
    pub counts: Vec<(String, usize)>,
    pub total: usize,
    pub relocated: usize,
}

impl Step {
    fn capture(action: &'static str, manager: &NodeManager, relocated: usize) -> Result<Self> {
        let counts = manager
            .members()
            .iter()
            .map(|node: &Arc<Node>| Ok((node.to_string(), node.len()?)))
            .collect::<Result<Vec<_>>>()?;
        let total = counts.iter().map(|(_, n)| n).sum();
        Ok(Step {
            action,
            counts,
            total,
            relocated,
        })
    }
}

#[derive(Debug, Clone)]
pub enum CommandResult {
    Members {
        entries: Vec<(f64, NodeId)>,
        members: Vec<String>,
    },
    Located(Vec<(String, String)>),
    Simulated(Vec<Step>),
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandResult::Members { entries, members } => {
                writeln!(f, "{} entries", entries.len())?;
                for (position, id) in entries {
                    writeln!(f, "  {:.6}  {}", position, id)?;
                }
                write!(f, "{} members", members.len())?;
                for member in members {
                    write!(f, "\n  {}", member)?;
                }
                Ok(())
            }
            CommandResult::Located(located) => {
                let mut first = true;
                for (key, owner) in located {
                    if !first {
                        writeln!(f)?;
                    }
                    first = false;
                    write!(f, "{} -> {}", key, owner)?;
                }
                Ok(())
            }
            CommandResult::Simulated(steps) => {
                for (i, step) in steps.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    writeln!(
                        f,
                        "[{}] {}: total={} relocated={}",
                        i, step.action, step.total, step.relocated
                    )?;
                    for (j, (node, count)) in step.counts.iter().enumerate() {
                        if j > 0 {
                            writeln!(f)?;
                        }
                        write!(f, "  {:>8}  {}", count, node)?;
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::HashAlgorithm;

    fn spec(nodes: usize, replicas: i64) -> ClusterSpec {
        ClusterSpec {
            replicas,
            hash: HashAlgorithm::Xxh3,
            nodes: (0..nodes)
                .map(|i| format!("10.0.0.{}:6379:redis", i).parse().unwrap())
                .collect(),
        }
    }

    #[test]
    fn test_members() {
        let result = Command::Members.execute(&spec(3, 4)).unwrap();
        match result {
            CommandResult::Members { entries, members } => {
                assert_eq!(entries.len(), 12);
                assert_eq!(members.len(), 3);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_locate() {
        let command = Command::Locate {
            keys: vec!["a".into(), "b".into()],
        };
        match command.execute(&spec(2, 2)).unwrap() {
            CommandResult::Located(located) => {
                assert_eq!(located.len(), 2);
                assert_eq!(located[0].0, "a");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_locate_on_empty_cluster_fails() {
        let command = Command::Locate {
            keys: vec!["a".into()],
        };
        assert!(command.execute(&spec(0, 2)).is_err());
    }

    #[test]
    fn test_simulate_totals() {
        let command = Command::Simulate {
            keys: 1_000,
            add: 2,
            shutdown: 1,
            crash: 0,
        };
        match command.execute(&spec(3, 3)).unwrap() {
            CommandResult::Simulated(steps) => {
                assert_eq!(steps.len(), 4);
                assert!(steps.iter().all(|s| s.total == 1_000));
                assert_eq!(steps.last().unwrap().counts.len(), 4);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_simulate_crash_loses_entries() {
        let command = Command::Simulate {
            keys: 1_000,
            add: 0,
            shutdown: 0,
            crash: 1,
        };
        match command.execute(&spec(3, 3)).unwrap() {
            CommandResult::Simulated(steps) => {
                assert_eq!(steps[0].total, 1_000);
                assert!(steps[1].total < 1_000);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_simulate_refuses_to_empty_cluster() {
        let command = Command::Simulate {
            keys: 10,
            add: 0,
            shutdown: 1,
            crash: 1,
        };
        assert!(command.execute(&spec(2, 1)).is_err());
    }
}
