//! Operator console: a line-oriented command loop on stdin.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::AsyncBufReadExt;
use tracing::{error, info};

use crate::state::Node;

const HELP: &str = "commands: deploy <path> | peers | help | exit";

/// Read commands until `exit` or end of input.
pub async fn run(node: Arc<Node>) -> Result<()> {
    println!("{HELP}");
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, arg) = match line.split_once(' ') {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };
        match command {
            "" => {}
            "deploy" => deploy(&node, arg).await,
            "peers" => {
                for peer in node.known_peers() {
                    println!("{peer}");
                }
            }
            "help" | "?" => println!("{HELP}"),
            "exit" | "quit" => break,
            other => println!("unknown command {other:?} (try `help`)"),
        }
    }
    Ok(())
}

/// Start a distribution from a local file: guard the name locally, read the
/// bytes, and commit with empty snapshots — the same entry point an upstream
/// peer would use, minus the forwarded state.
async fn deploy(node: &Node, path_arg: &str) {
    if path_arg.is_empty() {
        println!("usage: deploy <path>");
        return;
    }
    let path = Path::new(path_arg);
    if !path.exists() {
        error!(path = %path.display(), "file does not exist");
        return;
    }
    if !node.try_prepare(path_arg) {
        error!(file = path_arg, "prepare failed; a transfer with this name is in progress");
        return;
    }
    match tokio::fs::read(path).await {
        Ok(data) => {
            if node.accept(&data, &[], &[]) {
                info!(file = path_arg, bytes = data.len(), "deployment started");
            } else {
                error!(file = path_arg, "local store failed; deployment aborted");
            }
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "failed to read file");
        }
    }
}
