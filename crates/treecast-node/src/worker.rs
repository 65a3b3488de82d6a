//! Propagation worker — fans the held file out to unvisited peers.
//!
//! One long-lived task per node, parked on the deploy signal. Remote calls
//! are made one peer at a time; the node lock is only touched for the brief
//! bookkeeping between calls.

use std::sync::Arc;

use tracing::{debug, info, warn};

use treecast_net::contract::{Contract, Dial};

use crate::state::Node;

/// Run until shutdown closes the deploy signal. Wakes once per committed
/// receive and performs one fan-out pass per wake.
pub async fn run<D: Dial>(node: Arc<Node>, dialer: D) {
    while node.wait_for_deploy().await {
        propagate(&node, &dialer).await;
    }
    debug!("propagation worker stopped");
}

/// One fan-out pass: offer the held file to every unvisited peer in
/// directory order, forwarding to each acceptor with the current (growing)
/// snapshots. A peer that rejects or cannot be reached ends its own branch
/// only; the pass continues with the next peer.
async fn propagate<D: Dial>(node: &Node, dialer: &D) {
    let pass = node.begin_pass();
    let Some(file_name) = pass.file_name else {
        warn!("woken without a transfer in progress");
        node.finish_pass();
        return;
    };
    let Some(payload) = pass.payload else {
        warn!(file = %file_name, "no payload held; nothing to forward");
        node.finish_pass();
        return;
    };

    info!(file = %file_name, peers = pass.peers.len(), "starting fan-out");
    for peer in &pass.peers {
        if node.is_visited(peer) {
            continue;
        }
        let conn = dialer.dial(peer);
        match conn.prepare_to_receive(&file_name).await {
            Ok(true) => {
                // Visited before forwarding, so a later peer offered in this
                // same pass cannot re-offer this one.
                let (known, visited) = node.mark_visited(peer);
                match conn.commit_receive(&payload, &known, &visited).await {
                    Ok(true) => info!(%peer, file = %file_name, "forwarded"),
                    Ok(false) => warn!(%peer, file = %file_name, "peer failed to store the file"),
                    Err(e) => warn!(%peer, file = %file_name, error = %e, "commit call failed"),
                }
            }
            Ok(false) => debug!(%peer, file = %file_name, "peer busy; skipping"),
            Err(e) => warn!(%peer, file = %file_name, error = %e, "peer unreachable; skipping"),
        }
    }

    node.finish_pass();
    info!(file = %file_name, "fan-out finished");
}
