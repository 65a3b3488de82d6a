//! End-to-end distribution over real loopback TCP: every node runs the full
//! serving loop plus its propagation worker.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use treecast_core::peer::Peer;
use treecast_net::client::{RpcClient, TcpDialer};
use treecast_net::contract::Contract;
use treecast_net::server;
use treecast_node::state::Node;
use treecast_node::store::FileStore;
use treecast_node::worker;

struct TestNode {
    node: Arc<Node>,
    store_dir: PathBuf,
}

impl TestNode {
    fn peer(&self) -> Peer {
        self.node.this_node().clone()
    }

    fn stored(&self, name: &str) -> PathBuf {
        self.store_dir.join(name)
    }
}

async fn start_node(store_dir: PathBuf) -> TestNode {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let node = Arc::new(Node::new(
        Peer::new("127.0.0.1", port),
        FileStore::new(store_dir.clone()),
    ));
    tokio::spawn(server::serve(listener, Arc::clone(&node)));
    tokio::spawn(worker::run(Arc::clone(&node), TcpDialer));
    TestNode { node, store_dir }
}

/// Start a distribution the way the operator console does.
fn deploy(node: &Node, file_name: &str, data: &[u8]) {
    assert!(node.try_prepare(file_name), "local prepare refused");
    assert!(node.accept(data, &[], &[]), "local store failed");
}

async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("timed out waiting for: {what}");
}

fn assert_no_duplicates(peers: &[Peer]) {
    for (i, peer) in peers.iter().enumerate() {
        assert!(
            !peers[i + 1..].contains(peer),
            "peer {peer} appears twice in {peers:?}"
        );
    }
}

#[tokio::test]
async fn register_over_the_wire_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let a = start_node(tmp.path().join("a")).await;

    let newcomer = Peer::new("127.0.0.1", 9999);
    let client = RpcClient::new(a.peer());
    assert!(client.register(&newcomer).await.unwrap());
    assert!(!client.register(&newcomer).await.unwrap());
    assert_eq!(a.node.known_peers(), vec![newcomer]);
}

#[tokio::test]
async fn single_node_distribution_persists_and_goes_idle() {
    let tmp = tempfile::tempdir().unwrap();
    let a = start_node(tmp.path().join("a")).await;

    deploy(&a.node, "report.txt", b"ten bytes.");
    wait_until("node a back to idle", || {
        a.node.begin_pass().file_name.is_none()
    })
    .await;

    assert_eq!(std::fs::read(a.stored("report.txt")).unwrap(), b"ten bytes.");
}

#[tokio::test]
async fn chain_distribution_reaches_transitive_peers() {
    let tmp = tempfile::tempdir().unwrap();
    let a = start_node(tmp.path().join("a")).await;
    let b = start_node(tmp.path().join("b")).await;
    let c = start_node(tmp.path().join("c")).await;

    // A only knows B; B only knows C. C is reached through B's own pass.
    a.node.register_peer(b.peer());
    b.node.register_peer(c.peer());

    let data = b"flood me through the tree";
    deploy(&a.node, "report.txt", data);

    wait_until("file replicated to c", || c.stored("report.txt").exists()).await;
    for n in [&a, &b, &c] {
        assert_eq!(std::fs::read(n.stored("report.txt")).unwrap(), data);
        assert_no_duplicates(&n.node.visited_peers());
    }
    // B learned its upstream from the forwarded directory snapshot.
    wait_until("b back to idle", || b.node.begin_pass().file_name.is_none()).await;
    assert!(b.node.known_peers().contains(&a.peer()));
    // Everyone who accepted is in B's visited set.
    let visited = b.node.visited_peers();
    for peer in [a.peer(), b.peer(), c.peer()] {
        assert!(visited.contains(&peer), "{peer} missing from {visited:?}");
    }
}

#[tokio::test]
async fn zero_byte_file_is_distributed() {
    let tmp = tempfile::tempdir().unwrap();
    let a = start_node(tmp.path().join("a")).await;
    let b = start_node(tmp.path().join("b")).await;
    a.node.register_peer(b.peer());

    deploy(&a.node, "empty.bin", b"");
    wait_until("empty file replicated to b", || b.stored("empty.bin").exists()).await;
    assert_eq!(std::fs::metadata(b.stored("empty.bin")).unwrap().len(), 0);
}

#[tokio::test]
async fn busy_peer_is_a_dead_end_not_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let a = start_node(tmp.path().join("a")).await;
    let b = start_node(tmp.path().join("b")).await;
    let c = start_node(tmp.path().join("c")).await;
    a.node.register_peer(b.peer());
    a.node.register_peer(c.peer());

    // B is already mid-accept for this very name.
    assert!(b.node.try_prepare("report.txt"));

    deploy(&a.node, "report.txt", b"data");
    wait_until("file replicated to c", || c.stored("report.txt").exists()).await;
    wait_until("a back to idle", || a.node.begin_pass().file_name.is_none()).await;

    assert!(!a.node.is_visited(&b.peer()));
    assert!(a.node.is_visited(&c.peer()));
    assert!(!b.stored("report.txt").exists());
}

#[tokio::test]
async fn unreachable_peer_does_not_truncate_the_pass() {
    let tmp = tempfile::tempdir().unwrap();
    let a = start_node(tmp.path().join("a")).await;
    let c = start_node(tmp.path().join("c")).await;

    // A port nothing listens on, registered ahead of C in directory order.
    let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_peer = Peer::new("127.0.0.1", dead.local_addr().unwrap().port());
    drop(dead);
    a.node.register_peer(dead_peer.clone());
    a.node.register_peer(c.peer());

    deploy(&a.node, "report.txt", b"data");
    wait_until("file replicated to c", || c.stored("report.txt").exists()).await;

    assert!(!a.node.is_visited(&dead_peer));
    assert!(a.node.is_visited(&c.peer()));
}

#[tokio::test]
async fn second_distribution_reuses_the_cleared_slot() {
    let tmp = tempfile::tempdir().unwrap();
    let a = start_node(tmp.path().join("a")).await;
    let b = start_node(tmp.path().join("b")).await;
    a.node.register_peer(b.peer());

    deploy(&a.node, "first.txt", b"one");
    wait_until("first file at b", || b.stored("first.txt").exists()).await;
    wait_until("a back to idle", || a.node.begin_pass().file_name.is_none()).await;

    // B stays in A's visited set across distributions; only new acceptors
    // would be offered the second file, so B receives nothing more from A.
    deploy(&a.node, "second.txt", b"two");
    wait_until("a back to idle again", || {
        a.node.begin_pass().file_name.is_none()
    })
    .await;
    assert_eq!(std::fs::read(a.stored("second.txt")).unwrap(), b"two");
    assert!(!b.stored("second.txt").exists());
}
