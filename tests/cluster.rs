//! Multi-node clusters on localhost.

use std::sync::Arc;
use std::time::Duration;
use swim::membership::types::MemberState;
use swim::{Config, SwimNode};
use tokio::task::JoinHandle;

struct RunningNode {
    node: Arc<SwimNode>,
    tasks: Vec<JoinHandle<()>>,
}

impl RunningNode {
    async fn spawn(bootstrap: Vec<std::net::SocketAddr>) -> Self {
        let mut config = Config {
            bind_port: 0,
            bootstrap_peers: bootstrap,
            ..Config::default()
        };
        config.failure_detector.period = Duration::from_millis(30);
        config.failure_detector.timeout = Duration::from_millis(80);
        config.failure_detector.group_size = 2;

        let node = SwimNode::new(config).await.expect("Failed to create node");
        let tasks = vec![
            tokio::spawn(node.clone().start()),
            tokio::spawn(node.clone().probe_loop()),
        ];
        Self { node, tasks }
    }

    /// Stops answering and probing; the socket stays bound but unread.
    fn crash(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn eventually<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_three_nodes_discover_each_other() {
    let a = RunningNode::spawn(vec![]).await;
    let b = RunningNode::spawn(vec![a.node.address]).await;
    let c = RunningNode::spawn(vec![a.node.address]).await;

    // B and C only know A; they must learn about each other through gossip
    let converged = eventually(
        || {
            b.node.tracker().contains(c.node.local_id)
                && c.node.tracker().contains(b.node.local_id)
                && a.node.tracker().len() == 2
        },
        Duration::from_secs(5),
    )
    .await;

    assert!(converged, "cluster did not converge");
    assert_eq!(
        b.node.tracker().address_of(c.node.local_id),
        Some(c.node.address)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_crashed_node_is_declared_dead_everywhere() {
    let a = RunningNode::spawn(vec![]).await;
    let b = RunningNode::spawn(vec![a.node.address]).await;
    let c = RunningNode::spawn(vec![a.node.address, b.node.address]).await;

    assert!(
        eventually(
            || a.node.tracker().len() == 2 && b.node.tracker().len() == 2,
            Duration::from_secs(5)
        )
        .await
    );

    c.crash();
    let crashed = c.node.local_id;

    let detected = eventually(
        || {
            a.node.tracker().state_of(crashed) == Some(MemberState::Dead)
                && b.node.tracker().state_of(crashed) == Some(MemberState::Dead)
        },
        Duration::from_secs(10),
    )
    .await;

    assert!(detected, "crashed node was not marked dead on both peers");
    // The survivors still see each other
    assert_ne!(
        a.node.tracker().state_of(b.node.local_id),
        Some(MemberState::Dead)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_graceful_leave_propagates() {
    let a = RunningNode::spawn(vec![]).await;
    let b = RunningNode::spawn(vec![a.node.address]).await;
    let c = RunningNode::spawn(vec![a.node.address]).await;

    assert!(
        eventually(
            || b.node.tracker().contains(c.node.local_id) && a.node.tracker().len() == 2,
            Duration::from_secs(5)
        )
        .await
    );

    c.node.leave().await;
    c.crash();

    let gone = eventually(
        || {
            !a.node.tracker().contains(c.node.local_id)
                && !b.node.tracker().contains(c.node.local_id)
        },
        Duration::from_secs(5),
    )
    .await;

    assert!(gone, "leave was not disseminated");
}
