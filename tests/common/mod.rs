//! Shared helpers for in-memory ring tests

#![allow(dead_code)]

use dynakv::common::{NodeSettings, ReplicationConfig};
use dynakv::node::NodeId;
use dynakv::{Client, Locator, MemoryNetwork, Node, NodeStatus, Peer};
use std::collections::HashMap;
use tokio::task::JoinHandle;

pub fn locator(id: NodeId) -> Locator {
    Locator::from(format!("mem://node-{}", id))
}

pub fn settings(n: usize, r: usize, w: usize) -> NodeSettings {
    NodeSettings {
        replication: ReplicationConfig::new(n, r, w).unwrap(),
        ..NodeSettings::default()
    }
}

/// A ring of node tasks wired through one [`MemoryNetwork`].
pub struct Cluster {
    pub network: MemoryNetwork,
    pub settings: NodeSettings,
    nodes: HashMap<NodeId, JoinHandle<dynakv::Result<()>>>,
    clients: usize,
}

impl Cluster {
    /// Start `ids` as a ring whose members already know each other.
    pub fn start(settings: NodeSettings, ids: &[NodeId]) -> Self {
        let mut cluster = Self {
            network: MemoryNetwork::new(),
            settings,
            nodes: HashMap::new(),
            clients: 0,
        };

        let peers: Vec<Peer> = ids.iter().map(|id| Peer::new(*id, locator(*id))).collect();
        for id in ids {
            let mailbox = cluster.network.register(locator(*id));
            let node = Node::new(*id, locator(*id), settings, cluster.network.clone(), mailbox)
                .with_peers(peers.clone());
            cluster.nodes.insert(*id, tokio::spawn(node.run()));
        }
        cluster
    }

    /// Spawn node `id` and have it join through `contact`.
    pub fn join(&mut self, id: NodeId, contact: NodeId) {
        let mailbox = self.network.register(locator(id));
        let mut node = Node::new(id, locator(id), self.settings, self.network.clone(), mailbox);
        node.start_join(locator(contact));
        self.nodes.insert(id, tokio::spawn(node.run()));
    }

    pub fn client(&mut self) -> Client<MemoryNetwork> {
        self.clients += 1;
        let name = format!("mem://client-{}", self.clients);
        let mailbox = self.network.register(name.as_str());
        Client::new(name, self.network.clone(), mailbox)
    }

    pub async fn status(&mut self, id: NodeId) -> NodeStatus {
        self.client().status(&locator(id)).await.unwrap()
    }

    /// Keys held by node `id`, in order.
    pub async fn keys(&mut self, id: NodeId) -> Vec<u64> {
        self.status(id).await.items.iter().map(|item| item.key).collect()
    }

    pub fn isolate(&self, id: NodeId) {
        self.network.isolate(&locator(id));
    }

    pub fn heal(&self, id: NodeId) {
        self.network.heal(&locator(id));
    }

    /// Wait for node `id` to stop and return its outcome.
    pub async fn stopped(&mut self, id: NodeId) -> dynakv::Result<()> {
        let handle = self.nodes.remove(&id).expect("unknown node");
        handle.await.expect("node task panicked")
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        for handle in self.nodes.values() {
            handle.abort();
        }
    }
}
