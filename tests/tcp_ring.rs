//! Two-node ring over real TCP sockets

use dynakv::common::{NodeSettings, ReplicationConfig};
use dynakv::node::messages::Envelope;
use dynakv::transport::listen;
use dynakv::{Client, ClientReply, Item, Locator, Mailbox, Message, Node, Peer, TcpTransport};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;

fn settings() -> NodeSettings {
    NodeSettings {
        replication: ReplicationConfig::new(2, 2, 2).unwrap(),
        ..NodeSettings::default()
    }
}

async fn spawn_node(id: u64, contact: Option<&Locator>) -> (Locator, JoinHandle<dynakv::Result<()>>) {
    let settings = settings();
    let mailbox = Mailbox::new();
    let any: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let (addr, _listener) = listen(any, mailbox.sender()).await.unwrap();
    let locator = Locator::from(addr);

    let mut node = Node::new(id, locator.clone(), settings, TcpTransport::new(), mailbox);
    if let Some(contact) = contact {
        node.start_join(contact.clone());
    }
    (locator, tokio::spawn(node.run()))
}

async fn tcp_client() -> Client<TcpTransport> {
    let mailbox = Mailbox::new();
    let (addr, _listener) = listen("127.0.0.1:0".parse().unwrap(), mailbox.sender())
        .await
        .unwrap();
    Client::new(addr, TcpTransport::new(), mailbox)
}

#[tokio::test]
async fn test_join_write_read_over_tcp() {
    let (first, _first_task) = spawn_node(0, None).await;
    let (second, _second_task) = spawn_node(10, Some(&first)).await;
    let mut client = tcp_client().await;

    // Answered once the join has finished
    let status = client.status(&second).await.unwrap();
    assert_eq!(status.ring, vec![0, 10]);

    let reply = client.put(&first, 5, "hello").await.unwrap();
    assert_eq!(reply, ClientReply::Success);

    let reply = client.get(&second, 5).await.unwrap();
    assert_eq!(reply, ClientReply::Value(Item::new(5, "hello", 1)));
}

#[tokio::test]
async fn test_leave_over_tcp() {
    let (first, first_task) = spawn_node(0, None).await;
    let (second, _second_task) = spawn_node(10, Some(&first)).await;
    let mut client = tcp_client().await;

    assert_eq!(client.status(&second).await.unwrap().ring, vec![0, 10]);
    assert_eq!(
        client.put(&first, 5, "kept").await.unwrap(),
        ClientReply::Success
    );

    let reply = client.leave(&first).await.unwrap();
    assert_eq!(reply, ClientReply::Success);
    first_task.await.unwrap().unwrap();

    // The goodbye travels on its own connection, so give it a moment
    let mut ring = Vec::new();
    for _ in 0..50 {
        ring = client.status(&second).await.unwrap().ring;
        if ring == vec![10] {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(ring, vec![10]);

    let status = client.status(&second).await.unwrap();
    assert_eq!(status.items, vec![Item::new(5, "kept", 1)]);
}

#[test]
fn test_goodbye_survives_runtime_shutdown() {
    let any: SocketAddr = "127.0.0.1:0".parse().unwrap();

    // The peer lives on its own runtime, which outlasts the leaving node's
    let peer_runtime = Runtime::new().unwrap();
    let mut peer_inbox = Mailbox::new();
    let (peer_addr, _accept) = peer_runtime
        .block_on(listen(any, peer_inbox.sender()))
        .unwrap();

    for _ in 0..5 {
        let node_runtime = Runtime::new().unwrap();
        node_runtime.block_on(async {
            let mailbox = Mailbox::new();
            let (addr, _listener) = listen(any, mailbox.sender()).await.unwrap();
            let inbox = mailbox.sender();
            let node = Node::new(20, addr, settings(), TcpTransport::new(), mailbox)
                .with_peers([Peer::new(0, peer_addr)]);

            inbox.send(Envelope::new(addr, Message::Leave)).unwrap();
            node.run().await.unwrap();
        });
        // Same order as the node binary: run returns, then the runtime goes
        drop(node_runtime);

        let envelope = peer_runtime
            .block_on(async { tokio::time::timeout(Duration::from_secs(2), peer_inbox.recv()).await })
            .expect("goodbye not delivered")
            .unwrap();
        assert_eq!(
            envelope.message,
            Message::ByeMates {
                id: 20,
                items: Vec::new(),
            }
        );
    }
}
