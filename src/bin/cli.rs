//! CLI for ring operations

use anyhow::bail;
use clap::{Parser, Subcommand};
use dynakv::node::messages::ClientReply;
use dynakv::transport::{listen, Locator, Mailbox, TcpTransport};
use dynakv::Client;
use std::net::SocketAddr;

#[derive(Parser)]
#[command(name = "dynakv")]
#[command(about = "dynakv replicated key-value store CLI")]
#[command(version)]
struct Cli {
    /// Node to send the request to
    #[arg(long, default_value = "127.0.0.1:10000")]
    node: SocketAddr,

    /// Address the CLI listens on for the reply
    #[arg(long, default_value = "127.0.0.1:0")]
    listen: SocketAddr,

    /// Seconds to wait for an answer
    #[arg(long, default_value = "5")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a key
    Get {
        /// Key
        key: u64,
    },

    /// Write a key
    Put {
        /// Key
        key: u64,

        /// Value
        value: String,
    },

    /// Ask the node to leave the ring
    Leave,

    /// Show the node's ring view and items
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let mailbox = Mailbox::new();
    let (local_addr, listener) = listen(cli.listen, mailbox.sender()).await?;
    let mut client = Client::new(local_addr, TcpTransport::new(), mailbox)
        .with_timeout(std::time::Duration::from_secs(cli.timeout));
    let node = Locator::from(cli.node);

    match cli.command {
        Commands::Get { key } => match client.get(&node, key).await? {
            ClientReply::Value(item) => println!("{} (version {})", item.value, item.version),
            ClientReply::NotFound { key } => println!("Key {} not found", key),
            reply => bail!("get {} failed: {:?}", key, reply),
        },
        Commands::Put { key, value } => match client.put(&node, key, value).await? {
            ClientReply::Success => println!("✓ Stored key {}", key),
            reply => bail!("put {} failed: {:?}", key, reply),
        },
        Commands::Leave => match client.leave(&node).await? {
            ClientReply::Success => println!("✓ {} left the ring", node),
            reply => bail!("leave failed: {:?}", reply),
        },
        Commands::Status { json } => {
            let status = client.status(&node).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("Node {} at {}", status.id, status.locator);
                println!("  Ring: {:?}", status.ring);
                println!("  Busy: {}", status.busy);
                println!("  Items: {}", status.items.len());
                for item in &status.items {
                    println!("    {}", item);
                }
            }
        }
    }

    listener.abort();
    Ok(())
}
