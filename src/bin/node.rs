//! Node binary

use clap::{Args, Parser, Subcommand};
use dynakv::common::{default_bind_addr, Config};
use dynakv::node::messages::{Envelope, Message};
use dynakv::transport::{listen, Locator, Mailbox, TcpTransport};
use dynakv::Node;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dynakv-node")]
#[command(about = "dynakv ring member")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the first node of a new ring
    Start {
        #[command(flatten)]
        node: NodeArgs,
    },

    /// Join an existing ring through one of its members
    Join {
        #[command(flatten)]
        node: NodeArgs,

        /// Address of any ring member
        #[arg(long)]
        contact: SocketAddr,
    },
}

#[derive(Args)]
struct NodeArgs {
    /// Node ID (also the node's position on the ring)
    #[arg(long)]
    id: u64,

    /// Bind address (defaults to 127.0.0.1:10000+id)
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replication factor
    #[arg(short = 'n', long)]
    replicas: Option<usize>,

    /// Read quorum
    #[arg(short = 'r', long)]
    read_quorum: Option<usize>,

    /// Write quorum
    #[arg(short = 'w', long)]
    write_quorum: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (args, contact) = match cli.command {
        Commands::Start { node } => (node, None),
        Commands::Join { node, contact } => (node, Some(contact)),
    };

    // Load config from file and environment, then override with CLI arguments
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(n) = args.replicas {
        config.replication.n = n;
    }
    if let Some(r) = args.read_quorum {
        config.replication.r = r;
    }
    if let Some(w) = args.write_quorum {
        config.replication.w = w;
    }
    let settings = config.node_settings()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let bind = match args.bind {
        Some(bind) => bind,
        None => default_bind_addr(args.id)?,
    };

    let mailbox = Mailbox::new();
    let inbox = mailbox.sender();
    let (local_addr, listener) = listen(bind, mailbox.sender()).await?;
    let locator = Locator::from(local_addr);

    let mut node = Node::new(args.id, locator.clone(), settings, TcpTransport::new(), mailbox);
    if let Some(contact) = contact {
        node.start_join(contact);
    }

    // Ctrl-C turns into a graceful leave
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, leaving the ring");
            let _ = inbox.send(Envelope::new(locator, Message::Leave));
        }
    });

    let result = node.run().await;
    listener.abort();
    result?;

    Ok(())
}
