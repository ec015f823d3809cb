//! linkdns CLI: resolve names and watch mDNS traffic on the local link.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use linkdns_client::{setup, Client, Config};
use linkdns_protocol::hickory_proto::rr::{DNSClass, Name, RecordType};
use linkdns_protocol::{wire, Message, Query};
use linkdns_types::{AddressFamilies, BindStrategy};

#[derive(Parser)]
#[command(
    name = "linkdns",
    about = "Query and observe multicast DNS on the local link",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    transport: TransportArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the `[transport]` config section.
#[derive(Args)]
struct TransportArgs {
    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Address families to use: ipv4, ipv6 or both.
    #[arg(long, global = true)]
    families: Option<AddressFamilies>,

    /// Bind strategy: zero-address, fixed-service-port or group-address.
    #[arg(long, global = true)]
    bind: Option<BindStrategy>,

    /// Restrict to this interface (repeatable).
    #[arg(short, long = "interface", global = true)]
    interfaces: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a name and print the first matching answer.
    Query {
        /// Name to resolve, e.g. `printer.local`.
        name: String,

        /// Record type to ask for.
        #[arg(short = 't', long = "type", default_value = "A", value_parser = parse_record_type)]
        record_type: RecordType,

        /// How long to wait for an answer.
        #[arg(long, default_value_t = 3000)]
        timeout_ms: u64,
    },

    /// Print every inbound mDNS message until interrupted.
    Watch {
        /// Stop after this many messages.
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// List multicast-capable interfaces and the families they carry.
    Interfaces,
}

fn parse_record_type(s: &str) -> Result<RecordType, String> {
    RecordType::from_str(&s.to_ascii_uppercase()).map_err(|e| e.to_string())
}

fn load_config(args: TransportArgs) -> anyhow::Result<Config> {
    let mut config = setup::load_config(args.config.as_deref())?;
    if let Some(families) = args.families {
        config.transport.families = families;
    }
    if let Some(bind) = args.bind {
        config.transport.bind = bind;
    }
    if !args.interfaces.is_empty() {
        config.transport.interfaces = args.interfaces;
    }
    Ok(config)
}

fn question(name: &str, record_type: RecordType) -> anyhow::Result<Query> {
    let mut name = Name::from_ascii(name).with_context(|| format!("invalid name: {name}"))?;
    name.set_fqdn(true);
    let mut query = Query::query(name, record_type);
    query.set_query_class(DNSClass::IN);
    Ok(query)
}

fn summarize(msg: &Message) -> String {
    format!(
        "{:?} id={} questions={} answers={} names={}",
        msg.message_type(),
        msg.id(),
        msg.queries().len(),
        msg.answers().len(),
        wire::message_names(msg).join(",")
    )
}

async fn query(config: &Config, name: &str, record_type: RecordType, timeout: Duration) -> anyhow::Result<()> {
    let client = Client::open(config)?;
    let result = client.query_first(question(name, record_type)?, timeout).await;
    client.close().await?;

    let record = result.with_context(|| format!("no answer for {name}"))?;
    println!("{record}");
    Ok(())
}

async fn watch(config: &Config, count: Option<usize>) -> anyhow::Result<()> {
    let client = Client::open(config)?;
    let mut subscription = client.subscribe();
    let mut seen = 0usize;

    loop {
        tokio::select! {
            msg = subscription.recv() => {
                let Some(msg) = msg else { break };
                println!("{}", summarize(&msg));
                for record in msg.answers() {
                    println!("  {record}");
                }
                seen += 1;
                if count.is_some_and(|n| seen >= n) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    client.close().await?;
    Ok(())
}

fn interfaces() -> anyhow::Result<()> {
    for iface in linkdns_discovery::discover()? {
        let capability = linkdns_discovery::probe(&iface)?;
        let loopback = if iface.flags.loopback { " loopback" } else { "" };
        println!("{iface}: {capability}{loopback}");
        for addr in &iface.ipv4 {
            println!("  inet  {addr}");
        }
        for addr in &iface.ipv6 {
            println!("  inet6 {addr}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Query {
            name,
            record_type,
            timeout_ms,
        } => {
            let config = load_config(cli.transport)?;
            tracing::debug!(name = %name, record_type = %record_type, "resolving");
            query(&config, &name, record_type, Duration::from_millis(timeout_ms)).await?;
        }
        Commands::Watch { count } => {
            let config = load_config(cli.transport)?;
            watch(&config, count).await?;
        }
        Commands::Interfaces => interfaces()?,
    }

    Ok(())
}
