use clap::Parser;
use openalias::config::parse_upstream_server;
use openalias::{AliasResolver, Resolution, ResolvedAlias, ResolverConfig, TrustPolicy};
use std::io::{BufRead, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Resolve an OpenAlias address (alice@example.com or pay.example.com)
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Email-style alias or fully-qualified domain name
    alias: String,

    /// Return records even when the DNSSEC chain does not validate
    #[arg(long)]
    lenient: bool,

    /// Accept provably unsigned zones under the strict policy
    #[arg(long)]
    allow_insecure: bool,

    /// Upstream resolver (ip or ip:port), may be repeated
    #[arg(long = "server", value_parser = parse_server)]
    servers: Vec<SocketAddr>,

    /// Per-attempt query timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Attempts per query (3 to 10)
    #[arg(long)]
    attempts: Option<u32>,

    /// DS/DNSKEY trust anchor file replacing the built-in root anchors
    #[arg(long)]
    trust_anchors: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Do not ask for confirmation of unauthenticated results
    #[arg(short, long)]
    yes: bool,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn parse_server(s: &str) -> Result<SocketAddr, String> {
    parse_upstream_server(s).map_err(|e| e.to_string())
}

impl Args {
    fn apply(&self, config: &mut ResolverConfig) {
        if self.lenient {
            config.trust_policy = TrustPolicy::Lenient;
        }
        if self.allow_insecure {
            config.allow_insecure = true;
        }
        if !self.servers.is_empty() {
            config.upstream_servers = self.servers.clone();
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.query_timeout = Duration::from_millis(timeout_ms);
        }
        if let Some(attempts) = self.attempts {
            config.max_attempts = attempts;
        }
        if let Some(path) = &self.trust_anchors {
            config.trust_anchor_file = Some(path.clone());
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<bool, Box<dyn std::error::Error>> {
    let mut config = ResolverConfig::from_env()?;
    args.apply(&mut config);
    config.validate()?;

    let resolver = AliasResolver::from_config(&config)?;
    let resolution = resolver.resolve(&args.alias, config.trust_policy).await?;

    if let Resolution::Resolved(resolved) = &resolution {
        if let Some(warning) = resolved.warning() {
            eprintln!("WARNING: {}", warning);
            if !args.yes && !resolved.records.is_empty() && !confirm("Show these records anyway?")? {
                return Ok(false);
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&resolution)?);
    } else {
        print_human(&resolution);
    }
    Ok(true)
}

fn print_human(resolution: &Resolution) {
    match resolution {
        Resolution::BareAddress { address } => {
            println!("{} is an address, not an alias", address);
        }
        Resolution::Resolved(ResolvedAlias {
            name,
            dnssec,
            records,
            malformed,
        }) => {
            println!("{} (DNSSEC: {})", name, dnssec);
            if records.is_empty() && malformed.is_empty() {
                println!("no OpenAlias records published");
            }
            for record in records {
                println!(
                    "oa1:{}  {}  name={:?} description={:?}",
                    record.namespace,
                    record.recipient_address,
                    record.recipient_name,
                    record.tx_description
                );
                for (key, value) in &record.extensions {
                    println!("    {}={}", key, value);
                }
            }
            for diagnostic in malformed {
                eprintln!("malformed: {} ({})", diagnostic.kind, diagnostic.answer);
            }
        }
    }
}

fn confirm(prompt: &str) -> std::io::Result<bool> {
    eprint!("{} [y/N] ", prompt);
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}
