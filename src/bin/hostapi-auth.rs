use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use hostapi_auth::config::loader::load_config;
use hostapi_auth::legacy::models::DnsEntry;
use hostapi_auth::legacy::request::{LegacyCall, LegacySigningContext, DEFAULT_HOSTNAME};
use hostapi_auth::transport::client::ReqwestExecutor;
use hostapi_auth::utils::logging::{self, LogLevel};
use hostapi_auth::AuthCoordinator;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "hostapi-auth.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print an `Authorization` header value, issuing a token if needed
    Token {
        /// cache key, defaults to `<login>:<mode>`
        #[arg(long)]
        key: Option<String>,
    },
    /// Sign a legacy `setDnsEntries` call and print its signature input and cookie
    SignDns {
        #[arg(long)]
        domain: String,
        /// JSON array of `{"name","expire","type","content"}`
        #[arg(long)]
        entries: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // -------------------------------
    // 1. Load YAML config
    // -------------------------------

    let config = load_config(&args.config).await?;
    logging::run(&config, args.log_level);

    match args.command {
        // -------------------------------
        // 2. Bearer token
        // -------------------------------
        Command::Token { key } => {
            let coordinator = AuthCoordinator::from_config(&config, Arc::new(ReqwestExecutor::default()))?;
            let key = key.unwrap_or_else(|| coordinator.default_key().to_owned());
            let token = coordinator.acquire(&key).await?;
            info!(key, expires_at = token.expires_at(), "token ready");
            println!("{}", token.authorization_header_value());
        }
        // -------------------------------
        // 3. Legacy signed call
        // -------------------------------
        Command::SignDns { domain, entries } => {
            let key = config
                .load_private_key()?
                .ok_or_else(|| anyhow!("legacy signing needs 'private_key' or 'private_key_path'"))?;
            let login = config.login.clone().unwrap_or_default();
            let entries: Vec<DnsEntry> =
                serde_json::from_str(&entries).map_err(|e| anyhow!("invalid --entries: {}", e))?;

            let call = LegacyCall::new("DomainService", "setDnsEntries")
                .arg("domainName", domain.as_str())
                .arg("dnsEntries", &entries);
            let ctx = LegacySigningContext::new(login, DEFAULT_HOSTNAME, config.read_only);
            let signed = call.sign(&ctx, &key)?;

            println!("{}", call.signature_base(&ctx));
            println!("Cookie: {}", signed.cookie);
        }
    }
    Ok(())
}
