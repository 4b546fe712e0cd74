use anyhow::{Context, bail};
use clap::Parser;
use core::time::Duration;
use std::net::{IpAddr, SocketAddr};

/// Upper bound on the processing delay. Units cannot be cancelled, so a
/// mistyped delay would otherwise hold shutdown hostage.
const MAX_DELAY_SECS: u64 = 3600;

/// Runtime configuration for the `hashq-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file in the working directory is loaded first), with defaults suitable for
/// running locally.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "hashq-server",
    version,
    about = "An HTTP service that hashes passwords in the background and drains on shutdown"
)]
pub struct CliArgs {
    /// Address to bind the HTTP listener on.
    ///
    /// Environment variable: `HASHER_HOST`
    #[arg(long, env = "HASHER_HOST", default_value_t = String::from("0.0.0.0"))]
    pub host: String,

    /// Port to listen on. `0` picks an ephemeral port.
    ///
    /// Environment variable: `HASHER_PORT`
    #[arg(short, long, env = "HASHER_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Seconds each unit of work waits before hashing.
    ///
    /// Environment variable: `HASH_DELAY_SECS`
    #[arg(long, env = "HASH_DELAY_SECS", default_value_t = 5)]
    pub delay_secs: u64,

    /// Number of result store shards. Must be a power of two.
    ///
    /// More shards reduce lock contention between concurrent completions and
    /// lookups at the cost of a little memory.
    ///
    /// Environment variable: `STORE_SHARDS`
    #[arg(long, env = "STORE_SHARDS", default_value_t = hashq::DEFAULT_SHARDS)]
    pub store_shards: usize,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: SocketAddr,
    pub delay: Duration,
    pub store_shards: usize,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let ip: IpAddr = args
            .host
            .parse()
            .with_context(|| format!("HASHER_HOST ({}) is not an IP address", args.host))?;

        if args.delay_secs > MAX_DELAY_SECS {
            bail!(
                "HASH_DELAY_SECS ({}) exceeds the maximum of {MAX_DELAY_SECS}",
                args.delay_secs
            );
        }

        if args.store_shards == 0 || !args.store_shards.is_power_of_two() {
            bail!(
                "STORE_SHARDS ({}) must be a power of two greater than 0",
                args.store_shards
            );
        }

        Ok(Self {
            server_addr: SocketAddr::new(ip, args.port),
            delay: Duration::from_secs(args.delay_secs),
            store_shards: args.store_shards,
        })
    }
}
