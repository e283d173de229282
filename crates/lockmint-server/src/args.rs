use std::path::PathBuf;

use clap::Parser;
use lockmint_core::Ecosystem;
use tracing::Level;
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Args {
    /// The port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    pub(crate) port: u16,

    /// Path to the data directory
    #[arg(short, long, env = "DATA_PATH", visible_alias = "data")]
    pub(crate) data_path: PathBuf,

    /// JSON-RPC endpoint of the wallet node (http, ws or ipc)
    #[arg(short, long, env = "RPC_URL")]
    pub(crate) rpc_url: Url,

    /// JSON file with pool and market addresses missing from the built-in
    /// contract table, keyed by ecosystem
    #[arg(long, env = "DEPLOYMENTS")]
    pub(crate) deployments: Option<PathBuf>,

    /// Ecosystem to start in; defaults to the one matching the wallet network
    #[arg(short, long, env = "ECOSYSTEM", value_parser = parse_ecosystem)]
    pub(crate) ecosystem: Option<Ecosystem>,

    /// Default log level, overridden by `RUST_LOG`
    #[arg(short, long, env = "LOG_LEVEL", default_value_t = Level::INFO)]
    pub(crate) log_level: Level,
}

fn parse_ecosystem(value: &str) -> Result<Ecosystem, String> {
    Ecosystem::ALL
        .into_iter()
        .find(|ecosystem| format!("{ecosystem:?}").eq_ignore_ascii_case(value))
        .ok_or_else(|| format!("unknown ecosystem `{value}`"))
}
