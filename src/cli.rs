//! CLI surface (spec.md §6), `clap` derive style matching `sven/src/main.rs`.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "lsnp", about = "Local Social Networking Protocol peer")]
pub struct Cli {
    /// Username to announce on the network.
    #[arg(long)]
    pub username: String,

    /// UDP port for both the unicast and broadcast sockets.
    #[arg(long)]
    pub port: Option<u16>,

    /// Subnet prefix length used to compute the broadcast address.
    #[arg(long)]
    pub subnet: Option<u8>,

    /// Override the auto-detected local bind address.
    #[arg(long)]
    pub ipaddress: Option<String>,

    /// Enable debug-level logging.
    #[arg(long, short)]
    pub verbose: bool,
}
