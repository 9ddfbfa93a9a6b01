//! Process configuration: CLI-resolved port/subnet/IP plus the defaults
//! `original_source/config.py` hard-codes (`PING_INTERVAL`, `PORT`,
//! `SUBNET_MASK`, `BUFSIZE`).

use std::net::{Ipv4Addr, UdpSocket};
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Cli;
use crate::error::LsnpError;

pub const DEFAULT_PORT: u16 = 50999;
pub const DEFAULT_SUBNET_PREFIX: u8 = 24;
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub subnet_prefix: u8,
    pub local_ip: Ipv4Addr,
    pub broadcast_ip: Ipv4Addr,
    pub ping_interval: Duration,
    pub buffer_size: usize,
    pub received_files_dir: PathBuf,
    pub verbose: bool,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self, LsnpError> {
        let port = cli.port.unwrap_or(DEFAULT_PORT);
        let subnet_prefix = cli.subnet.unwrap_or(DEFAULT_SUBNET_PREFIX);
        let local_ip = match &cli.ipaddress {
            Some(ip) => ip.parse().map_err(|_| {
                LsnpError::InvalidUserInput(format!("invalid --ipaddress: {ip:?}"))
            })?,
            None => detect_local_ip()?,
        };
        let broadcast_ip = broadcast_address(local_ip, subnet_prefix);

        Ok(Config {
            port,
            subnet_prefix,
            local_ip,
            broadcast_ip,
            ping_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
            buffer_size: DEFAULT_BUFFER_SIZE,
            received_files_dir: PathBuf::from("received_files"),
            verbose: cli.verbose,
        })
    }
}

/// Opens a UDP socket and connects it to an off-host address purely to read
/// back the OS-chosen outbound interface address; no packet is actually
/// sent since UDP `connect` just records the peer. Matches `config.py`'s
/// `get_ip()`.
fn detect_local_ip() -> Result<Ipv4Addr, LsnpError> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("8.8.8.8:80")?;
    match socket.local_addr()?.ip() {
        std::net::IpAddr::V4(v4) => Ok(v4),
        std::net::IpAddr::V6(_) => Err(LsnpError::InvalidUserInput(
            "no local IPv4 address available; pass --ipaddress".into(),
        )),
    }
}

/// Matches `config.py`'s `get_broadcast_ip()`: OR the host bits of `ip` with
/// the inverse of the subnet mask.
pub fn broadcast_address(ip: Ipv4Addr, prefix: u8) -> Ipv4Addr {
    let prefix = prefix.min(32);
    let mask: u32 = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    };
    let bits = u32::from(ip) | !mask;
    Ipv4Addr::from(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_address_for_slash_24() {
        let ip: Ipv4Addr = "192.168.1.42".parse().unwrap();
        assert_eq!(broadcast_address(ip, 24), "192.168.1.255".parse::<Ipv4Addr>().unwrap());
    }

    #[test]
    fn broadcast_address_for_slash_16() {
        let ip: Ipv4Addr = "10.20.30.40".parse().unwrap();
        assert_eq!(broadcast_address(ip, 16), "10.20.255.255".parse::<Ipv4Addr>().unwrap());
    }
}
