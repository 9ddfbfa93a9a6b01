use std::net::IpAddr;

use clap::Parser;

use lsnp::cli::Cli;
use lsnp::config::Config;
use lsnp::context::Context;
use lsnp::fields::UserId;
use lsnp::{interface, transport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::from_cli(&cli)?;
    let ctx = Context::new(config);

    let user_id = UserId::new(cli.username, IpAddr::V4(ctx.config.local_ip))?;
    ctx.client.set_user_id(user_id);

    let handle = transport::start(ctx.clone()).await?;
    interface::run(ctx, handle.unicast).await;
    Ok(())
}

/// `--verbose` raises the default filter to `debug`; `RUST_LOG` always wins
/// when set, matching `sven-p2p`'s client/relay binaries.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.parse().unwrap()),
        )
        .init();
}
