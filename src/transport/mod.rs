//! Transport loops (C9): unicast receive/process, broadcast receive,
//! periodic presence, periodic cleanup.
//!
//! Socket setup (`SO_REUSEADDR`/`SO_BROADCAST`) uses `socket2`, the way
//! `morenodevai-haven`'s UDP transfer crate does it — the teacher
//! (`sven-p2p`) never opens a raw UDP socket, so this one concern is learned
//! from the other example repo that does. The event-loop shape (background
//! tasks reading channels/timers, logging via `tracing`) follows
//! `sven_p2p::node::P2pNode::run`.

pub mod reliable;

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time;

use crate::context::Context;
use crate::error::LsnpError;
use crate::router;

const QUEUE_CAPACITY: usize = 256;
const CLEANUP_INTERVAL: Duration = Duration::from_secs(5);

/// Cheap-to-clone handle to the running transport, mirroring
/// `sven_p2p::node::P2pHandle`: callers (the interactive command loop) send
/// through it without owning the sockets themselves.
#[derive(Clone)]
pub struct TransportHandle {
    pub unicast: Arc<UdpSocket>,
    pub broadcast_addr: SocketAddr,
}

/// Binds both sockets and spawns the long-lived background tasks described
/// in spec.md §5. Returns immediately; the tasks run for the process
/// lifetime.
pub async fn start(ctx: Context) -> Result<TransportHandle, LsnpError> {
    let unicast = Arc::new(UdpSocket::from_std(build_unicast_socket(&ctx)?)?);
    let broadcast = Arc::new(UdpSocket::from_std(build_broadcast_socket(&ctx)?)?);
    let broadcast_addr = SocketAddr::new(ctx.config.broadcast_ip.into(), ctx.config.port);

    spawn_unicast_pipeline(ctx.clone(), unicast.clone());
    spawn_broadcast_loop(ctx.clone(), unicast.clone(), broadcast);
    spawn_presence_loop(ctx.clone(), unicast.clone(), broadcast_addr);
    spawn_cleanup_loop(ctx);

    Ok(TransportHandle {
        unicast,
        broadcast_addr,
    })
}

fn build_unicast_socket(ctx: &Context) -> Result<std::net::UdpSocket, LsnpError> {
    let socket = socket2::Socket::new(
        socket2::Domain::IPV4,
        socket2::Type::DGRAM,
        Some(socket2::Protocol::UDP),
    )?;
    socket.set_reuse_address(true)?;
    // Presence PING and PROFILE both go out through this socket to
    // `broadcast_addr`; without SO_BROADCAST those sends fail EACCES.
    socket.set_broadcast(true)?;
    let addr: SocketAddr = (ctx.config.local_ip, ctx.config.port).into();
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

fn build_broadcast_socket(ctx: &Context) -> Result<std::net::UdpSocket, LsnpError> {
    let socket = socket2::Socket::new(
        socket2::Domain::IPV4,
        socket2::Type::DGRAM,
        Some(socket2::Protocol::UDP),
    )?;
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;
    let addr: SocketAddr = (Ipv4Addr::UNSPECIFIED, ctx.config.port).into();
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

/// Task 1 reads datagrams off the unicast socket into a bounded FIFO; task 2
/// dequeues and dispatches via the router. Splitting them means a slow
/// handler never blocks the socket drain.
fn spawn_unicast_pipeline(ctx: Context, unicast: Arc<UdpSocket>) {
    let buffer_size = ctx.config.buffer_size;
    let (tx, mut rx) = mpsc::channel::<(Vec<u8>, SocketAddr)>(QUEUE_CAPACITY);

    let recv_socket = unicast.clone();
    tokio::spawn(async move {
        let mut buf = vec![0u8; buffer_size];
        loop {
            match recv_socket.recv_from(&mut buf).await {
                Ok((n, from)) => {
                    if tx.send((buf[..n].to_vec(), from)).await.is_err() {
                        break;
                    }
                }
                Err(err) => tracing::warn!(error = %err, "unicast recv_from failed"),
            }
        }
    });

    tokio::spawn(async move {
        while let Some((bytes, from)) = rx.recv().await {
            match std::str::from_utf8(&bytes) {
                Ok(raw) => router::recv_message(&ctx, &unicast, raw, from).await,
                Err(_) => tracing::debug!(%from, "dropped non-utf8 unicast datagram"),
            }
        }
    });
}

/// Broadcast receive dispatches inline; no intermediate queue is required.
fn spawn_broadcast_loop(ctx: Context, unicast: Arc<UdpSocket>, broadcast: Arc<UdpSocket>) {
    let buffer_size = ctx.config.buffer_size;
    tokio::spawn(async move {
        let mut buf = vec![0u8; buffer_size];
        loop {
            match broadcast.recv_from(&mut buf).await {
                Ok((n, from)) => match std::str::from_utf8(&buf[..n]) {
                    Ok(raw) => router::recv_message(&ctx, &unicast, raw, from).await,
                    Err(_) => tracing::debug!(%from, "dropped non-utf8 broadcast datagram"),
                },
                Err(err) => tracing::warn!(error = %err, "broadcast recv_from failed"),
            }
        }
    });
}

/// Every `ping_interval` seconds, announce presence to the broadcast address.
fn spawn_presence_loop(ctx: Context, unicast: Arc<UdpSocket>, broadcast_addr: SocketAddr) {
    tokio::spawn(async move {
        let mut interval = time::interval(ctx.config.ping_interval);
        loop {
            interval.tick().await;
            let Some(user_id) = ctx.client.get_user_id() else {
                continue;
            };
            let ping = crate::messages::ping::Ping::new(user_id);
            if let Err(err) = router::send_message(&unicast, &ping, broadcast_addr).await {
                tracing::warn!(error = %err, "presence ping failed");
            }
        }
    });
}

/// Expires recent messages, purges file transfers whose FILE_OFFER expired,
/// and flushes any accepted transfer that has since completed.
fn spawn_cleanup_loop(ctx: Context) {
    tokio::spawn(async move {
        let mut interval = time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;

            let expired = ctx.client.cleanup_expired_messages();
            let expired_file_ids: Vec<_> = expired
                .iter()
                .filter_map(|m| m.as_any().downcast_ref::<crate::messages::file_offer::FileOffer>())
                .map(|fo| fo.fileid.clone())
                .collect();
            if !expired_file_ids.is_empty() {
                ctx.files.remove_transfers(&expired_file_ids);
            }

            if let Err(err) = ctx.files.complete_transfers() {
                tracing::warn!(error = %err, "failed to flush completed file transfers");
            }
        }
    });
}
