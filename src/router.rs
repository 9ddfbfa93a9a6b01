//! Router API (C10): `send_message`/`recv_message` wrappers driving the
//! codec, schema validator, registry and handlers.

use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::codec;
use crate::context::Context;
use crate::error::LsnpError;
use crate::messages;
use crate::registry;

/// Anything that can be turned into a wire frame: declaration-ordered
/// key/value pairs plus its own TYPE literal.
pub trait Sendable {
    fn msg_type(&self) -> &'static str;
    fn payload(&self) -> Vec<(&'static str, String)>;
}

/// Serializes and transmits `msg`. Construction via typed handler
/// constructors already guarantees well-formed fields, so the send path
/// does not re-run schema validation (unlike the receive path, where
/// inbound bytes are untrusted).
pub async fn send_message<T: Sendable>(
    socket: &UdpSocket,
    msg: &T,
    addr: SocketAddr,
) -> Result<(), LsnpError> {
    let frame = codec::serialize(&msg.payload());
    socket.send_to(frame.as_bytes(), addr).await?;
    tracing::debug!(msg_type = msg.msg_type(), %addr, "sent message");
    Ok(())
}

/// Entry point for the receive path. Errors are logged and dropped here;
/// they never propagate to the transport loop (spec.md §7).
pub async fn recv_message(ctx: &Context, socket: &UdpSocket, raw: &str, from: SocketAddr) {
    if let Err(err) = dispatch(ctx, socket, raw, from).await {
        tracing::debug!(%from, error = %err, "dropped inbound datagram");
    }
}

async fn dispatch(
    ctx: &Context,
    socket: &UdpSocket,
    raw: &str,
    from: SocketAddr,
) -> Result<(), LsnpError> {
    let frame = codec::deserialize(raw)?;
    let type_name = frame
        .get("TYPE")
        .ok_or_else(|| LsnpError::MalformedFrame("missing TYPE".into()))?
        .clone();
    let descriptor = registry::lookup(&type_name).ok_or_else(|| LsnpError::UnknownType(type_name.clone()))?;
    descriptor.schema.validate(&frame)?;

    match type_name.as_str() {
        "PING" => messages::ping::handle_receive(ctx, socket, &frame, from).await,
        "PROFILE" => messages::profile::handle_receive(ctx, &frame).await,
        "DM" => messages::dm::handle_receive(ctx, &frame).await,
        "POST" => messages::post::handle_receive(ctx, &frame).await,
        "LIKE" => messages::like::handle_receive(ctx, &frame).await,
        "FOLLOW" => messages::follow::handle_receive_follow(ctx, &frame).await,
        "UNFOLLOW" => messages::follow::handle_receive_unfollow(ctx, &frame).await,
        "ACK" => messages::ack::handle_receive(ctx, &frame).await,
        "REVOKE" => messages::revoke::handle_receive(ctx, &frame).await,
        "FILE_OFFER" => messages::file_offer::handle_receive(ctx, socket, &frame, from).await,
        "FILE_CHUNK" => messages::file_chunk::handle_receive(ctx, socket, &frame, from).await,
        "FILE_RECEIVED" => messages::file_received::handle_receive(ctx, &frame).await,
        "GROUP_CREATE" => messages::group_create::handle_receive(ctx, &frame).await,
        "GROUP_UPDATE" => messages::group_update::handle_receive(ctx, &frame).await,
        "GROUP_MESSAGE" => messages::group_message::handle_receive(ctx, &frame).await,
        "TICTACTOE_INVITE" => messages::tictactoe_invite::handle_receive(ctx, socket, &frame, from).await,
        "TICTACTOE_MOVE" => messages::tictactoe_move::handle_receive(ctx, socket, &frame, from).await,
        "TICTACTOE_RESULT" => messages::tictactoe_result::handle_receive(ctx, &frame).await,
        other => Err(LsnpError::UnknownType(other.to_string())),
    }
}
