//! FILE_CHUNK (C11.10): one base64-encoded slice of a file transfer, scope
//! `file`. Hidden from the visible command list — chunks are only ever
//! emitted by `file_offer::send_with_file`. Grounded on
//! `original_source/messages/file_chunk.py`.

use std::net::SocketAddr;

use base64::Engine;
use tokio::net::UdpSocket;

use crate::codec::Frame;
use crate::context::Context;
use crate::error::LsnpError;
use crate::fields::{MessageId, Scope, Token, UserId};
use crate::messages::file_received::FileReceived;
use crate::registry::MessageDescriptor;
use crate::router::{self, Sendable};
use crate::schema::{required, FieldKind, Schema};

pub const TYPE: &str = "FILE_CHUNK";

pub const SCHEMA: Schema = Schema {
    msg_type: TYPE,
    fields: &[
        ("FROM", required(FieldKind::UserId)),
        ("TO", required(FieldKind::UserId)),
        ("FILEID", required(FieldKind::MessageId)),
        ("CHUNK_INDEX", required(FieldKind::Int)),
        ("TOTAL_CHUNKS", required(FieldKind::Int)),
        ("CHUNK_SIZE", required(FieldKind::Int)),
        ("TOKEN", required(FieldKind::Token)),
        ("DATA", required(FieldKind::Str)),
    ],
};

#[derive(Debug, Clone)]
pub struct FileChunk {
    pub from: UserId,
    pub to: UserId,
    pub fileid: MessageId,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub chunk_size: usize,
    pub token: Token,
    pub data_b64: String,
}

impl FileChunk {
    pub fn new(
        from: UserId,
        to: UserId,
        fileid: MessageId,
        chunk_index: usize,
        total_chunks: usize,
        chunk_size: usize,
        token: Token,
        data: &[u8],
    ) -> Self {
        FileChunk {
            from,
            to,
            fileid,
            chunk_index,
            total_chunks,
            chunk_size,
            token,
            data_b64: base64::engine::general_purpose::STANDARD.encode(data),
        }
    }
}

impl Sendable for FileChunk {
    fn msg_type(&self) -> &'static str {
        TYPE
    }

    fn payload(&self) -> Vec<(&'static str, String)> {
        vec![
            ("TYPE", TYPE.to_string()),
            ("FROM", self.from.to_string()),
            ("TO", self.to.to_string()),
            ("FILEID", self.fileid.to_string()),
            ("CHUNK_INDEX", self.chunk_index.to_string()),
            ("TOTAL_CHUNKS", self.total_chunks.to_string()),
            ("CHUNK_SIZE", self.chunk_size.to_string()),
            ("TOKEN", self.token.to_string()),
            ("DATA", self.data_b64.clone()),
        ]
    }
}

pub fn descriptor() -> MessageDescriptor {
    MessageDescriptor {
        type_name: TYPE,
        hidden: true,
        scope: Some(Scope::File),
        schema: SCHEMA,
    }
}

/// Buffers the chunk regardless of whether the local user has accepted the
/// transfer yet: the sender streams the whole file right after the OFFER is
/// ACKed, with no handshake wait for a human to type `accept`, so chunks
/// routinely arrive first. `add_chunk` is safe to call pre-accept (the
/// pending transfer already exists from FILE_OFFER); only persisting the
/// finished file and notifying the sender wait for acceptance. If `accept`
/// comes in after the transfer is already complete, `accept_file` itself
/// persists immediately (see `state::file_transfer`).
pub async fn handle_receive(
    ctx: &Context,
    socket: &UdpSocket,
    frame: &Frame,
    from: SocketAddr,
) -> Result<(), LsnpError> {
    let from_id: UserId = frame["FROM"].parse()?;
    let to: UserId = frame["TO"].parse()?;
    let fileid: MessageId = frame["FILEID"].parse()?;
    let chunk_index: usize = frame["CHUNK_INDEX"].parse().map_err(|_| LsnpError::SchemaError {
        field: "CHUNK_INDEX".to_string(),
    })?;
    let total_chunks: usize = frame["TOTAL_CHUNKS"].parse().map_err(|_| LsnpError::SchemaError {
        field: "TOTAL_CHUNKS".to_string(),
    })?;
    let token: Token = frame["TOKEN"].parse()?;
    let data_b64 = &frame["DATA"];

    token.validate(&from_id, Scope::File)?;
    if ctx.client.is_revoked(&token) {
        return Err(LsnpError::RevokedToken);
    }
    let local = ctx.client.get_user_id().ok_or(LsnpError::SocketUninitialized)?;
    if to != local {
        return Err(LsnpError::NotForMe);
    }

    let complete = ctx.files.add_chunk(&fileid, chunk_index, data_b64, total_chunks)?;
    if complete && ctx.files.is_accepted(&fileid) {
        ctx.files.complete_transfers()?;
        let receipt = FileReceived::new(local, from_id, fileid, "COMPLETE");
        router::send_message(socket, &receipt, from).await?;
    }
    Ok(())
}
