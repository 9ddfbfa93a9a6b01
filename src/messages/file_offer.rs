//! FILE_OFFER (C11.9): announces an incoming file, scope `file`. Sent
//! reliably (spec.md §9) using its FILEID as the correlation id, since the
//! wire schema carries no separate MESSAGE_ID. Grounded on
//! `original_source/messages/file_offer.py` and `file_state.py`.

use std::any::Any;
use std::net::SocketAddr;
use std::path::Path;

use tokio::net::UdpSocket;

use crate::codec::Frame;
use crate::context::Context;
use crate::error::LsnpError;
use crate::fields::{MessageId, Scope, Timestamp, Token, Ttl, UserId};
use crate::messages::ack::Ack;
use crate::messages::file_chunk::FileChunk;
use crate::recent::RecentMessage;
use crate::registry::MessageDescriptor;
use crate::router::{self, Sendable};
use crate::schema::{required, FieldKind, Schema};
use crate::state::file_transfer::FileTransfer;
use crate::transport::reliable;

pub const TYPE: &str = "FILE_OFFER";

pub const SCHEMA: Schema = Schema {
    msg_type: TYPE,
    fields: &[
        ("FROM", required(FieldKind::UserId)),
        ("TO", required(FieldKind::UserId)),
        ("FILENAME", required(FieldKind::Str)),
        ("FILESIZE", required(FieldKind::Int)),
        ("FILETYPE", required(FieldKind::Str)),
        ("FILEID", required(FieldKind::MessageId)),
        ("DESCRIPTION", required(FieldKind::Str)),
        ("TIMESTAMP", required(FieldKind::Timestamp)),
        ("TOKEN", required(FieldKind::Token)),
    ],
};

#[derive(Debug, Clone)]
pub struct FileOffer {
    pub from: UserId,
    pub to: UserId,
    pub filename: String,
    pub filesize: u64,
    pub filetype: String,
    pub fileid: MessageId,
    pub description: String,
    pub timestamp: Timestamp,
    pub token: Token,
}

impl Sendable for FileOffer {
    fn msg_type(&self) -> &'static str {
        TYPE
    }

    fn payload(&self) -> Vec<(&'static str, String)> {
        vec![
            ("TYPE", TYPE.to_string()),
            ("FROM", self.from.to_string()),
            ("TO", self.to.to_string()),
            ("FILENAME", self.filename.clone()),
            ("FILESIZE", self.filesize.to_string()),
            ("FILETYPE", self.filetype.clone()),
            ("FILEID", self.fileid.to_string()),
            ("DESCRIPTION", self.description.clone()),
            ("TIMESTAMP", self.timestamp.to_string()),
            ("TOKEN", self.token.to_string()),
        ]
    }
}

impl RecentMessage for FileOffer {
    fn msg_type(&self) -> &'static str {
        TYPE
    }

    fn token(&self) -> &Token {
        &self.token
    }

    fn info(&self, verbose: bool) -> String {
        if verbose {
            format!("{self:?}")
        } else {
            format!("{} offered {} ({} bytes)", self.from, self.filename, self.filesize)
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn descriptor() -> MessageDescriptor {
    MessageDescriptor {
        type_name: TYPE,
        hidden: false,
        scope: Some(Scope::File),
        schema: SCHEMA,
    }
}

/// Reads `path` off disk, reliably sends the FILE_OFFER, and on ACK streams
/// every chunk best-effort. Chunk delivery itself is not retried: a dropped
/// chunk is recovered by the receiver re-requesting the file, not by this
/// transport (spec.md's Non-goals exclude chunk-level retransmission).
pub async fn send_with_file(
    ctx: &Context,
    socket: &UdpSocket,
    to: UserId,
    path: &Path,
    description: String,
    ttl: Ttl,
    chunk_size: usize,
) -> Result<(), LsnpError> {
    let data = std::fs::read(path)?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let filetype = mime_guess_by_extension(path);

    let from = ctx.client.get_user_id().ok_or(LsnpError::SocketUninitialized)?;
    let timestamp = Timestamp::now();
    let fileid = MessageId::generate();
    let token = Token::new(from.clone(), timestamp.plus_ttl(ttl), Scope::File);

    let offer = FileOffer {
        from: from.clone(),
        to: to.clone(),
        filename,
        filesize: data.len() as u64,
        filetype,
        fileid: fileid.clone(),
        description,
        timestamp,
        token,
    };

    let addr = SocketAddr::new(to.ip(), ctx.config.port);
    reliable::send_reliable(socket, &ctx.ack_table, &offer, addr, fileid.as_str()).await?;
    ctx.client.add_recent_message_sent(Box::new(offer));

    let total_chunks = data.chunks(chunk_size).count().max(1);
    let chunk_token = Token::new(from.clone(), timestamp.plus_ttl(ttl), Scope::File);
    for (index, chunk) in data.chunks(chunk_size).enumerate() {
        let msg = FileChunk::new(
            from.clone(),
            to.clone(),
            fileid.clone(),
            index,
            total_chunks,
            chunk_size,
            chunk_token.clone(),
            chunk,
        );
        router::send_message(socket, &msg, addr).await?;
    }
    Ok(())
}

fn mime_guess_by_extension(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("txt") => "text/plain",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// Stores the offer, opens a placeholder transfer (first FILE_CHUNK fills
/// in the real `total_chunks`/`chunk_size`, per the first-chunk-wins rule in
/// `state::file_transfer`), and ACKs the control message. It does not
/// auto-accept: a local `accept`/`reject` command decides that (an Open
/// Question resolved against auto-accept, see DESIGN.md).
pub async fn handle_receive(
    ctx: &Context,
    socket: &UdpSocket,
    frame: &Frame,
    from: SocketAddr,
) -> Result<(), LsnpError> {
    let from_id: UserId = frame["FROM"].parse()?;
    let to: UserId = frame["TO"].parse()?;
    let filename = frame["FILENAME"].clone();
    let filesize: u64 = frame["FILESIZE"].parse().map_err(|_| LsnpError::SchemaError {
        field: "FILESIZE".to_string(),
    })?;
    let filetype = frame["FILETYPE"].clone();
    let fileid: MessageId = frame["FILEID"].parse()?;
    let description = frame["DESCRIPTION"].clone();
    let timestamp: Timestamp = frame["TIMESTAMP"].parse()?;
    let token: Token = frame["TOKEN"].parse()?;

    token.validate(&from_id, Scope::File)?;
    if ctx.client.is_revoked(&token) {
        return Err(LsnpError::RevokedToken);
    }
    let local = ctx.client.get_user_id().ok_or(LsnpError::SocketUninitialized)?;
    if to != local {
        return Err(LsnpError::NotForMe);
    }

    ctx.client.add_peer(from_id.clone());
    ctx.files.add_pending_transfer(
        fileid.clone(),
        FileTransfer::new(filename.clone(), filesize, filetype.clone(), 0, 0),
    );

    let offer = FileOffer {
        from: from_id,
        to,
        filename,
        filesize,
        filetype,
        fileid: fileid.clone(),
        description,
        timestamp,
        token,
    };
    tracing::info!(offer = %offer.info(false), "received file offer");
    ctx.client.add_recent_message_received(Box::new(offer));

    let ack = Ack::new(fileid.to_string(), "RECEIVED");
    router::send_message(socket, &ack, from).await?;
    Ok(())
}
