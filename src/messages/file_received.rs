//! FILE_RECEIVED (C11.11): informational receipt closing out a file
//! transfer. No bearer token, not stored as a `RecentMessage`. Grounded on
//! `original_source/messages/file_received.py`.

use crate::codec::Frame;
use crate::context::Context;
use crate::error::LsnpError;
use crate::fields::{MessageId, Timestamp, UserId};
use crate::registry::MessageDescriptor;
use crate::router::Sendable;
use crate::schema::{required, FieldKind, Schema};

pub const TYPE: &str = "FILE_RECEIVED";

pub const SCHEMA: Schema = Schema {
    msg_type: TYPE,
    fields: &[
        ("FROM", required(FieldKind::UserId)),
        ("TO", required(FieldKind::UserId)),
        ("FILEID", required(FieldKind::MessageId)),
        ("STATUS", required(FieldKind::Str)),
        ("TIMESTAMP", required(FieldKind::Timestamp)),
    ],
};

#[derive(Debug, Clone)]
pub struct FileReceived {
    pub from: UserId,
    pub to: UserId,
    pub fileid: MessageId,
    pub status: String,
    pub timestamp: Timestamp,
}

impl FileReceived {
    pub fn new(from: UserId, to: UserId, fileid: MessageId, status: impl Into<String>) -> Self {
        FileReceived {
            from,
            to,
            fileid,
            status: status.into(),
            timestamp: Timestamp::now(),
        }
    }
}

impl Sendable for FileReceived {
    fn msg_type(&self) -> &'static str {
        TYPE
    }

    fn payload(&self) -> Vec<(&'static str, String)> {
        vec![
            ("TYPE", TYPE.to_string()),
            ("FROM", self.from.to_string()),
            ("TO", self.to.to_string()),
            ("FILEID", self.fileid.to_string()),
            ("STATUS", self.status.clone()),
            ("TIMESTAMP", self.timestamp.to_string()),
        ]
    }
}

pub fn descriptor() -> MessageDescriptor {
    MessageDescriptor {
        type_name: TYPE,
        hidden: false,
        scope: None,
        schema: SCHEMA,
    }
}

pub async fn handle_receive(ctx: &Context, frame: &Frame) -> Result<(), LsnpError> {
    let from: UserId = frame["FROM"].parse()?;
    let fileid: MessageId = frame["FILEID"].parse()?;
    let status = frame["STATUS"].clone();
    ctx.client.add_peer(from.clone());
    tracing::info!(%from, %fileid, status, "peer confirmed file receipt");
    Ok(())
}
