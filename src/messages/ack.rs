//! ACK (C11.7): completes an in-flight reliable send. No bearer token, so
//! it is never a `RecentMessage`; correlation runs through
//! `transport::reliable::AckTable`, per spec.md §9.

use crate::codec::Frame;
use crate::context::Context;
use crate::error::LsnpError;
use crate::registry::MessageDescriptor;
use crate::router::Sendable;
use crate::schema::{required, FieldKind, Schema};

pub const TYPE: &str = "ACK";

pub const SCHEMA: Schema = Schema {
    msg_type: TYPE,
    fields: &[
        ("MESSAGE_ID", required(FieldKind::MessageId)),
        ("STATUS", required(FieldKind::Str)),
    ],
};

#[derive(Debug, Clone)]
pub struct Ack {
    pub message_id: String,
    pub status: String,
}

impl Ack {
    pub fn new(message_id: impl Into<String>, status: impl Into<String>) -> Self {
        Ack {
            message_id: message_id.into(),
            status: status.into(),
        }
    }
}

impl Sendable for Ack {
    fn msg_type(&self) -> &'static str {
        TYPE
    }

    fn payload(&self) -> Vec<(&'static str, String)> {
        vec![
            ("TYPE", TYPE.to_string()),
            ("MESSAGE_ID", self.message_id.clone()),
            ("STATUS", self.status.clone()),
        ]
    }
}

pub fn descriptor() -> MessageDescriptor {
    MessageDescriptor {
        type_name: TYPE,
        hidden: true,
        scope: None,
        schema: SCHEMA,
    }
}

pub async fn handle_receive(ctx: &Context, frame: &Frame) -> Result<(), LsnpError> {
    let message_id = &frame["MESSAGE_ID"];
    ctx.ack_table.complete(message_id);
    Ok(())
}
