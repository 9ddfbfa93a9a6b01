//! DM (C11.3): unicast direct message, scope `chat`. Grounded on
//! `original_source/messages/dm.py`.

use std::any::Any;

use crate::codec::Frame;
use crate::context::Context;
use crate::error::LsnpError;
use crate::fields::{MessageId, Scope, Timestamp, Token, Ttl, UserId};
use crate::recent::RecentMessage;
use crate::registry::MessageDescriptor;
use crate::router::Sendable;
use crate::schema::{required, FieldKind, Schema};

pub const TYPE: &str = "DM";

pub const SCHEMA: Schema = Schema {
    msg_type: TYPE,
    fields: &[
        ("FROM", required(FieldKind::UserId)),
        ("TO", required(FieldKind::UserId)),
        ("CONTENT", required(FieldKind::Str)),
        ("TIMESTAMP", required(FieldKind::Timestamp)),
        ("MESSAGE_ID", required(FieldKind::MessageId)),
        ("TOKEN", required(FieldKind::Token)),
    ],
};

#[derive(Debug, Clone)]
pub struct Dm {
    pub from: UserId,
    pub to: UserId,
    pub content: String,
    pub timestamp: Timestamp,
    pub message_id: MessageId,
    pub token: Token,
}

impl Dm {
    pub fn new(ctx: &Context, to: UserId, content: String, ttl: Ttl) -> Result<Self, LsnpError> {
        let from = ctx.client.get_user_id().ok_or(LsnpError::SocketUninitialized)?;
        let timestamp = Timestamp::now();
        let token = Token::new(from.clone(), timestamp.plus_ttl(ttl), Scope::Chat);
        Ok(Dm {
            from,
            to,
            content,
            timestamp,
            message_id: MessageId::generate(),
            token,
        })
    }
}

impl Sendable for Dm {
    fn msg_type(&self) -> &'static str {
        TYPE
    }

    fn payload(&self) -> Vec<(&'static str, String)> {
        vec![
            ("TYPE", TYPE.to_string()),
            ("FROM", self.from.to_string()),
            ("TO", self.to.to_string()),
            ("CONTENT", self.content.clone()),
            ("TIMESTAMP", self.timestamp.to_string()),
            ("MESSAGE_ID", self.message_id.to_string()),
            ("TOKEN", self.token.to_string()),
        ]
    }
}

impl RecentMessage for Dm {
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
            format!("{}: {}", self.from, self.content)
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
        scope: Some(Scope::Chat),
        schema: SCHEMA,
    }
}

/// Dropped unless the local user is the recipient; a valid DM not addressed
/// here still passes schema/token validation before `NotForMe` is raised.
pub async fn handle_receive(ctx: &Context, frame: &Frame) -> Result<(), LsnpError> {
    let from: UserId = frame["FROM"].parse()?;
    let to: UserId = frame["TO"].parse()?;
    let content = frame["CONTENT"].clone();
    let timestamp: Timestamp = frame["TIMESTAMP"].parse()?;
    let message_id: MessageId = frame["MESSAGE_ID"].parse()?;
    let token: Token = frame["TOKEN"].parse()?;

    token.validate(&from, Scope::Chat)?;
    if ctx.client.is_revoked(&token) {
        return Err(LsnpError::RevokedToken);
    }
    let local = ctx.client.get_user_id().ok_or(LsnpError::SocketUninitialized)?;
    if to != local {
        return Err(LsnpError::NotForMe);
    }

    ctx.client.add_peer(from.clone());
    let dm = Dm {
        from,
        to,
        content,
        timestamp,
        message_id,
        token,
    };
    tracing::info!(dm = %dm.info(false), "received direct message");
    ctx.client.add_recent_message_received(Box::new(dm));
    Ok(())
}
