//! GROUP_MESSAGE (C11.14): a chat message fanned out to group members,
//! scope `group`. Grounded on `original_source/messages/group_message.py`.

use std::any::Any;

use crate::codec::Frame;
use crate::context::Context;
use crate::error::LsnpError;
use crate::fields::{MessageId, Scope, Timestamp, Token, Ttl, UserId};
use crate::recent::RecentMessage;
use crate::registry::MessageDescriptor;
use crate::router::Sendable;
use crate::schema::{required, FieldKind, Schema};

pub const TYPE: &str = "GROUP_MESSAGE";

pub const SCHEMA: Schema = Schema {
    msg_type: TYPE,
    fields: &[
        ("FROM", required(FieldKind::UserId)),
        ("GROUP_ID", required(FieldKind::Str)),
        ("CONTENT", required(FieldKind::Str)),
        ("MESSAGE_ID", required(FieldKind::MessageId)),
        ("TIMESTAMP", required(FieldKind::Timestamp)),
        ("TOKEN", required(FieldKind::Token)),
    ],
};

#[derive(Debug, Clone)]
pub struct GroupMessage {
    pub from: UserId,
    pub group_id: String,
    pub content: String,
    pub message_id: MessageId,
    pub timestamp: Timestamp,
    pub token: Token,
}

impl GroupMessage {
    pub fn new(ctx: &Context, group_id: String, content: String, ttl: Ttl) -> Result<Self, LsnpError> {
        let from = ctx.client.get_user_id().ok_or(LsnpError::SocketUninitialized)?;
        if !ctx.client.is_group_member(&group_id, &from) {
            return Err(LsnpError::InvalidUserInput(format!(
                "not a member of group {group_id}"
            )));
        }
        let timestamp = Timestamp::now();
        let token = Token::new(from.clone(), timestamp.plus_ttl(ttl), Scope::Group);
        Ok(GroupMessage {
            from,
            group_id,
            content,
            message_id: MessageId::generate(),
            timestamp,
            token,
        })
    }
}

impl Sendable for GroupMessage {
    fn msg_type(&self) -> &'static str {
        TYPE
    }

    fn payload(&self) -> Vec<(&'static str, String)> {
        vec![
            ("TYPE", TYPE.to_string()),
            ("FROM", self.from.to_string()),
            ("GROUP_ID", self.group_id.clone()),
            ("CONTENT", self.content.clone()),
            ("MESSAGE_ID", self.message_id.to_string()),
            ("TIMESTAMP", self.timestamp.to_string()),
            ("TOKEN", self.token.to_string()),
        ]
    }
}

impl RecentMessage for GroupMessage {
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
            format!("[{}] {}: {}", self.group_id, self.from, self.content)
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
        scope: Some(Scope::Group),
        schema: SCHEMA,
    }
}

/// Dropped unless the local user is still a member of the named group.
pub async fn handle_receive(ctx: &Context, frame: &Frame) -> Result<(), LsnpError> {
    let from: UserId = frame["FROM"].parse()?;
    let group_id = frame["GROUP_ID"].clone();
    let content = frame["CONTENT"].clone();
    let message_id: MessageId = frame["MESSAGE_ID"].parse()?;
    let timestamp: Timestamp = frame["TIMESTAMP"].parse()?;
    let token: Token = frame["TOKEN"].parse()?;

    token.validate(&from, Scope::Group)?;
    if ctx.client.is_revoked(&token) {
        return Err(LsnpError::RevokedToken);
    }
    let local = ctx.client.get_user_id().ok_or(LsnpError::SocketUninitialized)?;
    if !ctx.client.is_group_member(&group_id, &local) {
        return Err(LsnpError::NotForMe);
    }

    let msg = GroupMessage {
        from,
        group_id,
        content,
        message_id,
        timestamp,
        token,
    };
    tracing::info!(message = %msg.info(false), "received group message");
    ctx.client.add_recent_message_received(Box::new(msg));
    Ok(())
}
