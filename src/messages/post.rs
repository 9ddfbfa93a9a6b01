//! POST (C11.4): broadcast status update, scope `broadcast`.
//!
//! The wire schema (spec.md §4.8) carries no timestamp field, but LIKE's
//! `POST_TIMESTAMP` needs something stable to correlate against. The
//! sender's own copy keeps its effective post time as `token.valid_until -
//! ttl`, since `ttl` is known at construction and the token's validity
//! window is carried on the wire either way. A POST received from someone
//! else never needs this (LIKE lookups only ever scan the poster's own sent
//! log), so `posted_at` there is a harmless placeholder.

use std::any::Any;

use crate::codec::Frame;
use crate::context::Context;
use crate::error::LsnpError;
use crate::fields::{MessageId, Scope, Timestamp, Token, Ttl, UserId};
use crate::recent::RecentMessage;
use crate::registry::MessageDescriptor;
use crate::router::Sendable;
use crate::schema::{required, FieldKind, Schema};

pub const TYPE: &str = "POST";

pub const SCHEMA: Schema = Schema {
    msg_type: TYPE,
    fields: &[
        ("USER_ID", required(FieldKind::UserId)),
        ("CONTENT", required(FieldKind::Str)),
        ("MESSAGE_ID", required(FieldKind::MessageId)),
        ("TOKEN", required(FieldKind::Token)),
    ],
};

#[derive(Debug, Clone)]
pub struct Post {
    pub user_id: UserId,
    pub content: String,
    pub message_id: MessageId,
    pub token: Token,
    posted_at: Timestamp,
}

impl Post {
    pub fn new(ctx: &Context, content: String, ttl: Ttl) -> Result<Self, LsnpError> {
        let user_id = ctx.client.get_user_id().ok_or(LsnpError::SocketUninitialized)?;
        let posted_at = Timestamp::now();
        let token = Token::new(user_id.clone(), posted_at.plus_ttl(ttl), Scope::Broadcast);
        Ok(Post {
            user_id,
            content,
            message_id: MessageId::generate(),
            token,
            posted_at,
        })
    }

    pub fn posted_at(&self) -> Timestamp {
        self.posted_at
    }
}

impl Sendable for Post {
    fn msg_type(&self) -> &'static str {
        TYPE
    }

    fn payload(&self) -> Vec<(&'static str, String)> {
        vec![
            ("TYPE", TYPE.to_string()),
            ("USER_ID", self.user_id.to_string()),
            ("CONTENT", self.content.clone()),
            ("MESSAGE_ID", self.message_id.to_string()),
            ("TOKEN", self.token.to_string()),
        ]
    }
}

impl RecentMessage for Post {
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
            format!("{}: {}", self.user_id, self.content)
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
        scope: Some(Scope::Broadcast),
        schema: SCHEMA,
    }
}

/// Dropped unless the local user already follows the poster.
pub async fn handle_receive(ctx: &Context, frame: &Frame) -> Result<(), LsnpError> {
    let user_id: UserId = frame["USER_ID"].parse()?;
    let content = frame["CONTENT"].clone();
    let message_id: MessageId = frame["MESSAGE_ID"].parse()?;
    let token: Token = frame["TOKEN"].parse()?;

    token.validate(&user_id, Scope::Broadcast)?;
    if ctx.client.is_revoked(&token) {
        return Err(LsnpError::RevokedToken);
    }
    if !ctx.client.is_following(&user_id) {
        return Err(LsnpError::NotForMe);
    }

    let posted_at = token.valid_until;
    let post = Post {
        user_id,
        content,
        message_id,
        token,
        posted_at,
    };
    tracing::info!(post = %post.info(false), "received post");
    ctx.client.add_recent_message_received(Box::new(post));
    Ok(())
}
