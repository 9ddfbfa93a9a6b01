//! LIKE (C11.5): like/unlike a previously seen POST, scope `broadcast`.
//! Grounded on `original_source/messages/like.py`.

use std::any::Any;
use std::fmt;
use std::str::FromStr;

use crate::codec::Frame;
use crate::context::Context;
use crate::error::LsnpError;
use crate::fields::{Scope, Timestamp, Token, Ttl, UserId};
use crate::recent::RecentMessage;
use crate::registry::MessageDescriptor;
use crate::router::Sendable;
use crate::schema::{required, FieldKind, Schema};

pub const TYPE: &str = "LIKE";

pub const SCHEMA: Schema = Schema {
    msg_type: TYPE,
    fields: &[
        ("FROM", required(FieldKind::UserId)),
        ("TO", required(FieldKind::UserId)),
        ("POST_TIMESTAMP", required(FieldKind::Timestamp)),
        ("ACTION", required(FieldKind::Str)),
        ("TIMESTAMP", required(FieldKind::Timestamp)),
        ("TOKEN", required(FieldKind::Token)),
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Like,
    Unlike,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Like => "LIKE",
            Action::Unlike => "UNLIKE",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Action {
    type Err = LsnpError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LIKE" => Ok(Action::Like),
            "UNLIKE" => Ok(Action::Unlike),
            other => Err(LsnpError::InvalidUserInput(format!("unknown like action: {other:?}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Like {
    pub from: UserId,
    pub to: UserId,
    pub post_timestamp: Timestamp,
    pub action: Action,
    pub timestamp: Timestamp,
    pub token: Token,
}

impl Like {
    pub fn new(
        ctx: &Context,
        to: UserId,
        post_timestamp: Timestamp,
        action: Action,
        ttl: Ttl,
    ) -> Result<Self, LsnpError> {
        let from = ctx.client.get_user_id().ok_or(LsnpError::SocketUninitialized)?;
        let timestamp = Timestamp::now();
        let token = Token::new(from.clone(), timestamp.plus_ttl(ttl), Scope::Broadcast);
        Ok(Like {
            from,
            to,
            post_timestamp,
            action,
            timestamp,
            token,
        })
    }
}

impl Sendable for Like {
    fn msg_type(&self) -> &'static str {
        TYPE
    }

    fn payload(&self) -> Vec<(&'static str, String)> {
        vec![
            ("TYPE", TYPE.to_string()),
            ("FROM", self.from.to_string()),
            ("TO", self.to.to_string()),
            ("POST_TIMESTAMP", self.post_timestamp.to_string()),
            ("ACTION", self.action.to_string()),
            ("TIMESTAMP", self.timestamp.to_string()),
            ("TOKEN", self.token.to_string()),
        ]
    }
}

impl RecentMessage for Like {
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
            format!("{} {}d {}'s post", self.from, self.action, self.to)
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

/// Dropped unless the local user is `TO` and still has a matching POST on
/// record at `POST_TIMESTAMP`.
pub async fn handle_receive(ctx: &Context, frame: &Frame) -> Result<(), LsnpError> {
    let from: UserId = frame["FROM"].parse()?;
    let to: UserId = frame["TO"].parse()?;
    let post_timestamp: Timestamp = frame["POST_TIMESTAMP"].parse()?;
    let action: Action = frame["ACTION"].parse()?;
    let timestamp: Timestamp = frame["TIMESTAMP"].parse()?;
    let token: Token = frame["TOKEN"].parse()?;

    token.validate(&from, Scope::Broadcast)?;
    if ctx.client.is_revoked(&token) {
        return Err(LsnpError::RevokedToken);
    }
    let local = ctx.client.get_user_id().ok_or(LsnpError::SocketUninitialized)?;
    if to != local {
        return Err(LsnpError::NotForMe);
    }
    let Some(content) = ctx.client.get_post_message(post_timestamp) else {
        return Err(LsnpError::InvalidUserInput(format!(
            "no matching post at {post_timestamp}"
        )));
    };

    let like = Like {
        from,
        to,
        post_timestamp,
        action,
        timestamp,
        token,
    };
    tracing::info!(like = %like.info(false), post = %content, "received like");
    ctx.client.add_recent_message_received(Box::new(like));
    Ok(())
}
