//! FOLLOW / UNFOLLOW (C11.6): maintain the follow graph, scope `follow`.
//! Grounded on `original_source/messages/follow.py` and `unfollow.py`, which
//! are near-identical apart from the edge they mutate.

use std::any::Any;

use crate::codec::Frame;
use crate::context::Context;
use crate::error::LsnpError;
use crate::fields::{MessageId, Scope, Timestamp, Token, Ttl, UserId};
use crate::recent::RecentMessage;
use crate::registry::MessageDescriptor;
use crate::router::Sendable;
use crate::schema::{required, FieldKind, Schema};

pub const FOLLOW_TYPE: &str = "FOLLOW";
pub const UNFOLLOW_TYPE: &str = "UNFOLLOW";

const FIELDS: &[(&str, crate::schema::FieldSpec)] = &[
    ("FROM", required(FieldKind::UserId)),
    ("TO", required(FieldKind::UserId)),
    ("TIMESTAMP", required(FieldKind::Timestamp)),
    ("MESSAGE_ID", required(FieldKind::MessageId)),
    ("TOKEN", required(FieldKind::Token)),
];

pub const FOLLOW_SCHEMA: Schema = Schema {
    msg_type: FOLLOW_TYPE,
    fields: FIELDS,
};

pub const UNFOLLOW_SCHEMA: Schema = Schema {
    msg_type: UNFOLLOW_TYPE,
    fields: FIELDS,
};

#[derive(Debug, Clone)]
pub struct Follow {
    pub from: UserId,
    pub to: UserId,
    pub timestamp: Timestamp,
    pub message_id: MessageId,
    pub token: Token,
}

#[derive(Debug, Clone)]
pub struct Unfollow {
    pub from: UserId,
    pub to: UserId,
    pub timestamp: Timestamp,
    pub message_id: MessageId,
    pub token: Token,
}

impl Follow {
    /// Registers `to` in the local following set immediately; the remote
    /// side's ACK of the follower edge happens out of band, there is no
    /// reply message for FOLLOW.
    pub fn new(ctx: &Context, to: UserId, ttl: Ttl) -> Result<Self, LsnpError> {
        let from = ctx.client.get_user_id().ok_or(LsnpError::SocketUninitialized)?;
        let timestamp = Timestamp::now();
        let token = Token::new(from.clone(), timestamp.plus_ttl(ttl), Scope::Follow);
        ctx.client.add_following(to.clone());
        Ok(Follow {
            from,
            to,
            timestamp,
            message_id: MessageId::generate(),
            token,
        })
    }
}

impl Unfollow {
    pub fn new(ctx: &Context, to: UserId, ttl: Ttl) -> Result<Self, LsnpError> {
        let from = ctx.client.get_user_id().ok_or(LsnpError::SocketUninitialized)?;
        let timestamp = Timestamp::now();
        let token = Token::new(from.clone(), timestamp.plus_ttl(ttl), Scope::Follow);
        ctx.client.remove_following(&to);
        Ok(Unfollow {
            from,
            to,
            timestamp,
            message_id: MessageId::generate(),
            token,
        })
    }
}

macro_rules! impl_sendable_and_recent {
    ($ty:ty, $type_name:expr, $verb:expr) => {
        impl Sendable for $ty {
            fn msg_type(&self) -> &'static str {
                $type_name
            }

            fn payload(&self) -> Vec<(&'static str, String)> {
                vec![
                    ("TYPE", $type_name.to_string()),
                    ("FROM", self.from.to_string()),
                    ("TO", self.to.to_string()),
                    ("TIMESTAMP", self.timestamp.to_string()),
                    ("MESSAGE_ID", self.message_id.to_string()),
                    ("TOKEN", self.token.to_string()),
                ]
            }
        }

        impl RecentMessage for $ty {
            fn msg_type(&self) -> &'static str {
                $type_name
            }

            fn token(&self) -> &Token {
                &self.token
            }

            fn info(&self, verbose: bool) -> String {
                if verbose {
                    format!("{self:?}")
                } else {
                    format!("{} {} {}", self.from, $verb, self.to)
                }
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    };
}

impl_sendable_and_recent!(Follow, FOLLOW_TYPE, "followed");
impl_sendable_and_recent!(Unfollow, UNFOLLOW_TYPE, "unfollowed");

pub fn follow_descriptor() -> MessageDescriptor {
    MessageDescriptor {
        type_name: FOLLOW_TYPE,
        hidden: false,
        scope: Some(Scope::Follow),
        schema: FOLLOW_SCHEMA,
    }
}

pub fn unfollow_descriptor() -> MessageDescriptor {
    MessageDescriptor {
        type_name: UNFOLLOW_TYPE,
        hidden: false,
        scope: Some(Scope::Follow),
        schema: UNFOLLOW_SCHEMA,
    }
}

fn parse_common(frame: &Frame) -> Result<(UserId, UserId, Timestamp, MessageId, Token), LsnpError> {
    Ok((
        frame["FROM"].parse()?,
        frame["TO"].parse()?,
        frame["TIMESTAMP"].parse()?,
        frame["MESSAGE_ID"].parse()?,
        frame["TOKEN"].parse()?,
    ))
}

pub async fn handle_receive_follow(ctx: &Context, frame: &Frame) -> Result<(), LsnpError> {
    let (from, to, timestamp, message_id, token) = parse_common(frame)?;
    token.validate(&from, Scope::Follow)?;
    if ctx.client.is_revoked(&token) {
        return Err(LsnpError::RevokedToken);
    }
    let local = ctx.client.get_user_id().ok_or(LsnpError::SocketUninitialized)?;
    if to != local {
        return Err(LsnpError::NotForMe);
    }
    ctx.client.add_follower(from.clone());
    let follow = Follow {
        from,
        to,
        timestamp,
        message_id,
        token,
    };
    ctx.client.add_recent_message_received(Box::new(follow));
    Ok(())
}

pub async fn handle_receive_unfollow(ctx: &Context, frame: &Frame) -> Result<(), LsnpError> {
    let (from, to, timestamp, message_id, token) = parse_common(frame)?;
    token.validate(&from, Scope::Follow)?;
    if ctx.client.is_revoked(&token) {
        return Err(LsnpError::RevokedToken);
    }
    let local = ctx.client.get_user_id().ok_or(LsnpError::SocketUninitialized)?;
    if to != local {
        return Err(LsnpError::NotForMe);
    }
    ctx.client.remove_follower(&from);
    let unfollow = Unfollow {
        from,
        to,
        timestamp,
        message_id,
        token,
    };
    ctx.client.add_recent_message_received(Box::new(unfollow));
    Ok(())
}
