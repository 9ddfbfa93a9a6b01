//! GROUP_UPDATE (C11.13): adds/removes group members, scope `group`.
//! Grounded on `original_source/messages/group_update.py`.
//!
//! Recipients are `(current members ∪ ADD) − REMOVE − self` (an Open
//! Question the distilled spec left unresolved; see DESIGN.md): everyone
//! who is a member either before or after the update hears about it, except
//! the sender itself.

use std::any::Any;
use std::collections::HashSet;

use crate::codec::Frame;
use crate::context::Context;
use crate::error::LsnpError;
use crate::fields::{Scope, Timestamp, Token, Ttl, UserId};
use crate::messages::group_create::{members_to_wire, parse_members};
use crate::recent::RecentMessage;
use crate::registry::MessageDescriptor;
use crate::router::Sendable;
use crate::schema::{optional, required, FieldKind, Schema};

pub const TYPE: &str = "GROUP_UPDATE";

pub const SCHEMA: Schema = Schema {
    msg_type: TYPE,
    fields: &[
        ("FROM", required(FieldKind::UserId)),
        ("GROUP_ID", required(FieldKind::Str)),
        ("ADD", optional(FieldKind::Str)),
        ("REMOVE", optional(FieldKind::Str)),
        ("TIMESTAMP", required(FieldKind::Timestamp)),
        ("TOKEN", required(FieldKind::Token)),
    ],
};

#[derive(Debug, Clone)]
pub struct GroupUpdate {
    pub from: UserId,
    pub group_id: String,
    pub add: HashSet<UserId>,
    pub remove: HashSet<UserId>,
    pub timestamp: Timestamp,
    pub token: Token,
}

impl GroupUpdate {
    pub fn new(
        ctx: &Context,
        group_id: String,
        add: HashSet<UserId>,
        remove: HashSet<UserId>,
        ttl: Ttl,
    ) -> Result<Self, LsnpError> {
        let from = ctx.client.get_user_id().ok_or(LsnpError::SocketUninitialized)?;
        let timestamp = Timestamp::now();
        let token = Token::new(from.clone(), timestamp.plus_ttl(ttl), Scope::Group);
        for member in &add {
            ctx.client.add_group_member(&group_id, member.clone());
        }
        for member in &remove {
            ctx.client.remove_group_member(&group_id, member);
        }
        Ok(GroupUpdate {
            from,
            group_id,
            add,
            remove,
            timestamp,
            token,
        })
    }

    pub fn recipients(&self, ctx: &Context) -> HashSet<UserId> {
        let mut set: HashSet<UserId> = ctx.client.get_group_members(&self.group_id).into_iter().collect();
        set.extend(self.add.iter().cloned());
        for removed in &self.remove {
            set.remove(removed);
        }
        set.remove(&self.from);
        set
    }
}

impl Sendable for GroupUpdate {
    fn msg_type(&self) -> &'static str {
        TYPE
    }

    fn payload(&self) -> Vec<(&'static str, String)> {
        vec![
            ("TYPE", TYPE.to_string()),
            ("FROM", self.from.to_string()),
            ("GROUP_ID", self.group_id.clone()),
            ("ADD", members_to_wire(&self.add)),
            ("REMOVE", members_to_wire(&self.remove)),
            ("TIMESTAMP", self.timestamp.to_string()),
            ("TOKEN", self.token.to_string()),
        ]
    }
}

impl RecentMessage for GroupUpdate {
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
            format!(
                "{} updated group {}: +{} -{}",
                self.from,
                self.group_id,
                self.add.len(),
                self.remove.len()
            )
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

/// Applies additions, then removals (so an update that both adds and
/// removes the same member ends with them removed). Drops the group
/// locally if the local user is among those removed.
pub async fn handle_receive(ctx: &Context, frame: &Frame) -> Result<(), LsnpError> {
    let from: UserId = frame["FROM"].parse()?;
    let group_id = frame["GROUP_ID"].clone();
    let add = match frame.get("ADD") {
        Some(raw) => parse_members(raw)?,
        None => HashSet::new(),
    };
    let remove = match frame.get("REMOVE") {
        Some(raw) => parse_members(raw)?,
        None => HashSet::new(),
    };
    let timestamp: Timestamp = frame["TIMESTAMP"].parse()?;
    let token: Token = frame["TOKEN"].parse()?;

    token.validate(&from, Scope::Group)?;
    if ctx.client.is_revoked(&token) {
        return Err(LsnpError::RevokedToken);
    }
    ctx.client.add_peer(from.clone());

    for member in &add {
        ctx.client.add_group_member(&group_id, member.clone());
    }
    for member in &remove {
        ctx.client.remove_group_member(&group_id, member);
    }
    let local = ctx.client.get_user_id().ok_or(LsnpError::SocketUninitialized)?;
    if remove.contains(&local) {
        ctx.client.remove_group(&group_id);
    }

    let update = GroupUpdate {
        from,
        group_id,
        add,
        remove,
        timestamp,
        token,
    };
    ctx.client.add_recent_message_received(Box::new(update));
    Ok(())
}
