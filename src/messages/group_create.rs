//! GROUP_CREATE (C11.12): announces a new group, scope `group`. Grounded on
//! `original_source/messages/group_create.py`.

use std::any::Any;
use std::collections::HashSet;

use crate::codec::Frame;
use crate::context::Context;
use crate::error::LsnpError;
use crate::fields::{Scope, Timestamp, Token, Ttl, UserId};
use crate::recent::RecentMessage;
use crate::registry::MessageDescriptor;
use crate::router::Sendable;
use crate::schema::{required, FieldKind, Schema};

pub const TYPE: &str = "GROUP_CREATE";

pub const SCHEMA: Schema = Schema {
    msg_type: TYPE,
    fields: &[
        ("FROM", required(FieldKind::UserId)),
        ("GROUP_ID", required(FieldKind::Str)),
        ("GROUP_NAME", required(FieldKind::Str)),
        ("MEMBERS", required(FieldKind::Str)),
        ("TIMESTAMP", required(FieldKind::Timestamp)),
        ("TOKEN", required(FieldKind::Token)),
    ],
};

#[derive(Debug, Clone)]
pub struct GroupCreate {
    pub from: UserId,
    pub group_id: String,
    pub group_name: String,
    pub members: HashSet<UserId>,
    pub timestamp: Timestamp,
    pub token: Token,
}

impl GroupCreate {
    pub fn new(
        ctx: &Context,
        group_id: String,
        group_name: String,
        members: HashSet<UserId>,
        ttl: Ttl,
    ) -> Result<Self, LsnpError> {
        let from = ctx.client.get_user_id().ok_or(LsnpError::SocketUninitialized)?;
        let timestamp = Timestamp::now();
        let token = Token::new(from.clone(), timestamp.plus_ttl(ttl), Scope::Group);
        ctx.client.create_group(group_id.clone(), group_name.clone(), members.clone())?;
        Ok(GroupCreate {
            from,
            group_id,
            group_name,
            members,
            timestamp,
            token,
        })
    }

    /// The union of the declared membership, the sender, and every peer
    /// already known locally — so a member who hasn't been seen on the wire
    /// yet still gets the announcement once they show up, and existing
    /// peers outside the group still learn its id exists.
    pub fn recipients(&self, ctx: &Context) -> HashSet<UserId> {
        let mut set: HashSet<UserId> = self.members.clone();
        set.insert(self.from.clone());
        set.extend(ctx.client.get_peers());
        set
    }
}

pub fn members_to_wire(members: &HashSet<UserId>) -> String {
    members.iter().map(|u| u.to_string()).collect::<Vec<_>>().join(",")
}

pub fn parse_members(raw: &str) -> Result<HashSet<UserId>, LsnpError> {
    raw.split(',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse())
        .collect()
}

impl Sendable for GroupCreate {
    fn msg_type(&self) -> &'static str {
        TYPE
    }

    fn payload(&self) -> Vec<(&'static str, String)> {
        vec![
            ("TYPE", TYPE.to_string()),
            ("FROM", self.from.to_string()),
            ("GROUP_ID", self.group_id.clone()),
            ("GROUP_NAME", self.group_name.clone()),
            ("MEMBERS", members_to_wire(&self.members)),
            ("TIMESTAMP", self.timestamp.to_string()),
            ("TOKEN", self.token.to_string()),
        ]
    }
}

impl RecentMessage for GroupCreate {
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
            format!("{} created group {} ({})", self.from, self.group_name, self.group_id)
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

/// Installs the full group if the local user is a declared member;
/// otherwise only records that the group id exists, per
/// `ClientState::note_group_id`.
pub async fn handle_receive(ctx: &Context, frame: &Frame) -> Result<(), LsnpError> {
    let from: UserId = frame["FROM"].parse()?;
    let group_id = frame["GROUP_ID"].clone();
    let group_name = frame["GROUP_NAME"].clone();
    let members = parse_members(&frame["MEMBERS"])?;
    let timestamp: Timestamp = frame["TIMESTAMP"].parse()?;
    let token: Token = frame["TOKEN"].parse()?;

    token.validate(&from, Scope::Group)?;
    if ctx.client.is_revoked(&token) {
        return Err(LsnpError::RevokedToken);
    }
    ctx.client.add_peer(from.clone());

    let local = ctx.client.get_user_id().ok_or(LsnpError::SocketUninitialized)?;
    if members.contains(&local) {
        ctx.client.create_group(group_id.clone(), group_name.clone(), members.clone())?;
    } else {
        ctx.client.note_group_id(group_id.clone())?;
    }

    let create = GroupCreate {
        from,
        group_id,
        group_name,
        members,
        timestamp,
        token,
    };
    ctx.client.add_recent_message_received(Box::new(create));
    Ok(())
}
