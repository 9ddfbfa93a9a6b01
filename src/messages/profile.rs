//! PROFILE (C11.2): advertises a display name and status line for a peer.
//! Grounded on `original_source/messages/profile.py`.

use crate::codec::Frame;
use crate::context::Context;
use crate::error::LsnpError;
use crate::fields::UserId;
use crate::registry::MessageDescriptor;
use crate::router::Sendable;
use crate::schema::{required, FieldKind, Schema};

pub const TYPE: &str = "PROFILE";

pub const SCHEMA: Schema = Schema {
    msg_type: TYPE,
    fields: &[
        ("USER_ID", required(FieldKind::UserId)),
        ("DISPLAY_NAME", required(FieldKind::Str)),
        ("STATUS", required(FieldKind::Str)),
    ],
};

#[derive(Debug, Clone)]
pub struct Profile {
    pub user_id: UserId,
    pub display_name: String,
    pub status: String,
}

impl Profile {
    pub fn new(user_id: UserId, display_name: String, status: String) -> Self {
        Profile {
            user_id,
            display_name,
            status,
        }
    }
}

impl Sendable for Profile {
    fn msg_type(&self) -> &'static str {
        TYPE
    }

    fn payload(&self) -> Vec<(&'static str, String)> {
        vec![
            ("TYPE", TYPE.to_string()),
            ("USER_ID", self.user_id.to_string()),
            ("DISPLAY_NAME", self.display_name.clone()),
            ("STATUS", self.status.clone()),
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
    let user_id: UserId = frame["USER_ID"].parse()?;
    let display_name = frame["DISPLAY_NAME"].clone();
    ctx.client.add_peer(user_id.clone());
    ctx.client.update_peer_display_name(user_id, &display_name);
    Ok(())
}
