//! PING (C11.1): presence announcement. Carries no token — it is not stored
//! as a `RecentMessage` and is hidden from the visible command list, since
//! it is only ever emitted by the presence loop in `transport`.

use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::codec::Frame;
use crate::context::Context;
use crate::error::LsnpError;
use crate::fields::UserId;
use crate::registry::MessageDescriptor;
use crate::router::{self, Sendable};
use crate::schema::{required, FieldKind, Schema};

pub const TYPE: &str = "PING";

pub const SCHEMA: Schema = Schema {
    msg_type: TYPE,
    fields: &[("USER_ID", required(FieldKind::UserId))],
};

#[derive(Debug, Clone)]
pub struct Ping {
    pub user_id: UserId,
}

impl Ping {
    pub fn new(user_id: UserId) -> Self {
        Ping { user_id }
    }
}

impl Sendable for Ping {
    fn msg_type(&self) -> &'static str {
        TYPE
    }

    fn payload(&self) -> Vec<(&'static str, String)> {
        vec![("TYPE", TYPE.to_string()), ("USER_ID", self.user_id.to_string())]
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

/// Records the sender as a peer. A previously unknown peer gets an
/// unsolicited PING back, so a late joiner is discovered by everyone
/// already on the segment without waiting for the next presence tick.
pub async fn handle_receive(
    ctx: &Context,
    socket: &UdpSocket,
    frame: &Frame,
    from: SocketAddr,
) -> Result<(), LsnpError> {
    let user_id: UserId = frame["USER_ID"].parse()?;
    let is_new = ctx.client.add_peer(user_id);

    if is_new {
        if let Some(local_id) = ctx.client.get_user_id() {
            let reply = Ping::new(local_id);
            router::send_message(socket, &reply, from).await?;
        }
    }
    Ok(())
}
