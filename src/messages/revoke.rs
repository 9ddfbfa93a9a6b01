//! REVOKE (C11.8): invalidates a previously issued token ahead of its
//! natural expiry. Grounded on `original_source/messages/revoke.py`.

use crate::codec::Frame;
use crate::context::Context;
use crate::error::LsnpError;
use crate::fields::Token;
use crate::registry::MessageDescriptor;
use crate::router::Sendable;
use crate::schema::{required, FieldKind, Schema};

pub const TYPE: &str = "REVOKE";

pub const SCHEMA: Schema = Schema {
    msg_type: TYPE,
    fields: &[("TOKEN", required(FieldKind::Token))],
};

#[derive(Debug, Clone)]
pub struct Revoke {
    pub token: Token,
}

impl Revoke {
    pub fn new(token: Token) -> Self {
        Revoke { token }
    }
}

impl Sendable for Revoke {
    fn msg_type(&self) -> &'static str {
        TYPE
    }

    fn payload(&self) -> Vec<(&'static str, String)> {
        vec![("TYPE", TYPE.to_string()), ("TOKEN", self.token.to_string())]
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

/// Revocation is unauthenticated by design (the token itself is the only
/// credential LSNP has); anyone who learned the token can revoke it.
pub async fn handle_receive(ctx: &Context, frame: &Frame) -> Result<(), LsnpError> {
    let token: Token = frame["TOKEN"].parse()?;
    tracing::info!(user = %token.user_id, scope = %token.scope, "revoking token");
    ctx.client.revoke_token(token);
    Ok(())
}
