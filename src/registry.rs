//! Message registry (C4): static TYPE→descriptor table, built once.
//!
//! Replaces the original's `importlib`/`pkgutil` directory scan with a
//! compile-time table, per the REDESIGN FLAG in spec.md §9 ("Registry by
//! enumeration or discovery").

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::fields::Scope;
use crate::schema::Schema;

pub struct MessageDescriptor {
    pub type_name: &'static str,
    pub hidden: bool,
    pub scope: Option<Scope>,
    pub schema: Schema,
}

static REGISTRY: OnceLock<HashMap<&'static str, MessageDescriptor>> = OnceLock::new();

fn descriptors() -> Vec<MessageDescriptor> {
    vec![
        crate::messages::ping::descriptor(),
        crate::messages::profile::descriptor(),
        crate::messages::dm::descriptor(),
        crate::messages::post::descriptor(),
        crate::messages::like::descriptor(),
        crate::messages::follow::follow_descriptor(),
        crate::messages::follow::unfollow_descriptor(),
        crate::messages::ack::descriptor(),
        crate::messages::revoke::descriptor(),
        crate::messages::file_offer::descriptor(),
        crate::messages::file_chunk::descriptor(),
        crate::messages::file_received::descriptor(),
        crate::messages::group_create::descriptor(),
        crate::messages::group_update::descriptor(),
        crate::messages::group_message::descriptor(),
        crate::messages::tictactoe_invite::descriptor(),
        crate::messages::tictactoe_move::descriptor(),
        crate::messages::tictactoe_result::descriptor(),
    ]
}

fn build_registry() -> HashMap<&'static str, MessageDescriptor> {
    let mut map = HashMap::new();
    for descriptor in descriptors() {
        if map.insert(descriptor.type_name, descriptor).is_some() {
            panic!("duplicate message type registered twice");
        }
    }
    map
}

pub fn registry() -> &'static HashMap<&'static str, MessageDescriptor> {
    REGISTRY.get_or_init(build_registry)
}

pub fn lookup(type_name: &str) -> Option<&'static MessageDescriptor> {
    registry().get(type_name)
}

/// User-visible commands, excluding `hidden` handlers (e.g. FILE_CHUNK, ACK).
pub fn visible_commands() -> Vec<&'static MessageDescriptor> {
    let mut v: Vec<_> = registry().values().filter(|d| !d.hidden).collect();
    v.sort_by_key(|d| d.type_name);
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_is_registered_with_matching_schema_type() {
        let ping = lookup("PING").expect("PING must be registered");
        assert_eq!(ping.schema.msg_type, "PING");
    }

    #[test]
    fn visible_commands_exclude_hidden_handlers() {
        assert!(!visible_commands().iter().any(|d| d.type_name == "FILE_CHUNK"));
        assert!(!visible_commands().iter().any(|d| d.type_name == "ACK"));
    }
}
