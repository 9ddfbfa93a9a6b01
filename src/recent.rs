//! Interface-level contract shared between `messages::*` and `state::client`.
//!
//! Messages refer to client state (to read peers/groups/tokens) and client
//! state refers back to messages (for its recent-message logs). This trait
//! breaks that cycle, per spec.md §9's "cyclic coupling" note: state
//! components depend only on this small seam, not on any concrete message
//! type.

use std::any::Any;
use std::fmt;

use crate::fields::Token;

pub trait RecentMessage: fmt::Debug + Send + Sync {
    fn msg_type(&self) -> &'static str;
    fn token(&self) -> &Token;
    fn info(&self, verbose: bool) -> String;
    fn as_any(&self) -> &dyn Any;
}
