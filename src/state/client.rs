//! Client state (C5): identity, peers, follow graph, groups, recent-message
//! logs, revocation. Protected by a single mutex; every public operation
//! acquires it for the duration of the call and releases it before any I/O.
//!
//! Grounded on `original_source/states/client_state.py` (peers/follow graph)
//! extended with groups/recent-logs/revocation per spec.md §4.5, which the
//! original does not implement.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::LsnpError;
use crate::fields::{Timestamp, Token, UserId};
use crate::recent::RecentMessage;

#[derive(Debug, Clone)]
pub struct Group {
    pub group_id: String,
    pub group_name: String,
    pub members: HashSet<UserId>,
}

#[derive(Default)]
struct Inner {
    user_id: Option<UserId>,
    peers: HashSet<UserId>,
    display_names: HashMap<UserId, String>,
    followers: HashSet<UserId>,
    following: HashSet<UserId>,
    groups: HashMap<String, Group>,
    known_group_ids: HashSet<String>,
    sent: Vec<Box<dyn RecentMessage>>,
    received: Vec<Box<dyn RecentMessage>>,
    revoked: HashSet<Token>,
}

#[derive(Default)]
pub struct ClientState {
    inner: Mutex<Inner>,
}

impl ClientState {
    pub fn new() -> Self {
        ClientState::default()
    }

    pub fn set_user_id(&self, user_id: UserId) {
        tracing::info!(%user_id, "set local user id");
        self.inner.lock().unwrap().user_id = Some(user_id);
    }

    pub fn get_user_id(&self) -> Option<UserId> {
        self.inner.lock().unwrap().user_id.clone()
    }

    /// Returns whether the peer was newly added (idempotent set semantics).
    pub fn add_peer(&self, peer: UserId) -> bool {
        let mut g = self.inner.lock().unwrap();
        let added = g.peers.insert(peer.clone());
        if added {
            tracing::info!(%peer, "added peer");
        }
        added
    }

    pub fn remove_peer(&self, peer: &UserId) {
        let mut g = self.inner.lock().unwrap();
        if g.peers.remove(peer) {
            tracing::info!(%peer, "removed peer");
        }
    }

    pub fn get_peers(&self) -> Vec<UserId> {
        self.inner.lock().unwrap().peers.iter().cloned().collect()
    }

    /// An empty `name` removes the display-name mapping.
    pub fn update_peer_display_name(&self, peer: UserId, name: &str) {
        let mut g = self.inner.lock().unwrap();
        if name.is_empty() {
            g.display_names.remove(&peer);
        } else {
            g.peers.insert(peer.clone());
            g.display_names.insert(peer, name.to_string());
        }
    }

    pub fn get_peer_display_name(&self, peer: &UserId) -> String {
        self.inner
            .lock()
            .unwrap()
            .display_names
            .get(peer)
            .cloned()
            .unwrap_or_default()
    }

    pub fn add_follower(&self, follower: UserId) {
        let mut g = self.inner.lock().unwrap();
        g.peers.insert(follower.clone());
        if g.followers.insert(follower.clone()) {
            tracing::info!(%follower, "added follower");
        }
    }

    pub fn remove_follower(&self, follower: &UserId) {
        self.inner.lock().unwrap().followers.remove(follower);
    }

    pub fn get_followers(&self) -> Vec<UserId> {
        self.inner.lock().unwrap().followers.iter().cloned().collect()
    }

    pub fn add_following(&self, target: UserId) {
        let mut g = self.inner.lock().unwrap();
        g.peers.insert(target.clone());
        if g.following.insert(target.clone()) {
            tracing::info!(%target, "now following");
        }
    }

    pub fn remove_following(&self, target: &UserId) {
        self.inner.lock().unwrap().following.remove(target);
    }

    pub fn get_following(&self) -> Vec<UserId> {
        self.inner.lock().unwrap().following.iter().cloned().collect()
    }

    pub fn is_following(&self, target: &UserId) -> bool {
        self.inner.lock().unwrap().following.contains(target)
    }

    /// Installs a full group (the local user is a member). Duplicate
    /// `group_id`s, whether already a full group or only known, are dropped.
    pub fn create_group(
        &self,
        group_id: String,
        group_name: String,
        members: HashSet<UserId>,
    ) -> Result<(), LsnpError> {
        let mut g = self.inner.lock().unwrap();
        if g.groups.contains_key(&group_id) || g.known_group_ids.contains(&group_id) {
            return Err(LsnpError::DuplicateGroup(group_id));
        }
        g.known_group_ids.insert(group_id.clone());
        g.groups.insert(
            group_id.clone(),
            Group {
                group_id,
                group_name,
                members,
            },
        );
        Ok(())
    }

    /// Records only the `group_id` of a group this process is not a member of.
    pub fn note_group_id(&self, group_id: String) -> Result<(), LsnpError> {
        let mut g = self.inner.lock().unwrap();
        if g.groups.contains_key(&group_id) || g.known_group_ids.contains(&group_id) {
            return Err(LsnpError::DuplicateGroup(group_id));
        }
        g.known_group_ids.insert(group_id);
        Ok(())
    }

    pub fn remove_group(&self, group_id: &str) {
        let mut g = self.inner.lock().unwrap();
        g.groups.remove(group_id);
        g.known_group_ids.remove(group_id);
    }

    pub fn get_group(&self, group_id: &str) -> Option<Group> {
        self.inner.lock().unwrap().groups.get(group_id).cloned()
    }

    pub fn add_group_member(&self, group_id: &str, user: UserId) {
        let mut g = self.inner.lock().unwrap();
        if let Some(group) = g.groups.get_mut(group_id) {
            group.members.insert(user);
        }
    }

    pub fn remove_group_member(&self, group_id: &str, user: &UserId) {
        let mut g = self.inner.lock().unwrap();
        if let Some(group) = g.groups.get_mut(group_id) {
            group.members.remove(user);
        }
    }

    pub fn is_group_member(&self, group_id: &str, user: &UserId) -> bool {
        self.inner
            .lock()
            .unwrap()
            .groups
            .get(group_id)
            .map(|g| g.members.contains(user))
            .unwrap_or(false)
    }

    pub fn get_group_members(&self, group_id: &str) -> Vec<UserId> {
        self.inner
            .lock()
            .unwrap()
            .groups
            .get(group_id)
            .map(|g| g.members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_group_ids(&self) -> Vec<String> {
        let g = self.inner.lock().unwrap();
        g.groups
            .keys()
            .cloned()
            .chain(g.known_group_ids.iter().cloned())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect()
    }

    /// A received message whose token is already revoked is silently dropped.
    pub fn add_recent_message_received(&self, message: Box<dyn RecentMessage>) {
        let mut g = self.inner.lock().unwrap();
        if g.revoked.contains(message.token()) {
            return;
        }
        g.received.push(message);
    }

    pub fn add_recent_message_sent(&self, message: Box<dyn RecentMessage>) {
        self.inner.lock().unwrap().sent.push(message);
    }

    /// Runs `f` against the sent log while holding the lock; used for
    /// read-only inspection (including downcasting via `RecentMessage::as_any`).
    pub fn with_sent<R>(&self, f: impl FnOnce(&[Box<dyn RecentMessage>]) -> R) -> R {
        let g = self.inner.lock().unwrap();
        f(&g.sent)
    }

    pub fn with_received<R>(&self, f: impl FnOnce(&[Box<dyn RecentMessage>]) -> R) -> R {
        let g = self.inner.lock().unwrap();
        f(&g.received)
    }

    /// Looks up a previously sent POST by its effective post timestamp (see
    /// `messages::post` for why this isn't a wire field).
    pub fn get_post_message(&self, ts: Timestamp) -> Option<String> {
        use crate::messages::post::Post;
        self.with_sent(|sent| {
            sent.iter()
                .filter_map(|m| m.as_any().downcast_ref::<Post>())
                .find(|p| p.posted_at() == ts)
                .map(|p| p.content.clone())
        })
    }

    /// Scans recent stores for an ACK with the given correlation id. ACK
    /// carries no bearer token so it is never stored as a `RecentMessage`;
    /// real ACK correlation happens through `transport::reliable`'s
    /// in-flight completion table instead (see DESIGN.md).
    pub fn get_ack_message(&self, _message_id: &str) -> Option<String> {
        None
    }

    /// Removes expired entries from both stores and returns them, so other
    /// components (file-transfer cleanup) can react.
    pub fn cleanup_expired_messages(&self) -> Vec<Box<dyn RecentMessage>> {
        let mut g = self.inner.lock().unwrap();
        let mut expired = Vec::new();
        drain_expired(&mut g.sent, &mut expired);
        drain_expired(&mut g.received, &mut expired);
        expired
    }

    /// Adds to the revoked set and drops any matching recent received message.
    pub fn revoke_token(&self, token: Token) {
        let mut g = self.inner.lock().unwrap();
        g.received.retain(|m| m.token() != &token);
        g.revoked.insert(token);
    }

    pub fn is_revoked(&self, token: &Token) -> bool {
        self.inner.lock().unwrap().revoked.contains(token)
    }
}

fn drain_expired(v: &mut Vec<Box<dyn RecentMessage>>, out: &mut Vec<Box<dyn RecentMessage>>) {
    let mut i = 0;
    while i < v.len() {
        if v[i].token().is_expired() {
            out.push(v.remove(i));
        } else {
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> UserId {
        format!("{name}@10.0.0.1").parse().unwrap()
    }

    #[test]
    fn adding_the_same_peer_twice_is_idempotent() {
        let state = ClientState::new();
        assert!(state.add_peer(user("alice")));
        assert!(!state.add_peer(user("alice")));
        assert_eq!(state.get_peers().len(), 1);
    }

    #[test]
    fn display_name_is_removed_by_empty_string() {
        let state = ClientState::new();
        let alice = user("alice");
        state.update_peer_display_name(alice.clone(), "Alice");
        assert_eq!(state.get_peer_display_name(&alice), "Alice");
        state.update_peer_display_name(alice.clone(), "");
        assert_eq!(state.get_peer_display_name(&alice), "");
    }

    #[test]
    fn duplicate_group_id_is_rejected() {
        let state = ClientState::new();
        state
            .create_group("g1".into(), "Friends".into(), HashSet::new())
            .unwrap();
        assert!(state
            .create_group("g1".into(), "Friends2".into(), HashSet::new())
            .is_err());
    }

    #[test]
    fn follower_and_following_are_independent() {
        let state = ClientState::new();
        let bob = user("bob");
        state.add_follower(bob.clone());
        assert!(!state.is_following(&bob));
        assert_eq!(state.get_followers(), vec![bob]);
    }
}
