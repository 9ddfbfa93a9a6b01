//! Core value types: UserID, Timestamp, TTL, MessageID, Token and Scope.
//!
//! Wire forms are fixed by spec.md §3 and §6; the exact validation edge
//! cases (timestamp range, token split count, message id generation) follow
//! `original_source/custom_types/fields.py` and `token.py`.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use rand::RngCore;

use crate::error::LsnpError;

/// Strictly positive number of seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ttl(u64);

impl Ttl {
    pub fn new(seconds: u64) -> Result<Self, LsnpError> {
        if seconds == 0 {
            return Err(LsnpError::InvalidUserInput(
                "TTL must be a positive number of seconds".into(),
            ));
        }
        Ok(Ttl(seconds))
    }

    pub fn seconds(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Ttl {
    type Err = LsnpError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n: u64 = s
            .parse()
            .map_err(|_| LsnpError::InvalidUserInput(format!("invalid TTL: {s:?}")))?;
        Ttl::new(n)
    }
}

/// Seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Rejects values that don't round-trip through a valid UTC civil time,
    /// guarding against silently accepting garbage that happens to parse as
    /// an integer.
    pub fn new(unix_seconds: u64) -> Result<Self, LsnpError> {
        chrono::DateTime::from_timestamp(unix_seconds as i64, 0).ok_or_else(|| {
            LsnpError::InvalidUserInput(format!("timestamp out of range: {unix_seconds}"))
        })?;
        Ok(Timestamp(unix_seconds))
    }

    pub fn now() -> Self {
        Timestamp(chrono::Utc::now().timestamp().max(0) as u64)
    }

    pub fn unix_seconds(self) -> u64 {
        self.0
    }

    pub fn plus_ttl(self, ttl: Ttl) -> Timestamp {
        Timestamp(self.0.saturating_add(ttl.seconds()))
    }

    pub fn minus_ttl(self, ttl: Ttl) -> Timestamp {
        Timestamp(self.0.saturating_sub(ttl.seconds()))
    }

    pub fn is_expired(self) -> bool {
        self < Timestamp::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Timestamp {
    type Err = LsnpError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n: u64 = s
            .parse()
            .map_err(|_| LsnpError::InvalidUserInput(format!("invalid timestamp: {s:?}")))?;
        Timestamp::new(n)
    }
}

/// 16 lowercase hex characters (64 random bits), matching `secrets.randbits(64)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    pub fn generate() -> Self {
        let bits: u64 = rand::thread_rng().next_u64();
        MessageId(format!("{bits:016x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = LsnpError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s.len() == 16 && s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase());
        if !valid {
            return Err(LsnpError::InvalidUserInput(format!(
                "message id must be 16 lowercase hex characters: {s:?}"
            )));
        }
        Ok(MessageId(s.to_string()))
    }
}

/// Non-empty printable username plus an IPv4/IPv6 address. Wire form `name@ip`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId {
    username: String,
    ip: IpAddr,
}

impl UserId {
    pub fn new(username: impl Into<String>, ip: IpAddr) -> Result<Self, LsnpError> {
        let username = username.into();
        if username.is_empty() || !username.chars().all(|c| c.is_ascii_graphic()) {
            return Err(LsnpError::InvalidUserInput(format!(
                "invalid username: {username:?}"
            )));
        }
        Ok(UserId { username, ip })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.username, self.ip)
    }
}

impl FromStr for UserId {
    type Err = LsnpError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, ip) = s
            .split_once('@')
            .ok_or_else(|| LsnpError::InvalidUserInput(format!("malformed user id: {s:?}")))?;
        if ip.is_empty() {
            return Err(LsnpError::InvalidUserInput(format!(
                "malformed user id: {s:?}"
            )));
        }
        let ip: IpAddr = ip
            .parse()
            .map_err(|_| LsnpError::InvalidUserInput(format!("invalid ip in user id: {s:?}")))?;
        UserId::new(name, ip)
    }
}

/// Permitted domain of use for a token, enforced at receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Chat,
    File,
    Broadcast,
    Follow,
    Game,
    Group,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scope::Chat => "chat",
            Scope::File => "file",
            Scope::Broadcast => "broadcast",
            Scope::Follow => "follow",
            Scope::Game => "game",
            Scope::Group => "group",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Scope {
    type Err = LsnpError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(Scope::Chat),
            "file" => Ok(Scope::File),
            "broadcast" => Ok(Scope::Broadcast),
            "follow" => Ok(Scope::Follow),
            "game" => Ok(Scope::Game),
            "group" => Ok(Scope::Group),
            other => Err(LsnpError::InvalidUserInput(format!(
                "unknown scope: {other:?}"
            ))),
        }
    }
}

/// Bearer credential `(user_id, valid_until, scope)`. Not a security boundary:
/// anyone on the segment can mint a token for an arbitrary UserID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub user_id: UserId,
    pub valid_until: Timestamp,
    pub scope: Scope,
}

impl Token {
    pub fn new(user_id: UserId, valid_until: Timestamp, scope: Scope) -> Self {
        Token {
            user_id,
            valid_until,
            scope,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.valid_until.is_expired()
    }

    /// Checks owner identity, expiry and scope against what the carrying
    /// message expects.
    pub fn validate(&self, expected_user: &UserId, expected_scope: Scope) -> Result<(), LsnpError> {
        if &self.user_id != expected_user {
            return Err(LsnpError::OwnerMismatch);
        }
        if self.is_expired() {
            return Err(LsnpError::TokenExpired);
        }
        if self.scope != expected_scope {
            return Err(LsnpError::ScopeMismatch {
                expected: expected_scope,
                got: self.scope,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}",
            self.user_id,
            self.valid_until.unix_seconds(),
            self.scope
        )
    }
}

impl FromStr for Token {
    type Err = LsnpError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('|').collect();
        let [user, valid_until, scope]: [&str; 3] = parts
            .try_into()
            .map_err(|_| LsnpError::InvalidUserInput(format!("malformed token: {s:?}")))?;
        Ok(Token {
            user_id: user.parse()?,
            valid_until: valid_until.parse()?,
            scope: scope.parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_parses_username_and_ip() {
        let u: UserId = "alice@192.168.1.11".parse().unwrap();
        assert_eq!(u.username(), "alice");
        assert_eq!(u.to_string(), "alice@192.168.1.11");
    }

    #[test]
    fn user_id_rejects_malformed_forms() {
        assert!("@192.168.1.11".parse::<UserId>().is_err());
        assert!("alice@".parse::<UserId>().is_err());
        assert!("alice".parse::<UserId>().is_err());
    }

    #[test]
    fn message_id_generate_matches_shape() {
        let id = MessageId::generate();
        assert_eq!(id.as_str().len(), 16);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn message_id_rejects_uppercase_and_wrong_length() {
        assert!("ABCDEF0123456789".parse::<MessageId>().is_err());
        assert!("abc123".parse::<MessageId>().is_err());
    }

    #[test]
    fn token_round_trips_through_display_and_parse() {
        let t: Token = "alice@10.0.0.1|1700000000|chat".parse().unwrap();
        assert_eq!(t.scope, Scope::Chat);
        assert_eq!(t.to_string(), "alice@10.0.0.1|1700000000|chat");
    }

    #[test]
    fn token_rejects_unknown_scope() {
        assert!("alice@10.0.0.1|1700000000|bogus".parse::<Token>().is_err());
    }

    #[test]
    fn token_expiry_relative_to_wall_clock() {
        let t = Token::new(
            "alice@10.0.0.1".parse().unwrap(),
            Timestamp::new(1).unwrap(),
            Scope::Chat,
        );
        assert!(t.is_expired());
    }
}
