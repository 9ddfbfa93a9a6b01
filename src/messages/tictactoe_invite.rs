//! TICTACTOE_INVITE (C11.15): proposes a game, scope `game`. Sent reliably;
//! on exhausted retries the optimistically created game session is torn
//! down again. Grounded on `original_source/messages/tictactoe_invite.py`.

use std::any::Any;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::codec::Frame;
use crate::context::Context;
use crate::error::LsnpError;
use crate::fields::{MessageId, Scope, Timestamp, Token, Ttl, UserId};
use crate::messages::ack::Ack;
use crate::recent::RecentMessage;
use crate::registry::MessageDescriptor;
use crate::router::{self, Sendable};
use crate::schema::{required, FieldKind, Schema};
use crate::state::game::Symbol;
use crate::transport::reliable;

pub const TYPE: &str = "TICTACTOE_INVITE";

pub const SCHEMA: Schema = Schema {
    msg_type: TYPE,
    fields: &[
        ("FROM", required(FieldKind::UserId)),
        ("TO", required(FieldKind::UserId)),
        ("GAMEID", required(FieldKind::Str)),
        ("SYMBOL", required(FieldKind::Str)),
        ("MESSAGE_ID", required(FieldKind::MessageId)),
        ("TIMESTAMP", required(FieldKind::Timestamp)),
        ("TOKEN", required(FieldKind::Token)),
    ],
};

#[derive(Debug, Clone)]
pub struct TicTacToeInvite {
    pub from: UserId,
    pub to: UserId,
    pub gameid: String,
    pub symbol: Symbol,
    pub message_id: MessageId,
    pub timestamp: Timestamp,
    pub token: Token,
}

impl Sendable for TicTacToeInvite {
    fn msg_type(&self) -> &'static str {
        TYPE
    }

    fn payload(&self) -> Vec<(&'static str, String)> {
        vec![
            ("TYPE", TYPE.to_string()),
            ("FROM", self.from.to_string()),
            ("TO", self.to.to_string()),
            ("GAMEID", self.gameid.clone()),
            ("SYMBOL", self.symbol.to_string()),
            ("MESSAGE_ID", self.message_id.to_string()),
            ("TIMESTAMP", self.timestamp.to_string()),
            ("TOKEN", self.token.to_string()),
        ]
    }
}

impl RecentMessage for TicTacToeInvite {
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
            format!("{} invited {} to game {} as {}", self.from, self.to, self.gameid, self.symbol)
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
        scope: Some(Scope::Game),
        schema: SCHEMA,
    }
}

/// Creates the session optimistically (so a move can be queued the instant
/// the invite is accepted) and tears it down again if the invite is never
/// acknowledged.
pub async fn send_invite(
    ctx: &Context,
    socket: &UdpSocket,
    to: UserId,
    gameid: String,
    symbol: Symbol,
    ttl: Ttl,
) -> Result<(), LsnpError> {
    let from = ctx.client.get_user_id().ok_or(LsnpError::SocketUninitialized)?;
    let (player_x, player_o) = match symbol {
        Symbol::X => (from.clone(), to.clone()),
        Symbol::O => (to.clone(), from.clone()),
    };
    ctx.games.create_game(gameid.clone(), player_x, player_o);

    let message_id = MessageId::generate();
    let timestamp = Timestamp::now();
    let token = Token::new(from.clone(), timestamp.plus_ttl(ttl), Scope::Game);
    let invite = TicTacToeInvite {
        from,
        to: to.clone(),
        gameid: gameid.clone(),
        symbol,
        message_id: message_id.clone(),
        timestamp,
        token,
    };
    let addr = SocketAddr::new(to.ip(), ctx.config.port);

    match reliable::send_reliable(socket, &ctx.ack_table, &invite, addr, invite.message_id.as_str()).await {
        Ok(()) => {
            ctx.client.add_recent_message_sent(Box::new(invite));
            Ok(())
        }
        Err(err) => {
            ctx.games.delete_game(&gameid);
            Err(err)
        }
    }
}

/// Creates the session with the inviter's declared symbol and ACKs.
pub async fn handle_receive(
    ctx: &Context,
    socket: &UdpSocket,
    frame: &Frame,
    from: SocketAddr,
) -> Result<(), LsnpError> {
    let from_id: UserId = frame["FROM"].parse()?;
    let to: UserId = frame["TO"].parse()?;
    let gameid = frame["GAMEID"].clone();
    let symbol: Symbol = frame["SYMBOL"].parse()?;
    let message_id: MessageId = frame["MESSAGE_ID"].parse()?;
    let timestamp: Timestamp = frame["TIMESTAMP"].parse()?;
    let token: Token = frame["TOKEN"].parse()?;

    token.validate(&from_id, Scope::Game)?;
    if ctx.client.is_revoked(&token) {
        return Err(LsnpError::RevokedToken);
    }
    let local = ctx.client.get_user_id().ok_or(LsnpError::SocketUninitialized)?;
    if to != local {
        return Err(LsnpError::NotForMe);
    }

    ctx.client.add_peer(from_id.clone());
    let (player_x, player_o) = match symbol {
        Symbol::X => (from_id.clone(), to.clone()),
        Symbol::O => (to.clone(), from_id.clone()),
    };
    ctx.games.create_game(gameid.clone(), player_x, player_o);

    let invite = TicTacToeInvite {
        from: from_id,
        to,
        gameid,
        symbol,
        message_id: message_id.clone(),
        timestamp,
        token,
    };
    tracing::info!(invite = %invite.info(false), "received game invite");
    ctx.client.add_recent_message_received(Box::new(invite));

    let ack = Ack::new(message_id.to_string(), "RECEIVED");
    router::send_message(socket, &ack, from).await?;
    Ok(())
}
