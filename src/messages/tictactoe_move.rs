//! TICTACTOE_MOVE (C11.16): plays a cell, scope `game`. Applied locally
//! before the reliable send so the board only advances once, then undone if
//! the send never gets acknowledged. Grounded on
//! `original_source/messages/tictactoe_move.py`.

use std::any::Any;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::codec::Frame;
use crate::context::Context;
use crate::error::LsnpError;
use crate::fields::{MessageId, Scope, Token, Ttl, UserId};
use crate::messages::ack::Ack;
use crate::messages::tictactoe_result;
use crate::recent::RecentMessage;
use crate::registry::MessageDescriptor;
use crate::router::{self, Sendable};
use crate::schema::{required, FieldKind, Schema};
use crate::state::game::Symbol;
use crate::transport::reliable;

pub const TYPE: &str = "TICTACTOE_MOVE";

pub const SCHEMA: Schema = Schema {
    msg_type: TYPE,
    fields: &[
        ("FROM", required(FieldKind::UserId)),
        ("TO", required(FieldKind::UserId)),
        ("GAMEID", required(FieldKind::Str)),
        ("MESSAGE_ID", required(FieldKind::MessageId)),
        ("POSITION", required(FieldKind::Int)),
        ("SYMBOL", required(FieldKind::Str)),
        ("TURN", required(FieldKind::Int)),
        ("TOKEN", required(FieldKind::Token)),
    ],
};

#[derive(Debug, Clone)]
pub struct TicTacToeMove {
    pub from: UserId,
    pub to: UserId,
    pub gameid: String,
    pub message_id: MessageId,
    pub position: usize,
    pub symbol: Symbol,
    pub turn: u32,
    pub token: Token,
}

impl Sendable for TicTacToeMove {
    fn msg_type(&self) -> &'static str {
        TYPE
    }

    fn payload(&self) -> Vec<(&'static str, String)> {
        vec![
            ("TYPE", TYPE.to_string()),
            ("FROM", self.from.to_string()),
            ("TO", self.to.to_string()),
            ("GAMEID", self.gameid.clone()),
            ("MESSAGE_ID", self.message_id.to_string()),
            ("POSITION", self.position.to_string()),
            ("SYMBOL", self.symbol.to_string()),
            ("TURN", self.turn.to_string()),
            ("TOKEN", self.token.to_string()),
        ]
    }
}

impl RecentMessage for TicTacToeMove {
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
            format!("{} played {} at {} in game {}", self.from, self.symbol, self.position, self.gameid)
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

/// Applies the move optimistically, sends reliably, and rolls the local
/// board back if the opponent never acknowledges it. On success, checks
/// for a completed game and announces the result.
pub async fn send_move(
    ctx: &Context,
    socket: &UdpSocket,
    to: UserId,
    gameid: String,
    position: usize,
    ttl: Ttl,
) -> Result<(), LsnpError> {
    let from = ctx.client.get_user_id().ok_or(LsnpError::SocketUninitialized)?;
    let symbol = ctx
        .games
        .get_player_symbol(&gameid, &from)
        .ok_or_else(|| LsnpError::GameNotFound(gameid.clone()))?;

    ctx.games.apply_move(&gameid, &from, position)?;
    let turn = ctx.games.get_turn(&gameid).unwrap_or(1);

    let message_id = MessageId::generate();
    let token = Token::new(from.clone(), crate::fields::Timestamp::now().plus_ttl(ttl), Scope::Game);
    let mv = TicTacToeMove {
        from,
        to: to.clone(),
        gameid: gameid.clone(),
        message_id: message_id.clone(),
        position,
        symbol,
        turn,
        token,
    };
    let addr = SocketAddr::new(to.ip(), ctx.config.port);

    match reliable::send_reliable(socket, &ctx.ack_table, &mv, addr, mv.message_id.as_str()).await {
        Ok(()) => {
            ctx.client.add_recent_message_sent(Box::new(mv));
            tictactoe_result::maybe_announce_result(ctx, socket, &gameid, to, symbol, turn, ttl).await
        }
        Err(err) => {
            let _ = ctx.games.undo(&gameid);
            Err(err)
        }
    }
}

/// Auto-ACKs, applies the move (which itself validates turn parity and cell
/// occupancy), and announces the result if the board is now terminal.
pub async fn handle_receive(
    ctx: &Context,
    socket: &UdpSocket,
    frame: &Frame,
    from: SocketAddr,
) -> Result<(), LsnpError> {
    let from_id: UserId = frame["FROM"].parse()?;
    let to: UserId = frame["TO"].parse()?;
    let gameid = frame["GAMEID"].clone();
    let message_id: MessageId = frame["MESSAGE_ID"].parse()?;
    let position: usize = frame["POSITION"].parse().map_err(|_| LsnpError::SchemaError {
        field: "POSITION".to_string(),
    })?;
    let symbol: Symbol = frame["SYMBOL"].parse()?;
    let turn: u32 = frame["TURN"].parse().map_err(|_| LsnpError::SchemaError {
        field: "TURN".to_string(),
    })?;
    let token: Token = frame["TOKEN"].parse()?;

    token.validate(&from_id, Scope::Game)?;
    if ctx.client.is_revoked(&token) {
        return Err(LsnpError::RevokedToken);
    }
    let local = ctx.client.get_user_id().ok_or(LsnpError::SocketUninitialized)?;
    if to != local {
        return Err(LsnpError::NotForMe);
    }

    ctx.games.apply_move(&gameid, &from_id, position)?;

    let ack = Ack::new(message_id.to_string(), "RECEIVED");
    router::send_message(socket, &ack, from).await?;

    let mv = TicTacToeMove {
        from: from_id.clone(),
        to,
        gameid: gameid.clone(),
        message_id,
        position,
        symbol,
        turn,
        token,
    };
    tracing::info!(mv = %mv.info(false), "received game move");
    ctx.client.add_recent_message_received(Box::new(mv));

    let default_ttl = crate::fields::Ttl::new(3600)?;
    tictactoe_result::maybe_announce_result(ctx, socket, &gameid, from_id, symbol, turn, default_ttl).await
}
