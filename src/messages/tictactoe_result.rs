//! TICTACTOE_RESULT (C11.17): finalizes a game, scope `game`. Grounded on
//! `original_source/messages/tictactoe_result.py`.

use std::any::Any;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use tokio::net::UdpSocket;

use crate::codec::Frame;
use crate::context::Context;
use crate::error::LsnpError;
use crate::fields::{MessageId, Scope, Timestamp, Token, Ttl, UserId};
use crate::recent::RecentMessage;
use crate::registry::MessageDescriptor;
use crate::router::{self, Sendable};
use crate::schema::{required, FieldKind, Schema};
use crate::state::game::Symbol;

pub const TYPE: &str = "TICTACTOE_RESULT";

pub const SCHEMA: Schema = Schema {
    msg_type: TYPE,
    fields: &[
        ("FROM", required(FieldKind::UserId)),
        ("TO", required(FieldKind::UserId)),
        ("GAMEID", required(FieldKind::Str)),
        ("MESSAGE_ID", required(FieldKind::MessageId)),
        ("RESULT", required(FieldKind::Str)),
        ("SYMBOL", required(FieldKind::Str)),
        ("WINNING_LINE", required(FieldKind::Str)),
        ("TURN", required(FieldKind::Int)),
        ("TOKEN", required(FieldKind::Token)),
        ("TIMESTAMP", required(FieldKind::Timestamp)),
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
    Draw,
    Forfeit,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Win => "WIN",
            Outcome::Loss => "LOSS",
            Outcome::Draw => "DRAW",
            Outcome::Forfeit => "FORFEIT",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Outcome {
    type Err = LsnpError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WIN" => Ok(Outcome::Win),
            "LOSS" => Ok(Outcome::Loss),
            "DRAW" => Ok(Outcome::Draw),
            "FORFEIT" => Ok(Outcome::Forfeit),
            other => Err(LsnpError::InvalidUserInput(format!("unknown game result: {other:?}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TicTacToeResult {
    pub from: UserId,
    pub to: UserId,
    pub gameid: String,
    pub message_id: MessageId,
    pub result: Outcome,
    pub symbol: Symbol,
    pub winning_line: String,
    pub turn: u32,
    pub token: Token,
    pub timestamp: Timestamp,
}

impl Sendable for TicTacToeResult {
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
            ("RESULT", self.result.to_string()),
            ("SYMBOL", self.symbol.to_string()),
            ("WINNING_LINE", self.winning_line.clone()),
            ("TURN", self.turn.to_string()),
            ("TOKEN", self.token.to_string()),
            ("TIMESTAMP", self.timestamp.to_string()),
        ]
    }
}

impl RecentMessage for TicTacToeResult {
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
            format!("game {}: {} ({})", self.gameid, self.result, self.symbol)
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

/// Checked after every applied move, by both the mover and the receiver:
/// if the board is now won or drawn, announces it to the opponent and
/// deactivates the session. `mover_symbol`/`turn` describe the move that
/// was just applied, from the local point of view.
pub async fn maybe_announce_result(
    ctx: &Context,
    socket: &UdpSocket,
    gameid: &str,
    opponent: UserId,
    mover_symbol: Symbol,
    turn: u32,
    ttl: Ttl,
) -> Result<(), LsnpError> {
    let outcome = if ctx.games.is_winning_move(gameid) {
        Some(Outcome::Win)
    } else if ctx.games.is_draw(gameid) {
        Some(Outcome::Draw)
    } else {
        None
    };
    let Some(result) = outcome else { return Ok(()) };

    let from = ctx.client.get_user_id().ok_or(LsnpError::SocketUninitialized)?;
    let winning_line = ctx.games.find_winning_line(gameid).unwrap_or_default();
    let timestamp = Timestamp::now();
    let token = Token::new(from.clone(), timestamp.plus_ttl(ttl), Scope::Game);
    let msg = TicTacToeResult {
        from,
        to: opponent.clone(),
        gameid: gameid.to_string(),
        message_id: MessageId::generate(),
        result,
        symbol: mover_symbol,
        winning_line,
        turn,
        token,
        timestamp,
    };
    let addr = SocketAddr::new(opponent.ip(), ctx.config.port);
    router::send_message(socket, &msg, addr).await?;
    ctx.games.deactivate(gameid);
    ctx.client.add_recent_message_sent(Box::new(msg));
    Ok(())
}

pub async fn handle_receive(ctx: &Context, frame: &Frame) -> Result<(), LsnpError> {
    let from: UserId = frame["FROM"].parse()?;
    let to: UserId = frame["TO"].parse()?;
    let gameid = frame["GAMEID"].clone();
    let message_id: MessageId = frame["MESSAGE_ID"].parse()?;
    let result: Outcome = frame["RESULT"].parse()?;
    let symbol: Symbol = frame["SYMBOL"].parse()?;
    let winning_line = frame["WINNING_LINE"].clone();
    let turn: u32 = frame["TURN"].parse().map_err(|_| LsnpError::SchemaError {
        field: "TURN".to_string(),
    })?;
    let token: Token = frame["TOKEN"].parse()?;
    let timestamp: Timestamp = frame["TIMESTAMP"].parse()?;

    token.validate(&from, Scope::Game)?;
    if ctx.client.is_revoked(&token) {
        return Err(LsnpError::RevokedToken);
    }
    let local = ctx.client.get_user_id().ok_or(LsnpError::SocketUninitialized)?;
    if to != local {
        return Err(LsnpError::NotForMe);
    }

    ctx.games.deactivate(&gameid);
    let msg = TicTacToeResult {
        from,
        to,
        gameid,
        message_id,
        result,
        symbol,
        winning_line,
        turn,
        token,
        timestamp,
    };
    tracing::info!(result = %msg.info(false), "received game result");
    ctx.client.add_recent_message_received(Box::new(msg));
    Ok(())
}
