//! Interactive command loop (ambient addition, C6 "CLI surface"): a thin,
//! deliberately unpolished REPL over stdin so the crate is runnable
//! end-to-end. Presentation is explicitly out of scope; this exists to
//! drive the protocol, not to be pleasant.

use std::collections::HashSet;
use std::io::{self, Write as _};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;

use crate::context::Context;
use crate::fields::{MessageId, Timestamp, Ttl, UserId};
use crate::messages::{
    dm::Dm, file_offer, follow::Follow, follow::Unfollow, group_create::GroupCreate,
    group_create::parse_members, group_message::GroupMessage, group_update::GroupUpdate,
    like::{Action, Like}, post::Post, profile::Profile, tictactoe_invite, tictactoe_move,
};
use crate::recent::RecentMessage;
use crate::registry;
use crate::router::{self, Sendable};
use crate::state::game::Symbol;

const DEFAULT_TTL_SECS: u64 = 3600;
const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Runs until `exit` or EOF on stdin. Errors from individual commands are
/// printed and do not end the session.
pub async fn run(ctx: Context, socket: Arc<UdpSocket>) {
    let verbose = AtomicBool::new(false);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("lsnp ready. type `help` for commands.");

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("").trim();

        if command == "exit" {
            println!("bye");
            break;
        }

        if let Err(err) = dispatch(&ctx, &socket, command, rest, &verbose).await {
            eprintln!("error: {err}");
        }
    }
}

async fn dispatch(
    ctx: &Context,
    socket: &UdpSocket,
    command: &str,
    rest: &str,
    verbose: &AtomicBool,
) -> Result<(), crate::error::LsnpError> {
    match command {
        "help" => {
            print_help();
            Ok(())
        }
        "verbose" => {
            let new_value = !verbose.load(Ordering::Relaxed);
            verbose.store(new_value, Ordering::Relaxed);
            println!("verbose = {new_value}");
            Ok(())
        }
        "info" => {
            print_info(ctx);
            Ok(())
        }
        "recent" => {
            print_recent(ctx, verbose.load(Ordering::Relaxed));
            Ok(())
        }
        "dm" => cmd_dm(ctx, socket, rest).await,
        "post" => cmd_post(ctx, socket, rest).await,
        "follow" => cmd_follow(ctx, socket, rest).await,
        "unfollow" => cmd_unfollow(ctx, socket, rest).await,
        "like" => cmd_like(ctx, socket, rest).await,
        "profile" => cmd_profile(ctx, socket, rest).await,
        "file" => cmd_file(ctx, socket, rest).await,
        "accept" => cmd_accept(ctx, rest),
        "reject" => cmd_reject(ctx, rest),
        "group-create" => cmd_group_create(ctx, socket, rest).await,
        "group-update" => cmd_group_update(ctx, socket, rest).await,
        "group-message" => cmd_group_message(ctx, socket, rest).await,
        "tictactoe-invite" => cmd_tictactoe_invite(ctx, socket, rest).await,
        "tictactoe-move" => cmd_tictactoe_move(ctx, socket, rest).await,
        other => {
            println!("unknown command: {other}. type `help` for commands.");
            Ok(())
        }
    }
}

fn print_help() {
    let mut out = io::stdout();
    let _ = writeln!(out, "commands:");
    for d in registry::visible_commands() {
        let _ = writeln!(out, "  {}", d.type_name);
    }
    let _ = writeln!(
        out,
        "\ndm <user@ip> <text> | post <text> | follow <user@ip> | unfollow <user@ip>\n\
like <user@ip> <post_timestamp> <like|unlike> | profile <display name> <status>\n\
file <user@ip> <path> [description] | accept [fileid] | reject [fileid]\n\
group-create <id> <name> <a@ip,b@ip> | group-update <id> [+a@ip,b@ip] [-c@ip]\n\
group-message <id> <text> | tictactoe-invite <user@ip> <gameid> <X|O>\n\
tictactoe-move <gameid> <position> | info | recent | verbose | help | exit"
    );
}

fn print_info(ctx: &Context) {
    let me = ctx.client.get_user_id();
    println!("user: {}", me.map(|u| u.to_string()).unwrap_or_else(|| "<unset>".to_string()));
    println!("peers: {}", ctx.client.get_peers().len());
    println!("following: {}", ctx.client.get_following().len());
    println!("followers: {}", ctx.client.get_followers().len());
    println!("groups: {}", ctx.client.get_group_ids().len());
}

fn print_recent(ctx: &Context, verbose: bool) {
    println!("-- sent --");
    ctx.client.with_sent(|sent| {
        for m in sent {
            println!("{}", m.info(verbose));
        }
    });
    println!("-- received --");
    ctx.client.with_received(|received| {
        for m in received {
            println!("{}", m.info(verbose));
        }
    });
}

fn split_once_arg(rest: &str) -> (&str, &str) {
    match rest.split_once(char::is_whitespace) {
        Some((a, b)) => (a, b.trim()),
        None => (rest, ""),
    }
}

async fn cmd_dm(ctx: &Context, socket: &UdpSocket, rest: &str) -> Result<(), crate::error::LsnpError> {
    let (to_raw, content) = split_once_arg(rest);
    let to: UserId = to_raw.parse()?;
    let ttl = Ttl::new(DEFAULT_TTL_SECS)?;
    let dm = Dm::new(ctx, to.clone(), content.to_string(), ttl)?;
    let addr = SocketAddr::new(to.ip(), ctx.config.port);
    router::send_message(socket, &dm, addr).await?;
    ctx.client.add_recent_message_sent(Box::new(dm));
    Ok(())
}

async fn cmd_post(ctx: &Context, socket: &UdpSocket, rest: &str) -> Result<(), crate::error::LsnpError> {
    let ttl = Ttl::new(DEFAULT_TTL_SECS)?;
    let post = Post::new(ctx, rest.to_string(), ttl)?;
    for follower in ctx.client.get_followers() {
        let addr = SocketAddr::new(follower.ip(), ctx.config.port);
        router::send_message(socket, &post, addr).await?;
    }
    ctx.client.add_recent_message_sent(Box::new(post));
    Ok(())
}

async fn cmd_follow(ctx: &Context, socket: &UdpSocket, rest: &str) -> Result<(), crate::error::LsnpError> {
    let to: UserId = rest.trim().parse()?;
    let ttl = Ttl::new(DEFAULT_TTL_SECS)?;
    let addr = SocketAddr::new(to.ip(), ctx.config.port);
    let follow = Follow::new(ctx, to, ttl)?;
    router::send_message(socket, &follow, addr).await?;
    ctx.client.add_recent_message_sent(Box::new(follow));
    Ok(())
}

async fn cmd_unfollow(ctx: &Context, socket: &UdpSocket, rest: &str) -> Result<(), crate::error::LsnpError> {
    let to: UserId = rest.trim().parse()?;
    let ttl = Ttl::new(DEFAULT_TTL_SECS)?;
    let addr = SocketAddr::new(to.ip(), ctx.config.port);
    let unfollow = Unfollow::new(ctx, to, ttl)?;
    router::send_message(socket, &unfollow, addr).await?;
    ctx.client.add_recent_message_sent(Box::new(unfollow));
    Ok(())
}

async fn cmd_like(ctx: &Context, socket: &UdpSocket, rest: &str) -> Result<(), crate::error::LsnpError> {
    let mut tokens = rest.split_whitespace();
    let to: UserId = tokens
        .next()
        .ok_or_else(|| crate::error::LsnpError::InvalidUserInput("usage: like <user@ip> <post_timestamp> <like|unlike>".into()))?
        .parse()?;
    let post_timestamp: Timestamp = tokens
        .next()
        .ok_or_else(|| crate::error::LsnpError::InvalidUserInput("missing post timestamp".into()))?
        .parse()?;
    let action = match tokens.next().unwrap_or("like").to_ascii_lowercase().as_str() {
        "unlike" => Action::Unlike,
        _ => Action::Like,
    };
    let ttl = Ttl::new(DEFAULT_TTL_SECS)?;
    let addr = SocketAddr::new(to.ip(), ctx.config.port);
    let like = Like::new(ctx, to, post_timestamp, action, ttl)?;
    router::send_message(socket, &like, addr).await?;
    ctx.client.add_recent_message_sent(Box::new(like));
    Ok(())
}

async fn cmd_profile(ctx: &Context, socket: &UdpSocket, rest: &str) -> Result<(), crate::error::LsnpError> {
    let (display_name, status) = split_once_arg(rest);
    let user_id = ctx.client.get_user_id().ok_or(crate::error::LsnpError::SocketUninitialized)?;
    let profile = Profile::new(user_id, display_name.to_string(), status.to_string());
    let broadcast = SocketAddr::new(ctx.config.broadcast_ip.into(), ctx.config.port);
    router::send_message(socket, &profile, broadcast).await?;
    Ok(())
}

async fn cmd_file(ctx: &Context, socket: &UdpSocket, rest: &str) -> Result<(), crate::error::LsnpError> {
    let mut tokens = rest.split_whitespace();
    let to: UserId = tokens
        .next()
        .ok_or_else(|| crate::error::LsnpError::InvalidUserInput("usage: file <user@ip> <path> [description]".into()))?
        .parse()?;
    let path: PathBuf = tokens
        .next()
        .ok_or_else(|| crate::error::LsnpError::InvalidUserInput("missing file path".into()))?
        .into();
    let description = tokens.collect::<Vec<_>>().join(" ");
    let ttl = Ttl::new(DEFAULT_TTL_SECS)?;
    file_offer::send_with_file(ctx, socket, to, &path, description, ttl, DEFAULT_CHUNK_SIZE).await
}

fn cmd_accept(ctx: &Context, rest: &str) -> Result<(), crate::error::LsnpError> {
    let fid = parse_optional_fileid(rest)?;
    let accepted = ctx.files.accept_file(fid)?;
    println!("accepted {accepted}");
    Ok(())
}

fn cmd_reject(ctx: &Context, rest: &str) -> Result<(), crate::error::LsnpError> {
    let fid = parse_optional_fileid(rest)?;
    let rejected = ctx.files.reject_file(fid)?;
    println!("rejected {rejected}");
    Ok(())
}

fn parse_optional_fileid(rest: &str) -> Result<Option<MessageId>, crate::error::LsnpError> {
    let rest = rest.trim();
    if rest.is_empty() {
        Ok(None)
    } else {
        Ok(Some(rest.parse()?))
    }
}

async fn cmd_group_create(ctx: &Context, socket: &UdpSocket, rest: &str) -> Result<(), crate::error::LsnpError> {
    let mut tokens = rest.split_whitespace();
    let group_id = tokens
        .next()
        .ok_or_else(|| crate::error::LsnpError::InvalidUserInput("usage: group-create <id> <name> <members>".into()))?
        .to_string();
    let group_name = tokens
        .next()
        .ok_or_else(|| crate::error::LsnpError::InvalidUserInput("missing group name".into()))?
        .to_string();
    let members_raw = tokens.next().unwrap_or("");
    let members = parse_members(members_raw)?;
    let ttl = Ttl::new(DEFAULT_TTL_SECS)?;

    let create = GroupCreate::new(ctx, group_id, group_name, members, ttl)?;
    for recipient in create.recipients(ctx) {
        let addr = SocketAddr::new(recipient.ip(), ctx.config.port);
        router::send_message(socket, &create, addr).await?;
    }
    ctx.client.add_recent_message_sent(Box::new(create));
    Ok(())
}

async fn cmd_group_update(ctx: &Context, socket: &UdpSocket, rest: &str) -> Result<(), crate::error::LsnpError> {
    let mut tokens = rest.split_whitespace();
    let group_id = tokens
        .next()
        .ok_or_else(|| crate::error::LsnpError::InvalidUserInput("usage: group-update <id> [+members] [-members]".into()))?
        .to_string();

    let mut add = HashSet::new();
    let mut remove = HashSet::new();
    for token in tokens {
        if let Some(list) = token.strip_prefix('+') {
            add.extend(parse_members(list)?);
        } else if let Some(list) = token.strip_prefix('-') {
            remove.extend(parse_members(list)?);
        }
    }
    let ttl = Ttl::new(DEFAULT_TTL_SECS)?;
    let update = GroupUpdate::new(ctx, group_id, add, remove, ttl)?;
    for recipient in update.recipients(ctx) {
        let addr = SocketAddr::new(recipient.ip(), ctx.config.port);
        router::send_message(socket, &update, addr).await?;
    }
    ctx.client.add_recent_message_sent(Box::new(update));
    Ok(())
}

async fn cmd_group_message(ctx: &Context, socket: &UdpSocket, rest: &str) -> Result<(), crate::error::LsnpError> {
    let (group_id, content) = split_once_arg(rest);
    let ttl = Ttl::new(DEFAULT_TTL_SECS)?;
    let members = ctx.client.get_group_members(group_id);
    let msg = GroupMessage::new(ctx, group_id.to_string(), content.to_string(), ttl)?;
    let local = ctx.client.get_user_id();
    for member in members {
        if Some(&member) == local.as_ref() {
            continue;
        }
        let addr = SocketAddr::new(member.ip(), ctx.config.port);
        router::send_message(socket, &msg, addr).await?;
    }
    ctx.client.add_recent_message_sent(Box::new(msg));
    Ok(())
}

async fn cmd_tictactoe_invite(ctx: &Context, socket: &UdpSocket, rest: &str) -> Result<(), crate::error::LsnpError> {
    let mut tokens = rest.split_whitespace();
    let to: UserId = tokens
        .next()
        .ok_or_else(|| crate::error::LsnpError::InvalidUserInput("usage: tictactoe-invite <user@ip> <gameid> <X|O>".into()))?
        .parse()?;
    let gameid = tokens
        .next()
        .ok_or_else(|| crate::error::LsnpError::InvalidUserInput("missing game id".into()))?
        .to_string();
    let symbol: Symbol = tokens.next().unwrap_or("X").parse()?;
    let ttl = Ttl::new(DEFAULT_TTL_SECS)?;
    tictactoe_invite::send_invite(ctx, socket, to, gameid, symbol, ttl).await
}

async fn cmd_tictactoe_move(ctx: &Context, socket: &UdpSocket, rest: &str) -> Result<(), crate::error::LsnpError> {
    let mut tokens = rest.split_whitespace();
    let gameid = tokens
        .next()
        .ok_or_else(|| crate::error::LsnpError::InvalidUserInput("usage: tictactoe-move <gameid> <position>".into()))?
        .to_string();
    let position: usize = tokens
        .next()
        .ok_or_else(|| crate::error::LsnpError::InvalidUserInput("missing position".into()))?
        .parse()
        .map_err(|_| crate::error::LsnpError::InvalidMove("position must be 0-8".into()))?;

    let opponent = ctx
        .games
        .find_game(&gameid)
        .and_then(|g| {
            let local = ctx.client.get_user_id()?;
            if g.player_x == local {
                Some(g.player_o)
            } else {
                Some(g.player_x)
            }
        })
        .ok_or_else(|| crate::error::LsnpError::GameNotFound(gameid.clone()))?;
    let ttl = Ttl::new(DEFAULT_TTL_SECS)?;
    tictactoe_move::send_move(ctx, socket, opponent, gameid, position, ttl).await
}
