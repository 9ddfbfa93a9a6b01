//! End-to-end scenarios driving real loopback UDP sockets between two or
//! more simulated peers. Each peer gets its own `Context`/socket pair and a
//! background receive task wired through the real `router::recv_message`
//! dispatch path, the same pipeline `transport::spawn_unicast_pipeline`
//! drives in the running process.
//!
//! All peers share one fixed port (LSNP assumes a single well-known port
//! per subnet, peers distinguished by IP only) and sit on distinct loopback
//! addresses so the test can run several "hosts" at once without clashing.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::sleep;

use lsnp::config::Config;
use lsnp::context::Context;
use lsnp::fields::{MessageId, Scope, Timestamp, Token, Ttl, UserId};
use lsnp::messages::dm::Dm;
use lsnp::messages::file_chunk::FileChunk;
use lsnp::messages::file_offer::FileOffer;
use lsnp::messages::follow::Follow;
use lsnp::messages::ping::Ping;
use lsnp::messages::post::Post;
use lsnp::messages::revoke::Revoke;
use lsnp::messages::tictactoe_invite;
use lsnp::messages::tictactoe_move;
use lsnp::messages::tictactoe_result::{Outcome, TicTacToeResult};
use lsnp::recent::RecentMessage;
use lsnp::router;
use lsnp::state::game::Symbol;

const PORT: u16 = 58311;

fn peer_ip(host: u8) -> Ipv4Addr {
    Ipv4Addr::new(127, 77, 0, host)
}

fn addr_of(host: u8) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(peer_ip(host)), PORT)
}

fn test_ctx(username: &str, host: u8, received_dir: std::path::PathBuf) -> Context {
    let local_ip = peer_ip(host);
    let config = Config {
        port: PORT,
        subnet_prefix: 24,
        local_ip,
        broadcast_ip: Ipv4Addr::new(127, 77, 0, 255),
        ping_interval: Duration::from_secs(300),
        buffer_size: 4096,
        received_files_dir: received_dir,
        verbose: false,
    };
    let ctx = Context::new(config);
    let user_id = UserId::new(username, IpAddr::V4(local_ip)).unwrap();
    ctx.client.set_user_id(user_id);
    ctx
}

async fn bind(host: u8) -> Arc<UdpSocket> {
    Arc::new(UdpSocket::bind((peer_ip(host), PORT)).await.unwrap())
}

/// Mirrors `transport`'s unicast pipeline without the intermediate channel:
/// drain the socket, hand each datagram to the router.
fn spawn_receiver(ctx: Context, socket: Arc<UdpSocket>) {
    tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        loop {
            let (n, from) = match socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(_) => break,
            };
            if let Ok(raw) = std::str::from_utf8(&buf[..n]) {
                router::recv_message(&ctx, &socket, raw, from).await;
            }
        }
    });
}

// ── 1. Ping discovery ──────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ping_discovery_adds_each_other_as_peers() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let ctx_a = test_ctx("alice", 2, dir_a.path().to_path_buf());
    let ctx_b = test_ctx("bob", 3, dir_b.path().to_path_buf());

    let sock_a = bind(2).await;
    let sock_b = bind(3).await;
    spawn_receiver(ctx_a.clone(), sock_a.clone());
    spawn_receiver(ctx_b.clone(), sock_b.clone());

    let ping = Ping::new(ctx_a.client.get_user_id().unwrap());
    router::send_message(&sock_a, &ping, addr_of(3)).await.unwrap();

    sleep(Duration::from_millis(200)).await;

    assert!(
        ctx_b.client.get_peers().iter().any(|p| p.username() == "alice"),
        "bob must learn about alice from her PING"
    );
    assert!(
        ctx_a.client.get_peers().iter().any(|p| p.username() == "bob"),
        "alice must learn about bob from his unsolicited reply PING"
    );
}

// ── 2. DM ─────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dm_is_delivered_and_logged_by_recipient() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let ctx_a = test_ctx("alice", 10, dir_a.path().to_path_buf());
    let ctx_b = test_ctx("bob", 11, dir_b.path().to_path_buf());

    let sock_a = bind(10).await;
    let sock_b = bind(11).await;
    spawn_receiver(ctx_b.clone(), sock_b.clone());

    let bob_id = ctx_b.client.get_user_id().unwrap();
    let ttl = Ttl::new(3600).unwrap();
    let dm = Dm::new(&ctx_a, bob_id, "hi".into(), ttl).unwrap();
    router::send_message(&sock_a, &dm, addr_of(11)).await.unwrap();

    sleep(Duration::from_millis(150)).await;

    ctx_b.client.with_received(|received| {
        let found = received.iter().any(|m| {
            m.as_any()
                .downcast_ref::<Dm>()
                .map(|d| d.content == "hi" && d.from.username() == "alice")
                .unwrap_or(false)
        });
        assert!(found, "bob's received log must contain alice's DM");
    });
}

// ── 3. Follow + Post ──────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn post_reaches_followers_only() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_c = tempfile::tempdir().unwrap();
    let dir_d = tempfile::tempdir().unwrap();
    let ctx_a = test_ctx("alice", 20, dir_a.path().to_path_buf());
    let ctx_c = test_ctx("carol", 21, dir_c.path().to_path_buf());
    let ctx_d = test_ctx("dave", 22, dir_d.path().to_path_buf());

    let sock_a = bind(20).await;
    let sock_c = bind(21).await;
    let sock_d = bind(22).await;
    spawn_receiver(ctx_a.clone(), sock_a.clone());
    spawn_receiver(ctx_c.clone(), sock_c.clone());
    spawn_receiver(ctx_d.clone(), sock_d.clone());

    let alice_id = ctx_a.client.get_user_id().unwrap();
    let ttl = Ttl::new(3600).unwrap();

    let follow = Follow::new(&ctx_c, alice_id.clone(), ttl).unwrap();
    router::send_message(&sock_c, &follow, addr_of(20)).await.unwrap();
    sleep(Duration::from_millis(150)).await;
    assert!(
        ctx_a.client.get_followers().iter().any(|f| f.username() == "carol"),
        "alice must record carol as a follower"
    );

    let post = Post::new(&ctx_a, "hello world".into(), ttl).unwrap();
    router::send_message(&sock_a, &post, addr_of(21)).await.unwrap();
    router::send_message(&sock_a, &post, addr_of(22)).await.unwrap();
    sleep(Duration::from_millis(150)).await;

    ctx_c.client.with_received(|received| {
        let found = received.iter().any(|m| {
            m.as_any().downcast_ref::<Post>().map(|p| p.content == "hello world").unwrap_or(false)
        });
        assert!(found, "carol follows alice, so her received log must contain the POST");
    });
    ctx_d.client.with_received(|received| {
        let found = received.iter().any(|m| m.as_any().downcast_ref::<Post>().is_some());
        assert!(!found, "dave does not follow alice, so no POST should land in his log");
    });
}

// ── 4. File transfer ──────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn file_transfer_reassembles_byte_for_byte() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let ctx_a = test_ctx("alice", 30, dir_a.path().to_path_buf());
    let ctx_b = test_ctx("bob", 31, dir_b.path().to_path_buf());

    let sock_a = bind(30).await;
    let sock_b = bind(31).await;
    spawn_receiver(ctx_a.clone(), sock_a.clone());
    spawn_receiver(ctx_b.clone(), sock_b.clone());

    let alice_id = ctx_a.client.get_user_id().unwrap();
    let bob_id = ctx_b.client.get_user_id().unwrap();
    let ttl = Ttl::new(3600).unwrap();

    let data: Vec<u8> = (0..700u32).map(|i| (i % 251) as u8).collect();
    let chunk_size = 256usize;
    let fileid = MessageId::generate();
    let timestamp = Timestamp::now();
    let token = Token::new(alice_id.clone(), timestamp.plus_ttl(ttl), Scope::File);

    let offer = FileOffer {
        from: alice_id.clone(),
        to: bob_id.clone(),
        filename: "image.png".into(),
        filesize: data.len() as u64,
        filetype: "image/png".into(),
        fileid: fileid.clone(),
        description: String::new(),
        timestamp,
        token: token.clone(),
    };
    router::send_message(&sock_a, &offer, addr_of(31)).await.unwrap();
    sleep(Duration::from_millis(150)).await;

    let total_chunks = data.chunks(chunk_size).count();
    assert_eq!(total_chunks, 3, "700 bytes at 256 per chunk must split into 3 chunks");
    for (index, chunk) in data.chunks(chunk_size).enumerate() {
        let msg = FileChunk::new(
            alice_id.clone(),
            bob_id.clone(),
            fileid.clone(),
            index,
            total_chunks,
            chunk_size,
            token.clone(),
            chunk,
        );
        router::send_message(&sock_a, &msg, addr_of(31)).await.unwrap();
    }
    sleep(Duration::from_millis(200)).await;

    // Bob only types `accept` after every chunk has already arrived, the
    // realistic human-paced case: the chunks must have been buffered rather
    // than dropped while the transfer sat unaccepted.
    ctx_b.files.accept_file(Some(fileid.clone())).unwrap();

    let written = std::fs::read(dir_b.path().join("image.png")).unwrap();
    assert_eq!(written, data, "reassembled file must match the source byte-for-byte");
}

// ── 5. Revoke ─────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn revoke_removes_the_dm_from_the_recipients_log() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let ctx_a = test_ctx("alice", 40, dir_a.path().to_path_buf());
    let ctx_b = test_ctx("bob", 41, dir_b.path().to_path_buf());

    let sock_a = bind(40).await;
    let sock_b = bind(41).await;
    spawn_receiver(ctx_b.clone(), sock_b.clone());

    let bob_id = ctx_b.client.get_user_id().unwrap();
    let ttl = Ttl::new(3600).unwrap();
    let dm = Dm::new(&ctx_a, bob_id, "secret".into(), ttl).unwrap();
    let token = dm.token.clone();
    router::send_message(&sock_a, &dm, addr_of(41)).await.unwrap();
    sleep(Duration::from_millis(150)).await;

    ctx_b.client.with_received(|received| {
        assert!(received.iter().any(|m| m.as_any().downcast_ref::<Dm>().is_some()));
    });

    let revoke = Revoke::new(token);
    router::send_message(&sock_a, &revoke, addr_of(41)).await.unwrap();
    sleep(Duration::from_millis(150)).await;

    ctx_b.client.with_received(|received| {
        assert!(
            !received.iter().any(|m| m.as_any().downcast_ref::<Dm>().is_some()),
            "the revoked DM must no longer be in bob's received store"
        );
    });
}

// ── 6. TicTacToe win ───────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn tictactoe_top_row_win_is_reported_to_the_mover() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let ctx_a = test_ctx("alice", 50, dir_a.path().to_path_buf());
    let ctx_b = test_ctx("bob", 51, dir_b.path().to_path_buf());

    let sock_a = bind(50).await;
    let sock_b = bind(51).await;
    spawn_receiver(ctx_a.clone(), sock_a.clone());
    spawn_receiver(ctx_b.clone(), sock_b.clone());

    let alice_id = ctx_a.client.get_user_id().unwrap();
    let bob_id = ctx_b.client.get_user_id().unwrap();
    let ttl = Ttl::new(3600).unwrap();

    tictactoe_invite::send_invite(&ctx_a, &sock_a, bob_id.clone(), "g7".into(), Symbol::X, ttl)
        .await
        .unwrap();

    tictactoe_move::send_move(&ctx_a, &sock_a, bob_id.clone(), "g7".into(), 0, ttl).await.unwrap();
    tictactoe_move::send_move(&ctx_b, &sock_b, alice_id.clone(), "g7".into(), 4, ttl).await.unwrap();
    tictactoe_move::send_move(&ctx_a, &sock_a, bob_id.clone(), "g7".into(), 1, ttl).await.unwrap();
    tictactoe_move::send_move(&ctx_b, &sock_b, alice_id.clone(), "g7".into(), 8, ttl).await.unwrap();
    tictactoe_move::send_move(&ctx_a, &sock_a, bob_id.clone(), "g7".into(), 2, ttl).await.unwrap();

    sleep(Duration::from_millis(250)).await;

    ctx_a.client.with_received(|received| {
        let result = received
            .iter()
            .find_map(|m| m.as_any().downcast_ref::<TicTacToeResult>())
            .expect("alice must receive a game result from bob");
        assert_eq!(result.result, Outcome::Win);
        assert_eq!(result.winning_line, "0,1,2");
    });
}
