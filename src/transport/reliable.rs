//! In-flight `MessageID -> completion signal` table and the bounded retry
//! loop, per spec.md §9: "Keep a table of in-flight MessageID -> completion
//! signal. On ACK receipt, complete; retries use the signal with a timeout
//! instead of polling the recent-messages log."

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::time::timeout;

use crate::error::LsnpError;
use crate::router::{self, Sendable};

pub const MAX_ATTEMPTS: u32 = 3;
pub const RETRY_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Default)]
pub struct AckTable {
    inflight: Mutex<HashMap<String, oneshot::Sender<()>>>,
}

impl AckTable {
    pub fn new() -> Self {
        AckTable::default()
    }

    /// Called from the ACK handler on receipt; completes the matching
    /// in-flight send, if one is still waiting.
    pub fn complete(&self, message_id: &str) {
        if let Some(tx) = self.inflight.lock().unwrap().remove(message_id) {
            let _ = tx.send(());
        }
    }

    fn register(&self, message_id: String) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.inflight.lock().unwrap().insert(message_id, tx);
        rx
    }

    fn forget(&self, message_id: &str) {
        self.inflight.lock().unwrap().remove(message_id);
    }
}

/// Sends `msg` up to `MAX_ATTEMPTS` times, `RETRY_INTERVAL` apart, waiting
/// each round for the matching ACK. Returns `AckTimeout` once attempts are
/// exhausted; callers are responsible for rolling back any optimistic local
/// state (spec.md §7's failure policy).
pub async fn send_reliable<T: Sendable>(
    socket: &UdpSocket,
    ack_table: &AckTable,
    msg: &T,
    addr: SocketAddr,
    message_id: &str,
) -> Result<(), LsnpError> {
    let mut rx = ack_table.register(message_id.to_string());
    for attempt in 1..=MAX_ATTEMPTS {
        router::send_message(socket, msg, addr).await?;
        match timeout(RETRY_INTERVAL, &mut rx).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(_)) => break,
            Err(_) => {
                tracing::warn!(message_id, attempt, "ack timeout, retrying");
            }
        }
    }
    ack_table.forget(message_id);
    Err(LsnpError::AckTimeout(message_id.to_string()))
}
