//! Shared application context, cheap to clone, passed to every handler.
//!
//! Mirrors `sven_p2p::node::P2pHandle`'s shape: a small struct of `Arc`s
//! that can be handed to every task without exposing the raw sockets.

use std::sync::Arc;

use crate::config::Config;
use crate::state::client::ClientState;
use crate::state::file_transfer::FileTransferState;
use crate::state::game::GameSessionManager;
use crate::transport::reliable::AckTable;

#[derive(Clone)]
pub struct Context {
    pub config: Arc<Config>,
    pub client: Arc<ClientState>,
    pub files: Arc<FileTransferState>,
    pub games: Arc<GameSessionManager>,
    pub ack_table: Arc<AckTable>,
}

impl Context {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        Context {
            files: Arc::new(FileTransferState::new(config.received_files_dir.clone())),
            client: Arc::new(ClientState::new()),
            games: Arc::new(GameSessionManager::new()),
            ack_table: Arc::new(AckTable::new()),
            config,
        }
    }
}
