//! Local Social Networking Protocol: LAN peer discovery, authenticated
//! messaging, file transfer and a TicTacToe mini-game over UDP.

pub mod cli;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod fields;
pub mod interface;
pub mod messages;
pub mod recent;
pub mod registry;
pub mod router;
pub mod schema;
pub mod state;
pub mod transport;
