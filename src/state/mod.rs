pub mod client;
pub mod file_transfer;
pub mod game;
