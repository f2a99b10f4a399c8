//! Request engine, text protocol, and network processes for userdb.
//!
//! The engine process ([`server::EngineServer`]) answers datagram requests
//! from the single [`engine::RequestEngine`] held in [`state::AppState`]. The
//! front end ([`frontend::Frontend`]) accepts client connections and relays
//! their request lines to the engine through [`relay::UdpRelay`].

pub mod config;
pub mod engine;
pub mod error;
pub mod frontend;
pub mod protocol;
pub mod relay;
pub mod server;
pub mod state;
