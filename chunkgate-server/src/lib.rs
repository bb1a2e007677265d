//! chunkgate HTTP gateway

pub mod handlers;
pub mod server;
pub mod state;

pub use server::GateServer;
pub use state::AppState;
