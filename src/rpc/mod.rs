//! RPC Module
//!
//! Peer-to-peer transport: the server façade answering cache lookups from
//! other nodes, and the client used to issue them.

mod client;
mod server;

pub use client::RpcClient;
pub use server::{create_router, CacheServer, SERVICE_NAME};
