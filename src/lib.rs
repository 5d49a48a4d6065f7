//! peercache - a distributed in-memory key/value cache
//!
//! Nodes form a peer-to-peer cluster; consistent hashing assigns each key a
//! single owner. Reads go hot tier, main tier, then through a single-flight
//! load that asks the owner peer or, when this node owns the key, the local
//! data source. Keys fetched from remote peers at a sustained rate get
//! promoted into the hot tier.

pub mod byteview;
pub mod cache;
pub mod config;
pub mod error;
pub mod group;
pub mod peers;
pub mod registry;
pub mod ring;
pub mod rpc;
pub mod singleflight;

pub use byteview::ByteView;
pub use cache::CacheKind;
pub use config::Config;
pub use error::{CacheError, Result};
pub use group::{get_group, Group, Loader};
pub use rpc::{CacheServer, RpcClient};
