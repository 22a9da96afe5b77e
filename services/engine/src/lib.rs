// Library interface for the games engine - exposes modules for testing

pub mod bonus;
pub mod circuit_breaker;
pub mod config;
pub mod domain;
pub mod events;
pub mod indexer_client;
pub mod lifecycle;
pub mod odds;
pub mod pools;
pub mod retry;
pub mod round_watcher;
pub mod rpc_client;
pub mod wallet;
