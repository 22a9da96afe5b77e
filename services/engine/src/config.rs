use serde::Deserialize;
use std::env;

use games_shared::constants::*;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    pub rpc: RpcConfig,
    pub indexer: IndexerConfig,
    pub games: GamesConfig,
    pub metrics_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// How often each watcher refreshes its round snapshot
    pub refresh_interval_ms: u64,
    /// How often the event listener polls for new logs
    pub event_poll_interval_ms: u64,
    pub spin_timeout_secs: u64,
    pub settle_delay_ms: u64,
    pub max_read_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    pub urls: Vec<String>,
    pub request_timeout_secs: u64,
    pub failure_threshold: u64,
    pub reset_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexerConfig {
    pub graphql_url: String,
    pub page_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GamesConfig {
    pub luro_address: String,
    pub predict_address: String,
    pub roulette_address: String,
}

impl GamesConfig {
    pub fn contract_address(&self, game: crate::domain::GameKind) -> &str {
        match game {
            crate::domain::GameKind::Luro => &self.luro_address,
            crate::domain::GameKind::Predict => &self.predict_address,
            crate::domain::GameKind::Roulette => &self.roulette_address,
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let rpc_primary = env::var("GAMES_RPC_URL")?;
        let rpc_fallback = env::var("GAMES_RPC_FALLBACK_URL").unwrap_or_else(|_| rpc_primary.clone());

        Ok(Config {
            engine: EngineConfig {
                refresh_interval_ms: env::var("ENGINE_REFRESH_INTERVAL_MS")
                    .unwrap_or_else(|_| "2000".to_string())
                    .parse()?,
                event_poll_interval_ms: env::var("ENGINE_EVENT_POLL_INTERVAL_MS")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()?,
                spin_timeout_secs: env::var("ENGINE_SPIN_TIMEOUT_SECS")
                    .unwrap_or_else(|_| SPIN_TIMEOUT_SECS.to_string())
                    .parse()?,
                settle_delay_ms: env::var("ENGINE_SETTLE_DELAY_MS")
                    .unwrap_or_else(|_| SETTLE_DELAY_MS.to_string())
                    .parse()?,
                max_read_retries: env::var("ENGINE_MAX_READ_RETRIES")
                    .unwrap_or_else(|_| MAX_READ_RETRIES.to_string())
                    .parse()?,
            },
            rpc: RpcConfig {
                urls: vec![rpc_primary, rpc_fallback],
                request_timeout_secs: env::var("GAMES_RPC_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
                failure_threshold: env::var("GAMES_RPC_FAILURE_THRESHOLD")
                    .unwrap_or_else(|_| RPC_FAILURE_THRESHOLD.to_string())
                    .parse()?,
                reset_timeout_secs: env::var("GAMES_RPC_RESET_TIMEOUT_SECS")
                    .unwrap_or_else(|_| RPC_RESET_TIMEOUT_SECS.to_string())
                    .parse()?,
            },
            indexer: IndexerConfig {
                graphql_url: env::var("INDEXER_GRAPHQL_URL")
                    .unwrap_or_else(|_| "http://localhost:8000/graphql".to_string()),
                page_size: env::var("INDEXER_PAGE_SIZE")
                    .unwrap_or_else(|_| "50".to_string())
                    .parse()?,
            },
            games: GamesConfig {
                luro_address: env::var("LURO_CONTRACT_ADDRESS")?,
                predict_address: env::var("PREDICT_CONTRACT_ADDRESS")?,
                roulette_address: env::var("ROULETTE_CONTRACT_ADDRESS")?,
            },
            metrics_port: env::var("ENGINE_METRICS_PORT")
                .unwrap_or_else(|_| "9091".to_string())
                .parse()?,
        })
    }
}
