//! JSON-RPC client pool for the games node
//!
//! All contract reads and writes go through here: round bank, bet ledgers,
//! bonus shares, log queries, bet submission. Endpoints are tried
//! round-robin behind per-endpoint circuit breakers; transient transport
//! failures retry with exponential backoff, application errors (reverts,
//! unknown rounds) do not.

use async_trait::async_trait;
use primitive_types::U256;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use games_shared::{
    constants::RETRY_BACKOFF_BASE_MS,
    errors::{Result, ServiceError},
    types::{PlayerAddress, RoundId, TokenAmount},
};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::RpcConfig;
use crate::domain::{Bet, ContractEvent, GameKind, RoundStatus, Selection};
use crate::retry::RetryStrategy;

/// Read surface of the game contracts
#[async_trait]
pub trait ContractReader: Send + Sync {
    async fn round_bank(&self, contract: &str, round_id: RoundId) -> Result<TokenAmount>;
    async fn bets_count(&self, contract: &str, round_id: RoundId) -> Result<u32>;
    async fn round_bets(&self, contract: &str, game: GameKind, round_id: RoundId)
        -> Result<Vec<Bet>>;
    async fn bonus_share(&self, contract: &str, round_id: RoundId) -> Result<U256>;
    async fn round_status(&self, contract: &str, round_id: RoundId) -> Result<RoundStatusReport>;
    async fn logs_since(&self, contract: &str, game: GameKind, cursor: u64) -> Result<LogPage>;
}

/// Write surface of the game contracts
#[async_trait]
pub trait ContractWriter: Send + Sync {
    async fn place_bet(&self, contract: &str, call: &PlaceBetCall) -> Result<String>;
    async fn request_calculation(&self, contract: &str, round_id: RoundId) -> Result<String>;
    async fn balance_of(&self, address: &PlayerAddress) -> Result<TokenAmount>;
    async fn allowance(&self, owner: &PlayerAddress, contract: &str) -> Result<TokenAmount>;
    async fn transaction_receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>>;
}

/// Contract-reported round state, used by the stuck-spin recovery poll
#[derive(Debug, Clone, Deserialize)]
pub struct RoundStatusReport {
    pub status: RoundStatus,
    pub winner_offset: Option<u64>,
    pub winning_index: Option<u32>,
}

/// One page of decoded contract events
#[derive(Debug, Clone)]
pub struct LogPage {
    pub events: Vec<ContractEvent>,
    pub next_cursor: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaceBetCall {
    pub round_id: RoundId,
    pub selection: Selection,
    pub amount: TokenAmount,
    pub from: PlayerAddress,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub success: bool,
    pub block_number: u64,
}

#[derive(Serialize)]
struct RpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

struct RpcEndpoint {
    url: String,
    breaker: CircuitBreaker,
}

/// Round-robin pool of games-node endpoints
pub struct RpcClientPool {
    endpoints: Vec<RpcEndpoint>,
    next_index: AtomicUsize,
    request_id: AtomicU64,
    http: reqwest::Client,
    retry: RetryStrategy,
}

impl RpcClientPool {
    pub fn new(config: &RpcConfig, max_retries: u32) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ServiceError::internal(format!("Failed to build HTTP client: {}", e)))?;

        let endpoints = config
            .urls
            .iter()
            .map(|url| RpcEndpoint {
                url: url.clone(),
                breaker: CircuitBreaker::new(config.failure_threshold, config.reset_timeout_secs),
            })
            .collect();

        Ok(Self {
            endpoints,
            next_index: AtomicUsize::new(0),
            request_id: AtomicU64::new(1),
            http,
            retry: RetryStrategy::new(max_retries),
        })
    }

    /// Next endpoint whose circuit admits a request
    async fn pick_endpoint(&self) -> Option<&RpcEndpoint> {
        let start = self.next_index.fetch_add(1, Ordering::Relaxed);
        for offset in 0..self.endpoints.len() {
            let endpoint = &self.endpoints[(start + offset) % self.endpoints.len()];
            if endpoint.breaker.allow_request().await {
                return Some(endpoint);
            }
        }
        None
    }

    async fn call<P: Serialize, R: DeserializeOwned>(&self, method: &str, params: P) -> Result<R> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.request_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let mut attempt = 0;
        loop {
            let Some(endpoint) = self.pick_endpoint().await else {
                return Err(ServiceError::rpc_unavailable("all endpoints circuit-open"));
            };

            match self.call_once(endpoint, &request).await {
                Ok(result) => {
                    endpoint.breaker.on_success().await;
                    return Ok(result);
                }
                Err(err) => {
                    if err.is_retryable() {
                        endpoint.breaker.on_failure().await;
                    } else {
                        // The endpoint answered; the contract rejected us.
                        endpoint.breaker.on_success().await;
                        return Err(err);
                    }

                    attempt += 1;
                    if !self.retry.should_retry(attempt) {
                        return Err(err);
                    }

                    let backoff_ms = 2u64.pow(attempt - 1) * RETRY_BACKOFF_BASE_MS;
                    warn!(
                        method,
                        attempt,
                        backoff_ms,
                        error = %err,
                        "RPC call failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
            }
        }
    }

    async fn call_once<P: Serialize, R: DeserializeOwned>(
        &self,
        endpoint: &RpcEndpoint,
        request: &RpcRequest<'_, P>,
    ) -> Result<R> {
        let response = self
            .http
            .post(&endpoint.url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::rpc_timeout(endpoint.url.clone())
                } else {
                    ServiceError::rpc_unavailable(format!("{}: {}", endpoint.url, e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::rpc_unavailable(format!(
                "{}: HTTP {}",
                endpoint.url, status
            )));
        }

        let body: RpcResponse<R> = response
            .json()
            .await
            .map_err(|e| ServiceError::decode_error(e))?;

        if let Some(error) = body.error {
            debug!(
                method = request.method,
                code = error.code,
                "RPC application error"
            );
            return Err(ServiceError::contract_reverted(
                request.method,
                format!("code {}: {}", error.code, error.message),
            ));
        }

        body.result
            .ok_or_else(|| ServiceError::decode_error("RPC response missing result"))
    }

    /// Like `call`, but a null/missing result is a legitimate `None`
    async fn call_nullable<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<Option<R>> {
        let raw: serde_json::Value = self.call(method, params).await.or_else(|err| {
            // `call` reports a missing result as a decode error; for
            // nullable methods that simply means "not there yet".
            if err.code == "INTERNAL_RESPONSE_DECODE" {
                Ok(serde_json::Value::Null)
            } else {
                Err(err)
            }
        })?;

        if raw.is_null() {
            return Ok(None);
        }
        serde_json::from_value(raw)
            .map(Some)
            .map_err(|e| ServiceError::decode_error(e))
    }
}

/// Parse a `0x`-prefixed hex quantity into a U256
fn parse_hex_u256(value: &str) -> Result<U256> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    U256::from_str_radix(digits, 16)
        .map_err(|e| ServiceError::decode_error(format!("bad hex quantity {}: {}", value, e)))
}

fn parse_hex_amount(value: &str) -> Result<TokenAmount> {
    parse_hex_u256(value).map(TokenAmount::from_u256)
}

/// Bet as the games node reports it
#[derive(Debug, Deserialize)]
struct WireBet {
    player: String,
    amount: String,
    selection: Selection,
    order_index: u32,
}

impl WireBet {
    fn decode(self, round_id: RoundId) -> Result<Bet> {
        Ok(Bet {
            round_id,
            player: PlayerAddress::try_from(self.player)
                .map_err(|e| ServiceError::decode_error(e))?,
            amount: parse_hex_amount(&self.amount)?,
            selection: self.selection,
            order_index: self.order_index,
        })
    }
}

/// Event log entry as the games node reports it
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
enum WireEvent {
    BetPlaced {
        round_id: u64,
        bet: WireBet,
    },
    CalculationRequested {
        round_id: u64,
    },
    WinnerCalculated {
        round_id: u64,
        offset: String,
        winning_index: u32,
    },
}

impl WireEvent {
    fn decode(self, game: GameKind) -> Result<ContractEvent> {
        match self {
            WireEvent::BetPlaced { round_id, bet } => {
                let round_id = RoundId::new(round_id);
                Ok(ContractEvent::BetPlaced {
                    game,
                    round_id,
                    bet: bet.decode(round_id)?,
                })
            }
            WireEvent::CalculationRequested { round_id } => Ok(ContractEvent::CalculationRequested {
                game,
                round_id: RoundId::new(round_id),
            }),
            WireEvent::WinnerCalculated {
                round_id,
                offset,
                winning_index,
            } => Ok(ContractEvent::WinnerCalculated {
                game,
                round_id: RoundId::new(round_id),
                offset: parse_hex_u256(&offset)?.low_u64(),
                winning_index,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireLogPage {
    events: Vec<WireEvent>,
    next_cursor: u64,
}

#[async_trait]
impl ContractReader for RpcClientPool {
    async fn round_bank(&self, contract: &str, round_id: RoundId) -> Result<TokenAmount> {
        let raw: String = self
            .call("games_getRoundBank", json!([contract, round_id.as_u64()]))
            .await?;
        parse_hex_amount(&raw)
    }

    async fn bets_count(&self, contract: &str, round_id: RoundId) -> Result<u32> {
        self.call("games_getBetsCount", json!([contract, round_id.as_u64()]))
            .await
    }

    async fn round_bets(
        &self,
        contract: &str,
        _game: GameKind,
        round_id: RoundId,
    ) -> Result<Vec<Bet>> {
        let wire: Vec<WireBet> = self
            .call("games_getRoundBets", json!([contract, round_id.as_u64()]))
            .await?;
        wire.into_iter().map(|b| b.decode(round_id)).collect()
    }

    async fn bonus_share(&self, contract: &str, round_id: RoundId) -> Result<U256> {
        let raw: String = self
            .call("games_getBonusShare", json!([contract, round_id.as_u64()]))
            .await?;
        parse_hex_u256(&raw)
    }

    async fn round_status(&self, contract: &str, round_id: RoundId) -> Result<RoundStatusReport> {
        self.call("games_getRoundStatus", json!([contract, round_id.as_u64()]))
            .await
    }

    async fn logs_since(&self, contract: &str, game: GameKind, cursor: u64) -> Result<LogPage> {
        let page: WireLogPage = self
            .call("games_getLogs", json!({ "contract": contract, "from_cursor": cursor }))
            .await?;

        let next_cursor = page.next_cursor;
        let events = page
            .events
            .into_iter()
            .filter_map(|e| match e.decode(game) {
                Ok(event) => Some(event),
                Err(err) => {
                    // A malformed log must not wedge the cursor; skip it.
                    warn!(%game, error = %err, "Dropping undecodable event log");
                    None
                }
            })
            .collect();

        Ok(LogPage { events, next_cursor })
    }
}

#[async_trait]
impl ContractWriter for RpcClientPool {
    async fn place_bet(&self, contract: &str, call: &PlaceBetCall) -> Result<String> {
        self.call(
            "games_placeBet",
            json!({
                "contract": contract,
                "round_id": call.round_id.as_u64(),
                "selection": call.selection,
                "amount": format!("{:#x}", call.amount.as_u256()),
                "from": call.from.as_str(),
            }),
        )
        .await
    }

    async fn request_calculation(&self, contract: &str, round_id: RoundId) -> Result<String> {
        self.call(
            "games_requestCalculation",
            json!([contract, round_id.as_u64()]),
        )
        .await
    }

    async fn balance_of(&self, address: &PlayerAddress) -> Result<TokenAmount> {
        let raw: String = self
            .call("games_getBalance", json!([address.as_str()]))
            .await?;
        parse_hex_amount(&raw)
    }

    async fn allowance(&self, owner: &PlayerAddress, contract: &str) -> Result<TokenAmount> {
        let raw: String = self
            .call("games_getAllowance", json!([owner.as_str(), contract]))
            .await?;
        parse_hex_amount(&raw)
    }

    async fn transaction_receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>> {
        self.call_nullable("games_getTransactionReceipt", json!([tx_hash]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_quantities() {
        assert_eq!(
            parse_hex_u256("0xde0b6b3a7640000").unwrap(),
            U256::from(1_000_000_000_000_000_000u128)
        );
        assert_eq!(parse_hex_u256("0x0").unwrap(), U256::zero());
        assert!(parse_hex_u256("0xzz").is_err());
    }

    #[test]
    fn test_wire_bet_decode() {
        let wire = WireBet {
            player: "0xDEADBEEFdeadbeefDEADBEEFdeadbeefDEADBEEF".to_string(),
            amount: "0xde0b6b3a7640000".to_string(),
            selection: Selection::Pocket(7),
            order_index: 3,
        };
        let bet = wire.decode(RoundId::new(9)).unwrap();
        assert_eq!(bet.round_id, RoundId::new(9));
        assert_eq!(bet.amount, TokenAmount::from_tokens(1));
        assert_eq!(bet.order_index, 3);
    }

    #[test]
    fn test_wire_event_decode_carries_game() {
        let wire = WireEvent::CalculationRequested { round_id: 12 };
        let event = wire.decode(GameKind::Predict).unwrap();
        assert_eq!(event.game(), GameKind::Predict);
        assert_eq!(event.round_id(), RoundId::new(12));
    }

    #[test]
    fn test_pool_construction() {
        let config = RpcConfig {
            urls: vec!["http://localhost:8545".into(), "http://localhost:8546".into()],
            request_timeout_secs: 10,
            failure_threshold: 5,
            reset_timeout_secs: 30,
        };
        let pool = RpcClientPool::new(&config, 3).unwrap();
        assert_eq!(pool.endpoints.len(), 2);
    }
}
