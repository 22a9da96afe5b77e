//! GraphQL client for the indexed-log service
//!
//! Historical round and bet queries for tables and statistics; the live
//! round path never goes through here. Paginated, bounded retries, same
//! transport discipline as the RPC pool.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use games_shared::{
    errors::{Result, ServiceError},
    types::{PlayerAddress, RoundId, TokenAmount},
};

use crate::config::IndexerConfig;
use crate::domain::GameKind;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const MAX_RETRIES: u32 = 3;

const ROUNDS_QUERY: &str = r#"
query Rounds($game: String!, $limit: Int!, $offset: Int!) {
  rounds(game: $game, limit: $limit, offset: $offset, orderBy: ID_DESC) {
    roundId
    totalVolume
    betCount
    winnerAddress
    endedAt
  }
}
"#;

const PLAYER_BETS_QUERY: &str = r#"
query PlayerBets($player: String!, $limit: Int!, $offset: Int!) {
  bets(player: $player, limit: $limit, offset: $offset, orderBy: CREATED_DESC) {
    roundId
    player
    amount
    payout
    createdAt
  }
}
"#;

#[derive(Debug, Clone)]
pub struct HistoricalRound {
    pub round_id: RoundId,
    pub total_volume: TokenAmount,
    pub bet_count: u32,
    pub winner: Option<PlayerAddress>,
    pub ended_at: i64,
}

#[derive(Debug, Clone)]
pub struct HistoricalBet {
    pub round_id: RoundId,
    pub player: PlayerAddress,
    pub amount: TokenAmount,
    pub payout: Option<TokenAmount>,
    pub created_at: i64,
}

#[derive(Serialize)]
struct GraphQlRequest<'a, V: Serialize> {
    query: &'a str,
    variables: V,
}

#[derive(Deserialize)]
struct GraphQlResponse<D> {
    data: Option<D>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct RoundsData {
    rounds: Vec<WireRound>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRound {
    round_id: u64,
    total_volume: String,
    bet_count: u32,
    winner_address: Option<String>,
    ended_at: i64,
}

#[derive(Deserialize)]
struct BetsData {
    bets: Vec<WireHistoricalBet>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireHistoricalBet {
    round_id: u64,
    player: String,
    amount: String,
    payout: Option<String>,
    created_at: i64,
}

/// Parse a decimal token amount as indexers encode them
fn parse_dec_amount(value: &str) -> Result<TokenAmount> {
    U256::from_dec_str(value)
        .map(TokenAmount::from_u256)
        .map_err(|e| ServiceError::decode_error(format!("bad decimal amount {}: {:?}", value, e)))
}

pub struct IndexerClient {
    http: reqwest::Client,
    url: String,
    page_size: u32,
}

impl IndexerClient {
    pub fn new(config: &IndexerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ServiceError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            url: config.graphql_url.clone(),
            page_size: config.page_size,
        })
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Historical rounds for one game, newest first
    pub async fn rounds(
        &self,
        game: GameKind,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<HistoricalRound>> {
        let data: RoundsData = self
            .query(
                ROUNDS_QUERY,
                json!({
                    "game": game.as_str(),
                    "limit": limit.min(self.page_size),
                    "offset": offset,
                }),
            )
            .await?;

        data.rounds
            .into_iter()
            .map(|round| {
                Ok(HistoricalRound {
                    round_id: RoundId::new(round.round_id),
                    total_volume: parse_dec_amount(&round.total_volume)?,
                    bet_count: round.bet_count,
                    winner: round
                        .winner_address
                        .map(|w| {
                            PlayerAddress::try_from(w).map_err(|e| ServiceError::decode_error(e))
                        })
                        .transpose()?,
                    ended_at: round.ended_at,
                })
            })
            .collect()
    }

    /// Historical bets for one player, newest first
    pub async fn player_bets(
        &self,
        player: &PlayerAddress,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<HistoricalBet>> {
        let data: BetsData = self
            .query(
                PLAYER_BETS_QUERY,
                json!({
                    "player": player.as_str(),
                    "limit": limit.min(self.page_size),
                    "offset": offset,
                }),
            )
            .await?;

        data.bets
            .into_iter()
            .map(|bet| {
                Ok(HistoricalBet {
                    round_id: RoundId::new(bet.round_id),
                    player: PlayerAddress::try_from(bet.player)
                        .map_err(|e| ServiceError::decode_error(e))?,
                    amount: parse_dec_amount(&bet.amount)?,
                    payout: bet.payout.as_deref().map(parse_dec_amount).transpose()?,
                    created_at: bet.created_at,
                })
            })
            .collect()
    }

    async fn query<V: Serialize, D: serde::de::DeserializeOwned>(
        &self,
        query: &str,
        variables: V,
    ) -> Result<D> {
        let request = GraphQlRequest { query, variables };

        for attempt in 1..=MAX_RETRIES {
            match self.query_once(&request).await {
                Ok(data) => {
                    debug!(attempt, "Indexer query succeeded");
                    return Ok(data);
                }
                Err(err) if err.is_retryable() && attempt < MAX_RETRIES => {
                    let backoff_ms = 2u64.pow(attempt - 1) * 1_000;
                    warn!(attempt, backoff_ms, error = %err, "Indexer query failed, retrying");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(err) => return Err(err),
            }
        }

        unreachable!()
    }

    async fn query_once<V: Serialize, D: serde::de::DeserializeOwned>(
        &self,
        request: &GraphQlRequest<'_, V>,
    ) -> Result<D> {
        let response = self
            .http
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| ServiceError::indexer_unavailable(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::indexer_unavailable(format!("HTTP {}", status)));
        }

        let body: GraphQlResponse<D> = response
            .json()
            .await
            .map_err(|e| ServiceError::decode_error(e))?;

        if let Some(errors) = body.errors {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(ServiceError::decode_error(format!(
                "GraphQL errors: {}",
                messages.join("; ")
            )));
        }

        body.data
            .ok_or_else(|| ServiceError::decode_error("GraphQL response missing data"))
    }
}
