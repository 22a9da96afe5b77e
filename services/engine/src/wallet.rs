//! Wallet seam
//!
//! Connected-account view plus the bet submission path: client-side
//! precondition checks (amount range, balance, allowance) run before any
//! transaction leaves the engine, and submissions are tracked with a local
//! correlation id until the node hands back a receipt.

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use games_shared::{
    errors::{ErrorCategory, ErrorCode, Result, ServiceError},
    types::{PlayerAddress, RoundId, TokenAmount},
};

use crate::domain::Selection;
use crate::rpc_client::{ContractWriter, PlaceBetCall, TxReceipt};

/// A submitted transaction, tracked locally until confirmed
#[derive(Debug, Clone)]
pub struct SubmittedTx {
    /// Client-side correlation id, assigned before the node responds
    pub correlation_id: Uuid,
    pub tx_hash: String,
}

#[async_trait]
pub trait Wallet: Send + Sync {
    fn address(&self) -> &PlayerAddress;
    async fn balance(&self) -> Result<TokenAmount>;
    async fn allowance(&self, contract: &str) -> Result<TokenAmount>;
    async fn place_bet(
        &self,
        contract: &str,
        round_id: RoundId,
        selection: Selection,
        amount_units: u128,
    ) -> Result<SubmittedTx>;
    async fn wait_for_confirmation(&self, tx_hash: &str, timeout: Duration) -> Result<TxReceipt>;
}

/// Wallet backed by the games node RPC
pub struct RpcWallet {
    writer: Arc<dyn ContractWriter>,
    address: PlayerAddress,
}

impl RpcWallet {
    pub fn new(writer: Arc<dyn ContractWriter>, address: PlayerAddress) -> Self {
        Self { writer, address }
    }
}

#[async_trait]
impl Wallet for RpcWallet {
    fn address(&self) -> &PlayerAddress {
        &self.address
    }

    async fn balance(&self) -> Result<TokenAmount> {
        self.writer.balance_of(&self.address).await
    }

    async fn allowance(&self, contract: &str) -> Result<TokenAmount> {
        self.writer.allowance(&self.address, contract).await
    }

    async fn place_bet(
        &self,
        contract: &str,
        round_id: RoundId,
        selection: Selection,
        amount_units: u128,
    ) -> Result<SubmittedTx> {
        // Range/zero validation happens before any network traffic.
        let stake = TokenAmount::bet_stake(amount_units)?;

        let balance = self.balance().await?;
        if balance < stake {
            return Err(ServiceError::insufficient_balance(stake, balance));
        }

        let approved = self.allowance(contract).await?;
        if approved < stake {
            return Err(ServiceError::insufficient_allowance(stake, approved));
        }

        let correlation_id = Uuid::new_v4();
        let call = PlaceBetCall {
            round_id,
            selection,
            amount: stake,
            from: self.address.clone(),
        };

        let tx_hash = self.writer.place_bet(contract, &call).await?;

        info!(
            %correlation_id,
            %round_id,
            stake = %stake,
            tx_hash = %tx_hash,
            "Bet submitted"
        );
        metrics::counter!("bets_submitted_total").increment(1);

        Ok(SubmittedTx {
            correlation_id,
            tx_hash,
        })
    }

    async fn wait_for_confirmation(&self, tx_hash: &str, timeout: Duration) -> Result<TxReceipt> {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_max_interval(Duration::from_secs(5))
            .with_max_elapsed_time(Some(timeout))
            .build();

        let receipt = backoff::future::retry(backoff, || async {
            match self.writer.transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => Ok(receipt),
                Ok(None) => Err(backoff::Error::transient(ServiceError::new(
                    ErrorCategory::NotFound,
                    ErrorCode::NOT_FOUND_TX,
                    format!("Transaction {} not yet mined", tx_hash),
                ))),
                Err(err) if err.is_retryable() => Err(backoff::Error::transient(err)),
                Err(err) => Err(backoff::Error::permanent(err)),
            }
        })
        .await
        .map_err(|err| {
            if err.code == ErrorCode::NOT_FOUND_TX.as_str() {
                // Gave up while the receipt was still pending.
                ServiceError::new(
                    ErrorCategory::Contract,
                    ErrorCode::CONTRACT_TX_TIMEOUT,
                    format!("Transaction {} unconfirmed after {:?}", tx_hash, timeout),
                )
            } else {
                err
            }
        })?;

        if !receipt.success {
            warn!(tx_hash, "Transaction reverted on chain");
            return Err(ServiceError::tx_failed(tx_hash, "receipt status 0"));
        }

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockWriter {
        balance: TokenAmount,
        allowance: TokenAmount,
        receipts: Mutex<Vec<Option<TxReceipt>>>,
        receipt_polls: AtomicUsize,
        submissions: AtomicUsize,
    }

    impl MockWriter {
        fn new(balance: TokenAmount, allowance: TokenAmount) -> Self {
            Self {
                balance,
                allowance,
                receipts: Mutex::new(Vec::new()),
                receipt_polls: AtomicUsize::new(0),
                submissions: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ContractWriter for MockWriter {
        async fn place_bet(&self, _: &str, _: &PlaceBetCall) -> Result<String> {
            self.submissions.fetch_add(1, Ordering::SeqCst);
            Ok("0xtxhash".to_string())
        }

        async fn request_calculation(&self, _: &str, _: RoundId) -> Result<String> {
            Ok("0xcalc".to_string())
        }

        async fn balance_of(&self, _: &PlayerAddress) -> Result<TokenAmount> {
            Ok(self.balance)
        }

        async fn allowance(&self, _: &PlayerAddress, _: &str) -> Result<TokenAmount> {
            Ok(self.allowance)
        }

        async fn transaction_receipt(&self, _: &str) -> Result<Option<TxReceipt>> {
            self.receipt_polls.fetch_add(1, Ordering::SeqCst);
            let mut receipts = self.receipts.lock().unwrap();
            if receipts.is_empty() {
                Ok(None)
            } else {
                Ok(receipts.remove(0))
            }
        }
    }

    fn wallet_with(writer: MockWriter) -> (RpcWallet, Arc<MockWriter>) {
        let writer = Arc::new(writer);
        let wallet = RpcWallet::new(
            writer.clone(),
            PlayerAddress::try_from("0x00000000000000000000000000000000000000aa").unwrap(),
        );
        (wallet, writer)
    }

    #[tokio::test]
    async fn test_zero_amount_rejected_before_any_call() {
        let (wallet, writer) =
            wallet_with(MockWriter::new(TokenAmount::from_tokens(10), TokenAmount::from_tokens(10)));

        let err = wallet
            .place_bet("0xgame", RoundId::new(1), Selection::Entry, 0)
            .await
            .unwrap_err();

        assert_eq!(err.category, ErrorCategory::Validation);
        assert_eq!(writer.submissions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_insufficient_balance_rejected() {
        let (wallet, writer) =
            wallet_with(MockWriter::new(TokenAmount::from_tokens(1), TokenAmount::from_tokens(100)));

        let err = wallet
            .place_bet(
                "0xgame",
                RoundId::new(1),
                Selection::Entry,
                5 * games_shared::constants::TOKEN_UNIT,
            )
            .await
            .unwrap_err();

        assert_eq!(err.code, "VALIDATION_INSUFFICIENT_BALANCE");
        assert_eq!(writer.submissions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_insufficient_allowance_rejected() {
        let (wallet, writer) =
            wallet_with(MockWriter::new(TokenAmount::from_tokens(100), TokenAmount::from_tokens(1)));

        let err = wallet
            .place_bet(
                "0xgame",
                RoundId::new(1),
                Selection::Entry,
                5 * games_shared::constants::TOKEN_UNIT,
            )
            .await
            .unwrap_err();

        assert_eq!(err.code, "VALIDATION_INSUFFICIENT_ALLOWANCE");
        assert_eq!(writer.submissions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_place_bet_submits_and_tracks() {
        let (wallet, writer) = wallet_with(MockWriter::new(
            TokenAmount::from_tokens(100),
            TokenAmount::from_tokens(100),
        ));

        let tx = wallet
            .place_bet(
                "0xgame",
                RoundId::new(1),
                Selection::Entry,
                5 * games_shared::constants::TOKEN_UNIT,
            )
            .await
            .unwrap();

        assert_eq!(tx.tx_hash, "0xtxhash");
        assert_eq!(writer.submissions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_confirmation_polls_until_mined() {
        let writer = MockWriter::new(TokenAmount::from_tokens(10), TokenAmount::from_tokens(10));
        writer.receipts.lock().unwrap().extend([
            None,
            Some(TxReceipt {
                tx_hash: "0xtxhash".to_string(),
                success: true,
                block_number: 42,
            }),
        ]);
        let (wallet, writer) = wallet_with(writer);

        let receipt = wallet
            .wait_for_confirmation("0xtxhash", Duration::from_secs(30))
            .await
            .unwrap();

        assert!(receipt.success);
        assert!(writer.receipt_polls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_reverted_receipt_is_tx_failure() {
        let writer = MockWriter::new(TokenAmount::from_tokens(10), TokenAmount::from_tokens(10));
        writer.receipts.lock().unwrap().push(Some(TxReceipt {
            tx_hash: "0xtxhash".to_string(),
            success: false,
            block_number: 42,
        }));
        let (wallet, _) = wallet_with(writer);

        let err = wallet
            .wait_for_confirmation("0xtxhash", Duration::from_secs(5))
            .await
            .unwrap_err();

        assert_eq!(err.code, "CONTRACT_TX_FAILED");
    }
}
