//! RPC-backed ledger client
//!
//! Wraps the nonblocking `RpcClient` behind [`LedgerClient`]. One instance
//! is constructed per run and passed by reference into the pipeline.

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use solana_account_decoder::UiAccountEncoding;
use solana_client::{client_error::ClientError, nonblocking::rpc_client::RpcClient};
use solana_rpc_client_api::{
    config::{RpcAccountInfoConfig, RpcSimulateTransactionConfig},
    request::RpcRequest,
    response::{Response, RpcKeyedAccount},
};
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::Transaction,
};
use tracing::{debug, warn};

use super::{LedgerClient, LedgerError, RawTokenAccount, SimulationReport, TokenBalance};

/// Connection settings for [`RpcLedger`]
#[derive(Debug, Clone)]
pub struct RpcLedgerConfig {
    /// RPC endpoint URL
    pub endpoint: String,
    /// Deadline for a single request
    pub request_timeout: Duration,
    /// Deadline for a submitted transaction to reach `confirmed`
    pub confirm_timeout: Duration,
}

/// Production [`LedgerClient`] over JSON-RPC
pub struct RpcLedger {
    client: RpcClient,
    endpoint: String,
    request_timeout: Duration,
    confirm_timeout: Duration,
}

impl std::fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedger")
            .field("endpoint", &self.endpoint)
            .field("request_timeout", &self.request_timeout)
            .field("confirm_timeout", &self.confirm_timeout)
            .finish()
    }
}

impl RpcLedger {
    pub fn new(config: RpcLedgerConfig) -> Self {
        let client = RpcClient::new_with_timeouts_and_commitment(
            config.endpoint.clone(),
            config.request_timeout,
            CommitmentConfig::confirmed(),
            config.confirm_timeout,
        );

        Self {
            client,
            endpoint: config.endpoint,
            request_timeout: config.request_timeout,
            confirm_timeout: config.confirm_timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_err(&self, err: ClientError) -> LedgerError {
        LedgerError::from_client_error(err, &self.endpoint)
    }

    /// Run `fut` under `deadline`, mapping both expiry and client errors.
    async fn bounded<T, F>(
        &self,
        operation: &'static str,
        deadline: Duration,
        fut: F,
    ) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, ClientError>>,
    {
        match tokio::time::timeout(deadline, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(self.map_err(e)),
            Err(_) => {
                warn!(operation, timeout_ms = deadline.as_millis() as u64, "Ledger call timed out");
                Err(LedgerError::Timeout {
                    operation,
                    timeout_ms: deadline.as_millis() as u64,
                })
            }
        }
    }
}

#[async_trait]
impl LedgerClient for RpcLedger {
    async fn token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        program_id: &Pubkey,
    ) -> Result<Vec<RawTokenAccount>, LedgerError> {
        // Base64 encoding keeps the raw account layout intact for local decoding
        let account_config = RpcAccountInfoConfig {
            encoding: Some(UiAccountEncoding::Base64),
            commitment: Some(CommitmentConfig::confirmed()),
            ..RpcAccountInfoConfig::default()
        };
        let params = json!([
            owner.to_string(),
            { "programId": program_id.to_string() },
            account_config,
        ]);

        let response: Response<Vec<RpcKeyedAccount>> = self
            .bounded(
                "getTokenAccountsByOwner",
                self.request_timeout,
                self.client.send(RpcRequest::GetTokenAccountsByOwner, params),
            )
            .await?;

        debug!(
            slot = response.context.slot,
            count = response.value.len(),
            "Token accounts enumerated"
        );

        response
            .value
            .into_iter()
            .map(|keyed| {
                let address = Pubkey::from_str(&keyed.pubkey).map_err(|e| {
                    LedgerError::InvalidResponse(format!(
                        "invalid account address {}: {}",
                        keyed.pubkey, e
                    ))
                })?;
                let data = keyed.account.data.decode().ok_or_else(|| {
                    LedgerError::InvalidResponse(format!(
                        "account {} data is not base64 encoded",
                        address
                    ))
                })?;
                Ok(RawTokenAccount {
                    address,
                    lamports: keyed.account.lamports,
                    data,
                })
            })
            .collect()
    }

    async fn token_account_balance(&self, account: &Pubkey) -> Result<TokenBalance, LedgerError> {
        let ui_amount = self
            .bounded(
                "getTokenAccountBalance",
                self.request_timeout,
                self.client.get_token_account_balance(account),
            )
            .await?;

        let amount = ui_amount.amount.parse::<u64>().map_err(|e| {
            LedgerError::InvalidResponse(format!(
                "token amount '{}' for {} is not a u64: {}",
                ui_amount.amount, account, e
            ))
        })?;

        Ok(TokenBalance {
            amount,
            decimals: ui_amount.decimals,
            ui_amount: ui_amount.ui_amount,
        })
    }

    async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
        self.bounded(
            "getLatestBlockhash",
            self.request_timeout,
            self.client.get_latest_blockhash(),
        )
        .await
    }

    async fn simulate_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<SimulationReport, LedgerError> {
        let config = RpcSimulateTransactionConfig {
            sig_verify: true,
            commitment: Some(CommitmentConfig::confirmed()),
            ..RpcSimulateTransactionConfig::default()
        };

        let response = self
            .bounded(
                "simulateTransaction",
                self.request_timeout,
                self.client.simulate_transaction_with_config(transaction, config),
            )
            .await?;

        let result = response.value;
        Ok(SimulationReport {
            err: result.err.map(|e| format!("{:?}", e)),
            logs: result.logs.unwrap_or_default(),
            units_consumed: result.units_consumed,
        })
    }

    async fn send_and_confirm_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<Signature, LedgerError> {
        // The client polls for confirmation internally; the outer deadline
        // covers submission plus the full confirmation window.
        let deadline = self.request_timeout + self.confirm_timeout;
        self.bounded(
            "sendAndConfirmTransaction",
            deadline,
            self.client.send_and_confirm_transaction(transaction),
        )
        .await
    }
}
