use solana_client::{
    client_error::{ClientError, ClientErrorKind},
    rpc_request::RpcError,
};
use thiserror::Error;

/// Ledger client error types
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// Transport-level errors (network, connection, HTTP)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    /// A call did not complete within its deadline
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// RPC response errors (from the RPC server)
    #[error("RPC response error: {message} (code: {code:?})")]
    RpcResponse { message: String, code: Option<i64> },

    /// The cluster accepted the request but rejected the transaction
    #[error("Transaction rejected: {0}")]
    Rejected(String),

    /// The response could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl LedgerError {
    /// Check if this error is transient
    ///
    /// The pipeline never retries on its own; this only shapes diagnostics so
    /// the operator knows whether a rerun is likely to help.
    pub fn is_transient(&self) -> bool {
        match self {
            LedgerError::Transport { .. } => true,
            LedgerError::Timeout { .. } => true,
            LedgerError::RpcResponse { code, .. } => {
                // Server-side failures and rate limiting
                matches!(code, Some(c) if (500..600).contains(c) || *c == 429)
            }
            LedgerError::Rejected(_) => false,
            LedgerError::InvalidResponse(_) => false,
        }
    }

    /// Create from ClientError with context
    pub fn from_client_error(err: ClientError, endpoint: &str) -> Self {
        match err.kind() {
            ClientErrorKind::RpcError(RpcError::RpcResponseError { code, message, .. }) => {
                LedgerError::RpcResponse {
                    message: message.clone(),
                    code: Some(*code),
                }
            }
            ClientErrorKind::TransactionError(tx_err) => LedgerError::Rejected(tx_err.to_string()),
            ClientErrorKind::SerdeJson(e) => LedgerError::InvalidResponse(e.to_string()),
            _ => {
                let err_str = err.to_string();
                let lowered = err_str.to_lowercase();
                if lowered.contains("timeout") || lowered.contains("timed out") {
                    LedgerError::Timeout {
                        operation: "rpc request",
                        timeout_ms: 0,
                    }
                } else {
                    LedgerError::Transport {
                        endpoint: endpoint.to_string(),
                        message: err_str,
                    }
                }
            }
        }
    }
}
