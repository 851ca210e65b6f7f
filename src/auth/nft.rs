//! ERC-721 ownership check
//!
//! Read-only `balanceOf` query over JSON-RPC `eth_call`. Any failure to get a
//! definite answer is reported as `Unknown` and treated as "not owned".

use std::time::Duration;

use reqwest::Client;
use serde_json::json;

use crate::config::NftConfig;

/// `balanceOf(address)` selector
const BALANCE_OF_SELECTOR: &str = "70a08231";

/// Result of an ownership query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NftOwnership {
    Owned,
    NotOwned,
    /// RPC failed or returned something unusable
    Unknown(String),
}

impl NftOwnership {
    /// Fail closed: only a definite positive answer counts
    pub fn owns(&self) -> bool {
        matches!(self, NftOwnership::Owned)
    }
}

/// ABI-encoded call data for `balanceOf(owner)`. `owner` must already be a
/// validated `0x` address.
pub fn balance_of_call_data(owner: &str) -> String {
    let hex_part = owner.trim_start_matches("0x").to_ascii_lowercase();
    format!("0x{}{:0>64}", BALANCE_OF_SELECTOR, hex_part)
}

/// Interpret an `eth_call` result as a uint256 balance
pub fn parse_balance(result: &str) -> NftOwnership {
    let hex_part = result.trim().trim_start_matches("0x");
    if hex_part.is_empty() {
        // empty return data: no contract at that address
        return NftOwnership::Unknown("empty call result".to_string());
    }
    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return NftOwnership::Unknown(format!("malformed call result: {}", result));
    }
    if hex_part.chars().any(|c| c != '0') {
        NftOwnership::Owned
    } else {
        NftOwnership::NotOwned
    }
}

/// NFT ownership client. Without configuration every check is `NotOwned`.
#[derive(Clone)]
pub struct NftChecker {
    client: Client,
    config: Option<NftConfig>,
}

impl NftChecker {
    pub fn new(config: Option<NftConfig>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            config,
        }
    }

    pub fn disabled() -> Self {
        Self {
            client: Client::new(),
            config: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Ownership of the configured contract's tokens
    pub async fn check(&self, owner: &str) -> NftOwnership {
        let contract = match &self.config {
            Some(config) => config.contract_address.clone(),
            None => return NftOwnership::NotOwned,
        };
        self.check_ownership(owner, &contract).await
    }

    /// Convenience over [`check`](Self::check) for callers that only need a flag
    pub async fn owns(&self, owner: &str) -> bool {
        self.check(owner).await.owns()
    }

    /// Ownership of tokens from `contract`
    pub async fn check_ownership(&self, owner: &str, contract: &str) -> NftOwnership {
        let rpc_url = match &self.config {
            Some(config) => config.rpc_url.as_str(),
            None => return NftOwnership::NotOwned,
        };

        let outcome = match self.call_balance_of(rpc_url, owner, contract).await {
            Ok(result) => parse_balance(&result),
            Err(reason) => NftOwnership::Unknown(reason),
        };

        if let NftOwnership::Unknown(reason) = &outcome {
            tracing::warn!(
                wallet = %owner,
                contract = %contract,
                reason = %reason,
                "NFT ownership check failed, treating as not owned"
            );
        }
        outcome
    }

    async fn call_balance_of(
        &self,
        rpc_url: &str,
        owner: &str,
        contract: &str,
    ) -> Result<String, String> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [
                {
                    "to": contract,
                    "data": balance_of_call_data(owner)
                },
                "latest"
            ]
        });

        let resp = self
            .client
            .post(rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| e.to_string())?
            .json::<serde_json::Value>()
            .await
            .map_err(|e| e.to_string())?;

        if let Some(err) = resp.get("error") {
            return Err(format!("RPC error: {}", err));
        }

        resp.get("result")
            .and_then(|r| r.as_str())
            .map(str::to_string)
            .ok_or_else(|| "No result in RPC response".to_string())
    }
}
