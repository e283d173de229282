//! Error types for the dashboard core

use thiserror::Error;

use crate::{ecosystem::Layer, numeric::InvalidNumber};

/// Multicall encode/decode errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid function signature `{signature}`: {reason}")]
    Signature { signature: String, reason: String },

    #[error("Invalid ABI type `{ty}`: {reason}")]
    Type { ty: String, reason: String },

    #[error("ABI error in `{call}`: {source}")]
    Abi {
        call: String,
        #[source]
        source: alloy::dyn_abi::Error,
    },

    #[error("Aggregate returned {actual} results for {expected} calls")]
    ResultCount { expected: usize, actual: usize },

    #[error("Unexpected return value in `{call}`: expected {expected}")]
    Shape { call: String, expected: &'static str },

    #[error("Missing result `{0}`")]
    MissingResult(String),

    #[error("Call `{0}` is already part of the batch")]
    DuplicateCall(String),
}

/// Errors coming back from the wallet or RPC node
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    /// Raw provider failure, carrying the provider's original message.
    #[error("{message}")]
    Provider { message: String },

    /// A contract call reverted with a readable reason.
    #[error("{reason}")]
    Reverted { reason: String },

    #[error("Wallet has no accounts available")]
    NoAccounts,
}

impl ChainError {
    pub fn provider(message: impl Into<String>) -> Self {
        ChainError::Provider {
            message: message.into(),
        }
    }

    /// Turn a raw provider failure into [`ChainError::Reverted`] when a revert
    /// reason can be extracted from it.
    pub fn into_revert(self) -> Self {
        match self {
            ChainError::Provider { message } => match parse_revert_reason(&message) {
                Some(reason) => ChainError::Reverted { reason },
                None => ChainError::Provider { message },
            },
            other => other,
        }
    }
}

/// Errors surfaced by query executors
#[derive(Debug, Error)]
pub enum QueryError {
    /// The aggregated read failed after every retry.
    #[error("{err} (network {network_type:?}, chain {net_id})")]
    Rpc {
        err: String,
        net_id: u64,
        network_type: Layer,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("No address selected")]
    NoSelectedAddress,

    #[error("{0} is not available in this ecosystem")]
    Unsupported(&'static str),

    #[error("Amount is too large to quote")]
    AmountTooLarge,
}

/// Reasons a known command is rejected. The state keeps only the message.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error(transparent)]
    InvalidNumber(#[from] InvalidNumber),

    #[error("No address selected")]
    NoSelectedAddress,

    #[error("Account state has not been loaded yet")]
    AccountNotLoaded,

    #[error("Authorize the minting contract as an operator first")]
    OperatorNotAuthorized,
}

const REVERT_MARKERS: [&str; 3] = [
    "reverted with reason string '",
    "execution reverted: ",
    "revert ",
];

/// Extract a human-readable revert reason from a raw provider error.
///
/// Providers report reverts in several shapes: plain text
/// (`execution reverted: Insufficient balance`), hardhat style
/// (`reverted with reason string 'X'`), or a JSON body embedded inside the
/// message (`... {"code":3,"message":"execution reverted: X"}`).
pub fn parse_revert_reason(raw: &str) -> Option<String> {
    if let Some(reason) = json_message(raw).and_then(|message| parse_revert_reason(&message)) {
        return Some(reason);
    }

    for marker in REVERT_MARKERS {
        let Some(start) = raw.find(marker) else {
            continue;
        };
        let rest = &raw[start + marker.len()..];
        let reason = rest
            .split(['\'', '"', '\n'])
            .next()
            .unwrap_or_default()
            .trim()
            .trim_end_matches(',');

        if !reason.is_empty() {
            return Some(reason.to_owned());
        }
    }

    None
}

/// Find a `{...}` JSON object inside a message and return its `message` field,
/// looking one level into `error` / `data` objects as well.
fn json_message(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(&raw[start..=end]).ok()?;

    let message = [&value, &value["error"], &value["data"]]
        .into_iter()
        .find_map(|v| v["message"].as_str())
        .map(str::to_owned);
    message
}
