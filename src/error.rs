//! Composer error taxonomy
//!
//! Upstream failures (RPC, HTTP) propagate unchanged; nothing here is
//! retried or recovered locally.

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::types::{ActionType, ProtocolId};

#[derive(Debug, Error)]
pub enum ComposerError {
    /// The protocol does not implement the requested action. Raised
    /// before any state mutation or network call.
    #[error("action {action} is not supported on {protocol}")]
    UnsupportedAction {
        action: ActionType,
        protocol: ProtocolId,
    },

    /// The session queue already holds the maximum number of actions.
    #[error("action queue is full ({capacity} steps)")]
    QueueFull { capacity: usize },

    /// The routing service found no viable path for a swap.
    #[error("no viable route for swap {source_mint} -> {destination}")]
    EmptyRoute {
        source_mint: Pubkey,
        destination: Pubkey,
    },

    /// A fetched account could not be interpreted as the expected
    /// descriptor kind.
    #[error("malformed {kind} descriptor at {address}: {reason}")]
    BadDescriptor {
        kind: &'static str,
        address: Pubkey,
        reason: String,
    },

    /// No descriptor decoder registered for the protocol family.
    #[error("no descriptor decoder registered for {0}")]
    MissingDecoder(ProtocolId),

    /// An adapter was handed a descriptor of the wrong kind.
    #[error("adapter for {protocol} expected a {expected} descriptor")]
    DescriptorMismatch {
        protocol: ProtocolId,
        expected: &'static str,
    },

    #[error("rpc error: {0}")]
    Rpc(#[from] solana_client::client_error::ClientError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The router answered but its payload could not be used.
    #[error("router response malformed: {0}")]
    RouterResponse(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ComposerError>;
