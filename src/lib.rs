//! Client-side composer for batched on-chain DeFi actions
//!
//! This library builds ordered action queues against a generic on-chain
//! dispatcher program: callers enqueue swaps, liquidity moves, farm,
//! lending, vault, and NFT-vault steps, and finalize into open / step /
//! close instruction batches ready to sign and send.

pub mod adapter;
pub mod adapters;
pub mod composer;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod fetcher;
pub mod queue;
pub mod resolve;
pub mod router;
pub mod telemetry;
pub mod types;

// Re-export main types
pub use adapter::{AdapterOutput, AdapterRegistry, ProtocolAdapter, StepRequest};
pub use composer::{ComposeContext, ComposedBatch, Composer};
pub use config::ComposerConfig;
pub use error::{ComposerError, Result};
pub use fetcher::{InMemoryStateFetcher, RpcStateFetcher, StateFetcher};
pub use queue::{ActionQueue, QueueRecord};
pub use router::{HttpRouter, RouteQuote, SwapRouter};
pub use types::{ActionType, PoolDirection, ProtocolId, QueueEntry};
