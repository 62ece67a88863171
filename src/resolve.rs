//! Direction and cross-step dependency resolution
//!
//! Runs after every enqueue and once more at finalize. Pure over its
//! inputs: the same queue and metadata always produce the same
//! [`Resolution`], so repeated runs are harmless.

use tracing::debug;

use crate::queue::ActionQueue;
use crate::types::{ActionType, CompositionMetadata, PoolDirection};

/// A pending rewrite of a queued entry's headline amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountRewrite {
    pub index: usize,
    pub amount: u64,
}

/// Outcome of one resolver pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub direction: PoolDirection,
    pub rewrite: Option<AmountRewrite>,
}

/// Compute the implicit pool direction and any dependency rewrite.
///
/// Direction follows the side the user is moving funds from: a queued
/// swap's source token selects the pool leg being fed. Without a swap,
/// an add-liquidity target token selects the opposite leg, because the
/// named token is the one the caller already holds.
///
/// The rewrite implements the zap: once a swap has a nonzero guaranteed
/// minimum output and an add-liquidity step sits later in the queue, that
/// step's amount becomes the swap's minimum output. An add-liquidity at
/// position 0 predates any swap and is never rewritten.
pub fn resolve(
    queue: &ActionQueue,
    swap_min_out: u64,
    metadata: &CompositionMetadata,
) -> Resolution {
    let direction = resolve_direction(metadata);

    let rewrite = if swap_min_out > 0 {
        queue
            .position_of(ActionType::AddLiquidity)
            .filter(|index| *index > 0)
            .map(|index| AmountRewrite {
                index,
                amount: swap_min_out,
            })
    } else {
        None
    };

    Resolution { direction, rewrite }
}

fn resolve_direction(metadata: &CompositionMetadata) -> PoolDirection {
    let Some(pool) = &metadata.pool else {
        return PoolDirection::default();
    };

    if let Some(source) = metadata.swap_source_mint {
        if pool.token_a_mint == source {
            return PoolDirection::Obverse;
        }
        return PoolDirection::Reverse;
    }

    if let Some(target) = metadata.liquidity_mint {
        // Inverted relative to the swap rule: the named token is the leg
        // the caller supplies directly, so the other leg is the input.
        if pool.token_a_mint == target {
            return PoolDirection::Reverse;
        }
        return PoolDirection::Obverse;
    }

    PoolDirection::default()
}

/// Apply a resolution's rewrite to the queue.
pub fn apply(queue: &mut ActionQueue, resolution: &Resolution) {
    if let Some(rewrite) = resolution.rewrite {
        debug!(
            index = rewrite.index,
            amount = rewrite.amount,
            "rewriting queued add-liquidity amount to swap minimum output"
        );
        queue.set_amount(rewrite.index, rewrite.amount);
    }
}
