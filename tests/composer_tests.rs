//! Integration tests for the batch composer
//!
//! Exercises the full flow: enqueue typed actions against stubbed
//! protocol state, resolve direction and dependencies, finalize into
//! dispatcher instruction batches.

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

use sol_batch_composer::adapters::default_registry;
use sol_batch_composer::composer::{
    AddLiquidityParams, ClaimParams, FarmParams, HarvestParams, NftParams, SwapParams, VaultParams,
};
use sol_batch_composer::types::{
    FarmDescriptor, PoolDescriptor, VaultDescriptor, MAX_QUEUE_ACTIONS,
};
use sol_batch_composer::{
    ActionType, ComposeContext, Composer, ComposerError, InMemoryStateFetcher, PoolDirection,
    ProtocolId, QueueRecord, Result, RouteQuote, SwapRouter,
};

/// Router stub answering every pair with a fixed guaranteed minimum.
struct FixedRouter {
    min_out: u64,
}

#[async_trait]
impl SwapRouter for FixedRouter {
    async fn quote(
        &self,
        _source: Pubkey,
        _destination: Pubkey,
        amount: u64,
        _slippage_bps: u16,
    ) -> Result<RouteQuote> {
        Ok(RouteQuote {
            input_amount: amount,
            output_amount: self.min_out + self.min_out / 100,
            min_output_amount: self.min_out,
            hop_count: 1,
        })
    }
}

fn pool_descriptor() -> PoolDescriptor {
    PoolDescriptor {
        address: Pubkey::new_unique(),
        program_id: Pubkey::new_unique(),
        token_a_mint: Pubkey::new_unique(),
        token_b_mint: Pubkey::new_unique(),
        token_a_vault: Pubkey::new_unique(),
        token_b_vault: Pubkey::new_unique(),
        lp_mint: Pubkey::new_unique(),
        authority: Pubkey::new_unique(),
        version: 1,
    }
}

fn farm_descriptor() -> FarmDescriptor {
    FarmDescriptor {
        address: Pubkey::new_unique(),
        program_id: Pubkey::new_unique(),
        staked_mint: Pubkey::new_unique(),
        reward_mint: Pubkey::new_unique(),
        reward_vault: Pubkey::new_unique(),
        authority: Pubkey::new_unique(),
    }
}

fn vault_descriptor() -> VaultDescriptor {
    VaultDescriptor {
        address: Pubkey::new_unique(),
        program_id: Pubkey::new_unique(),
        underlying_mint: Pubkey::new_unique(),
        share_mint: Pubkey::new_unique(),
        underlying_vault: Pubkey::new_unique(),
        authority: Pubkey::new_unique(),
    }
}

fn context(fetcher: InMemoryStateFetcher, min_out: u64) -> Arc<ComposeContext> {
    Arc::new(ComposeContext::new(
        Pubkey::new_unique(),
        default_registry().unwrap(),
        Arc::new(fetcher),
        Arc::new(FixedRouter { min_out }),
        50,
    ))
}

/// Swap then add-liquidity on the same pool: direction derives from the
/// swap source, the add-liquidity amount becomes the swap's guaranteed
/// minimum output, and finalize emits one batch per step in order.
#[tokio::test]
async fn test_swap_into_liquidity_zap() {
    let pool = pool_descriptor();
    let mut fetcher = InMemoryStateFetcher::new();
    fetcher.insert_pool(pool.clone());
    let context = context(fetcher, 950);
    let mut composer = Composer::new(Pubkey::new_unique(), context.clone());

    composer
        .swap(SwapParams {
            protocol: ProtocolId::Raydium,
            pool: pool.address,
            source_mint: pool.token_a_mint,
            destination_mint: pool.token_b_mint,
            amount_in: 1000,
            slippage_bps: None,
            version: None,
        })
        .await
        .unwrap()
        .add_liquidity(AddLiquidityParams {
            protocol: ProtocolId::Raydium,
            pool: pool.address,
            token_mint: pool.token_b_mint,
            amount: 1000,
            version: None,
        })
        .await
        .unwrap();

    assert_eq!(composer.queue().len(), 2);
    assert_eq!(composer.direction(), PoolDirection::Obverse);
    assert_eq!(composer.swap_min_out(), 950);
    assert_eq!(composer.queue().get(0).unwrap().amount, 1000);
    // Rewritten to the swap's guaranteed minimum output.
    assert_eq!(composer.queue().get(1).unwrap().amount, 950);

    let batch = composer.finalize().unwrap();
    assert_eq!(batch.step_count(), 2);

    // Every step batch invokes the dispatcher exactly once.
    for step in &batch.steps {
        let dispatcher_calls = step
            .iter()
            .filter(|ix| ix.program_id == context.dispatcher_program)
            .count();
        assert_eq!(dispatcher_calls, 1);
    }

    // The open instruction carries the resolved queue record.
    let record = QueueRecord::decode(&batch.open.data[16..]).unwrap();
    assert_eq!(record.queue_size, 2);
    assert_eq!(record.direction, 0);
    assert_eq!(record.swap_min_out, 950);
    assert_eq!(record.actions[0], ActionType::Swap.tag());
    assert_eq!(record.actions[1], ActionType::AddLiquidity.tag());
    assert_eq!(record.amounts[1], 950);
}

/// Without a swap, an add-liquidity naming the pool's first token
/// resolves the opposite leg as the input side.
#[test]
fn test_liquidity_only_direction() {
    let pool = pool_descriptor();
    let mut fetcher = InMemoryStateFetcher::new();
    fetcher.insert_pool(pool.clone());
    let context = context(fetcher, 0);
    let mut composer = Composer::new(Pubkey::new_unique(), context);

    tokio_test::block_on(composer.add_liquidity(AddLiquidityParams {
        protocol: ProtocolId::Orca,
        pool: pool.address,
        token_mint: pool.token_a_mint,
        amount: 500,
        version: None,
    }))
    .unwrap();

    assert_eq!(composer.direction(), PoolDirection::Reverse);
    // No swap output: the amount stays as enqueued.
    assert_eq!(composer.queue().get(0).unwrap().amount, 500);
}

/// An unsupported protocol/action combination is rejected before any
/// descriptor fetch; the fetcher holds nothing, so reaching it would
/// fail with a different error.
#[tokio::test]
async fn test_unsupported_combination_rejected_first() {
    let context = context(InMemoryStateFetcher::new(), 0);
    let mut composer = Composer::new(Pubkey::new_unique(), context);

    let err = composer
        .swap(SwapParams {
            protocol: ProtocolId::Frakt,
            pool: Pubkey::new_unique(),
            source_mint: Pubkey::new_unique(),
            destination_mint: Pubkey::new_unique(),
            amount_in: 100,
            slippage_bps: None,
            version: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ComposerError::UnsupportedAction {
            action: ActionType::Swap,
            protocol: ProtocolId::Frakt,
        }
    ));
    assert!(composer.queue().is_empty());
}

/// The ninth enqueue fails with the capacity error and leaves the first
/// eight untouched.
#[tokio::test]
async fn test_capacity_limit() {
    let farm = farm_descriptor();
    let mut fetcher = InMemoryStateFetcher::new();
    fetcher.insert_farm(farm.clone());
    let context = context(fetcher, 0);
    let mut composer = Composer::new(Pubkey::new_unique(), context);

    for i in 0..MAX_QUEUE_ACTIONS {
        composer
            .stake(FarmParams {
                protocol: ProtocolId::Quarry,
                farm: farm.address,
                amount: i as u64 + 1,
                version: None,
            })
            .await
            .unwrap();
    }

    let err = composer
        .stake(FarmParams {
            protocol: ProtocolId::Quarry,
            farm: farm.address,
            amount: 9,
            version: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ComposerError::QueueFull { capacity: 8 }));
    assert_eq!(composer.queue().len(), MAX_QUEUE_ACTIONS);
}

/// A failed enqueue leaves no partial state behind; the composer keeps
/// working afterwards.
#[tokio::test]
async fn test_composer_reusable_after_failed_enqueue() {
    let farm = farm_descriptor();
    let mut fetcher = InMemoryStateFetcher::new();
    fetcher.insert_farm(farm.clone());
    let context = context(fetcher, 0);
    let mut composer = Composer::new(Pubkey::new_unique(), context);

    // Pool is unknown to the fetcher, so the swap fails mid-flight.
    let err = composer
        .swap(SwapParams {
            protocol: ProtocolId::Raydium,
            pool: Pubkey::new_unique(),
            source_mint: Pubkey::new_unique(),
            destination_mint: Pubkey::new_unique(),
            amount_in: 100,
            slippage_bps: None,
            version: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ComposerError::BadDescriptor { .. }));
    assert!(composer.queue().is_empty());
    assert_eq!(composer.swap_min_out(), 0);

    composer
        .stake(FarmParams {
            protocol: ProtocolId::Quarry,
            farm: farm.address,
            amount: 10,
            version: None,
        })
        .await
        .unwrap();
    assert_eq!(composer.queue().len(), 1);
    assert_eq!(composer.queue().get(0).unwrap().action, ActionType::Stake);
}

/// Finalizing twice produces the same batch.
#[tokio::test]
async fn test_finalize_idempotent() {
    let farm = farm_descriptor();
    let mut fetcher = InMemoryStateFetcher::new();
    fetcher.insert_farm(farm.clone());
    let context = context(fetcher, 0);
    let mut composer = Composer::new(Pubkey::new_unique(), context);

    composer
        .harvest(HarvestParams {
            protocol: ProtocolId::Quarry,
            farm: farm.address,
            version: None,
        })
        .await
        .unwrap();

    let first = composer.finalize().unwrap();
    let second = composer.finalize().unwrap();
    assert_eq!(first.open.data, second.open.data);
    assert_eq!(first.step_count(), second.step_count());
    assert_eq!(first.close.data, second.close.data);
}

/// An empty composition still finalizes into a valid open/close pair.
#[tokio::test]
async fn test_empty_finalize() {
    let context = context(InMemoryStateFetcher::new(), 0);
    let mut composer = Composer::new(Pubkey::new_unique(), context);

    let batch = composer.finalize().unwrap();
    assert_eq!(batch.step_count(), 0);

    let record = QueueRecord::decode(&batch.open.data[16..]).unwrap();
    assert_eq!(record.queue_size, 0);

    // open + close only.
    assert_eq!(batch.instructions().len(), 2);
}

/// Staged vault actions and NFT locks flow through the same queue as
/// everything else; amount-less actions enqueue with their fixed values.
#[tokio::test]
async fn test_vault_and_nft_actions_enqueue() {
    let vault = vault_descriptor();
    let nft_vault = vault_descriptor();
    let mut fetcher = InMemoryStateFetcher::new();
    fetcher.insert_vault(vault.clone());
    fetcher.insert_vault(nft_vault.clone());
    let context = context(fetcher, 0);
    let mut composer = Composer::new(Pubkey::new_unique(), context);

    composer
        .initiate_deposit(VaultParams {
            protocol: ProtocolId::Katana,
            vault: vault.address,
            amount: 2_000,
            version: None,
        })
        .await
        .unwrap()
        .lock_nft(NftParams {
            protocol: ProtocolId::Frakt,
            vault: nft_vault.address,
            nft_mint: Pubkey::new_unique(),
            version: None,
        })
        .await
        .unwrap()
        .claim(ClaimParams {
            protocol: ProtocolId::Frakt,
            vault: nft_vault.address,
            version: None,
        })
        .await
        .unwrap();

    let entries = composer.queue().entries();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].action, ActionType::InitiateDeposit);
    assert_eq!(entries[0].amount, 2_000);
    assert_eq!(entries[1].action, ActionType::LockNft);
    assert_eq!(entries[1].amount, 1);
    assert_eq!(entries[2].action, ActionType::Claim);
    assert_eq!(entries[2].amount, 0);

    // Staged vaults are epoch-gated on Tulip's side: not registered.
    let err = composer
        .initiate_deposit(VaultParams {
            protocol: ProtocolId::Tulip,
            vault: vault.address,
            amount: 1,
            version: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ComposerError::UnsupportedAction { .. }));
}

/// Distinct composers derive distinct session accounts.
#[test]
fn test_session_addresses_unique_per_composer() {
    let context = context(InMemoryStateFetcher::new(), 0);
    let owner = Pubkey::new_unique();

    let a = Composer::new(owner, context.clone());
    let b = Composer::new(owner, context);
    assert_ne!(a.session_address(), b.session_address());
}
