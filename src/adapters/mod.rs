//! Protocol adapter instances
//!
//! One adapter per protocol family, all behind the uniform
//! [`ProtocolAdapter`](crate::adapter::ProtocolAdapter) contract. Adapters
//! differ only in how they fill the dispatcher's pass-through account
//! list and encode their payload bytes.

mod amm;
mod farm;
mod lending;
mod nft;
mod vault;

pub use amm::AmmAdapter;
pub use farm::FarmAdapter;
pub use lending::LendingAdapter;
pub use nft::NftVaultAdapter;
pub use vault::VaultAdapter;

use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_instruction;
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;
use std::sync::Arc;

use crate::adapter::AdapterRegistry;
use crate::error::Result;
use crate::types::{ActionType, ProtocolId};

/// Associated token account for `owner` and `mint`.
pub(crate) fn ata(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    get_associated_token_address(owner, mint)
}

/// Idempotent ATA creation, funded by the owner.
pub(crate) fn create_ata(owner: &Pubkey, mint: &Pubkey) -> Instruction {
    create_associated_token_account_idempotent(owner, owner, mint, &spl_token::id())
}

/// Wrap `amount` lamports into the owner's wSOL account. Returns the
/// instructions and the wrapped account address.
pub(crate) fn wrap_native(owner: &Pubkey, amount: u64) -> Result<(Vec<Instruction>, Pubkey)> {
    let native_mint = spl_token::native_mint::id();
    let wrapped = ata(owner, &native_mint);
    let instructions = vec![
        create_ata(owner, &native_mint),
        system_instruction::transfer(owner, &wrapped, amount),
        spl_token::instruction::sync_native(&spl_token::id(), &wrapped)
            .map_err(anyhow::Error::from)?,
    ];
    Ok((instructions, wrapped))
}

/// Close the owner's wSOL account, returning lamports to the owner.
pub(crate) fn unwrap_native(owner: &Pubkey) -> Result<Instruction> {
    let wrapped = ata(owner, &spl_token::native_mint::id());
    let ix = spl_token::instruction::close_account(&spl_token::id(), &wrapped, owner, owner, &[])
        .map_err(anyhow::Error::from)?;
    Ok(ix)
}

/// Build the registry covering every supported protocol/action pair.
pub fn default_registry() -> Result<AdapterRegistry> {
    let mut registry = AdapterRegistry::new();

    let amm = Arc::new(AmmAdapter::new());
    for protocol in [ProtocolId::Raydium, ProtocolId::Orca, ProtocolId::Saber] {
        registry.register(
            amm.clone(),
            protocol,
            &[
                ActionType::Swap,
                ActionType::AddLiquidity,
                ActionType::RemoveLiquidity,
                ActionType::RemoveLiquiditySingleSide,
            ],
        )?;
    }
    // Concentrated pools have no single-sided removal path.
    registry.register(
        amm.clone(),
        ProtocolId::Whirlpool,
        &[
            ActionType::Swap,
            ActionType::AddLiquidity,
            ActionType::RemoveLiquidity,
        ],
    )?;

    let farm = Arc::new(FarmAdapter::new());
    for protocol in [ProtocolId::Quarry, ProtocolId::Raydium] {
        registry.register(
            farm.clone(),
            protocol,
            &[ActionType::Stake, ActionType::Unstake, ActionType::Harvest],
        )?;
    }

    let lending = Arc::new(LendingAdapter::new());
    for protocol in [ProtocolId::Solend, ProtocolId::Larix] {
        registry.register(
            lending.clone(),
            protocol,
            &[
                ActionType::Supply,
                ActionType::Unsupply,
                ActionType::Borrow,
                ActionType::Repay,
                ActionType::Collateralize,
                ActionType::Uncollateralize,
                ActionType::ClaimCollateralReward,
            ],
        )?;
    }

    let vault = Arc::new(VaultAdapter::new());
    registry.register(
        vault.clone(),
        ProtocolId::Tulip,
        &[ActionType::Deposit, ActionType::Withdraw],
    )?;
    // Epoch-based vaults stage deposits and withdrawals.
    registry.register(
        vault.clone(),
        ProtocolId::Katana,
        &[
            ActionType::Deposit,
            ActionType::Withdraw,
            ActionType::InitiateDeposit,
            ActionType::FinalizeDeposit,
            ActionType::CancelDeposit,
            ActionType::InitiateWithdrawal,
            ActionType::FinalizeWithdrawal,
            ActionType::CancelWithdrawal,
        ],
    )?;

    let nft = Arc::new(NftVaultAdapter::new());
    registry.register(
        nft,
        ProtocolId::Frakt,
        &[
            ActionType::LockNft,
            ActionType::UnlockNft,
            ActionType::StakeProof,
            ActionType::UnstakeProof,
            ActionType::Claim,
        ],
    )?;

    Ok(registry)
}
