//! Common types used throughout the composer

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt;

/// Maximum number of actions one session can queue.
pub const MAX_QUEUE_ACTIONS: usize = 8;

/// Fixed size of a per-step opaque payload, in bytes.
pub const STEP_PAYLOAD_LEN: usize = 32;

/// One typed DeFi operation queued for batched execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Swap,
    AddLiquidity,
    RemoveLiquidity,
    RemoveLiquiditySingleSide,
    Stake,
    Unstake,
    Harvest,
    Supply,
    Unsupply,
    Borrow,
    Repay,
    Collateralize,
    Uncollateralize,
    ClaimCollateralReward,
    Deposit,
    Withdraw,
    InitiateDeposit,
    FinalizeDeposit,
    CancelDeposit,
    InitiateWithdrawal,
    FinalizeWithdrawal,
    CancelWithdrawal,
    LockNft,
    UnlockNft,
    StakeProof,
    UnstakeProof,
    Claim,
}

impl ActionType {
    /// Stable wire tag. Never reorder: the dispatcher matches on these.
    pub fn tag(&self) -> u8 {
        match self {
            ActionType::Swap => 0,
            ActionType::AddLiquidity => 1,
            ActionType::RemoveLiquidity => 2,
            ActionType::RemoveLiquiditySingleSide => 3,
            ActionType::Stake => 4,
            ActionType::Unstake => 5,
            ActionType::Harvest => 6,
            ActionType::Supply => 7,
            ActionType::Unsupply => 8,
            ActionType::Borrow => 9,
            ActionType::Repay => 10,
            ActionType::Collateralize => 11,
            ActionType::Uncollateralize => 12,
            ActionType::ClaimCollateralReward => 13,
            ActionType::Deposit => 14,
            ActionType::Withdraw => 15,
            ActionType::InitiateDeposit => 16,
            ActionType::FinalizeDeposit => 17,
            ActionType::CancelDeposit => 18,
            ActionType::InitiateWithdrawal => 19,
            ActionType::FinalizeWithdrawal => 20,
            ActionType::CancelWithdrawal => 21,
            ActionType::LockNft => 22,
            ActionType::UnlockNft => 23,
            ActionType::StakeProof => 24,
            ActionType::UnstakeProof => 25,
            ActionType::Claim => 26,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        let action = match tag {
            0 => ActionType::Swap,
            1 => ActionType::AddLiquidity,
            2 => ActionType::RemoveLiquidity,
            3 => ActionType::RemoveLiquiditySingleSide,
            4 => ActionType::Stake,
            5 => ActionType::Unstake,
            6 => ActionType::Harvest,
            7 => ActionType::Supply,
            8 => ActionType::Unsupply,
            9 => ActionType::Borrow,
            10 => ActionType::Repay,
            11 => ActionType::Collateralize,
            12 => ActionType::Uncollateralize,
            13 => ActionType::ClaimCollateralReward,
            14 => ActionType::Deposit,
            15 => ActionType::Withdraw,
            16 => ActionType::InitiateDeposit,
            17 => ActionType::FinalizeDeposit,
            18 => ActionType::CancelDeposit,
            19 => ActionType::InitiateWithdrawal,
            20 => ActionType::FinalizeWithdrawal,
            21 => ActionType::CancelWithdrawal,
            22 => ActionType::LockNft,
            23 => ActionType::UnlockNft,
            24 => ActionType::StakeProof,
            25 => ActionType::UnstakeProof,
            26 => ActionType::Claim,
            _ => return None,
        };
        Some(action)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionType::Swap => "swap",
            ActionType::AddLiquidity => "add_liquidity",
            ActionType::RemoveLiquidity => "remove_liquidity",
            ActionType::RemoveLiquiditySingleSide => "remove_liquidity_single_side",
            ActionType::Stake => "stake",
            ActionType::Unstake => "unstake",
            ActionType::Harvest => "harvest",
            ActionType::Supply => "supply",
            ActionType::Unsupply => "unsupply",
            ActionType::Borrow => "borrow",
            ActionType::Repay => "repay",
            ActionType::Collateralize => "collateralize",
            ActionType::Uncollateralize => "uncollateralize",
            ActionType::ClaimCollateralReward => "claim_collateral_reward",
            ActionType::Deposit => "deposit",
            ActionType::Withdraw => "withdraw",
            ActionType::InitiateDeposit => "initiate_deposit",
            ActionType::FinalizeDeposit => "finalize_deposit",
            ActionType::CancelDeposit => "cancel_deposit",
            ActionType::InitiateWithdrawal => "initiate_withdrawal",
            ActionType::FinalizeWithdrawal => "finalize_withdrawal",
            ActionType::CancelWithdrawal => "cancel_withdrawal",
            ActionType::LockNft => "lock_nft",
            ActionType::UnlockNft => "unlock_nft",
            ActionType::StakeProof => "stake_proof",
            ActionType::UnstakeProof => "unstake_proof",
            ActionType::Claim => "claim",
        };
        write!(f, "{}", name)
    }
}

/// Which external protocol family handles an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolId {
    Raydium,
    Orca,
    Saber,
    Whirlpool,
    Quarry,
    Solend,
    Larix,
    Tulip,
    Katana,
    Frakt,
}

impl ProtocolId {
    /// Stable wire tag.
    pub fn tag(&self) -> u8 {
        match self {
            ProtocolId::Raydium => 0,
            ProtocolId::Orca => 1,
            ProtocolId::Saber => 2,
            ProtocolId::Whirlpool => 3,
            ProtocolId::Quarry => 4,
            ProtocolId::Solend => 5,
            ProtocolId::Larix => 6,
            ProtocolId::Tulip => 7,
            ProtocolId::Katana => 8,
            ProtocolId::Frakt => 9,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        let protocol = match tag {
            0 => ProtocolId::Raydium,
            1 => ProtocolId::Orca,
            2 => ProtocolId::Saber,
            3 => ProtocolId::Whirlpool,
            4 => ProtocolId::Quarry,
            5 => ProtocolId::Solend,
            6 => ProtocolId::Larix,
            7 => ProtocolId::Tulip,
            8 => ProtocolId::Katana,
            9 => ProtocolId::Frakt,
            _ => return None,
        };
        Some(protocol)
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtocolId::Raydium => "raydium",
            ProtocolId::Orca => "orca",
            ProtocolId::Saber => "saber",
            ProtocolId::Whirlpool => "whirlpool",
            ProtocolId::Quarry => "quarry",
            ProtocolId::Solend => "solend",
            ProtocolId::Larix => "larix",
            ProtocolId::Tulip => "tulip",
            ProtocolId::Katana => "katana",
            ProtocolId::Frakt => "frakt",
        };
        write!(f, "{}", name)
    }
}

/// Which of a two-token pool's legs the caller is treating as the input.
///
/// Obverse means the pool's first token is the input side, Reverse the
/// second. Derived by the resolver from queued metadata, never supplied
/// directly by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoolDirection {
    #[default]
    Obverse,
    Reverse,
}

impl PoolDirection {
    pub fn tag(&self) -> u8 {
        match self {
            PoolDirection::Obverse => 0,
            PoolDirection::Reverse => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(PoolDirection::Obverse),
            1 => Some(PoolDirection::Reverse),
            _ => None,
        }
    }
}

/// Fixed-size opaque payload placed in the dispatcher's per-step table.
///
/// Protocol adapters fill the leading bytes with their own layout; the
/// buffer is deterministically zero-padded (or truncated) to
/// [`STEP_PAYLOAD_LEN`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPayload([u8; STEP_PAYLOAD_LEN]);

impl StepPayload {
    pub fn zeroed() -> Self {
        Self([0u8; STEP_PAYLOAD_LEN])
    }

    /// Build a payload from raw bytes, padding or truncating to the
    /// fixed length.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buf = [0u8; STEP_PAYLOAD_LEN];
        let take = bytes.len().min(STEP_PAYLOAD_LEN);
        buf[..take].copy_from_slice(&bytes[..take]);
        Self(buf)
    }

    pub fn as_bytes(&self) -> &[u8; STEP_PAYLOAD_LEN] {
        &self.0
    }

    pub fn is_zeroed(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl Default for StepPayload {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// One queued action, stored as an explicit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub action: ActionType,
    pub protocol: ProtocolId,
    pub version: u8,
    /// Headline amount, subject to cross-step dependency rewriting.
    pub amount: u64,
    pub payload: StepPayload,
    /// Which payload slot the adapter program reads. Reserved; always 0.
    pub payload_route: u8,
}

/// Constant-product or stable pool descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolDescriptor {
    pub address: Pubkey,
    pub program_id: Pubkey,
    pub token_a_mint: Pubkey,
    pub token_b_mint: Pubkey,
    pub token_a_vault: Pubkey,
    pub token_b_vault: Pubkey,
    pub lp_mint: Pubkey,
    pub authority: Pubkey,
    pub version: u8,
}

/// Staking farm descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FarmDescriptor {
    pub address: Pubkey,
    pub program_id: Pubkey,
    pub staked_mint: Pubkey,
    pub reward_mint: Pubkey,
    pub reward_vault: Pubkey,
    pub authority: Pubkey,
}

/// Lending reserve descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveDescriptor {
    pub address: Pubkey,
    pub program_id: Pubkey,
    pub liquidity_mint: Pubkey,
    pub liquidity_vault: Pubkey,
    pub collateral_mint: Pubkey,
    pub market: Pubkey,
    pub market_authority: Pubkey,
}

/// Yield vault descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultDescriptor {
    pub address: Pubkey,
    pub program_id: Pubkey,
    pub underlying_mint: Pubkey,
    pub share_mint: Pubkey,
    pub underlying_vault: Pubkey,
    pub authority: Pubkey,
}

/// Protocol state handed from the fetcher to an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolDescriptor {
    Pool(PoolDescriptor),
    Farm(FarmDescriptor),
    Reserve(ReserveDescriptor),
    Vault(VaultDescriptor),
}

impl ProtocolDescriptor {
    pub fn as_pool(&self) -> Option<&PoolDescriptor> {
        match self {
            ProtocolDescriptor::Pool(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_farm(&self) -> Option<&FarmDescriptor> {
        match self {
            ProtocolDescriptor::Farm(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_reserve(&self) -> Option<&ReserveDescriptor> {
        match self {
            ProtocolDescriptor::Reserve(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_vault(&self) -> Option<&VaultDescriptor> {
        match self {
            ProtocolDescriptor::Vault(v) => Some(v),
            _ => None,
        }
    }
}

/// Ephemeral context the resolver reads. Never encoded into the queue;
/// discarded with the composer.
#[derive(Debug, Clone, Default)]
pub struct CompositionMetadata {
    /// Last pool descriptor touched by a swap or liquidity action.
    pub pool: Option<PoolDescriptor>,
    /// Source token of the most recent swap.
    pub swap_source_mint: Option<Pubkey>,
    /// Destination token of the most recent swap.
    pub swap_destination_mint: Option<Pubkey>,
    /// Token being supplied by a swap-free add-liquidity.
    pub liquidity_mint: Option<Pubkey>,
    /// Chosen payout token for single-sided liquidity removal.
    pub payout_mint: Option<Pubkey>,
}
