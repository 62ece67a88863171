//! Lending market adapter (Solend, Larix)
//!
//! Supply/unsupply move liquidity against the reserve; collateralize and
//! uncollateralize move minted collateral tokens into and out of the
//! user's obligation; borrow and repay act against the obligation.

use async_trait::async_trait;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;
use tracing::debug;

use crate::adapter::{AdapterOutput, ProtocolAdapter, StepRequest};
use crate::adapters::{ata, create_ata};
use crate::error::Result;
use crate::fetcher::StateFetcher;
use crate::types::{ActionType, ProtocolId, ReserveDescriptor, StepPayload};

const INIT_OBLIGATION_DISCRIMINATOR: [u8; 8] = [251, 10, 231, 76, 27, 11, 159, 96];

pub struct LendingAdapter;

impl LendingAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Per-user obligation account for a lending market.
    fn obligation(reserve: &ReserveDescriptor, owner: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(
            &[b"obligation", reserve.market.as_ref(), owner.as_ref()],
            &reserve.program_id,
        )
        .0
    }

    fn init_obligation(
        reserve: &ReserveDescriptor,
        owner: &Pubkey,
        obligation: &Pubkey,
    ) -> Instruction {
        Instruction {
            program_id: reserve.program_id,
            accounts: vec![
                AccountMeta::new(*owner, true),
                AccountMeta::new(*obligation, false),
                AccountMeta::new_readonly(reserve.market, false),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
            data: INIT_OBLIGATION_DISCRIMINATOR.to_vec(),
        }
    }

    /// Actions that cannot proceed without an obligation account.
    fn needs_obligation(action: ActionType) -> bool {
        matches!(
            action,
            ActionType::Borrow
                | ActionType::Repay
                | ActionType::Collateralize
                | ActionType::Uncollateralize
                | ActionType::ClaimCollateralReward
        )
    }
}

impl Default for LendingAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolAdapter for LendingAdapter {
    fn supports(&self, protocol: ProtocolId, action: ActionType) -> bool {
        matches!(protocol, ProtocolId::Solend | ProtocolId::Larix)
            && matches!(
                action,
                ActionType::Supply
                    | ActionType::Unsupply
                    | ActionType::Borrow
                    | ActionType::Repay
                    | ActionType::Collateralize
                    | ActionType::Uncollateralize
                    | ActionType::ClaimCollateralReward
            )
    }

    async fn build_step(
        &self,
        fetcher: &dyn StateFetcher,
        request: &StepRequest,
    ) -> Result<AdapterOutput> {
        if !self.supports(request.protocol, request.action) {
            return Ok(AdapterOutput::empty());
        }
        let reserve = request.reserve()?;
        let obligation = Self::obligation(reserve, &request.owner);

        let mut output = AdapterOutput::default();

        if Self::needs_obligation(request.action) && !fetcher.account_exists(obligation).await? {
            debug!(%obligation, "obligation absent, scheduling creation");
            output
                .setup
                .push(Self::init_obligation(reserve, &request.owner, &obligation));
        }

        match request.action {
            ActionType::Supply | ActionType::Collateralize => {
                output
                    .setup
                    .push(create_ata(&request.owner, &reserve.collateral_mint));
            }
            ActionType::Unsupply | ActionType::Borrow | ActionType::ClaimCollateralReward => {
                output
                    .setup
                    .push(create_ata(&request.owner, &reserve.liquidity_mint));
            }
            _ => {}
        }

        output.step_accounts = vec![
            AccountMeta::new_readonly(reserve.program_id, false),
            AccountMeta::new(reserve.address, false),
            AccountMeta::new(reserve.liquidity_vault, false),
            AccountMeta::new(reserve.collateral_mint, false),
            AccountMeta::new_readonly(reserve.market, false),
            AccountMeta::new_readonly(reserve.market_authority, false),
            AccountMeta::new(obligation, false),
            AccountMeta::new(ata(&request.owner, &reserve.liquidity_mint), false),
            AccountMeta::new(ata(&request.owner, &reserve.collateral_mint), false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ];

        let mut data = Vec::with_capacity(9);
        data.push(request.action.tag());
        data.extend_from_slice(&request.amount.to_le_bytes());
        output.payload = StepPayload::from_bytes(&data);
        Ok(output)
    }
}
