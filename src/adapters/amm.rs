//! Two-token pool adapter
//!
//! Covers the constant-product and stable pools (Raydium, Orca, Saber)
//! and, minus single-sided removal, concentrated pools (Whirlpool).

use async_trait::async_trait;
use solana_sdk::instruction::AccountMeta;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::adapter::{AdapterOutput, ProtocolAdapter, StepRequest};
use crate::adapters::{ata, create_ata, unwrap_native, wrap_native};
use crate::error::{ComposerError, Result};
use crate::fetcher::StateFetcher;
use crate::types::{ActionType, PoolDescriptor, PoolDirection, ProtocolId, StepPayload};

pub struct AmmAdapter;

impl AmmAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Vault and mint on the input leg, per resolved direction.
    fn input_leg(pool: &PoolDescriptor, direction: PoolDirection) -> (Pubkey, Pubkey) {
        match direction {
            PoolDirection::Obverse => (pool.token_a_vault, pool.token_a_mint),
            PoolDirection::Reverse => (pool.token_b_vault, pool.token_b_mint),
        }
    }

    fn output_leg(pool: &PoolDescriptor, direction: PoolDirection) -> (Pubkey, Pubkey) {
        match direction {
            PoolDirection::Obverse => (pool.token_b_vault, pool.token_b_mint),
            PoolDirection::Reverse => (pool.token_a_vault, pool.token_a_mint),
        }
    }

    fn pool_accounts(pool: &PoolDescriptor) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new_readonly(pool.program_id, false),
            AccountMeta::new(pool.address, false),
            AccountMeta::new_readonly(pool.authority, false),
            AccountMeta::new(pool.token_a_vault, false),
            AccountMeta::new(pool.token_b_vault, false),
            AccountMeta::new(pool.lp_mint, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ]
    }

    fn build_swap(&self, request: &StepRequest) -> Result<AdapterOutput> {
        let pool = request.pool()?;
        let source = request
            .source_mint
            .ok_or_else(|| ComposerError::Other(anyhow::anyhow!("swap step missing source mint")))?;
        let destination = request.destination_mint.ok_or_else(|| {
            ComposerError::Other(anyhow::anyhow!("swap step missing destination mint"))
        })?;
        let min_out = request.min_amount_out.unwrap_or(0);

        let mut output = AdapterOutput::default();
        let native_mint = spl_token::native_mint::id();

        let user_source = if source == native_mint {
            let (wrap, wrapped) = wrap_native(&request.owner, request.amount)?;
            output.setup.extend(wrap);
            wrapped
        } else {
            ata(&request.owner, &source)
        };
        let user_destination = ata(&request.owner, &destination);
        output.setup.push(create_ata(&request.owner, &destination));

        output.step_accounts = Self::pool_accounts(pool);
        output
            .step_accounts
            .push(AccountMeta::new(user_source, false));
        output
            .step_accounts
            .push(AccountMeta::new(user_destination, false));

        if destination == native_mint || source == native_mint {
            output.cleanup.push(unwrap_native(&request.owner)?);
        }

        let mut data = Vec::with_capacity(18);
        data.push(request.action.tag());
        data.extend_from_slice(&request.amount.to_le_bytes());
        data.extend_from_slice(&min_out.to_le_bytes());
        data.push(request.direction.tag());
        output.payload = StepPayload::from_bytes(&data);

        debug!(
            pool = %pool.address,
            amount = request.amount,
            min_out,
            "built swap step"
        );
        Ok(output)
    }

    fn build_add_liquidity(&self, request: &StepRequest) -> Result<AdapterOutput> {
        let pool = request.pool()?;
        let (input_vault, input_mint) = Self::input_leg(pool, request.direction);

        let mut output = AdapterOutput::default();
        output.setup.push(create_ata(&request.owner, &pool.lp_mint));

        output.step_accounts = Self::pool_accounts(pool);
        output
            .step_accounts
            .push(AccountMeta::new(ata(&request.owner, &input_mint), false));
        output
            .step_accounts
            .push(AccountMeta::new(input_vault, false));
        output
            .step_accounts
            .push(AccountMeta::new(ata(&request.owner, &pool.lp_mint), false));

        let mut data = Vec::with_capacity(10);
        data.push(request.action.tag());
        data.extend_from_slice(&request.amount.to_le_bytes());
        data.push(request.direction.tag());
        output.payload = StepPayload::from_bytes(&data);
        Ok(output)
    }

    fn build_remove_liquidity(&self, request: &StepRequest) -> Result<AdapterOutput> {
        let pool = request.pool()?;

        let mut output = AdapterOutput::default();
        output
            .setup
            .push(create_ata(&request.owner, &pool.token_a_mint));
        output
            .setup
            .push(create_ata(&request.owner, &pool.token_b_mint));

        output.step_accounts = Self::pool_accounts(pool);
        output
            .step_accounts
            .push(AccountMeta::new(ata(&request.owner, &pool.lp_mint), false));
        output.step_accounts.push(AccountMeta::new(
            ata(&request.owner, &pool.token_a_mint),
            false,
        ));
        output.step_accounts.push(AccountMeta::new(
            ata(&request.owner, &pool.token_b_mint),
            false,
        ));

        let mut data = Vec::with_capacity(10);
        data.push(request.action.tag());
        data.extend_from_slice(&request.amount.to_le_bytes());

        if request.action == ActionType::RemoveLiquiditySingleSide {
            let payout = request.payout_mint.ok_or_else(|| {
                ComposerError::Other(anyhow::anyhow!(
                    "single-sided removal missing payout mint"
                ))
            })?;
            // Which leg the pool pays out on.
            data.push(if payout == pool.token_a_mint { 0 } else { 1 });
        }
        output.payload = StepPayload::from_bytes(&data);
        Ok(output)
    }
}

impl Default for AmmAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolAdapter for AmmAdapter {
    fn supports(&self, protocol: ProtocolId, action: ActionType) -> bool {
        let base = matches!(
            action,
            ActionType::Swap | ActionType::AddLiquidity | ActionType::RemoveLiquidity
        );
        match protocol {
            ProtocolId::Raydium | ProtocolId::Orca | ProtocolId::Saber => {
                base || action == ActionType::RemoveLiquiditySingleSide
            }
            ProtocolId::Whirlpool => base,
            _ => false,
        }
    }

    async fn build_step(
        &self,
        _fetcher: &dyn StateFetcher,
        request: &StepRequest,
    ) -> Result<AdapterOutput> {
        if !self.supports(request.protocol, request.action) {
            return Ok(AdapterOutput::empty());
        }
        match request.action {
            ActionType::Swap => self.build_swap(request),
            ActionType::AddLiquidity => self.build_add_liquidity(request),
            ActionType::RemoveLiquidity | ActionType::RemoveLiquiditySingleSide => {
                self.build_remove_liquidity(request)
            }
            _ => Ok(AdapterOutput::empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::InMemoryStateFetcher;
    use crate::types::ProtocolDescriptor;

    fn pool() -> PoolDescriptor {
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

    fn swap_request(pool: PoolDescriptor) -> StepRequest {
        StepRequest {
            owner: Pubkey::new_unique(),
            action: ActionType::Swap,
            protocol: ProtocolId::Raydium,
            version: 1,
            amount: 1000,
            direction: PoolDirection::Obverse,
            source_mint: Some(pool.token_a_mint),
            destination_mint: Some(pool.token_b_mint),
            payout_mint: None,
            nft_mint: None,
            min_amount_out: Some(950),
            step_index: 0,
            descriptor: Some(ProtocolDescriptor::Pool(pool)),
        }
    }

    #[tokio::test]
    async fn test_swap_payload_layout() {
        let adapter = AmmAdapter::new();
        let fetcher = InMemoryStateFetcher::new();
        let output = adapter
            .build_step(&fetcher, &swap_request(pool()))
            .await
            .unwrap();

        let payload = output.payload.as_bytes();
        assert_eq!(payload[0], ActionType::Swap.tag());
        assert_eq!(&payload[1..9], &1000u64.to_le_bytes());
        assert_eq!(&payload[9..17], &950u64.to_le_bytes());
        assert_eq!(payload[17], 0);
        assert!(!output.step_accounts.is_empty());
    }

    #[tokio::test]
    async fn test_native_source_is_wrapped_and_unwrapped() {
        let adapter = AmmAdapter::new();
        let fetcher = InMemoryStateFetcher::new();
        let mut pool = pool();
        pool.token_a_mint = spl_token::native_mint::id();
        let mut request = swap_request(pool);
        request.source_mint = Some(spl_token::native_mint::id());

        let output = adapter.build_step(&fetcher, &request).await.unwrap();
        // wrap (3) + destination ATA create.
        assert_eq!(output.setup.len(), 4);
        assert_eq!(output.cleanup.len(), 1);
    }

    #[tokio::test]
    async fn test_unadvertised_action_returns_empty_output() {
        let adapter = AmmAdapter::new();
        let fetcher = InMemoryStateFetcher::new();
        let mut request = swap_request(pool());
        request.protocol = ProtocolId::Whirlpool;
        request.action = ActionType::RemoveLiquiditySingleSide;

        let output = adapter.build_step(&fetcher, &request).await.unwrap();
        assert!(output.setup.is_empty());
        assert!(output.step_accounts.is_empty());
        assert!(output.payload.is_zeroed());
    }
}
