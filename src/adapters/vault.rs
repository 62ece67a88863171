//! Yield vault adapter (Tulip, Katana)
//!
//! Tulip vaults settle immediately; Katana vaults stage deposits and
//! withdrawals across epochs through a per-user receipt account.

use async_trait::async_trait;
use solana_sdk::instruction::AccountMeta;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::adapter::{AdapterOutput, ProtocolAdapter, StepRequest};
use crate::adapters::{ata, create_ata};
use crate::error::Result;
use crate::fetcher::StateFetcher;
use crate::types::{ActionType, ProtocolId, StepPayload, VaultDescriptor};

pub struct VaultAdapter;

impl VaultAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Per-user receipt tracking a staged deposit or withdrawal.
    fn receipt(vault: &VaultDescriptor, owner: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(
            &[b"receipt", vault.address.as_ref(), owner.as_ref()],
            &vault.program_id,
        )
        .0
    }

    fn is_staged(action: ActionType) -> bool {
        matches!(
            action,
            ActionType::InitiateDeposit
                | ActionType::FinalizeDeposit
                | ActionType::CancelDeposit
                | ActionType::InitiateWithdrawal
                | ActionType::FinalizeWithdrawal
                | ActionType::CancelWithdrawal
        )
    }
}

impl Default for VaultAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolAdapter for VaultAdapter {
    fn supports(&self, protocol: ProtocolId, action: ActionType) -> bool {
        match protocol {
            ProtocolId::Tulip => matches!(action, ActionType::Deposit | ActionType::Withdraw),
            ProtocolId::Katana => {
                matches!(action, ActionType::Deposit | ActionType::Withdraw)
                    || Self::is_staged(action)
            }
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
        let vault = request.vault()?;

        let mut output = AdapterOutput::default();

        match request.action {
            ActionType::Deposit | ActionType::InitiateDeposit => {
                output
                    .setup
                    .push(create_ata(&request.owner, &vault.share_mint));
            }
            ActionType::Withdraw | ActionType::FinalizeWithdrawal => {
                output
                    .setup
                    .push(create_ata(&request.owner, &vault.underlying_mint));
            }
            _ => {}
        }

        output.step_accounts = vec![
            AccountMeta::new_readonly(vault.program_id, false),
            AccountMeta::new(vault.address, false),
            AccountMeta::new_readonly(vault.authority, false),
            AccountMeta::new(vault.underlying_vault, false),
            AccountMeta::new(vault.share_mint, false),
            AccountMeta::new(ata(&request.owner, &vault.underlying_mint), false),
            AccountMeta::new(ata(&request.owner, &vault.share_mint), false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ];

        if Self::is_staged(request.action) {
            let receipt = Self::receipt(vault, &request.owner);
            debug!(%receipt, action = %request.action, "staged vault step");
            output.step_accounts.push(AccountMeta::new(receipt, false));
        }

        let mut data = Vec::with_capacity(9);
        data.push(request.action.tag());
        data.extend_from_slice(&request.amount.to_le_bytes());
        output.payload = StepPayload::from_bytes(&data);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::InMemoryStateFetcher;
    use crate::types::ProtocolDescriptor;

    fn vault() -> VaultDescriptor {
        VaultDescriptor {
            address: Pubkey::new_unique(),
            program_id: Pubkey::new_unique(),
            underlying_mint: Pubkey::new_unique(),
            share_mint: Pubkey::new_unique(),
            underlying_vault: Pubkey::new_unique(),
            authority: Pubkey::new_unique(),
        }
    }

    fn request(vault: VaultDescriptor, protocol: ProtocolId, action: ActionType) -> StepRequest {
        StepRequest {
            owner: Pubkey::new_unique(),
            action,
            protocol,
            version: 1,
            amount: 100,
            direction: Default::default(),
            source_mint: None,
            destination_mint: None,
            payout_mint: None,
            nft_mint: None,
            min_amount_out: None,
            step_index: 0,
            descriptor: Some(ProtocolDescriptor::Vault(vault)),
        }
    }

    #[tokio::test]
    async fn test_staged_step_appends_receipt_account() {
        let adapter = VaultAdapter::new();
        let fetcher = InMemoryStateFetcher::new();

        let plain = adapter
            .build_step(
                &fetcher,
                &request(vault(), ProtocolId::Tulip, ActionType::Deposit),
            )
            .await
            .unwrap();
        let staged = adapter
            .build_step(
                &fetcher,
                &request(vault(), ProtocolId::Katana, ActionType::InitiateDeposit),
            )
            .await
            .unwrap();

        assert_eq!(staged.step_accounts.len(), plain.step_accounts.len() + 1);
    }

    #[tokio::test]
    async fn test_tulip_rejects_staged_actions_quietly() {
        let adapter = VaultAdapter::new();
        let fetcher = InMemoryStateFetcher::new();
        let output = adapter
            .build_step(
                &fetcher,
                &request(vault(), ProtocolId::Tulip, ActionType::InitiateDeposit),
            )
            .await
            .unwrap();
        assert!(output.step_accounts.is_empty());
        assert!(output.payload.is_zeroed());
    }
}
