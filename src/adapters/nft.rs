//! NFT-collateral vault adapter (Frakt)
//!
//! Locking an NFT escrows it against the vault and mints a fungible
//! proof token; the proof can be staked for rewards and claimed.

use async_trait::async_trait;
use solana_sdk::instruction::AccountMeta;
use solana_sdk::pubkey::Pubkey;

use crate::adapter::{AdapterOutput, ProtocolAdapter, StepRequest};
use crate::adapters::{ata, create_ata};
use crate::error::{ComposerError, Result};
use crate::fetcher::StateFetcher;
use crate::types::{ActionType, ProtocolId, StepPayload, VaultDescriptor};

pub struct NftVaultAdapter;

impl NftVaultAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Escrow holding a locked NFT.
    fn escrow(vault: &VaultDescriptor, nft_mint: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(
            &[b"escrow", vault.address.as_ref(), nft_mint.as_ref()],
            &vault.program_id,
        )
        .0
    }

    fn needs_nft(action: ActionType) -> bool {
        matches!(action, ActionType::LockNft | ActionType::UnlockNft)
    }
}

impl Default for NftVaultAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolAdapter for NftVaultAdapter {
    fn supports(&self, protocol: ProtocolId, action: ActionType) -> bool {
        protocol == ProtocolId::Frakt
            && matches!(
                action,
                ActionType::LockNft
                    | ActionType::UnlockNft
                    | ActionType::StakeProof
                    | ActionType::UnstakeProof
                    | ActionType::Claim
            )
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
        output.step_accounts = vec![
            AccountMeta::new_readonly(vault.program_id, false),
            AccountMeta::new(vault.address, false),
            AccountMeta::new_readonly(vault.authority, false),
            // Proof token side.
            AccountMeta::new(vault.share_mint, false),
            AccountMeta::new(ata(&request.owner, &vault.share_mint), false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ];

        if Self::needs_nft(request.action) {
            let nft_mint = request.nft_mint.ok_or_else(|| {
                ComposerError::Other(anyhow::anyhow!("NFT step missing nft mint"))
            })?;
            let escrow = Self::escrow(vault, &nft_mint);
            output.step_accounts.push(AccountMeta::new(
                ata(&request.owner, &nft_mint),
                false,
            ));
            output.step_accounts.push(AccountMeta::new(escrow, false));

            if request.action == ActionType::LockNft {
                output
                    .setup
                    .push(create_ata(&request.owner, &vault.share_mint));
            }
        }

        if request.action == ActionType::Claim {
            output
                .setup
                .push(create_ata(&request.owner, &vault.underlying_mint));
            output
                .step_accounts
                .push(AccountMeta::new(vault.underlying_vault, false));
            output.step_accounts.push(AccountMeta::new(
                ata(&request.owner, &vault.underlying_mint),
                false,
            ));
        }

        let mut data = Vec::with_capacity(41);
        data.push(request.action.tag());
        data.extend_from_slice(&request.amount.to_le_bytes());
        if let Some(nft_mint) = request.nft_mint {
            data.extend_from_slice(nft_mint.as_ref());
        }
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

    fn request(action: ActionType, nft_mint: Option<Pubkey>) -> StepRequest {
        StepRequest {
            owner: Pubkey::new_unique(),
            action,
            protocol: ProtocolId::Frakt,
            version: 1,
            amount: 1,
            direction: Default::default(),
            source_mint: None,
            destination_mint: None,
            payout_mint: None,
            nft_mint,
            min_amount_out: None,
            step_index: 0,
            descriptor: Some(ProtocolDescriptor::Vault(vault())),
        }
    }

    #[tokio::test]
    async fn test_lock_requires_nft_mint() {
        let adapter = NftVaultAdapter::new();
        let fetcher = InMemoryStateFetcher::new();
        let err = adapter
            .build_step(&fetcher, &request(ActionType::LockNft, None))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nft mint"));
    }

    #[tokio::test]
    async fn test_lock_payload_embeds_nft_mint() {
        let adapter = NftVaultAdapter::new();
        let fetcher = InMemoryStateFetcher::new();
        let nft = Pubkey::new_unique();
        let output = adapter
            .build_step(&fetcher, &request(ActionType::LockNft, Some(nft)))
            .await
            .unwrap();

        let payload = output.payload.as_bytes();
        assert_eq!(payload[0], ActionType::LockNft.tag());
        // 32-byte mint truncated into the remaining 23 payload bytes.
        assert_eq!(&payload[9..], &nft.as_ref()[..23]);
    }

    #[tokio::test]
    async fn test_claim_touches_reward_side() {
        let adapter = NftVaultAdapter::new();
        let fetcher = InMemoryStateFetcher::new();
        let output = adapter
            .build_step(&fetcher, &request(ActionType::Claim, None))
            .await
            .unwrap();
        assert_eq!(output.setup.len(), 1);
        assert_eq!(output.step_accounts.len(), 8);
    }
}
