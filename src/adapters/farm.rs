//! Staking farm adapter (Quarry, Raydium farms)

use async_trait::async_trait;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;
use tracing::debug;

use crate::adapter::{AdapterOutput, ProtocolAdapter, StepRequest};
use crate::adapters::{ata, create_ata};
use crate::error::Result;
use crate::fetcher::StateFetcher;
use crate::types::{ActionType, FarmDescriptor, ProtocolId, StepPayload};

const INIT_STAKE_ACCOUNT_DISCRIMINATOR: [u8; 8] = [132, 171, 255, 149, 163, 37, 220, 45];

pub struct FarmAdapter;

impl FarmAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Per-user stake record for a farm.
    fn stake_record(farm: &FarmDescriptor, owner: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(
            &[b"stake", farm.address.as_ref(), owner.as_ref()],
            &farm.program_id,
        )
        .0
    }

    fn init_stake_record(farm: &FarmDescriptor, owner: &Pubkey, record: &Pubkey) -> Instruction {
        Instruction {
            program_id: farm.program_id,
            accounts: vec![
                AccountMeta::new(*owner, true),
                AccountMeta::new(*record, false),
                AccountMeta::new_readonly(farm.address, false),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
            data: INIT_STAKE_ACCOUNT_DISCRIMINATOR.to_vec(),
        }
    }
}

impl Default for FarmAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolAdapter for FarmAdapter {
    fn supports(&self, protocol: ProtocolId, action: ActionType) -> bool {
        matches!(protocol, ProtocolId::Quarry | ProtocolId::Raydium)
            && matches!(
                action,
                ActionType::Stake | ActionType::Unstake | ActionType::Harvest
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
        let farm = request.farm()?;
        let record = Self::stake_record(farm, &request.owner);

        let mut output = AdapterOutput::default();

        // Staking into a farm for the first time needs the per-user
        // record created beforehand.
        if request.action == ActionType::Stake && !fetcher.account_exists(record).await? {
            debug!(%record, "stake record absent, scheduling creation");
            output
                .setup
                .push(Self::init_stake_record(farm, &request.owner, &record));
        }

        if request.action == ActionType::Harvest {
            output
                .setup
                .push(create_ata(&request.owner, &farm.reward_mint));
        }

        output.step_accounts = vec![
            AccountMeta::new_readonly(farm.program_id, false),
            AccountMeta::new(farm.address, false),
            AccountMeta::new(record, false),
            AccountMeta::new_readonly(farm.authority, false),
            AccountMeta::new(ata(&request.owner, &farm.staked_mint), false),
            AccountMeta::new(farm.reward_vault, false),
            AccountMeta::new(ata(&request.owner, &farm.reward_mint), false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ];

        let mut data = Vec::with_capacity(9);
        data.push(request.action.tag());
        data.extend_from_slice(&request.amount.to_le_bytes());
        output.payload = StepPayload::from_bytes(&data);
        Ok(output)
    }
}
