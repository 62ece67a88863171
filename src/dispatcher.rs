//! Dispatcher program interface
//!
//! The on-chain dispatcher walks the queued batch and invokes each
//! protocol program in order. Only its account layout and wire format
//! live here; execution semantics are the program's.

use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;

use crate::error::Result;
use crate::queue::QueueRecord;
use crate::types::StepPayload;

/// Seed for the session-scoped queue account.
pub const SESSION_SEED: &[u8] = b"session";

/// Seed for the global authority account shared by all sessions.
pub const AUTHORITY_SEED: &[u8] = b"authority";

const OPEN_SESSION_DISCRIMINATOR: [u8; 8] = [130, 54, 124, 7, 236, 20, 104, 104];
const INVOKE_STEP_DISCRIMINATOR: [u8; 8] = [75, 196, 25, 165, 111, 42, 237, 8];
const CLOSE_SESSION_DISCRIMINATOR: [u8; 8] = [68, 114, 178, 140, 222, 38, 248, 211];

/// Derive the session queue account for a nonce.
pub fn session_address(program_id: &Pubkey, nonce: u64) -> Pubkey {
    Pubkey::find_program_address(&[SESSION_SEED, &nonce.to_le_bytes()], program_id).0
}

/// Derive the global dispatcher authority.
pub fn authority_address(program_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[AUTHORITY_SEED], program_id).0
}

/// Build the open instruction: creates the session account and writes
/// the full queue record into it.
pub fn open_session(
    program_id: &Pubkey,
    payer: &Pubkey,
    nonce: u64,
    record: &QueueRecord,
) -> Result<Instruction> {
    let mut data = OPEN_SESSION_DISCRIMINATOR.to_vec();
    data.extend_from_slice(&nonce.to_le_bytes());
    data.extend_from_slice(&record.encode()?);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(session_address(program_id, nonce), false),
            AccountMeta::new_readonly(authority_address(program_id), false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data,
    })
}

/// Build the per-step invocation. `step_accounts` are passed through to
/// the protocol program the dispatcher calls for this slot.
pub fn invoke_step(
    program_id: &Pubkey,
    payer: &Pubkey,
    nonce: u64,
    step_index: u8,
    payload_route: u8,
    payload: &StepPayload,
    step_accounts: &[AccountMeta],
) -> Instruction {
    let mut data = INVOKE_STEP_DISCRIMINATOR.to_vec();
    data.push(step_index);
    data.push(payload_route);
    data.extend_from_slice(payload.as_bytes());

    let mut accounts = vec![
        AccountMeta::new(*payer, true),
        AccountMeta::new(session_address(program_id, nonce), false),
        AccountMeta::new_readonly(authority_address(program_id), false),
    ];
    accounts.extend_from_slice(step_accounts);

    Instruction {
        program_id: *program_id,
        accounts,
        data,
    }
}

/// Build the close instruction: tears down the session account and
/// refunds its rent to the payer.
pub fn close_session(program_id: &Pubkey, payer: &Pubkey, nonce: u64) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(session_address(program_id, nonce), false),
        ],
        data: CLOSE_SESSION_DISCRIMINATOR.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{ActionQueue, QUEUE_RECORD_LEN};
    use crate::types::PoolDirection;

    #[test]
    fn test_session_address_deterministic_per_nonce() {
        let program = Pubkey::new_unique();
        let a = session_address(&program, 42);
        let b = session_address(&program, 42);
        let c = session_address(&program, 43);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_authority_shared_across_sessions() {
        let program = Pubkey::new_unique();
        assert_eq!(authority_address(&program), authority_address(&program));
    }

    #[test]
    fn test_open_session_data_layout() {
        let program = Pubkey::new_unique();
        let payer = Pubkey::new_unique();
        let record = ActionQueue::new().to_record(PoolDirection::Obverse, 0);

        let ix = open_session(&program, &payer, 7, &record).unwrap();
        assert_eq!(ix.data.len(), 8 + 8 + QUEUE_RECORD_LEN);
        assert_eq!(&ix.data[..8], &OPEN_SESSION_DISCRIMINATOR);
        assert_eq!(&ix.data[8..16], &7u64.to_le_bytes());
        assert_eq!(ix.accounts.len(), 4);
        assert!(ix.accounts[0].is_signer);
    }

    #[test]
    fn test_invoke_step_carries_payload_and_pass_through_accounts() {
        let program = Pubkey::new_unique();
        let payer = Pubkey::new_unique();
        let payload = StepPayload::from_bytes(&[9, 9, 9]);
        let extra = vec![AccountMeta::new_readonly(Pubkey::new_unique(), false)];

        let ix = invoke_step(&program, &payer, 1, 3, 0, &payload, &extra);
        assert_eq!(&ix.data[..8], &INVOKE_STEP_DISCRIMINATOR);
        assert_eq!(ix.data[8], 3);
        assert_eq!(ix.data[9], 0);
        assert_eq!(&ix.data[10..], payload.as_bytes());
        assert_eq!(ix.accounts.len(), 3 + extra.len());
    }
}
