//! Uniform protocol adapter contract and capability registry
//!
//! Every protocol family implements the same surface: given one action
//! step and its pre-fetched descriptor, return the setup/cleanup
//! instructions, the accounts the dispatcher passes through to the
//! protocol program, and a fixed-size opaque payload. Adapters asked to
//! build an action they advertise but cannot fill return an empty output
//! rather than failing.

use async_trait::async_trait;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ComposerError, Result};
use crate::fetcher::StateFetcher;
use crate::types::{ActionType, PoolDirection, ProtocolDescriptor, ProtocolId, StepPayload};

/// Everything an adapter needs to build one queued step.
#[derive(Debug, Clone)]
pub struct StepRequest {
    /// Wallet that signs and owns every user-side account.
    pub owner: Pubkey,
    pub action: ActionType,
    pub protocol: ProtocolId,
    pub version: u8,
    /// Headline amount for the step; zero for amount-less actions.
    pub amount: u64,
    pub direction: PoolDirection,
    pub descriptor: Option<ProtocolDescriptor>,
    pub source_mint: Option<Pubkey>,
    pub destination_mint: Option<Pubkey>,
    pub payout_mint: Option<Pubkey>,
    pub nft_mint: Option<Pubkey>,
    /// Guaranteed minimum output for swap steps.
    pub min_amount_out: Option<u64>,
    /// Queue position this step lands at.
    pub step_index: u8,
}

impl StepRequest {
    pub fn pool(&self) -> Result<&crate::types::PoolDescriptor> {
        self.descriptor
            .as_ref()
            .and_then(ProtocolDescriptor::as_pool)
            .ok_or(ComposerError::DescriptorMismatch {
                protocol: self.protocol,
                expected: "pool",
            })
    }

    pub fn farm(&self) -> Result<&crate::types::FarmDescriptor> {
        self.descriptor
            .as_ref()
            .and_then(ProtocolDescriptor::as_farm)
            .ok_or(ComposerError::DescriptorMismatch {
                protocol: self.protocol,
                expected: "farm",
            })
    }

    pub fn reserve(&self) -> Result<&crate::types::ReserveDescriptor> {
        self.descriptor
            .as_ref()
            .and_then(ProtocolDescriptor::as_reserve)
            .ok_or(ComposerError::DescriptorMismatch {
                protocol: self.protocol,
                expected: "reserve",
            })
    }

    pub fn vault(&self) -> Result<&crate::types::VaultDescriptor> {
        self.descriptor
            .as_ref()
            .and_then(ProtocolDescriptor::as_vault)
            .ok_or(ComposerError::DescriptorMismatch {
                protocol: self.protocol,
                expected: "vault",
            })
    }
}

/// What an adapter hands back for one step.
#[derive(Debug, Clone, Default)]
pub struct AdapterOutput {
    /// Instructions prepended before the dispatcher's step invocation
    /// (account creation, native-asset wrapping).
    pub setup: Vec<Instruction>,
    /// Accounts the dispatcher passes through to the protocol program.
    pub step_accounts: Vec<AccountMeta>,
    /// Instructions appended after the dispatcher's step invocation
    /// (unwrapping, closing temporary accounts).
    pub cleanup: Vec<Instruction>,
    /// Protocol-specific encoded detail, fixed size.
    pub payload: StepPayload,
}

impl AdapterOutput {
    /// The uniform "not applicable" answer: no instructions, no
    /// accounts, zero-filled payload.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Per-protocol instruction construction, behind one uniform surface.
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// Actions this adapter can build for the given protocol.
    fn supports(&self, protocol: ProtocolId, action: ActionType) -> bool;

    /// Build one step. May perform read-only auxiliary fetches through
    /// `fetcher` (e.g. does the user's tracking account exist yet).
    async fn build_step(
        &self,
        fetcher: &dyn StateFetcher,
        request: &StepRequest,
    ) -> Result<AdapterOutput>;
}

impl std::fmt::Debug for dyn ProtocolAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn ProtocolAdapter")
    }
}

/// Capability-keyed adapter registry.
///
/// An unsupported protocol/action combination is a lookup miss here, not
/// a hand-written branch in the composer.
#[derive(Default)]
pub struct AdapterRegistry {
    entries: HashMap<(ProtocolId, ActionType), Arc<dyn ProtocolAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `adapter` for every (protocol, action) pair given.
    ///
    /// Registration is validated against the adapter's own capability
    /// claim, so a miswired table fails at startup instead of at
    /// enqueue time.
    pub fn register(
        &mut self,
        adapter: Arc<dyn ProtocolAdapter>,
        protocol: ProtocolId,
        actions: &[ActionType],
    ) -> Result<()> {
        for action in actions {
            if !adapter.supports(protocol, *action) {
                return Err(ComposerError::Other(anyhow::anyhow!(
                    "adapter registered for {}/{} it does not support",
                    protocol,
                    action
                )));
            }
            self.entries.insert((protocol, *action), adapter.clone());
        }
        Ok(())
    }

    pub fn supports(&self, protocol: ProtocolId, action: ActionType) -> bool {
        self.entries.contains_key(&(protocol, action))
    }

    /// Resolve the adapter for a combination, failing fast when none is
    /// registered.
    pub fn resolve(
        &self,
        protocol: ProtocolId,
        action: ActionType,
    ) -> Result<Arc<dyn ProtocolAdapter>> {
        self.entries
            .get(&(protocol, action))
            .cloned()
            .ok_or(ComposerError::UnsupportedAction { action, protocol })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubAdapter {
        protocol: ProtocolId,
        actions: Vec<ActionType>,
    }

    #[async_trait]
    impl ProtocolAdapter for StubAdapter {
        fn supports(&self, protocol: ProtocolId, action: ActionType) -> bool {
            protocol == self.protocol && self.actions.contains(&action)
        }

        async fn build_step(
            &self,
            _fetcher: &dyn StateFetcher,
            _request: &StepRequest,
        ) -> Result<AdapterOutput> {
            Ok(AdapterOutput::empty())
        }
    }

    #[test]
    fn test_registry_resolves_registered_pairs() {
        let mut registry = AdapterRegistry::new();
        let adapter = Arc::new(StubAdapter {
            protocol: ProtocolId::Solend,
            actions: vec![ActionType::Supply, ActionType::Borrow],
        });
        registry
            .register(
                adapter,
                ProtocolId::Solend,
                &[ActionType::Supply, ActionType::Borrow],
            )
            .unwrap();

        assert!(registry.supports(ProtocolId::Solend, ActionType::Supply));
        assert!(registry.resolve(ProtocolId::Solend, ActionType::Borrow).is_ok());
    }

    #[test]
    fn test_registry_miss_is_unsupported_action() {
        let registry = AdapterRegistry::new();
        let err = registry
            .resolve(ProtocolId::Frakt, ActionType::Swap)
            .unwrap_err();
        assert!(matches!(
            err,
            ComposerError::UnsupportedAction {
                action: ActionType::Swap,
                protocol: ProtocolId::Frakt,
            }
        ));
    }

    #[test]
    fn test_registration_validated_against_capability() {
        let mut registry = AdapterRegistry::new();
        let adapter = Arc::new(StubAdapter {
            protocol: ProtocolId::Solend,
            actions: vec![ActionType::Supply],
        });
        let result = registry.register(adapter, ProtocolId::Solend, &[ActionType::Swap]);
        assert!(result.is_err());
        assert!(registry.is_empty());
    }
}
