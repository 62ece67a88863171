//! Protocol state fetching
//!
//! Resolves protocol identifiers to descriptors and answers account
//! existence checks. Read-only; fetch failures propagate unchanged and
//! nothing here retries. Memoization, if any, is the caller's concern.

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::RpcConfig;
use crate::error::{ComposerError, Result};
use crate::types::{
    FarmDescriptor, PoolDescriptor, ProtocolId, ReserveDescriptor, VaultDescriptor,
};

/// Read-only protocol state service.
#[async_trait]
pub trait StateFetcher: Send + Sync {
    async fn pool(&self, protocol: ProtocolId, address: Pubkey) -> Result<PoolDescriptor>;
    async fn farm(&self, protocol: ProtocolId, address: Pubkey) -> Result<FarmDescriptor>;
    async fn reserve(&self, protocol: ProtocolId, address: Pubkey) -> Result<ReserveDescriptor>;
    async fn vault(&self, protocol: ProtocolId, address: Pubkey) -> Result<VaultDescriptor>;

    /// Whether a per-user tracking account (obligation, stake record,
    /// deposit receipt) already exists on chain.
    async fn account_exists(&self, address: Pubkey) -> Result<bool>;
}

/// Decodes raw account data into descriptors for one protocol family.
///
/// Account layouts are protocol-specific and live with the integrator;
/// the fetcher only routes raw bytes to the right decoder.
pub trait DescriptorDecoder: Send + Sync {
    fn decode_pool(&self, address: Pubkey, _account: &Account) -> Result<PoolDescriptor> {
        Err(ComposerError::BadDescriptor {
            kind: "pool",
            address,
            reason: "decoder does not handle pools".to_string(),
        })
    }

    fn decode_farm(&self, address: Pubkey, _account: &Account) -> Result<FarmDescriptor> {
        Err(ComposerError::BadDescriptor {
            kind: "farm",
            address,
            reason: "decoder does not handle farms".to_string(),
        })
    }

    fn decode_reserve(&self, address: Pubkey, _account: &Account) -> Result<ReserveDescriptor> {
        Err(ComposerError::BadDescriptor {
            kind: "reserve",
            address,
            reason: "decoder does not handle reserves".to_string(),
        })
    }

    fn decode_vault(&self, address: Pubkey, _account: &Account) -> Result<VaultDescriptor> {
        Err(ComposerError::BadDescriptor {
            kind: "vault",
            address,
            reason: "decoder does not handle vaults".to_string(),
        })
    }
}

/// RPC-backed fetcher: pulls raw accounts and hands them to the decoder
/// registered for the protocol family.
pub struct RpcStateFetcher {
    client: Arc<RpcClient>,
    decoders: HashMap<ProtocolId, Arc<dyn DescriptorDecoder>>,
}

impl RpcStateFetcher {
    pub fn new(config: &RpcConfig) -> Self {
        let client = Arc::new(RpcClient::new_with_timeout_and_commitment(
            config.url.clone(),
            Duration::from_millis(config.request_timeout_ms),
            CommitmentConfig::confirmed(),
        ));
        info!(url = %config.url, "state fetcher initialized");
        Self {
            client,
            decoders: HashMap::new(),
        }
    }

    pub fn with_client(client: Arc<RpcClient>) -> Self {
        Self {
            client,
            decoders: HashMap::new(),
        }
    }

    pub fn register_decoder(&mut self, protocol: ProtocolId, decoder: Arc<dyn DescriptorDecoder>) {
        self.decoders.insert(protocol, decoder);
    }

    fn decoder(&self, protocol: ProtocolId) -> Result<&Arc<dyn DescriptorDecoder>> {
        self.decoders
            .get(&protocol)
            .ok_or(ComposerError::MissingDecoder(protocol))
    }

    async fn fetch_account(&self, address: Pubkey) -> Result<Account> {
        debug!(%address, "fetching account");
        let account = self.client.get_account(&address).await?;
        Ok(account)
    }
}

#[async_trait]
impl StateFetcher for RpcStateFetcher {
    async fn pool(&self, protocol: ProtocolId, address: Pubkey) -> Result<PoolDescriptor> {
        let decoder = self.decoder(protocol)?;
        let account = self.fetch_account(address).await?;
        decoder.decode_pool(address, &account)
    }

    async fn farm(&self, protocol: ProtocolId, address: Pubkey) -> Result<FarmDescriptor> {
        let decoder = self.decoder(protocol)?;
        let account = self.fetch_account(address).await?;
        decoder.decode_farm(address, &account)
    }

    async fn reserve(&self, protocol: ProtocolId, address: Pubkey) -> Result<ReserveDescriptor> {
        let decoder = self.decoder(protocol)?;
        let account = self.fetch_account(address).await?;
        decoder.decode_reserve(address, &account)
    }

    async fn vault(&self, protocol: ProtocolId, address: Pubkey) -> Result<VaultDescriptor> {
        let decoder = self.decoder(protocol)?;
        let account = self.fetch_account(address).await?;
        decoder.decode_vault(address, &account)
    }

    async fn account_exists(&self, address: Pubkey) -> Result<bool> {
        let response = self
            .client
            .get_account_with_commitment(&address, CommitmentConfig::confirmed())
            .await?;
        Ok(response.value.is_some())
    }
}

/// In-memory fetcher for tests and integrators that pre-resolve state.
#[derive(Default)]
pub struct InMemoryStateFetcher {
    pools: HashMap<Pubkey, PoolDescriptor>,
    farms: HashMap<Pubkey, FarmDescriptor>,
    reserves: HashMap<Pubkey, ReserveDescriptor>,
    vaults: HashMap<Pubkey, VaultDescriptor>,
    existing: HashSet<Pubkey>,
}

impl InMemoryStateFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_pool(&mut self, descriptor: PoolDescriptor) {
        self.pools.insert(descriptor.address, descriptor);
    }

    pub fn insert_farm(&mut self, descriptor: FarmDescriptor) {
        self.farms.insert(descriptor.address, descriptor);
    }

    pub fn insert_reserve(&mut self, descriptor: ReserveDescriptor) {
        self.reserves.insert(descriptor.address, descriptor);
    }

    pub fn insert_vault(&mut self, descriptor: VaultDescriptor) {
        self.vaults.insert(descriptor.address, descriptor);
    }

    pub fn mark_existing(&mut self, address: Pubkey) {
        self.existing.insert(address);
    }
}

#[async_trait]
impl StateFetcher for InMemoryStateFetcher {
    async fn pool(&self, _protocol: ProtocolId, address: Pubkey) -> Result<PoolDescriptor> {
        self.pools
            .get(&address)
            .cloned()
            .ok_or_else(|| missing("pool", address))
    }

    async fn farm(&self, _protocol: ProtocolId, address: Pubkey) -> Result<FarmDescriptor> {
        self.farms
            .get(&address)
            .cloned()
            .ok_or_else(|| missing("farm", address))
    }

    async fn reserve(&self, _protocol: ProtocolId, address: Pubkey) -> Result<ReserveDescriptor> {
        self.reserves
            .get(&address)
            .cloned()
            .ok_or_else(|| missing("reserve", address))
    }

    async fn vault(&self, _protocol: ProtocolId, address: Pubkey) -> Result<VaultDescriptor> {
        self.vaults
            .get(&address)
            .cloned()
            .ok_or_else(|| missing("vault", address))
    }

    async fn account_exists(&self, address: Pubkey) -> Result<bool> {
        Ok(self.existing.contains(&address))
    }
}

fn missing(kind: &'static str, address: Pubkey) -> ComposerError {
    ComposerError::BadDescriptor {
        kind,
        address,
        reason: "not found".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_fetcher_round_trip() {
        let mut fetcher = InMemoryStateFetcher::new();
        let descriptor = PoolDescriptor {
            address: Pubkey::new_unique(),
            program_id: Pubkey::new_unique(),
            token_a_mint: Pubkey::new_unique(),
            token_b_mint: Pubkey::new_unique(),
            token_a_vault: Pubkey::new_unique(),
            token_b_vault: Pubkey::new_unique(),
            lp_mint: Pubkey::new_unique(),
            authority: Pubkey::new_unique(),
            version: 1,
        };
        let address = descriptor.address;
        fetcher.insert_pool(descriptor.clone());

        let fetched = fetcher.pool(ProtocolId::Raydium, address).await.unwrap();
        assert_eq!(fetched, descriptor);

        let err = fetcher
            .pool(ProtocolId::Raydium, Pubkey::new_unique())
            .await
            .unwrap_err();
        assert!(matches!(err, ComposerError::BadDescriptor { kind: "pool", .. }));
    }

    #[tokio::test]
    async fn test_account_exists_tracking() {
        let mut fetcher = InMemoryStateFetcher::new();
        let address = Pubkey::new_unique();
        assert!(!fetcher.account_exists(address).await.unwrap());
        fetcher.mark_existing(address);
        assert!(fetcher.account_exists(address).await.unwrap());
    }
}
