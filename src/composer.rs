//! Queue composer and finalizer
//!
//! One method per action kind. Every call resolves the adapter first,
//! performs its read-only fetches, and only commits the queue entry once
//! the adapter call has succeeded, so a failed call leaves the composer
//! exactly as it was. The dispatcher executes strictly in enqueue order;
//! nothing here reorders.

use rand::RngCore;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::adapter::{AdapterRegistry, StepRequest};
use crate::adapters::default_registry;
use crate::config::ComposerConfig;
use crate::dispatcher;
use crate::error::{ComposerError, Result};
use crate::fetcher::{RpcStateFetcher, StateFetcher};
use crate::queue::ActionQueue;
use crate::resolve::{apply, resolve};
use crate::router::{HttpRouter, SwapRouter};
use crate::types::{
    ActionType, CompositionMetadata, PoolDirection, ProtocolDescriptor, ProtocolId, QueueEntry,
};

/// Payload slot the dispatcher reads at execution time. Reserved; always 0.
const PAYLOAD_ROUTE: u8 = 0;

/// Shared wiring one or more composers are built against.
pub struct ComposeContext {
    pub dispatcher_program: Pubkey,
    pub registry: AdapterRegistry,
    pub fetcher: Arc<dyn StateFetcher>,
    pub router: Arc<dyn SwapRouter>,
    /// Default slippage applied when a swap does not name its own.
    pub slippage_bps: u16,
}

impl ComposeContext {
    pub fn new(
        dispatcher_program: Pubkey,
        registry: AdapterRegistry,
        fetcher: Arc<dyn StateFetcher>,
        router: Arc<dyn SwapRouter>,
        slippage_bps: u16,
    ) -> Self {
        Self {
            dispatcher_program,
            registry,
            fetcher,
            router,
            slippage_bps,
        }
    }

    /// Wire up RPC fetcher, HTTP router, and the default adapter
    /// registry from configuration.
    pub fn from_config(config: &ComposerConfig) -> Result<Self> {
        let dispatcher_program = config.dispatcher.program()?;
        Ok(Self {
            dispatcher_program,
            registry: default_registry()?,
            fetcher: Arc::new(RpcStateFetcher::new(&config.rpc)),
            router: Arc::new(HttpRouter::new(&config.router)?),
            slippage_bps: config.router.slippage_bps,
        })
    }
}

/// Swap parameters
#[derive(Debug, Clone)]
pub struct SwapParams {
    pub protocol: ProtocolId,
    pub pool: Pubkey,
    pub source_mint: Pubkey,
    pub destination_mint: Pubkey,
    pub amount_in: u64,
    pub slippage_bps: Option<u16>,
    pub version: Option<u8>,
}

/// Add-liquidity parameters. `token_mint` names the leg the caller is
/// supplying directly.
#[derive(Debug, Clone)]
pub struct AddLiquidityParams {
    pub protocol: ProtocolId,
    pub pool: Pubkey,
    pub token_mint: Pubkey,
    pub amount: u64,
    pub version: Option<u8>,
}

/// Remove-liquidity parameters (both legs paid out).
#[derive(Debug, Clone)]
pub struct RemoveLiquidityParams {
    pub protocol: ProtocolId,
    pub pool: Pubkey,
    pub amount: u64,
    pub version: Option<u8>,
}

/// Single-sided remove-liquidity parameters.
#[derive(Debug, Clone)]
pub struct RemoveLiquiditySingleSideParams {
    pub protocol: ProtocolId,
    pub pool: Pubkey,
    pub amount: u64,
    pub payout_mint: Pubkey,
    pub version: Option<u8>,
}

/// Farm stake/unstake parameters.
#[derive(Debug, Clone)]
pub struct FarmParams {
    pub protocol: ProtocolId,
    pub farm: Pubkey,
    pub amount: u64,
    pub version: Option<u8>,
}

/// Harvest parameters.
#[derive(Debug, Clone)]
pub struct HarvestParams {
    pub protocol: ProtocolId,
    pub farm: Pubkey,
    pub version: Option<u8>,
}

/// Lending market parameters, shared by every reserve-side action.
#[derive(Debug, Clone)]
pub struct LendingParams {
    pub protocol: ProtocolId,
    pub reserve: Pubkey,
    pub amount: u64,
    pub version: Option<u8>,
}

/// Vault parameters, shared by immediate and staged vault actions.
#[derive(Debug, Clone)]
pub struct VaultParams {
    pub protocol: ProtocolId,
    pub vault: Pubkey,
    pub amount: u64,
    pub version: Option<u8>,
}

/// NFT lock/unlock parameters.
#[derive(Debug, Clone)]
pub struct NftParams {
    pub protocol: ProtocolId,
    pub vault: Pubkey,
    pub nft_mint: Pubkey,
    pub version: Option<u8>,
}

/// Proof-token stake/unstake parameters.
#[derive(Debug, Clone)]
pub struct ProofParams {
    pub protocol: ProtocolId,
    pub vault: Pubkey,
    pub amount: u64,
    pub version: Option<u8>,
}

/// Reward claim parameters.
#[derive(Debug, Clone)]
pub struct ClaimParams {
    pub protocol: ProtocolId,
    pub vault: Pubkey,
    pub version: Option<u8>,
}

/// The finalized, ready-to-sign output of one composition session.
#[derive(Debug, Clone)]
pub struct ComposedBatch {
    /// Creates the session account and writes the queue record.
    pub open: Instruction,
    /// Per-step instruction batches, in enqueue order.
    pub steps: Vec<Vec<Instruction>>,
    /// Tears the session account down.
    pub close: Instruction,
}

impl ComposedBatch {
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Flatten into one ordered instruction list: open, steps, close.
    pub fn instructions(&self) -> Vec<Instruction> {
        let mut out = vec![self.open.clone()];
        for step in &self.steps {
            out.extend(step.iter().cloned());
        }
        out.push(self.close.clone());
        out
    }
}

/// One composition session: accumulate actions in caller order, then
/// finalize once.
pub struct Composer {
    owner: Pubkey,
    context: Arc<ComposeContext>,
    queue: ActionQueue,
    direction: PoolDirection,
    swap_min_out: u64,
    session_nonce: u64,
    metadata: CompositionMetadata,
    step_batches: Vec<Vec<Instruction>>,
}

impl std::fmt::Debug for Composer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composer")
            .field("owner", &self.owner)
            .field("queue", &self.queue)
            .field("direction", &self.direction)
            .field("swap_min_out", &self.swap_min_out)
            .field("session_nonce", &self.session_nonce)
            .field("metadata", &self.metadata)
            .field("step_batches", &self.step_batches)
            .finish_non_exhaustive()
    }
}

impl Composer {
    pub fn new(owner: Pubkey, context: Arc<ComposeContext>) -> Self {
        let session_nonce = rand::thread_rng().next_u64();
        debug!(%owner, session_nonce, "composer session opened");
        Self {
            owner,
            context,
            queue: ActionQueue::new(),
            direction: PoolDirection::default(),
            swap_min_out: 0,
            session_nonce,
            metadata: CompositionMetadata::default(),
            step_batches: Vec::new(),
        }
    }

    pub fn owner(&self) -> Pubkey {
        self.owner
    }

    pub fn session_nonce(&self) -> u64 {
        self.session_nonce
    }

    /// Session queue account this composition will execute under.
    pub fn session_address(&self) -> Pubkey {
        dispatcher::session_address(&self.context.dispatcher_program, self.session_nonce)
    }

    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    pub fn direction(&self) -> PoolDirection {
        self.direction
    }

    pub fn swap_min_out(&self) -> u64 {
        self.swap_min_out
    }

    // ---- action methods -------------------------------------------------

    pub async fn swap(&mut self, params: SwapParams) -> Result<&mut Self> {
        self.precheck(ActionType::Swap, params.protocol)?;

        let pool = self
            .context
            .fetcher
            .pool(params.protocol, params.pool)
            .await?;
        let slippage = params.slippage_bps.unwrap_or(self.context.slippage_bps);
        let quote = self
            .context
            .router
            .quote(
                params.source_mint,
                params.destination_mint,
                params.amount_in,
                slippage,
            )
            .await?;

        let mut metadata = self.metadata.clone();
        metadata.pool = Some(pool.clone());
        metadata.swap_source_mint = Some(params.source_mint);
        metadata.swap_destination_mint = Some(params.destination_mint);

        let request = StepRequest {
            owner: self.owner,
            action: ActionType::Swap,
            protocol: params.protocol,
            version: params.version.unwrap_or(1),
            amount: params.amount_in,
            direction: resolve(&self.queue, self.swap_min_out, &metadata).direction,
            descriptor: Some(ProtocolDescriptor::Pool(pool)),
            source_mint: Some(params.source_mint),
            destination_mint: Some(params.destination_mint),
            payout_mint: None,
            nft_mint: None,
            min_amount_out: Some(quote.min_output_amount),
            step_index: self.queue.len() as u8,
        };
        self.commit(request, metadata, Some(quote.min_output_amount))
            .await?;
        Ok(self)
    }

    pub async fn add_liquidity(&mut self, params: AddLiquidityParams) -> Result<&mut Self> {
        self.precheck(ActionType::AddLiquidity, params.protocol)?;

        let pool = self
            .context
            .fetcher
            .pool(params.protocol, params.pool)
            .await?;

        let mut metadata = self.metadata.clone();
        metadata.pool = Some(pool.clone());
        metadata.liquidity_mint = Some(params.token_mint);

        let request = StepRequest {
            owner: self.owner,
            action: ActionType::AddLiquidity,
            protocol: params.protocol,
            version: params.version.unwrap_or(1),
            amount: params.amount,
            direction: resolve(&self.queue, self.swap_min_out, &metadata).direction,
            descriptor: Some(ProtocolDescriptor::Pool(pool)),
            source_mint: None,
            destination_mint: None,
            payout_mint: None,
            nft_mint: None,
            min_amount_out: None,
            step_index: self.queue.len() as u8,
        };
        self.commit(request, metadata, None).await?;
        Ok(self)
    }

    pub async fn remove_liquidity(&mut self, params: RemoveLiquidityParams) -> Result<&mut Self> {
        self.precheck(ActionType::RemoveLiquidity, params.protocol)?;

        let pool = self
            .context
            .fetcher
            .pool(params.protocol, params.pool)
            .await?;

        let mut metadata = self.metadata.clone();
        metadata.pool = Some(pool.clone());

        let request = StepRequest {
            owner: self.owner,
            action: ActionType::RemoveLiquidity,
            protocol: params.protocol,
            version: params.version.unwrap_or(1),
            amount: params.amount,
            direction: resolve(&self.queue, self.swap_min_out, &metadata).direction,
            descriptor: Some(ProtocolDescriptor::Pool(pool)),
            source_mint: None,
            destination_mint: None,
            payout_mint: None,
            nft_mint: None,
            min_amount_out: None,
            step_index: self.queue.len() as u8,
        };
        self.commit(request, metadata, None).await?;
        Ok(self)
    }

    pub async fn remove_liquidity_single_side(
        &mut self,
        params: RemoveLiquiditySingleSideParams,
    ) -> Result<&mut Self> {
        self.precheck(ActionType::RemoveLiquiditySingleSide, params.protocol)?;

        let pool = self
            .context
            .fetcher
            .pool(params.protocol, params.pool)
            .await?;

        let mut metadata = self.metadata.clone();
        metadata.pool = Some(pool.clone());
        metadata.payout_mint = Some(params.payout_mint);

        let request = StepRequest {
            owner: self.owner,
            action: ActionType::RemoveLiquiditySingleSide,
            protocol: params.protocol,
            version: params.version.unwrap_or(1),
            amount: params.amount,
            direction: resolve(&self.queue, self.swap_min_out, &metadata).direction,
            descriptor: Some(ProtocolDescriptor::Pool(pool)),
            source_mint: None,
            destination_mint: None,
            payout_mint: Some(params.payout_mint),
            nft_mint: None,
            min_amount_out: None,
            step_index: self.queue.len() as u8,
        };
        self.commit(request, metadata, None).await?;
        Ok(self)
    }

    pub async fn stake(&mut self, params: FarmParams) -> Result<&mut Self> {
        self.enqueue_farm(ActionType::Stake, params.protocol, params.farm, params.amount, params.version)
            .await?;
        Ok(self)
    }

    pub async fn unstake(&mut self, params: FarmParams) -> Result<&mut Self> {
        self.enqueue_farm(ActionType::Unstake, params.protocol, params.farm, params.amount, params.version)
            .await?;
        Ok(self)
    }

    pub async fn harvest(&mut self, params: HarvestParams) -> Result<&mut Self> {
        self.enqueue_farm(ActionType::Harvest, params.protocol, params.farm, 0, params.version)
            .await?;
        Ok(self)
    }

    pub async fn supply(&mut self, params: LendingParams) -> Result<&mut Self> {
        self.enqueue_lending(ActionType::Supply, params).await?;
        Ok(self)
    }

    pub async fn unsupply(&mut self, params: LendingParams) -> Result<&mut Self> {
        self.enqueue_lending(ActionType::Unsupply, params).await?;
        Ok(self)
    }

    pub async fn borrow(&mut self, params: LendingParams) -> Result<&mut Self> {
        self.enqueue_lending(ActionType::Borrow, params).await?;
        Ok(self)
    }

    pub async fn repay(&mut self, params: LendingParams) -> Result<&mut Self> {
        self.enqueue_lending(ActionType::Repay, params).await?;
        Ok(self)
    }

    pub async fn collateralize(&mut self, params: LendingParams) -> Result<&mut Self> {
        self.enqueue_lending(ActionType::Collateralize, params).await?;
        Ok(self)
    }

    pub async fn uncollateralize(&mut self, params: LendingParams) -> Result<&mut Self> {
        self.enqueue_lending(ActionType::Uncollateralize, params)
            .await?;
        Ok(self)
    }

    pub async fn claim_collateral_reward(&mut self, params: LendingParams) -> Result<&mut Self> {
        self.enqueue_lending(ActionType::ClaimCollateralReward, params)
            .await?;
        Ok(self)
    }

    pub async fn deposit(&mut self, params: VaultParams) -> Result<&mut Self> {
        self.enqueue_vault(ActionType::Deposit, params).await?;
        Ok(self)
    }

    pub async fn withdraw(&mut self, params: VaultParams) -> Result<&mut Self> {
        self.enqueue_vault(ActionType::Withdraw, params).await?;
        Ok(self)
    }

    pub async fn initiate_deposit(&mut self, params: VaultParams) -> Result<&mut Self> {
        self.enqueue_vault(ActionType::InitiateDeposit, params).await?;
        Ok(self)
    }

    pub async fn finalize_deposit(&mut self, params: VaultParams) -> Result<&mut Self> {
        self.enqueue_vault(ActionType::FinalizeDeposit, params).await?;
        Ok(self)
    }

    pub async fn cancel_deposit(&mut self, params: VaultParams) -> Result<&mut Self> {
        self.enqueue_vault(ActionType::CancelDeposit, params).await?;
        Ok(self)
    }

    pub async fn initiate_withdrawal(&mut self, params: VaultParams) -> Result<&mut Self> {
        self.enqueue_vault(ActionType::InitiateWithdrawal, params)
            .await?;
        Ok(self)
    }

    pub async fn finalize_withdrawal(&mut self, params: VaultParams) -> Result<&mut Self> {
        self.enqueue_vault(ActionType::FinalizeWithdrawal, params)
            .await?;
        Ok(self)
    }

    pub async fn cancel_withdrawal(&mut self, params: VaultParams) -> Result<&mut Self> {
        self.enqueue_vault(ActionType::CancelWithdrawal, params)
            .await?;
        Ok(self)
    }

    pub async fn lock_nft(&mut self, params: NftParams) -> Result<&mut Self> {
        self.enqueue_nft(ActionType::LockNft, params).await?;
        Ok(self)
    }

    pub async fn unlock_nft(&mut self, params: NftParams) -> Result<&mut Self> {
        self.enqueue_nft(ActionType::UnlockNft, params).await?;
        Ok(self)
    }

    pub async fn stake_proof(&mut self, params: ProofParams) -> Result<&mut Self> {
        self.enqueue_proof(ActionType::StakeProof, params).await?;
        Ok(self)
    }

    pub async fn unstake_proof(&mut self, params: ProofParams) -> Result<&mut Self> {
        self.enqueue_proof(ActionType::UnstakeProof, params).await?;
        Ok(self)
    }

    pub async fn claim(&mut self, params: ClaimParams) -> Result<&mut Self> {
        self.precheck(ActionType::Claim, params.protocol)?;
        let vault = self
            .context
            .fetcher
            .vault(params.protocol, params.vault)
            .await?;
        let request = self.vault_request(
            ActionType::Claim,
            params.protocol,
            params.version.unwrap_or(1),
            0,
            vault,
            None,
        );
        self.commit(request, self.metadata.clone(), None).await?;
        Ok(self)
    }

    /// Re-run the resolver and wrap the queue with the dispatcher's
    /// open/close instructions. Idempotent; the composer can be
    /// finalized again and will produce the same batch.
    pub fn finalize(&mut self) -> Result<ComposedBatch> {
        self.run_resolver();

        if self.queue.is_empty() {
            warn!("finalizing an empty composition");
        }

        let record = self.queue.to_record(self.direction, self.swap_min_out);
        let open = dispatcher::open_session(
            &self.context.dispatcher_program,
            &self.owner,
            self.session_nonce,
            &record,
        )?;
        let close = dispatcher::close_session(
            &self.context.dispatcher_program,
            &self.owner,
            self.session_nonce,
        );

        info!(
            steps = self.queue.len(),
            direction = ?self.direction,
            swap_min_out = self.swap_min_out,
            session = %self.session_address(),
            "composition finalized"
        );
        Ok(ComposedBatch {
            open,
            steps: self.step_batches.clone(),
            close,
        })
    }

    // ---- internals ------------------------------------------------------

    /// Fail fast before any fetch or mutation: adapter lookup, then
    /// capacity.
    fn precheck(&self, action: ActionType, protocol: ProtocolId) -> Result<()> {
        self.context.registry.resolve(protocol, action)?;
        if self.queue.is_full() {
            return Err(ComposerError::QueueFull {
                capacity: crate::types::MAX_QUEUE_ACTIONS,
            });
        }
        Ok(())
    }

    async fn enqueue_farm(
        &mut self,
        action: ActionType,
        protocol: ProtocolId,
        farm: Pubkey,
        amount: u64,
        version: Option<u8>,
    ) -> Result<()> {
        self.precheck(action, protocol)?;
        let farm = self.context.fetcher.farm(protocol, farm).await?;
        let request = StepRequest {
            owner: self.owner,
            action,
            protocol,
            version: version.unwrap_or(1),
            amount,
            direction: self.direction,
            descriptor: Some(ProtocolDescriptor::Farm(farm)),
            source_mint: None,
            destination_mint: None,
            payout_mint: None,
            nft_mint: None,
            min_amount_out: None,
            step_index: self.queue.len() as u8,
        };
        self.commit(request, self.metadata.clone(), None).await
    }

    async fn enqueue_lending(&mut self, action: ActionType, params: LendingParams) -> Result<()> {
        self.precheck(action, params.protocol)?;
        let reserve = self
            .context
            .fetcher
            .reserve(params.protocol, params.reserve)
            .await?;
        let request = StepRequest {
            owner: self.owner,
            action,
            protocol: params.protocol,
            version: params.version.unwrap_or(1),
            amount: params.amount,
            direction: self.direction,
            descriptor: Some(ProtocolDescriptor::Reserve(reserve)),
            source_mint: None,
            destination_mint: None,
            payout_mint: None,
            nft_mint: None,
            min_amount_out: None,
            step_index: self.queue.len() as u8,
        };
        self.commit(request, self.metadata.clone(), None).await
    }

    async fn enqueue_vault(&mut self, action: ActionType, params: VaultParams) -> Result<()> {
        self.precheck(action, params.protocol)?;
        let vault = self
            .context
            .fetcher
            .vault(params.protocol, params.vault)
            .await?;
        let request = self.vault_request(
            action,
            params.protocol,
            params.version.unwrap_or(1),
            params.amount,
            vault,
            None,
        );
        self.commit(request, self.metadata.clone(), None).await
    }

    async fn enqueue_nft(&mut self, action: ActionType, params: NftParams) -> Result<()> {
        self.precheck(action, params.protocol)?;
        let vault = self
            .context
            .fetcher
            .vault(params.protocol, params.vault)
            .await?;
        let request = self.vault_request(
            action,
            params.protocol,
            params.version.unwrap_or(1),
            1,
            vault,
            Some(params.nft_mint),
        );
        self.commit(request, self.metadata.clone(), None).await
    }

    async fn enqueue_proof(&mut self, action: ActionType, params: ProofParams) -> Result<()> {
        self.precheck(action, params.protocol)?;
        let vault = self
            .context
            .fetcher
            .vault(params.protocol, params.vault)
            .await?;
        let request = self.vault_request(
            action,
            params.protocol,
            params.version.unwrap_or(1),
            params.amount,
            vault,
            None,
        );
        self.commit(request, self.metadata.clone(), None).await
    }

    fn vault_request(
        &self,
        action: ActionType,
        protocol: ProtocolId,
        version: u8,
        amount: u64,
        vault: crate::types::VaultDescriptor,
        nft_mint: Option<Pubkey>,
    ) -> StepRequest {
        StepRequest {
            owner: self.owner,
            action,
            protocol,
            version,
            amount,
            direction: self.direction,
            descriptor: Some(ProtocolDescriptor::Vault(vault)),
            source_mint: None,
            destination_mint: None,
            payout_mint: None,
            nft_mint,
            min_amount_out: None,
            step_index: self.queue.len() as u8,
        }
    }

    /// Run the adapter, then commit everything at once. Nothing in the
    /// composer changes until the adapter call has succeeded.
    async fn commit(
        &mut self,
        request: StepRequest,
        metadata: CompositionMetadata,
        swap_min_out: Option<u64>,
    ) -> Result<()> {
        let adapter = self
            .context
            .registry
            .resolve(request.protocol, request.action)?;
        let output = adapter
            .build_step(self.context.fetcher.as_ref(), &request)
            .await?;

        let invoke = dispatcher::invoke_step(
            &self.context.dispatcher_program,
            &self.owner,
            self.session_nonce,
            request.step_index,
            PAYLOAD_ROUTE,
            &output.payload,
            &output.step_accounts,
        );
        let mut batch = output.setup;
        batch.push(invoke);
        batch.extend(output.cleanup);

        let entry = QueueEntry {
            action: request.action,
            protocol: request.protocol,
            version: request.version,
            amount: request.amount,
            payload: output.payload,
            payload_route: PAYLOAD_ROUTE,
        };
        self.queue.push(entry)?;
        self.step_batches.push(batch);
        self.metadata = metadata;
        if let Some(min_out) = swap_min_out {
            self.swap_min_out = min_out;
        }
        self.run_resolver();

        debug!(
            action = %request.action,
            protocol = %request.protocol,
            amount = request.amount,
            position = self.queue.len() - 1,
            "action queued"
        );
        Ok(())
    }

    fn run_resolver(&mut self) {
        let resolution = resolve(&self.queue, self.swap_min_out, &self.metadata);
        self.direction = resolution.direction;
        apply(&mut self.queue, &resolution);
    }
}
