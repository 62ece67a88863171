//! Composer configuration
//!
//! Connection endpoints and program addresses. The composer itself holds
//! no durable state; this is wiring, not persistence.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Top-level composer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposerConfig {
    pub rpc: RpcConfig,
    pub dispatcher: DispatcherConfig,
    pub router: RouterConfig,
}

impl ComposerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Self =
            serde_yaml::from_str(&content).with_context(|| "Failed to parse config file")?;

        config.validate()?;
        info!("Configuration loaded from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.rpc.url.is_empty(), "rpc.url must be set");
        anyhow::ensure!(
            self.rpc.request_timeout_ms > 0,
            "rpc.request_timeout_ms must be positive"
        );
        anyhow::ensure!(!self.router.api_url.is_empty(), "router.api_url must be set");
        anyhow::ensure!(
            self.router.slippage_bps <= 10_000,
            "router.slippage_bps must be at most 10000"
        );
        self.dispatcher.program()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout() -> u64 {
    10000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Base-58 address of the on-chain dispatcher program.
    pub program_id: String,
}

impl DispatcherConfig {
    pub fn program(&self) -> Result<Pubkey> {
        Pubkey::from_str(&self.program_id).context("Invalid dispatcher program ID")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub api_url: String,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_slippage_bps() -> u16 {
    50
}
