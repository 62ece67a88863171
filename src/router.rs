//! Swap routing service client
//!
//! Resolves a swap's guaranteed minimum output through an aggregator
//! quote API. The composer only needs the quote; instruction
//! construction stays with the protocol adapters.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::config::RouterConfig;
use crate::error::{ComposerError, Result};

/// A resolved swap route.
#[derive(Debug, Clone)]
pub struct RouteQuote {
    pub input_amount: u64,
    pub output_amount: u64,
    /// Worst-case output the route guarantees under the requested
    /// slippage. Feeds the zap rewrite.
    pub min_output_amount: u64,
    pub hop_count: usize,
}

/// Quote provider for swap steps.
#[async_trait]
pub trait SwapRouter: Send + Sync {
    /// Quote `amount` of `source` into `destination`. An unroutable
    /// pair is a hard [`ComposerError::EmptyRoute`], never a silent
    /// zero.
    async fn quote(
        &self,
        source: Pubkey,
        destination: Pubkey,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<RouteQuote>;
}

/// Aggregator quote response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    in_amount: String,
    out_amount: String,
    other_amount_threshold: String,
    route_plan: Vec<RoutePlan>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoutePlan {
    #[allow(dead_code)]
    percent: u8,
}

/// HTTP-backed router client.
pub struct HttpRouter {
    client: Client,
    api_url: String,
}

impl HttpRouter {
    pub fn new(config: &RouterConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(ComposerError::Http)?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
        })
    }
}

#[async_trait]
impl SwapRouter for HttpRouter {
    async fn quote(
        &self,
        source: Pubkey,
        destination: Pubkey,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<RouteQuote> {
        let url = Url::parse_with_params(
            &format!("{}/quote", self.api_url),
            &[
                ("inputMint", source.to_string()),
                ("outputMint", destination.to_string()),
                ("amount", amount.to_string()),
                ("slippageBps", slippage_bps.to_string()),
            ],
        )
        .map_err(|e| ComposerError::RouterResponse(format!("bad router url: {}", e)))?;
        debug!(%source, %destination, amount, "fetching route quote");

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ComposerError::RouterResponse(format!(
                "{} - {}",
                status, body
            )));
        }

        let quote: QuoteResponse = response.json().await?;
        if quote.route_plan.is_empty() {
            return Err(ComposerError::EmptyRoute {
                source_mint: source,
                destination,
            });
        }

        let parsed = RouteQuote {
            input_amount: parse_amount(&quote.in_amount)?,
            output_amount: parse_amount(&quote.out_amount)?,
            min_output_amount: parse_amount(&quote.other_amount_threshold)?,
            hop_count: quote.route_plan.len(),
        };

        info!(
            input = parsed.input_amount,
            output = parsed.output_amount,
            min_output = parsed.min_output_amount,
            hops = parsed.hop_count,
            "route quote resolved"
        );
        Ok(parsed)
    }
}

fn parse_amount(raw: &str) -> Result<u64> {
    raw.parse::<u64>()
        .map_err(|e| ComposerError::RouterResponse(format!("bad amount {:?}: {}", raw, e)))
}
