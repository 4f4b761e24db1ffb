//! Engine configuration with environment-variable overrides.
//!
//! Every knob has a hard default so the engine runs against mainnet out of
//! the box; deployments override via `STAKEBOARD_*` variables.

use std::str::FromStr;

use alloy_primitives::{address, Address};

/// Seconds in the 30-day claim window the staking contract uses.
pub const MONTH_SECONDS: u64 = 30 * 86400;

/// Default hard ceiling for the per-index stake scan.
pub const DEFAULT_STAKE_SCAN_CEILING: usize = 1000;

/// Default bound on concurrent metadata fetches. Gateways rate-limit per
/// connection; unbounded fan-out causes cascading timeouts.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 6;

/// Default quiet period before a reward preview read fires.
pub const DEFAULT_PREVIEW_DEBOUNCE_MS: u64 = 250;

#[derive(Debug, Clone)]
pub struct Config {
    pub chain_id: u64,
    pub rpc_url: String,
    pub explorer_url: String,

    pub staking_addr: Address,
    pub token_addr: Address,
    pub nft_addr: Address,

    /// V2 pair reward-token/wrapped-native. `None` means price discovery
    /// is unconfigured and the oracle reports no price.
    pub token_wnative_pair: Option<Address>,
    /// V2 pair wrapped-native/stable.
    pub wnative_stable_pair: Option<Address>,
    pub wnative_addr: Address,
    pub stable_addr: Address,

    /// Gateways tried in order when rewriting content-addressed URIs. The
    /// first entry is the primary; at least two public fallbacks follow.
    pub ipfs_gateways: Vec<String>,

    /// Per-tier APY bonus in basis points, tiers 1..=6.
    pub tier_bonus_bps: [u16; 6],

    pub stake_scan_ceiling: usize,
    pub fetch_concurrency: usize,
    pub month_seconds: u64,
    pub preview_debounce_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain_id: 56,
            rpc_url: "https://bsc-dataseed.binance.org".to_string(),
            explorer_url: "https://bscscan.com".to_string(),
            staking_addr: address!("0xe80239e6E3af4F0E0D6cEFf33FfCCC9638fcC4B1"),
            token_addr: address!("0xD78c339444fA0C83640A6191a6D775c321e63B78"),
            nft_addr: address!("0x80279A67b1F485f4C9de376194a38448f5a3DEBf"),
            token_wnative_pair: None,
            wnative_stable_pair: None,
            wnative_addr: address!("0xbb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c"),
            stable_addr: address!("0xe9e7CEA3DedcA5984780Bafc599bD69ADd087D56"),
            ipfs_gateways: vec![
                "https://ipfs.io/ipfs/".to_string(),
                "https://cloudflare-ipfs.com/ipfs/".to_string(),
                "https://gateway.pinata.cloud/ipfs/".to_string(),
            ],
            tier_bonus_bps: [100, 200, 300, 400, 500, 600],
            stake_scan_ceiling: DEFAULT_STAKE_SCAN_CEILING,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            month_seconds: MONTH_SECONDS,
            preview_debounce_ms: DEFAULT_PREVIEW_DEBOUNCE_MS,
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_var(key).and_then(|v| v.parse().ok())
}

fn env_addr(key: &str) -> Option<Address> {
    match env_var(key) {
        Some(v) => match Address::from_str(&v) {
            Ok(addr) => Some(addr),
            Err(e) => {
                log::warn!("ignoring unparseable {}: {}", key, e);
                None
            }
        },
        None => None,
    }
}

impl Config {
    /// Load configuration from `STAKEBOARD_*` environment variables,
    /// falling back to mainnet defaults field by field.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let mut gateways = defaults.ipfs_gateways.clone();
        if let Some(primary) = env_var("STAKEBOARD_IPFS_GATEWAY") {
            gateways.retain(|g| *g != primary);
            gateways.insert(0, primary);
        }
        Self {
            chain_id: env_parse("STAKEBOARD_CHAIN_ID").unwrap_or(defaults.chain_id),
            rpc_url: env_var("STAKEBOARD_RPC_URL").unwrap_or(defaults.rpc_url),
            explorer_url: env_var("STAKEBOARD_EXPLORER").unwrap_or(defaults.explorer_url),
            staking_addr: env_addr("STAKEBOARD_STAKING_ADDR").unwrap_or(defaults.staking_addr),
            token_addr: env_addr("STAKEBOARD_TOKEN_ADDR").unwrap_or(defaults.token_addr),
            nft_addr: env_addr("STAKEBOARD_NFT_ADDR").unwrap_or(defaults.nft_addr),
            token_wnative_pair: env_addr("STAKEBOARD_TOKEN_WNATIVE_PAIR"),
            wnative_stable_pair: env_addr("STAKEBOARD_WNATIVE_STABLE_PAIR"),
            wnative_addr: env_addr("STAKEBOARD_WNATIVE").unwrap_or(defaults.wnative_addr),
            stable_addr: env_addr("STAKEBOARD_STABLE").unwrap_or(defaults.stable_addr),
            ipfs_gateways: gateways,
            tier_bonus_bps: defaults.tier_bonus_bps,
            stake_scan_ceiling: env_parse("STAKEBOARD_STAKE_SCAN_CEILING")
                .unwrap_or(defaults.stake_scan_ceiling),
            fetch_concurrency: env_parse("STAKEBOARD_FETCH_CONCURRENCY")
                .unwrap_or(defaults.fetch_concurrency),
            month_seconds: env_parse("STAKEBOARD_MONTH_SECONDS").unwrap_or(defaults.month_seconds),
            preview_debounce_ms: env_parse("STAKEBOARD_PREVIEW_DEBOUNCE_MS")
                .unwrap_or(defaults.preview_debounce_ms),
        }
    }

    /// Both pool addresses are required before any price can be derived.
    pub fn price_pools_configured(&self) -> bool {
        self.token_wnative_pair.is_some() && self.wnative_stable_pair.is_some()
    }

    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), tx_hash)
    }
}
