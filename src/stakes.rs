//! Stake ledger reads: positions, plans, totals, and the per-position
//! contract views. Deployed staking contracts differ in which accessors
//! they expose, so reads that vary across deployments go through ordered
//! probes; the decode error from a missing accessor is the signal to try
//! the next shape.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use futures_util::future::join_all;
use tokio::sync::OnceCell;

use crate::abi::{Arg, ParamType, Value};
use crate::config::Config;
use crate::rpc::{ContractReader, RpcError};

/// Number of staking plans the contract defines.
pub const PLAN_COUNT: usize = 3;

/// Candidates for the global total, in probe order.
const TOTAL_STAKED_CANDIDATES: [&str; 4] = [
    "totalStaked()",
    "totalDeposits()",
    "totalTokensStaked()",
    "totalStakedAmount()",
];

/// Candidates for a wallet's lifetime claimed figure, in probe order.
const TOTAL_CLAIMED_CANDIDATES: [&str; 6] = [
    "totalClaimedOf(address)",
    "rewardsClaimed(address)",
    "totalClaimed(address)",
    "claimedOf(address)",
    "lifetimeClaimed(address)",
    "userClaimed(address)",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StakePosition {
    pub amount: U256,
    pub start_time: u64,
    pub last_claim_time: u64,
    pub plan_index: u8,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plan {
    pub duration_seconds: u64,
    pub apy_bps: u16,
    pub early_exit_penalty_bps: u16,
}

fn stake_tuple() -> ParamType {
    ParamType::Tuple(vec![
        ParamType::Uint,
        ParamType::Uint,
        ParamType::Uint,
        ParamType::Uint,
        ParamType::Bool,
    ])
}

fn stake_from_fields(fields: &[Value]) -> Option<StakePosition> {
    Some(StakePosition {
        amount: fields.first()?.as_uint()?,
        start_time: fields.get(1)?.as_u64()?,
        last_claim_time: fields.get(2)?.as_u64()?,
        plan_index: fields.get(3)?.as_u64()? as u8,
        active: fields.get(4)?.as_bool()?,
    })
}

pub struct StakeLedgerReader<R: ContractReader> {
    reader: Arc<R>,
    staking: Address,
    token: Address,
    scan_ceiling: usize,
    plans: OnceCell<Vec<Plan>>,
}

impl<R: ContractReader> StakeLedgerReader<R> {
    pub fn from_config(reader: Arc<R>, cfg: &Config) -> Self {
        Self {
            reader,
            staking: cfg.staking_addr,
            token: cfg.token_addr,
            scan_ceiling: cfg.stake_scan_ceiling,
            plans: OnceCell::new(),
        }
    }

    /// All stake positions of a wallet, in contract index order.
    ///
    /// The batched `stakesOf` accessor is preferred; when it is missing or
    /// reports nothing, the per-index accessor is scanned from zero until
    /// the first failure or the configured ceiling. Malformed entries from
    /// either path are skipped rather than aborting the whole read.
    pub async fn positions(&self, wallet: Address) -> Vec<StakePosition> {
        match self
            .reader
            .read(
                self.staking,
                "stakesOf(address)",
                &[Arg::Address(wallet)],
                &[ParamType::Array(Box::new(stake_tuple()))],
            )
            .await
        {
            Ok(vals) => {
                if let Some(arr) = vals.first().and_then(Value::as_array) {
                    if !arr.is_empty() {
                        return arr
                            .iter()
                            .filter_map(|v| v.as_tuple().and_then(stake_from_fields))
                            .collect();
                    }
                }
            }
            Err(e) => {
                log::debug!("stakesOf unavailable, scanning per index: {}", e);
            }
        }
        self.scan_positions(wallet).await
    }

    async fn scan_positions(&self, wallet: Address) -> Vec<StakePosition> {
        let mut out = Vec::new();
        for i in 0..self.scan_ceiling {
            let result = self
                .reader
                .read(
                    self.staking,
                    "stakes(address,uint256)",
                    &[Arg::Address(wallet), Arg::Uint(U256::from(i))],
                    &[
                        ParamType::Uint,
                        ParamType::Uint,
                        ParamType::Uint,
                        ParamType::Uint,
                        ParamType::Bool,
                    ],
                )
                .await;
            match result {
                Ok(vals) => match stake_from_fields(&vals) {
                    Some(position) => out.push(position),
                    None => break,
                },
                // First failure is end-of-list, not an error.
                Err(_) => break,
            }
        }
        if out.len() == self.scan_ceiling {
            log::warn!(
                "stake scan stopped at ceiling {} for {}",
                self.scan_ceiling,
                wallet
            );
        }
        out
    }

    /// Plan parameters, read once per session and cached.
    pub async fn plans(&self) -> Result<&[Plan], RpcError> {
        let plans = self
            .plans
            .get_or_try_init(|| async {
                let reads = (0..PLAN_COUNT).map(|i| async move {
                    self.reader
                        .read(
                            self.staking,
                            "plans(uint8)",
                            &[Arg::U8(i as u8)],
                            &[ParamType::Uint, ParamType::Uint, ParamType::Uint],
                        )
                        .await
                });
                let mut plans = Vec::with_capacity(PLAN_COUNT);
                for vals in join_all(reads).await {
                    let vals = vals?;
                    let field = |i: usize| {
                        vals.get(i)
                            .and_then(Value::as_u64)
                            .ok_or_else(|| RpcError::Decode("malformed plan tuple".to_string()))
                    };
                    plans.push(Plan {
                        duration_seconds: field(0)?,
                        apy_bps: field(1)?.min(u16::MAX as u64) as u16,
                        early_exit_penalty_bps: field(2)?.min(u16::MAX as u64) as u16,
                    });
                }
                Ok(plans)
            })
            .await?;
        Ok(plans)
    }

    /// Global total staked across all wallets, `None` when no known
    /// accessor answers.
    pub async fn total_staked(&self) -> Option<U256> {
        self.probe_uint(&TOTAL_STAKED_CANDIDATES, &[]).await
    }

    /// Lifetime rewards a wallet has claimed, `None` when no known
    /// accessor answers.
    pub async fn total_claimed_of(&self, wallet: Address) -> Option<U256> {
        self.probe_uint(&TOTAL_CLAIMED_CANDIDATES, &[Arg::Address(wallet)])
            .await
    }

    async fn probe_uint(&self, candidates: &[&str], args: &[Arg]) -> Option<U256> {
        for signature in candidates {
            match self.read_uint(self.staking, signature, args).await {
                Ok(v) => return Some(v),
                Err(e) => log::debug!("probe {} missed: {}", signature, e),
            }
        }
        None
    }

    pub async fn effective_boost_bps(&self, wallet: Address) -> Result<u64, RpcError> {
        let v = self
            .read_uint(self.staking, "effectiveBoostBps(address)", &[Arg::Address(wallet)])
            .await?;
        Ok(v.saturating_to())
    }

    pub async fn claimable_months(&self, wallet: Address, index: u64) -> Result<u64, RpcError> {
        let v = self
            .read_uint(
                self.staking,
                "claimableMonths(address,uint256)",
                &[Arg::Address(wallet), Arg::Uint(U256::from(index))],
            )
            .await?;
        Ok(v.saturating_to())
    }

    pub async fn pending_reward(&self, wallet: Address, index: u64) -> Result<U256, RpcError> {
        self.read_uint(
            self.staking,
            "pendingReward(address,uint256)",
            &[Arg::Address(wallet), Arg::Uint(U256::from(index))],
        )
        .await
    }

    /// Contract-side projection of one month of rewards for a hypothetical
    /// stake. Drive this through a `PreviewDebouncer` when wired to rapid
    /// input changes.
    pub async fn preview_monthly_reward(
        &self,
        wallet: Address,
        amount: U256,
        plan_index: u8,
    ) -> Result<U256, RpcError> {
        self.read_uint(
            self.staking,
            "previewMonthlyReward(address,uint256,uint8)",
            &[Arg::Address(wallet), Arg::Uint(amount), Arg::U8(plan_index)],
        )
        .await
    }

    pub async fn claim_paused(&self) -> Result<bool, RpcError> {
        let vals = self
            .reader
            .read(self.staking, "claimPaused()", &[], &[ParamType::Bool])
            .await?;
        vals.first()
            .and_then(Value::as_bool)
            .ok_or_else(|| RpcError::Decode("claimPaused returned no bool".to_string()))
    }

    pub async fn all_tiers_bonus_bps(&self) -> Result<u64, RpcError> {
        let v = self.read_uint(self.staking, "allTiersBonusBps()", &[]).await?;
        Ok(v.saturating_to())
    }

    pub async fn max_total_boost_bps(&self) -> Result<u64, RpcError> {
        let v = self.read_uint(self.staking, "maxTotalBoostBps()", &[]).await?;
        Ok(v.saturating_to())
    }

    pub async fn token_decimals(&self) -> Result<u8, RpcError> {
        let v = self.read_uint(self.token, "decimals()", &[]).await?;
        Ok(v.saturating_to::<u64>() as u8)
    }

    pub async fn token_symbol(&self) -> Result<String, RpcError> {
        let vals = self
            .reader
            .read(self.token, "symbol()", &[], &[ParamType::Str])
            .await?;
        vals.first()
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RpcError::Decode("symbol returned no string".to_string()))
    }

    pub async fn token_balance(&self, owner: Address) -> Result<U256, RpcError> {
        self.read_uint(self.token, "balanceOf(address)", &[Arg::Address(owner)])
            .await
    }

    /// Allowance granted by `owner` to the staking contract.
    pub async fn token_allowance(&self, owner: Address) -> Result<U256, RpcError> {
        self.read_uint(
            self.token,
            "allowance(address,address)",
            &[Arg::Address(owner), Arg::Address(self.staking)],
        )
        .await
    }

    async fn read_uint(
        &self,
        address: Address,
        signature: &str,
        args: &[Arg],
    ) -> Result<U256, RpcError> {
        let vals = self
            .reader
            .read(address, signature, args, &[ParamType::Uint])
            .await?;
        vals.first()
            .and_then(Value::as_uint)
            .ok_or_else(|| RpcError::Decode(format!("{} returned no word", signature)))
    }
}

/// Coalesces rapid successive preview requests: each call bumps the
/// generation, waits out the quiet period, and reports whether it is still
/// the latest. Superseded callers skip their read.
#[derive(Debug, Clone)]
pub struct PreviewDebouncer {
    generation: Arc<AtomicU64>,
    quiet: Duration,
}

impl PreviewDebouncer {
    pub fn new(quiet_ms: u64) -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
            quiet: Duration::from_millis(quiet_ms),
        }
    }

    /// Returns `true` when no newer request arrived during the quiet
    /// period; `false` means the caller was superseded and should not
    /// fire its read.
    pub async fn debounce(&self) -> bool {
        let mine = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.quiet).await;
        self.generation.load(Ordering::SeqCst) == mine
    }
}
