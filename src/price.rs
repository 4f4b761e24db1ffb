//! USD price discovery from V2 pair reserves, with no centralized feed.
//!
//! The reward token is priced through two hops: token/wrapped-native and
//! wrapped-native/stable. "No price available" is a designed value: every
//! failure mode here collapses to `None`, and callers render a placeholder
//! instead of zero.

use std::sync::Arc;

use alloy_primitives::{Address, U256};

use crate::abi::ParamType;
use crate::config::Config;
use crate::rewards::u256_to_f64;
use crate::rpc::ContractReader;

pub struct PriceOracle<R: ContractReader> {
    reader: Arc<R>,
    token: Address,
    wnative: Address,
    stable: Address,
    token_wnative_pair: Option<Address>,
    wnative_stable_pair: Option<Address>,
}

impl<R: ContractReader> PriceOracle<R> {
    pub fn from_config(reader: Arc<R>, cfg: &Config) -> Self {
        Self {
            reader,
            token: cfg.token_addr,
            wnative: cfg.wnative_addr,
            stable: cfg.stable_addr,
            token_wnative_pair: cfg.token_wnative_pair,
            wnative_stable_pair: cfg.wnative_stable_pair,
        }
    }

    /// USD price of the reward token, or `None` when it cannot be
    /// determined (unconfigured pools, zero reserves, unreachable node,
    /// non-finite arithmetic). Never errors.
    pub async fn usd_price(&self) -> Option<f64> {
        let (pair_a, pair_b) = match (self.token_wnative_pair, self.wnative_stable_pair) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                log::debug!("price pools unconfigured, no USD price");
                return None;
            }
        };

        let (token_in_wnative, wnative_in_stable) = tokio::join!(
            self.pair_price(pair_a, self.token, self.wnative),
            self.pair_price(pair_b, self.wnative, self.stable),
        );

        let usd = token_in_wnative? * wnative_in_stable?;
        if usd.is_finite() {
            Some(usd)
        } else {
            None
        }
    }

    /// Price of `base` denominated in `quote` from one pair's reserves.
    /// Orientation is determined against token0/token1; a pair that holds
    /// neither ordering, or whose base reserve is zero, is undeterminable.
    async fn pair_price(&self, pair: Address, base: Address, quote: Address) -> Option<f64> {
        let (t0, t1, reserves) = tokio::join!(
            self.reader.read(pair, "token0()", &[], &[ParamType::Address]),
            self.reader.read(pair, "token1()", &[], &[ParamType::Address]),
            self.reader.read(
                pair,
                "getReserves()",
                &[],
                &[ParamType::Uint, ParamType::Uint, ParamType::Uint],
            ),
        );

        let token0 = t0.ok()?.first()?.as_address()?;
        let token1 = t1.ok()?.first()?.as_address()?;
        let reserves = reserves.ok()?;
        let r0 = reserves.first()?.as_uint()?;
        let r1 = reserves.get(1)?.as_uint()?;

        let (r_base, r_quote) = if base == token0 && quote == token1 {
            (r0, r1)
        } else if base == token1 && quote == token0 {
            (r1, r0)
        } else {
            log::warn!("pair {} does not hold the queried token pair", pair);
            return None;
        };

        if r_base == U256::ZERO {
            return None;
        }
        let price = u256_to_f64(r_quote) / u256_to_f64(r_base);
        price.is_finite().then_some(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{Arg, Value};
    use crate::rpc::RpcError;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct PairSim {
        answers: HashMap<(Address, String), Vec<Value>>,
    }

    impl PairSim {
        fn new() -> Self {
            Self {
                answers: HashMap::new(),
            }
        }

        fn pair(mut self, pair: Address, t0: Address, t1: Address, r0: u128, r1: u128) -> Self {
            self.answers
                .insert((pair, "token0()".into()), vec![Value::Address(t0)]);
            self.answers
                .insert((pair, "token1()".into()), vec![Value::Address(t1)]);
            self.answers.insert(
                (pair, "getReserves()".into()),
                vec![
                    Value::Uint(U256::from(r0)),
                    Value::Uint(U256::from(r1)),
                    Value::Uint(U256::ZERO),
                ],
            );
            self
        }
    }

    #[async_trait]
    impl ContractReader for PairSim {
        async fn read(
            &self,
            address: Address,
            signature: &str,
            _args: &[Arg],
            _outputs: &[ParamType],
        ) -> Result<Vec<Value>, RpcError> {
            self.answers
                .get(&(address, signature.to_string()))
                .cloned()
                .ok_or_else(|| RpcError::Node("execution reverted".to_string()))
        }
    }

    fn addr(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    fn oracle(reader: PairSim) -> PriceOracle<PairSim> {
        PriceOracle {
            reader: Arc::new(reader),
            token: addr(0x01),
            wnative: addr(0x02),
            stable: addr(0x03),
            token_wnative_pair: Some(addr(0xA1)),
            wnative_stable_pair: Some(addr(0xA2)),
        }
    }

    #[tokio::test]
    async fn derives_two_hop_usd_price() {
        // 1 token = 0.5 wnative, 1 wnative = 300 stable => $150.
        let sim = PairSim::new()
            .pair(addr(0xA1), addr(0x01), addr(0x02), 2_000, 1_000)
            .pair(addr(0xA2), addr(0x02), addr(0x03), 10, 3_000);
        let price = oracle(sim).usd_price().await.unwrap();
        assert!((price - 150.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn orientation_flip_is_reciprocal() {
        let sim = PairSim::new().pair(addr(0xA1), addr(0x01), addr(0x02), 4_000, 1_000);
        let o = oracle(sim);
        let forward = o.pair_price(addr(0xA1), addr(0x01), addr(0x02)).await.unwrap();
        let backward = o.pair_price(addr(0xA1), addr(0x02), addr(0x01)).await.unwrap();
        assert!((forward - 1.0 / backward).abs() < 1e-12);
    }

    #[tokio::test]
    async fn reversed_pair_ordering_gives_same_usd_figure() {
        // Same liquidity, but the pair contracts store the tokens in the
        // opposite slot order.
        let a = PairSim::new()
            .pair(addr(0xA1), addr(0x01), addr(0x02), 2_000, 1_000)
            .pair(addr(0xA2), addr(0x02), addr(0x03), 10, 3_000);
        let b = PairSim::new()
            .pair(addr(0xA1), addr(0x02), addr(0x01), 1_000, 2_000)
            .pair(addr(0xA2), addr(0x03), addr(0x02), 3_000, 10);
        let pa = oracle(a).usd_price().await.unwrap();
        let pb = oracle(b).usd_price().await.unwrap();
        assert!((pa - pb).abs() < 1e-9);
    }

    #[tokio::test]
    async fn zero_reserve_is_undeterminable() {
        let sim = PairSim::new()
            .pair(addr(0xA1), addr(0x01), addr(0x02), 0, 1_000)
            .pair(addr(0xA2), addr(0x02), addr(0x03), 10, 3_000);
        assert_eq!(oracle(sim).usd_price().await, None);
    }

    #[tokio::test]
    async fn unconfigured_pools_yield_none() {
        let mut o = oracle(PairSim::new());
        o.token_wnative_pair = None;
        assert_eq!(o.usd_price().await, None);
    }

    #[tokio::test]
    async fn foreign_pair_tokens_yield_none() {
        let sim = PairSim::new()
            .pair(addr(0xA1), addr(0x08), addr(0x09), 2_000, 1_000)
            .pair(addr(0xA2), addr(0x02), addr(0x03), 10, 3_000);
        assert_eq!(oracle(sim).usd_price().await, None);
    }

    #[tokio::test]
    async fn read_failure_absorbs_to_none() {
        // Only the second pair is known; the first hop errors out.
        let sim = PairSim::new().pair(addr(0xA2), addr(0x02), addr(0x03), 10, 3_000);
        assert_eq!(oracle(sim).usd_price().await, None);
    }
}
