//! Read-only aggregation engine for a token-staking product on an EVM
//! chain. Reconciles on-chain state (stake positions, emission
//! parameters, collateral price) and content-addressed NFT metadata into
//! a consistent session view, and computes accrued rewards and effective
//! APY from it.
//!
//! The crate never signs or submits transactions; every chain interaction
//! is an `eth_call`. Absence of a figure (no price pool configured, an
//! accessor a deployment does not expose, an unreachable gateway) is a
//! designed value that degrades one number, never the whole view.

pub mod abi;
pub mod config;
pub mod metadata;
pub mod price;
pub mod rewards;
pub mod rpc;
pub mod stakes;
pub mod txindex;

pub use config::Config;
pub use metadata::{CancelFlag, HttpFetcher, JsonFetcher, MetadataResolver, OwnedToken};
pub use price::PriceOracle;
pub use rewards::RewardProjection;
pub use rpc::{ContractReader, EthClient, RpcError};
pub use stakes::{Plan, PreviewDebouncer, StakeLedgerReader, StakePosition};
pub use txindex::{FileKvStore, KvStore, TxIndex};
