//! NFT metadata resolution: enumerate owned tokens, then resolve each
//! token's display metadata through a fixed-priority pipeline of design
//! base URIs, inline data URIs, and multi-gateway content-addressed
//! fetches. Resolution failures are recorded on the token, never dropped.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures_util::future::join_all;
use serde_json::Value as Json;
use tokio::sync::Mutex;

use crate::abi::{Arg, ParamType, Value};
use crate::config::Config;
use crate::rpc::{ContractReader, RpcError};

/// Token ids encode design and edition as `design * 10000 + edition`.
pub const EDITION_BASE: u64 = 10_000;

const INLINE_JSON_PREFIX: &str = "data:application/json;base64,";

#[derive(Debug, Clone, PartialEq)]
pub struct OwnedToken {
    pub id: U256,
    pub design_id: u32,
    pub edition: u32,
    pub name: Option<String>,
    pub image_uri: Option<String>,
    pub animation_uri: Option<String>,
    pub tier: Option<u8>,
    /// False when no media could be located; `error_detail` then explains
    /// every path that was tried.
    pub resolved: bool,
    pub error_detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DesignInfo {
    pub base_uri: String,
    pub tier: u8,
}

/// Split a token id into its design and edition components.
pub fn split_token_id(id: U256) -> (u32, u32) {
    let base = U256::from(EDITION_BASE);
    let design = (id / base).saturating_to::<u64>() as u32;
    let edition = (id % base).saturating_to::<u64>() as u32;
    (design, edition)
}

/// Rewrite a possibly content-addressed URI into one candidate URL per
/// gateway. Plain http(s) URIs pass through as a single candidate.
pub fn gateway_candidates(uri: &str, gateways: &[String]) -> Vec<String> {
    match uri.strip_prefix("ipfs://") {
        Some(path) => {
            // Some minters emit ipfs://ipfs/<cid>; normalize that away.
            let path = path.strip_prefix("ipfs/").unwrap_or(path);
            gateways.iter().map(|g| format!("{}{}", g, path)).collect()
        }
        None => vec![uri.to_string()],
    }
}

/// Candidate URLs for a design's JSON document: the base URI with
/// `<design_id>.json` appended, unless the base already points at a JSON
/// file, fanned out across the gateways.
pub fn design_json_candidates(base_uri: &str, design_id: u32, gateways: &[String]) -> Vec<String> {
    let url = if base_uri.ends_with(".json") {
        base_uri.to_string()
    } else if base_uri.ends_with('/') {
        format!("{}{}.json", base_uri, design_id)
    } else {
        format!("{}/{}.json", base_uri, design_id)
    };
    gateway_candidates(&url, gateways)
}

#[derive(Debug, Clone)]
pub struct FetchError(pub String);

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fetch error: {}", self.0)
    }
}

impl std::error::Error for FetchError {}

/// Seam over gateway HTTP so the pool/cache/fallback logic runs against
/// mocks in tests.
#[async_trait::async_trait]
pub trait JsonFetcher: Send + Sync {
    async fn fetch_json(&self, url: &str) -> Result<Json, FetchError>;
}

pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl JsonFetcher for HttpFetcher {
    async fn fetch_json(&self, url: &str) -> Result<Json, FetchError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError(format!("request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(FetchError(format!("HTTP {}", response.status())));
        }
        response
            .json()
            .await
            .map_err(|e| FetchError(format!("invalid JSON: {}", e)))
    }
}

/// Cooperative cancellation for a resolution run. Cheap to clone; setting
/// it stops workers from pulling further tokens.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct MetadataResolver<R: ContractReader, F: JsonFetcher> {
    reader: Arc<R>,
    fetcher: Arc<F>,
    nft: Address,
    gateways: Vec<String>,
    concurrency: usize,
}

impl<R: ContractReader, F: JsonFetcher> MetadataResolver<R, F> {
    pub fn from_config(reader: Arc<R>, fetcher: Arc<F>, cfg: &Config) -> Self {
        Self {
            reader,
            fetcher,
            nft: cfg.nft_addr,
            gateways: cfg.ipfs_gateways.clone(),
            concurrency: cfg.fetch_concurrency.max(1),
        }
    }

    /// Token ids held by `owner`, via `balanceOf` + `tokenOfOwnerByIndex`.
    /// Individual index failures are dropped; the rest of the wallet still
    /// enumerates.
    pub async fn owned_token_ids(&self, owner: Address) -> Result<Vec<U256>, RpcError> {
        let balance = self
            .reader
            .read(self.nft, "balanceOf(address)", &[Arg::Address(owner)], &[ParamType::Uint])
            .await?
            .first()
            .and_then(Value::as_u64)
            .ok_or_else(|| RpcError::Decode("balanceOf returned no word".to_string()))?;

        let reads = (0..balance).map(|i| async move {
            self.reader
                .read(
                    self.nft,
                    "tokenOfOwnerByIndex(address,uint256)",
                    &[Arg::Address(owner), Arg::Uint(U256::from(i))],
                    &[ParamType::Uint],
                )
                .await
        });
        let ids = join_all(reads)
            .await
            .into_iter()
            .filter_map(|r| match r {
                Ok(vals) => vals.first().and_then(Value::as_uint),
                Err(e) => {
                    log::warn!("tokenOfOwnerByIndex failed: {}", e);
                    None
                }
            })
            .collect();
        Ok(ids)
    }

    /// `design(id)` read, absorbed to `None` on any failure.
    async fn design_info(&self, design_id: u32) -> Option<DesignInfo> {
        let outputs = [
            ParamType::Str,  // name
            ParamType::Uint, // tier
            ParamType::Uint,
            ParamType::Uint,
            ParamType::Uint,
            ParamType::Uint,
            ParamType::Bool,
            ParamType::Str, // base URI
        ];
        let vals = match self
            .reader
            .read(
                self.nft,
                "design(uint256)",
                &[Arg::Uint(U256::from(design_id))],
                &outputs,
            )
            .await
        {
            Ok(vals) => vals,
            Err(e) => {
                log::debug!("design {} unavailable: {}", design_id, e);
                return None;
            }
        };
        Some(DesignInfo {
            base_uri: vals.get(7)?.as_str()?.to_string(),
            tier: vals.get(1)?.as_u64()? as u8,
        })
    }

    async fn token_uri(&self, id: U256) -> Option<String> {
        let vals = self
            .reader
            .read(self.nft, "tokenURI(uint256)", &[Arg::Uint(id)], &[ParamType::Str])
            .await
            .ok()?;
        vals.first().and_then(Value::as_str).map(str::to_string)
    }

    /// Resolve every token the wallet owns into a displayable record.
    ///
    /// Designs are read at most once per distinct design id. Metadata
    /// documents are fetched by a fixed pool of workers sharing a per-run
    /// URL cache. A cancelled run commits nothing and returns `None`;
    /// otherwise every enumerated token appears exactly once in the
    /// result, sorted by id.
    pub async fn resolve_owned(&self, owner: Address, cancel: CancelFlag) -> Option<Vec<OwnedToken>> {
        let ids = match self.owned_token_ids(owner).await {
            Ok(ids) => ids,
            Err(e) => {
                log::warn!("token enumeration failed for {}: {}", owner, e);
                Vec::new()
            }
        };
        if cancel.is_cancelled() {
            return None;
        }

        // One design read per distinct design id, before any fan-out.
        let mut design_ids: Vec<u32> = ids.iter().map(|id| split_token_id(*id).0).collect();
        design_ids.sort_unstable();
        design_ids.dedup();
        let design_reads = join_all(design_ids.iter().map(|d| self.design_info(*d))).await;
        let designs: HashMap<u32, Option<DesignInfo>> =
            design_ids.into_iter().zip(design_reads).collect();
        if cancel.is_cancelled() {
            return None;
        }

        let queue = Mutex::new(ids.iter().copied().collect::<VecDeque<U256>>());
        let url_cache: Mutex<HashMap<String, Json>> = Mutex::new(HashMap::new());
        let results: Mutex<Vec<OwnedToken>> = Mutex::new(Vec::with_capacity(ids.len()));

        let workers = (0..self.concurrency.min(ids.len().max(1))).map(|_| {
            let queue = &queue;
            let results = &results;
            let designs = &designs;
            let url_cache = &url_cache;
            let cancel = &cancel;
            async move {
                loop {
                    if cancel.is_cancelled() {
                        return;
                    }
                    let id = match queue.lock().await.pop_front() {
                        Some(id) => id,
                        None => return,
                    };
                    let token = self.resolve_one(id, designs, url_cache).await;
                    results.lock().await.push(token);
                }
            }
        });
        join_all(workers).await;

        if cancel.is_cancelled() {
            return None;
        }
        let mut tokens = results.into_inner();
        tokens.sort_by(|a, b| a.id.cmp(&b.id));
        Some(tokens)
    }

    async fn resolve_one(
        &self,
        id: U256,
        designs: &HashMap<u32, Option<DesignInfo>>,
        url_cache: &Mutex<HashMap<String, Json>>,
    ) -> OwnedToken {
        let (design_id, edition) = split_token_id(id);
        let design = designs.get(&design_id).and_then(Clone::clone);
        let mut errors: Vec<String> = Vec::new();

        let mut doc: Option<Json> = None;
        if let Some(info) = &design {
            let candidates = design_json_candidates(&info.base_uri, design_id, &self.gateways);
            doc = self.fetch_first(&candidates, url_cache, &mut errors).await;
        } else {
            errors.push(format!("design {} unavailable", design_id));
        }

        if doc.is_none() {
            doc = self.doc_from_token_uri(id, url_cache, &mut errors).await;
        }

        let name = doc
            .as_ref()
            .and_then(|d| d.get("name"))
            .and_then(Json::as_str)
            .map(str::to_string);
        let image_uri = doc.as_ref().and_then(|d| {
            media_field(d, &["image", "image_url", "imageURI"], "image")
        });
        let animation_uri = doc.as_ref().and_then(|d| {
            media_field(d, &["animation_url", "animation"], "animation_url")
        });

        let resolved = image_uri.is_some() || animation_uri.is_some();
        if !resolved {
            errors.push("no media fields in any document".to_string());
        }
        OwnedToken {
            id,
            design_id,
            edition,
            name,
            image_uri,
            animation_uri,
            tier: design.map(|d| d.tier),
            resolved,
            error_detail: (!resolved).then(|| errors.join("; ")),
        }
    }

    async fn doc_from_token_uri(
        &self,
        id: U256,
        url_cache: &Mutex<HashMap<String, Json>>,
        errors: &mut Vec<String>,
    ) -> Option<Json> {
        let uri = match self.token_uri(id).await {
            Some(uri) => uri,
            None => {
                errors.push(format!("tokenURI({}) unavailable", id));
                return None;
            }
        };
        if let Some(encoded) = uri.strip_prefix(INLINE_JSON_PREFIX) {
            match BASE64
                .decode(encoded)
                .ok()
                .and_then(|bytes| serde_json::from_slice::<Json>(&bytes).ok())
            {
                Some(doc) => return Some(doc),
                None => {
                    errors.push("inline token URI is not valid JSON".to_string());
                    return None;
                }
            }
        }
        let candidates = gateway_candidates(&uri, &self.gateways);
        self.fetch_first(&candidates, url_cache, errors).await
    }

    /// Try candidate URLs in order; the first parseable document wins and
    /// is cached by URL for the rest of the run.
    async fn fetch_first(
        &self,
        candidates: &[String],
        url_cache: &Mutex<HashMap<String, Json>>,
        errors: &mut Vec<String>,
    ) -> Option<Json> {
        for url in candidates {
            if let Some(doc) = url_cache.lock().await.get(url) {
                return Some(doc.clone());
            }
            match self.fetcher.fetch_json(url).await {
                Ok(doc) => {
                    url_cache.lock().await.insert(url.clone(), doc.clone());
                    return Some(doc);
                }
                Err(e) => errors.push(format!("{}: {}", url, e)),
            }
        }
        None
    }
}

/// Pull a media URI from the document: top-level keys in order, then the
/// same field nested under `properties`.
fn media_field(doc: &Json, keys: &[&str], properties_key: &str) -> Option<String> {
    for key in keys {
        if let Some(v) = doc.get(key).and_then(Json::as_str) {
            return Some(v.to_string());
        }
    }
    doc.get("properties")?
        .get(properties_key)
        .and_then(Json::as_str)
        .map(str::to_string)
}
