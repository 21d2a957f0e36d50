//! Free-form search input to navigation target.
//!
//! Pure digits are a block number and resolve without touching the network.
//! `0x`-prefixed input is a hash and is tried against each [`LookupStrategy`]
//! in order; the first hit wins and later strategies are never called.
//! Anything else is handed to free-text block search.

use crate::api::ExplorerApi;
use crate::block_number::BlockNumber;
use crate::error::{ExplorerError, ExplorerResult};
use crate::types::ExtrinsicIndex;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolutionTarget {
    BlockByNumber(BlockNumber),
    BlockByHash { hash: String, number: BlockNumber },
    ExtrinsicByIndex(ExtrinsicIndex),
    FreeTextSearch(String),
    NotFound(String),
}

impl ResolutionTarget {
    /// Block the target lives in, if it names one.
    pub fn block_number(&self) -> Option<&BlockNumber> {
        match self {
            ResolutionTarget::BlockByNumber(n) => Some(n),
            ResolutionTarget::BlockByHash { number, .. } => Some(number),
            ResolutionTarget::ExtrinsicByIndex(idx) => Some(&idx.block),
            _ => None,
        }
    }
}

/// Shape of a query before any lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryKind {
    Empty,
    Number,
    Hash,
    FreeText,
}

pub fn classify_query(query: &str) -> QueryKind {
    let q = query.trim();
    if q.is_empty() {
        QueryKind::Empty
    } else if q.bytes().all(|b| b.is_ascii_digit()) {
        QueryKind::Number
    } else if q.starts_with("0x") {
        QueryKind::Hash
    } else {
        QueryKind::FreeText
    }
}

/// One way of turning a hash into a target.
#[async_trait]
pub trait LookupStrategy: Send + Sync {
    /// Noun used in user-facing messages ("block", "extrinsic").
    fn name(&self) -> &'static str;

    async fn lookup(&self, api: &dyn ExplorerApi, hash: &str) -> ExplorerResult<ResolutionTarget>;
}

pub struct BlockHashLookup;

#[async_trait]
impl LookupStrategy for BlockHashLookup {
    fn name(&self) -> &'static str {
        "block"
    }

    async fn lookup(&self, api: &dyn ExplorerApi, hash: &str) -> ExplorerResult<ResolutionTarget> {
        let block = api.block_by_hash(hash).await?;
        Ok(ResolutionTarget::BlockByHash {
            hash: block.hash,
            number: block.number,
        })
    }
}

pub struct ExtrinsicHashLookup;

#[async_trait]
impl LookupStrategy for ExtrinsicHashLookup {
    fn name(&self) -> &'static str {
        "extrinsic"
    }

    async fn lookup(&self, api: &dyn ExplorerApi, hash: &str) -> ExplorerResult<ResolutionTarget> {
        let ex = api.extrinsic_by_hash(hash).await?;
        Ok(ResolutionTarget::ExtrinsicByIndex(ex.index))
    }
}

pub struct IdentifierResolver {
    api: Arc<dyn ExplorerApi>,
    strategies: Vec<Box<dyn LookupStrategy>>,
}

impl IdentifierResolver {
    /// Block hash first, then extrinsic hash.
    pub fn new(api: Arc<dyn ExplorerApi>) -> Self {
        Self::with_strategies(
            api,
            vec![Box::new(BlockHashLookup), Box::new(ExtrinsicHashLookup)],
        )
    }

    pub fn with_strategies(api: Arc<dyn ExplorerApi>, strategies: Vec<Box<dyn LookupStrategy>>) -> Self {
        Self { api, strategies }
    }

    pub async fn resolve(&self, query: &str) -> ResolutionTarget {
        let q = query.trim();
        match classify_query(q) {
            QueryKind::Empty => ResolutionTarget::NotFound("empty search query".to_string()),
            QueryKind::Number => match BlockNumber::parse(q) {
                Ok(n) => ResolutionTarget::BlockByNumber(n),
                Err(e) => ResolutionTarget::NotFound(e.to_string()),
            },
            QueryKind::Hash => self.resolve_hash(q).await,
            QueryKind::FreeText => ResolutionTarget::FreeTextSearch(q.to_string()),
        }
    }

    async fn resolve_hash(&self, hash: &str) -> ResolutionTarget {
        let mut last_err: Option<ExplorerError> = None;
        for strategy in &self.strategies {
            match strategy.lookup(self.api.as_ref(), hash).await {
                Ok(target) => {
                    log::debug!("[resolver] {hash} matched {}", strategy.name());
                    return target;
                }
                Err(e) => {
                    log::debug!("[resolver] {} lookup for {hash} failed: {e}", strategy.name());
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) if e.is_retryable() => {
                log::warn!("[resolver] error searching for hash {hash}: {e}");
                ResolutionTarget::NotFound(format!("error searching for hash {hash}: {e}"))
            }
            _ => ResolutionTarget::NotFound(self.nothing_matched(hash)),
        }
    }

    fn nothing_matched(&self, hash: &str) -> String {
        let names: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        match names.as_slice() {
            [] => format!("no lookup available for hash {hash}"),
            [one] => format!("{one} with hash {hash} not found"),
            many => format!("no {} matched hash {hash}", many.join(" or ")),
        }
    }
}
