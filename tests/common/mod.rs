//! In-memory explorer backend for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use dotx::api::ExplorerApi;
use dotx::types::{
    AccountBalances, AssetBalance, Block, BlockSearch, Event, EventSource, Extrinsic,
    ExtrinsicIndex, LogEntry, MethodRef, Page,
};
use dotx::{BlockNumber, ExplorerError, ExplorerResult};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MockApi {
    pub blocks: Mutex<Vec<Block>>,
    pub recent: Mutex<Vec<Block>>,
    pub extrinsics: Mutex<Vec<Extrinsic>>,
    pub events: Mutex<Vec<Event>>,
    pub logs: Mutex<HashMap<String, Vec<LogEntry>>>,
    pub accounts: Mutex<HashMap<String, AccountBalances>>,
    /// Forced failures keyed by operation name.
    pub failures: Mutex<HashMap<&'static str, ExplorerError>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks `lo..=hi`, all known by number and all in the recent list.
    pub fn with_chain(lo: u64, hi: u64) -> Self {
        let api = Self::new();
        let chain: Vec<Block> = (lo..=hi).map(block).collect();
        *api.blocks.lock().unwrap() = chain.clone();
        *api.recent.lock().unwrap() = chain.into_iter().rev().collect();
        api
    }

    pub fn fail(&self, op: &'static str, err: ExplorerError) {
        self.failures.lock().unwrap().insert(op, err);
    }

    pub fn heal(&self, op: &'static str) {
        self.failures.lock().unwrap().remove(op);
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn push_extrinsics(&self, n: u64, count: u32) {
        let mut xs = self.extrinsics.lock().unwrap();
        let mut evs = self.events.lock().unwrap();
        for pos in 0..count {
            xs.push(extrinsic(n, pos));
            evs.push(event(n, pos));
        }
    }

    fn enter(&self, op: &'static str) -> ExplorerResult<()> {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;
        match self.failures.lock().unwrap().get(op) {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

fn paginate<T: Clone>(items: Vec<T>, page: u32, page_size: u32) -> Page<T> {
    let total = items.len() as u64;
    let size = u64::from(page_size.max(1));
    let total_pages = total.div_ceil(size);
    let start = (u64::from(page.max(1)) - 1) * size;
    let items = items
        .into_iter()
        .skip(start as usize)
        .take(size as usize)
        .collect();
    Page {
        items,
        total,
        total_pages,
    }
}

#[async_trait]
impl ExplorerApi for MockApi {
    async fn recent_blocks(&self, limit: u32) -> ExplorerResult<Vec<Block>> {
        self.enter("recent_blocks")?;
        Ok(self
            .recent
            .lock()
            .unwrap()
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn block_by_number(&self, number: &BlockNumber) -> ExplorerResult<Block> {
        self.enter("block_by_number")?;
        self.blocks
            .lock()
            .unwrap()
            .iter()
            .find(|b| &b.number == number)
            .cloned()
            .ok_or_else(|| ExplorerError::not_found(format!("block {number}")))
    }

    async fn block_by_hash(&self, hash: &str) -> ExplorerResult<Block> {
        self.enter("block_by_hash")?;
        self.blocks
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.hash == hash)
            .cloned()
            .ok_or_else(|| ExplorerError::not_found(format!("block with hash {hash}")))
    }

    async fn search_blocks(&self, query: &BlockSearch) -> ExplorerResult<Vec<Block>> {
        self.enter("search_blocks")?;
        Ok(self
            .blocks
            .lock()
            .unwrap()
            .iter()
            .filter(|b| query.number.as_ref().map_or(true, |n| &b.number == n))
            .filter(|b| query.hash.as_deref().map_or(true, |h| h.is_empty() || b.hash == h))
            .filter(|b| query.author.as_deref().map_or(true, |a| b.author_id == a))
            .filter(|b| !query.finalized_only || b.finalized)
            .cloned()
            .collect())
    }

    async fn block_extrinsics(
        &self,
        number: &BlockNumber,
        page: u32,
        page_size: u32,
        filter: Option<&ExtrinsicIndex>,
    ) -> ExplorerResult<Page<Extrinsic>> {
        self.enter("block_extrinsics")?;
        let items: Vec<Extrinsic> = self
            .extrinsics
            .lock()
            .unwrap()
            .iter()
            .filter(|x| &x.index.block == number)
            .filter(|x| filter.map_or(true, |f| &x.index == f))
            .cloned()
            .collect();
        Ok(paginate(items, page, page_size))
    }

    async fn block_events(
        &self,
        number: &BlockNumber,
        page: u32,
        page_size: u32,
        filter: Option<&ExtrinsicIndex>,
    ) -> ExplorerResult<Page<Event>> {
        self.enter("block_events")?;
        let prefix = format!("{number}-");
        let wanted = filter.map(|f| f.to_string());
        let items: Vec<Event> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| {
                e.extrinsic_index
                    .as_deref()
                    .is_some_and(|i| i.starts_with(&prefix))
            })
            .filter(|e| wanted.is_none() || e.extrinsic_index == wanted)
            .cloned()
            .collect();
        Ok(paginate(items, page, page_size))
    }

    async fn block_logs(&self, number: &BlockNumber) -> ExplorerResult<Vec<LogEntry>> {
        self.enter("block_logs")?;
        Ok(self
            .logs
            .lock()
            .unwrap()
            .get(number.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn recent_extrinsics(&self, limit: u32) -> ExplorerResult<Vec<Extrinsic>> {
        self.enter("recent_extrinsics")?;
        Ok(self
            .extrinsics
            .lock()
            .unwrap()
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn extrinsic_by_hash(&self, hash: &str) -> ExplorerResult<Extrinsic> {
        self.enter("extrinsic_by_hash")?;
        self.extrinsics
            .lock()
            .unwrap()
            .iter()
            .find(|x| x.hash.as_deref() == Some(hash))
            .cloned()
            .ok_or_else(|| ExplorerError::not_found(format!("extrinsic with hash {hash}")))
    }

    async fn account_balances(&self, account_id: &str) -> ExplorerResult<AccountBalances> {
        self.enter("account_balances")?;
        self.accounts
            .lock()
            .unwrap()
            .get(account_id)
            .cloned()
            .ok_or_else(|| ExplorerError::not_found(format!("account {account_id}")))
    }
}

pub fn n(s: &str) -> BlockNumber {
    BlockNumber::parse(s).unwrap()
}

pub fn block(number: u64) -> Block {
    Block {
        number: BlockNumber::from(number),
        hash: format!("0xb{number:063x}"),
        parent_hash: format!("0xb{:063x}", number.saturating_sub(1)),
        state_root: String::new(),
        extrinsics_root: String::new(),
        timestamp: 1_700_000_000_000 + number as i64 * 6000,
        author_id: format!("author{}", number % 3),
        finalized: number % 2 == 0,
        extrinsics_count: 0,
        events_count: 0,
        logs_count: 0,
    }
}

pub fn extrinsic(number: u64, position: u32) -> Extrinsic {
    Extrinsic {
        index: ExtrinsicIndex::new(BlockNumber::from(number), position),
        method: MethodRef {
            pallet: "balances".into(),
            method: "transferKeepAlive".into(),
        },
        signer: Some("14alice".into()),
        success: true,
        pays_fee: true,
        hash: Some(format!("0xe{number:040x}{position:023x}")),
        nonce: Some(position.to_string()),
        tip: None,
        args: json!({"value": "1000"}),
    }
}

pub fn event(number: u64, position: u32) -> Event {
    Event {
        pallet: "system".into(),
        method: "ExtrinsicSuccess".into(),
        data: json!({}),
        source: EventSource::Extrinsic,
        extrinsic_index: Some(format!("{number}-{position}")),
    }
}

pub fn balance(asset: &str, amount: &str) -> AssetBalance {
    AssetBalance {
        asset_id: asset.into(),
        balance: amount.into(),
        symbol: Some("DOT".into()),
        decimals: Some(10),
    }
}
