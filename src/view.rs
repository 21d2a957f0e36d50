//! Detail views: block, extrinsic, account, and block search.
//!
//! A block view classifies the requested number against the shared range
//! before fetching anything. Only in-range numbers hit the network; future
//! and stale numbers produce an explanatory state instead.

use crate::api::ExplorerApi;
use crate::block_number::BlockNumber;
use crate::error::{ExplorerError, ExplorerResult};
use crate::pagination::{BlockPanels, ResourceKind, ResourcePanel};
use crate::range::{RangeClass, SharedRange};
use crate::types::{AccountBalances, Block, BlockSearch, Extrinsic, ExtrinsicIndex};
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub enum BlockViewState {
    Empty,
    /// Not produced yet as far as the indexer knows.
    Future {
        latest: BlockNumber,
        eta: Option<DateTime<Utc>>,
    },
    /// Older than anything indexed so far.
    Stale { oldest: BlockNumber },
    Loaded(Block),
    /// Block-level failure; panels carry their own errors.
    Failed(ExplorerError),
}

pub struct BlockView {
    api: Arc<dyn ExplorerApi>,
    range: SharedRange,
    current: Option<BlockNumber>,
    state: BlockViewState,
    panels: BlockPanels,
}

impl BlockView {
    pub fn new(api: Arc<dyn ExplorerApi>, range: SharedRange, page_size: u32) -> Self {
        Self {
            api,
            range,
            current: None,
            state: BlockViewState::Empty,
            panels: BlockPanels::new(page_size),
        }
    }

    pub fn current(&self) -> Option<&BlockNumber> {
        self.current.as_ref()
    }

    pub fn state(&self) -> &BlockViewState {
        &self.state
    }

    pub fn panels(&self) -> &BlockPanels {
        &self.panels
    }

    pub async fn open(&mut self, number: BlockNumber) -> &BlockViewState {
        let (class, snapshot, eta) = {
            let tracker = self.range.lock();
            (
                tracker.classify(&number),
                tracker.snapshot(),
                tracker.estimate_arrival(&number, Utc::now()),
            )
        };
        self.current = Some(number.clone());

        match (class, snapshot.latest_known, snapshot.oldest_known) {
            (RangeClass::Future, Some(latest), _) => {
                log::debug!("[view] block {number} is ahead of latest {latest}");
                self.panels.clear();
                self.state = BlockViewState::Future { latest, eta };
            }
            (RangeClass::Stale, _, Some(oldest)) => {
                log::debug!("[view] block {number} is older than {oldest}");
                self.panels.clear();
                self.state = BlockViewState::Stale { oldest };
            }
            _ => self.fetch(number).await,
        }
        &self.state
    }

    async fn fetch(&mut self, number: BlockNumber) {
        self.panels.set_block(&number);
        let api = self.api.clone();
        let (block, ()) = futures::join!(
            api.block_by_number(&number),
            self.panels.load_all(api.as_ref())
        );
        self.state = match block {
            Ok(block) => {
                self.range.observe_single(&block);
                BlockViewState::Loaded(block)
            }
            Err(e) => {
                log::warn!("[view] block {number}: {e}");
                BlockViewState::Failed(e)
            }
        };
    }

    /// Re-run the current request, e.g. after the feed has moved the range.
    pub async fn reload(&mut self) -> &BlockViewState {
        if let Some(n) = self.current.clone() {
            self.open(n).await;
        }
        &self.state
    }

    /// Move to `current + 1`. Stepping one past an observed head first raises
    /// the head with an optimistic hint so the block is fetched instead of
    /// being reported as future. A hinted head is never extended.
    pub async fn next(&mut self) -> &BlockViewState {
        let Some(current) = self.current.clone() else {
            return &self.state;
        };
        let target = current.successor();
        {
            let mut tracker = self.range.lock();
            if tracker.classify(&target) == RangeClass::Future
                && tracker.latest_known() == Some(&current)
                && !tracker.is_hinted()
            {
                tracker.hint_latest(&target);
            }
        }
        self.open(target).await
    }

    /// Move to `current - 1`; a no-op at block zero.
    pub async fn prev(&mut self) -> &BlockViewState {
        match self.current.as_ref().and_then(BlockNumber::predecessor) {
            Some(target) => self.open(target).await,
            None => &self.state,
        }
    }

    /// Switch one panel to another page and reload only that panel.
    pub async fn load_page(&mut self, kind: ResourceKind, page: u32) -> ExplorerResult<()> {
        let panel = self.panels.panel_mut(kind);
        panel.set_page(page)?;
        panel.refresh(self.api.as_ref()).await;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExtrinsicViewState {
    Empty,
    Loaded(Extrinsic),
    Failed(ExplorerError),
}

/// A single extrinsic and the events it emitted.
pub struct ExtrinsicView {
    api: Arc<dyn ExplorerApi>,
    current: Option<ExtrinsicIndex>,
    state: ExtrinsicViewState,
    events: ResourcePanel,
}

impl ExtrinsicView {
    pub fn new(api: Arc<dyn ExplorerApi>, page_size: u32) -> Self {
        Self {
            api,
            current: None,
            state: ExtrinsicViewState::Empty,
            events: ResourcePanel::new(ResourceKind::Events, page_size),
        }
    }

    pub fn current(&self) -> Option<&ExtrinsicIndex> {
        self.current.as_ref()
    }

    pub fn state(&self) -> &ExtrinsicViewState {
        &self.state
    }

    pub fn events(&self) -> &ResourcePanel {
        &self.events
    }

    pub async fn open_str(&mut self, index: &str) -> ExplorerResult<&ExtrinsicViewState> {
        let index: ExtrinsicIndex = index.trim().parse()?;
        Ok(self.open(index).await)
    }

    pub async fn open(&mut self, index: ExtrinsicIndex) -> &ExtrinsicViewState {
        self.events.set_block(index.block.clone());
        self.events.set_filter(Some(index.clone()));
        self.current = Some(index.clone());

        let api = self.api.clone();
        let (found, ()) = futures::join!(
            fetch_extrinsic(api.as_ref(), &index),
            self.events.refresh(api.as_ref())
        );
        self.state = match found {
            Ok(ex) => ExtrinsicViewState::Loaded(ex),
            Err(e) => {
                log::warn!("[view] extrinsic {index}: {e}");
                ExtrinsicViewState::Failed(e)
            }
        };
        &self.state
    }

    pub async fn next(&mut self) -> &ExtrinsicViewState {
        match self.current.as_ref().map(ExtrinsicIndex::next) {
            Some(target) => self.open(target).await,
            None => &self.state,
        }
    }

    /// A no-op at position zero.
    pub async fn prev(&mut self) -> &ExtrinsicViewState {
        match self.current.as_ref().and_then(ExtrinsicIndex::prev) {
            Some(target) => self.open(target).await,
            None => &self.state,
        }
    }
}

async fn fetch_extrinsic(api: &dyn ExplorerApi, index: &ExtrinsicIndex) -> ExplorerResult<Extrinsic> {
    let page = api.block_extrinsics(&index.block, 1, 1, Some(index)).await?;
    page.items
        .into_iter()
        .find(|ex| &ex.index == index)
        .ok_or_else(|| ExplorerError::not_found(format!("extrinsic {index}")))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccountLookup {
    Balances(AccountBalances),
    /// The account is known to the backend but holds nothing.
    NoBalances(String),
}

pub struct AccountView {
    api: Arc<dyn ExplorerApi>,
}

impl AccountView {
    pub fn new(api: Arc<dyn ExplorerApi>) -> Self {
        Self { api }
    }

    pub async fn lookup(&self, account_id: &str) -> ExplorerResult<AccountLookup> {
        let id = account_id.trim();
        if id.is_empty() {
            return Err(ExplorerError::invalid_format("account id is empty"));
        }
        let account = self.api.account_balances(id).await?;
        if account.balances.is_empty() {
            Ok(AccountLookup::NoBalances(account.account_id))
        } else {
            Ok(AccountLookup::Balances(account))
        }
    }
}

/// Run a block search and widen the known range with whatever comes back.
pub async fn search_blocks(
    api: &dyn ExplorerApi,
    range: &SharedRange,
    query: &BlockSearch,
) -> ExplorerResult<Vec<Block>> {
    let mut blocks = api.search_blocks(query).await?;
    range.observe(&blocks);
    blocks.sort_by(|a, b| b.number.cmp(&a.number));
    log::debug!("[view] search returned {} blocks", blocks.len());
    Ok(blocks)
}
