//! Recent-blocks, recent-extrinsics and head-events feeds.
//!
//! A feed fetches a fresh list, then applies it in one step: the cached list
//! is replaced while the shared range lock is held, so a reader holding the
//! range never sees a new head next to the previous list. `spawn_polling`
//! hands `refresh` to a [`PollingScheduler`].
//!
//! [`RecentEventsFeed`] follows the head: each refresh reloads recent blocks
//! and then one page of events for the newest indexed block.

use crate::api::ExplorerApi;
use crate::block_number::BlockNumber;
use crate::error::ExplorerResult;
use crate::pagination::{PageState, PanelState, ResourceKind, ResourcePanel};
use crate::poll::{PollHandle, PollingScheduler};
use crate::range::{RangeUpdate, SharedRange};
use crate::types::{Block, Extrinsic};
use anyhow::Context;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DEFAULT_RECENT_LIMIT: u32 = 50;

#[derive(Clone)]
pub struct RecentBlocksFeed {
    api: Arc<dyn ExplorerApi>,
    range: SharedRange,
    limit: u32,
    blocks: Arc<Mutex<Vec<Block>>>,
}

impl RecentBlocksFeed {
    pub fn new(api: Arc<dyn ExplorerApi>, range: SharedRange, limit: u32) -> Self {
        Self {
            api,
            range,
            limit: limit.max(1),
            blocks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn range(&self) -> &SharedRange {
        &self.range
    }

    /// Newest first.
    pub fn blocks(&self) -> Vec<Block> {
        self.blocks.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn latest(&self) -> Option<Block> {
        self.blocks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .first()
            .cloned()
    }

    pub async fn refresh(&self) -> ExplorerResult<RangeUpdate> {
        let mut fetched = self.api.recent_blocks(self.limit).await?;
        fetched.sort_by(|a, b| b.number.cmp(&a.number));
        // range guard first, list second; nothing takes them the other way round
        let mut tracker = self.range.lock();
        let update = tracker.observe(&fetched);

        if update.latest_moved {
            if let Some(head) = fetched.first() {
                log::info!("🔔 [feed] new head {} ({} blocks)", head.number, fetched.len());
            }
        } else {
            log::debug!("💤 [feed] no new blocks ({} fetched)", fetched.len());
        }

        *self.blocks.lock().unwrap_or_else(|p| p.into_inner()) = fetched;
        drop(tracker);
        Ok(update)
    }

    pub fn spawn_polling(&self, scheduler: &PollingScheduler, period: Duration) -> PollHandle {
        let feed = self.clone();
        scheduler.start("recent blocks", period, move || {
            let feed = feed.clone();
            async move {
                feed.refresh()
                    .await
                    .map(|_| ())
                    .context("refreshing recent blocks")
            }
        })
    }
}

#[derive(Clone)]
pub struct RecentExtrinsicsFeed {
    api: Arc<dyn ExplorerApi>,
    limit: u32,
    extrinsics: Arc<Mutex<Vec<Extrinsic>>>,
}

impl RecentExtrinsicsFeed {
    pub fn new(api: Arc<dyn ExplorerApi>, limit: u32) -> Self {
        Self {
            api,
            limit: limit.max(1),
            extrinsics: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn extrinsics(&self) -> Vec<Extrinsic> {
        self.extrinsics
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Returns how many extrinsics the refreshed list holds.
    pub async fn refresh(&self) -> ExplorerResult<usize> {
        let mut fetched = self.api.recent_extrinsics(self.limit).await?;
        fetched.sort_by(|a, b| {
            b.index
                .block
                .cmp(&a.index.block)
                .then(b.index.position.cmp(&a.index.position))
        });
        let count = fetched.len();
        log::debug!("[feed] {count} recent extrinsics");
        *self.extrinsics.lock().unwrap_or_else(|p| p.into_inner()) = fetched;
        Ok(count)
    }

    pub fn spawn_polling(&self, scheduler: &PollingScheduler, period: Duration) -> PollHandle {
        let feed = self.clone();
        scheduler.start("recent extrinsics", period, move || {
            let feed = feed.clone();
            async move {
                feed.refresh()
                    .await
                    .map(|_| ())
                    .context("refreshing recent extrinsics")
            }
        })
    }
}

/// Events of the newest indexed block, one page at a time.
#[derive(Clone)]
pub struct RecentEventsFeed {
    blocks: RecentBlocksFeed,
    panel: Arc<Mutex<ResourcePanel>>,
}

impl RecentEventsFeed {
    pub fn new(blocks: RecentBlocksFeed, page_size: u32) -> Self {
        Self {
            blocks,
            panel: Arc::new(Mutex::new(ResourcePanel::new(ResourceKind::Events, page_size))),
        }
    }

    fn panel(&self) -> std::sync::MutexGuard<'_, ResourcePanel> {
        self.panel.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// The block whose events are shown.
    pub fn head(&self) -> Option<BlockNumber> {
        self.panel().block().cloned()
    }

    pub fn page_state(&self) -> PageState {
        self.panel().page_state().clone()
    }

    pub fn state(&self) -> PanelState {
        self.panel().state().clone()
    }

    /// Select another page of the current head; takes effect on the next refresh.
    pub fn set_page(&self, page: u32) -> ExplorerResult<()> {
        self.panel().set_page(page)
    }

    /// Refresh recent blocks, move the panel to the latest known block and
    /// load the selected page. A new head resets the panel to page 1.
    /// Returns the block that was loaded, `None` while the range is empty.
    pub async fn refresh(&self) -> ExplorerResult<Option<BlockNumber>> {
        self.blocks.refresh().await?;
        let Some(head) = self.blocks.range().snapshot().latest_known else {
            return Ok(None);
        };

        let req = {
            let mut panel = self.panel();
            if panel.set_block(head.clone()) {
                log::debug!("[feed] events follow new head {head}");
            }
            panel.begin()
        };
        let Some(req) = req else {
            return Ok(None);
        };
        let result = req.run(self.blocks.api.as_ref()).await;
        let outcome = result.as_ref().map(|_| ()).map_err(|e| e.clone());
        self.panel().complete(req, result);
        outcome.map(|()| Some(head))
    }

    pub fn spawn_polling(&self, scheduler: &PollingScheduler, period: Duration) -> PollHandle {
        let feed = self.clone();
        scheduler.start("recent events", period, move || {
            let feed = feed.clone();
            async move {
                feed.refresh()
                    .await
                    .map(|_| ())
                    .context("refreshing head events")
            }
        })
    }
}
