//! Paginated sub-resources of a block.
//!
//! Each resource panel (extrinsics, events, logs) keeps its own page cursor.
//! A load is split into [`ResourcePanel::begin`], which snapshots the request
//! and moves the panel to `Loading`, and [`ResourcePanel::complete`], which
//! applies whatever response arrives. Requests are never cancelled or fenced:
//! the most recently completed response is the one shown.

use crate::api::ExplorerApi;
use crate::block_number::BlockNumber;
use crate::error::{ExplorerError, ExplorerResult};
use crate::types::{Event, Extrinsic, ExtrinsicIndex, LogEntry, Page};
use std::fmt;

pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Extrinsics,
    Events,
    Logs,
}

impl ResourceKind {
    pub fn is_paginated(self) -> bool {
        !matches!(self, ResourceKind::Logs)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Extrinsics => "extrinsics",
            ResourceKind::Events => "events",
            ResourceKind::Logs => "logs",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ResourceItems {
    Extrinsics(Vec<Extrinsic>),
    Events(Vec<Event>),
    Logs(Vec<LogEntry>),
}

impl ResourceItems {
    pub fn len(&self) -> usize {
        match self {
            ResourceItems::Extrinsics(v) => v.len(),
            ResourceItems::Events(v) => v.len(),
            ResourceItems::Logs(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResourcePage {
    pub items: ResourceItems,
    pub total: u64,
    pub total_pages: u64,
}

impl ResourcePage {
    fn from_page<T>(page: Page<T>, wrap: impl FnOnce(Vec<T>) -> ResourceItems) -> Self {
        Self {
            items: wrap(page.items),
            total: page.total,
            total_pages: page.total_pages,
        }
    }
}

/// Fetch one page of `kind` for `block`. Logs are returned whole and ignore
/// `page`/`page_size`.
pub async fn load(
    api: &dyn ExplorerApi,
    block: &BlockNumber,
    kind: ResourceKind,
    page: u32,
    page_size: u32,
    filter: Option<&ExtrinsicIndex>,
) -> ExplorerResult<ResourcePage> {
    match kind {
        ResourceKind::Extrinsics => {
            let p = api.block_extrinsics(block, page, page_size, filter).await?;
            Ok(ResourcePage::from_page(p, ResourceItems::Extrinsics))
        }
        ResourceKind::Events => {
            let p = api.block_events(block, page, page_size, filter).await?;
            Ok(ResourcePage::from_page(p, ResourceItems::Events))
        }
        ResourceKind::Logs => {
            let logs = api.block_logs(block).await?;
            Ok(ResourcePage::from_page(Page::whole(logs), ResourceItems::Logs))
        }
    }
}

/// Page cursor of one panel. Totals are `None` until the first response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageState {
    pub page: u32,
    pub page_size: u32,
    pub total: Option<u64>,
    pub total_pages: Option<u64>,
}

impl PageState {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            total: None,
            total_pages: None,
        }
    }

    fn reset(&mut self) {
        self.page = 1;
        self.total = None;
        self.total_pages = None;
    }

    pub fn has_next(&self) -> bool {
        self.total_pages.is_some_and(|tp| u64::from(self.page) < tp)
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum PanelState {
    #[default]
    Idle,
    Loading,
    Loaded(ResourcePage),
    Failed(ExplorerError),
}

/// Everything needed to run one load, detached from the panel so the panel
/// can keep changing while the request is in flight.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadRequest {
    pub kind: ResourceKind,
    pub block: BlockNumber,
    pub page: u32,
    pub page_size: u32,
    pub filter: Option<ExtrinsicIndex>,
}

impl LoadRequest {
    pub async fn run(&self, api: &dyn ExplorerApi) -> ExplorerResult<ResourcePage> {
        load(
            api,
            &self.block,
            self.kind,
            self.page,
            self.page_size,
            self.filter.as_ref(),
        )
        .await
    }
}

#[derive(Clone, Debug)]
pub struct ResourcePanel {
    kind: ResourceKind,
    block: Option<BlockNumber>,
    filter: Option<ExtrinsicIndex>,
    page: PageState,
    state: PanelState,
    shown: Option<LoadRequest>,
}

impl ResourcePanel {
    pub fn new(kind: ResourceKind, page_size: u32) -> Self {
        Self {
            kind,
            block: None,
            filter: None,
            page: PageState::new(page_size),
            state: PanelState::Idle,
            shown: None,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn block(&self) -> Option<&BlockNumber> {
        self.block.as_ref()
    }

    pub fn page_state(&self) -> &PageState {
        &self.page
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    /// The request whose response is currently displayed.
    pub fn shown(&self) -> Option<&LoadRequest> {
        self.shown.as_ref()
    }

    /// Point the panel at another block. Resets the cursor to page 1; a no-op
    /// returning `false` when the block is unchanged.
    pub fn set_block(&mut self, block: BlockNumber) -> bool {
        if self.block.as_ref() == Some(&block) {
            return false;
        }
        self.block = Some(block);
        self.page.reset();
        self.state = PanelState::Idle;
        true
    }

    /// Detach from any block and drop loaded results.
    pub fn clear(&mut self) {
        self.block = None;
        self.page.reset();
        self.state = PanelState::Idle;
        self.shown = None;
    }

    /// Restrict the panel to one extrinsic. Changing the filter resets paging.
    pub fn set_filter(&mut self, filter: Option<ExtrinsicIndex>) -> bool {
        if self.filter == filter {
            return false;
        }
        self.filter = filter;
        self.page.reset();
        self.state = PanelState::Idle;
        true
    }

    pub fn set_page(&mut self, page: u32) -> ExplorerResult<()> {
        if page == 0 {
            return Err(ExplorerError::invalid_format("page numbers start at 1"));
        }
        if !self.kind.is_paginated() && page != 1 {
            return Err(ExplorerError::invalid_format(format!("{} are not paginated", self.kind)));
        }
        if let Some(tp) = self.page.total_pages {
            if u64::from(page) > tp.max(1) {
                return Err(ExplorerError::invalid_format(format!(
                    "page {page} is beyond the last page ({tp})"
                )));
            }
        }
        self.page.page = page;
        Ok(())
    }

    pub fn next_page(&mut self) -> ExplorerResult<()> {
        self.set_page(self.page.page.saturating_add(1))
    }

    pub fn prev_page(&mut self) -> ExplorerResult<()> {
        self.set_page(self.page.page.saturating_sub(1))
    }

    /// Snapshot the current request and enter `Loading`. `None` until a block
    /// is selected.
    pub fn begin(&mut self) -> Option<LoadRequest> {
        let block = self.block.clone()?;
        self.state = PanelState::Loading;
        Some(LoadRequest {
            kind: self.kind,
            block,
            page: self.page.page,
            page_size: self.page.page_size,
            filter: self.filter.clone(),
        })
    }

    /// Apply a finished load. Always applied, even when a newer request has
    /// been issued since.
    pub fn complete(&mut self, req: LoadRequest, result: ExplorerResult<ResourcePage>) {
        match result {
            Ok(page) => {
                log::debug!(
                    "[pagination] {} block {} page {}: {} of {}",
                    req.kind,
                    req.block,
                    req.page,
                    page.items.len(),
                    page.total
                );
                self.page.total = Some(page.total);
                self.page.total_pages = Some(page.total_pages);
                self.state = PanelState::Loaded(page);
            }
            Err(e) => {
                log::warn!("[pagination] {} block {} failed: {e}", req.kind, req.block);
                self.state = PanelState::Failed(e);
            }
        }
        self.shown = Some(req);
    }

    pub async fn refresh(&mut self, api: &dyn ExplorerApi) {
        if let Some(req) = self.begin() {
            let result = req.run(api).await;
            self.complete(req, result);
        }
    }
}

/// The three resource panels of a block detail view.
#[derive(Clone, Debug)]
pub struct BlockPanels {
    pub extrinsics: ResourcePanel,
    pub events: ResourcePanel,
    pub logs: ResourcePanel,
}

impl BlockPanels {
    pub fn new(page_size: u32) -> Self {
        Self {
            extrinsics: ResourcePanel::new(ResourceKind::Extrinsics, page_size),
            events: ResourcePanel::new(ResourceKind::Events, page_size),
            logs: ResourcePanel::new(ResourceKind::Logs, page_size),
        }
    }

    pub fn set_block(&mut self, block: &BlockNumber) -> bool {
        let a = self.extrinsics.set_block(block.clone());
        let b = self.events.set_block(block.clone());
        let c = self.logs.set_block(block.clone());
        a || b || c
    }

    pub fn clear(&mut self) {
        self.extrinsics.clear();
        self.events.clear();
        self.logs.clear();
    }

    pub fn panel_mut(&mut self, kind: ResourceKind) -> &mut ResourcePanel {
        match kind {
            ResourceKind::Extrinsics => &mut self.extrinsics,
            ResourceKind::Events => &mut self.events,
            ResourceKind::Logs => &mut self.logs,
        }
    }

    /// Load all three panels concurrently. A failure stays in its own panel.
    pub async fn load_all(&mut self, api: &dyn ExplorerApi) {
        let (ex, ev, lg) = (
            self.extrinsics.begin(),
            self.events.begin(),
            self.logs.begin(),
        );
        let (ex_res, ev_res, lg_res) = futures::join!(
            run_opt(api, ex.as_ref()),
            run_opt(api, ev.as_ref()),
            run_opt(api, lg.as_ref())
        );
        if let (Some(req), Some(res)) = (ex, ex_res) {
            self.extrinsics.complete(req, res);
        }
        if let (Some(req), Some(res)) = (ev, ev_res) {
            self.events.complete(req, res);
        }
        if let (Some(req), Some(res)) = (lg, lg_res) {
            self.logs.complete(req, res);
        }
    }
}

async fn run_opt(
    api: &dyn ExplorerApi,
    req: Option<&LoadRequest>,
) -> Option<ExplorerResult<ResourcePage>> {
    match req {
        Some(req) => Some(req.run(api).await),
        None => None,
    }
}
