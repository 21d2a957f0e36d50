//! dotx - read-only explorer core for an indexed ledger API
//!
//! The backend indexes new blocks at the head while backfill is still
//! catching up at the tail. This library keeps a client-side view consistent
//! with that sliding window: it tracks the indexed range, refreshes it on a
//! timer, pages through block sub-resources, and resolves search input.
//!
//! ## Layout
//!
//! - [`block_number`]: precision-safe decimal block numbers
//! - [`range`]: indexed-window tracking and future/stale classification
//! - [`poll`]: cancellable periodic refresh
//! - [`pagination`]: per-panel page cursors for extrinsics/events/logs
//! - [`resolver`]: search input to navigation target
//! - [`feed`], [`view`]: the pieces above wired to an [`api::ExplorerApi`]
//!
//! The `dotx` binary (feature `native`) drives all of it from the command line.

pub mod api;
pub mod block_number;
pub mod config;
pub mod error;
pub mod feed;
pub mod pagination;
pub mod poll;
pub mod range;
pub mod resolver;
pub mod types;
pub mod util_text;
pub mod view;

pub use api::{ExplorerApi, HttpApi};
pub use block_number::BlockNumber;
pub use error::{ExplorerError, ExplorerResult};
pub use feed::{RecentBlocksFeed, RecentEventsFeed, RecentExtrinsicsFeed};
pub use pagination::{BlockPanels, PageState, PanelState, ResourceKind, ResourcePanel};
pub use poll::{PollHandle, PollStatus, PollingScheduler};
pub use range::{RangeClass, RangeState, RangeTracker, SharedRange};
pub use resolver::{IdentifierResolver, LookupStrategy, ResolutionTarget};
pub use types::{Block, BlockSearch, Event, Extrinsic, ExtrinsicIndex, LogEntry};
pub use view::{AccountView, BlockView, BlockViewState, ExtrinsicView};
